use smallvec::SmallVec;

use crate::{
    accessor::{DataAccessor, VolumeAccessor},
    types::{Point, Value},
};

/// A change reported by [`DataProbe::update`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProbeEvent {
    /// The probe moved from outside the volume bounds to inside.
    Entered,
    Exited,
    /// The interpolated value under the probe changed.
    ValueChanged(Value),
    /// Same reading as the preceding `ValueChanged`, normalized against the volume range.
    NormalizedValueChanged(Value),
}

pub type ProbeEvents = SmallVec<[ProbeEvent; 3]>;

/// Tracks a moving point against a volume and reports what changed.
///
/// Outside the volume the last reading is kept, so `value()` always holds
/// the value from the last time the probe could read data.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DataProbe {
    inside: bool,
    value: Value,
    normalized: Value,
}

impl DataProbe {
    pub fn is_inside(&self) -> bool {
        self.inside
    }

    pub fn value(&self) -> Value {
        self.value
    }

    pub fn normalized_value(&self) -> Value {
        self.normalized
    }

    /// Moves the probe to `position` (world space) and samples `volume` there.
    pub fn update(&mut self, volume: &VolumeAccessor, position: &Point) -> ProbeEvents {
        let mut events = ProbeEvents::new();

        let inside = volume.contains_world_point(position);
        if inside != self.inside {
            self.inside = inside;
            events.push(if inside {
                ProbeEvent::Entered
            } else {
                ProbeEvent::Exited
            });
        }

        if self.inside {
            let value = volume.value_at_world(position);
            if value != self.value {
                self.value = value;
                self.normalized = volume.normalize_color_value(value);
                events.push(ProbeEvent::ValueChanged(value));
                events.push(ProbeEvent::NormalizedValueChanged(self.normalized));
            }
        }
        events
    }
}
