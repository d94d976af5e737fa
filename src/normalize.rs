use serde::{Deserialize, Serialize};

use crate::types::{Value, Vector};

// (value - min) / (max - min), unclamped; NaN or ±inf when min == max
pub fn normalize(value: Value, min: Value, max: Value) -> Value {
    (value - min) / (max - min)
}

// linearly map a number from one range to another
pub fn remap(s: Value, range_in: [Value; 2], range_out: [Value; 2]) -> Value {
    range_out[0] + normalize(s, range_in[0], range_in[1]) * (range_out[1] - range_out[0])
}

// Linear interpolation
pub fn lerp(a: Value, b: Value, t: Value) -> Value {
    a + (b - a) * t
}

/// Closed min/max pair of a data variable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataRange {
    pub min: Value,
    pub max: Value,
}

impl Default for DataRange {
    fn default() -> Self {
        Self { min: 0.0, max: 1.0 }
    }
}

impl DataRange {
    pub fn new(min: Value, max: Value) -> Self {
        Self { min, max }
    }

    /// See [`normalize`]. A degenerate range is not special-cased.
    pub fn normalize(&self, value: Value) -> Value {
        normalize(value, self.min, self.max)
    }

    /// [`normalize`](DataRange::normalize) clamped into `[0, 1]`.
    pub fn normalize_clamped(&self, value: Value) -> Value {
        self.normalize(value).clamp(0.0, 1.0)
    }
}

/// Scales an object between two sizes according to a data value.
///
/// Values at or below `range.min` give `min_scale`, at or above `range.max`
/// give `max_scale`, linear in between.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleMapping {
    pub range: DataRange,
    pub min_scale: Vector,
    pub max_scale: Vector,
}

impl Default for ScaleMapping {
    fn default() -> Self {
        Self {
            range: DataRange::default(),
            min_scale: Vector::repeat(1.0),
            max_scale: Vector::repeat(10.0),
        }
    }
}

impl ScaleMapping {
    pub fn scale_for(&self, value: Value) -> Vector {
        let t = self.range.normalize_clamped(value);
        self.min_scale.lerp(&self.max_scale, t)
    }
}
