use std::sync::Arc;

use bevy::color::{Laba, Mix, Srgba};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    colormap_xml,
    error::{ProbeError, Result},
    normalize::{DataRange, normalize},
    types::Value,
};

/// Number of samples taken when a color map is built from a continuous source.
pub const DEFAULT_SAMPLE_COUNT: usize = 11;

/// A data value paired with the color it maps to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlPoint {
    pub value: Value,
    pub color: Srgba,
}

impl ControlPoint {
    pub fn new(value: Value, color: Srgba) -> Self {
        Self { value, color }
    }
}

/// A continuous color function over `[0, 1]`, e.g. a color asset owned by the host.
pub trait ColorSource {
    fn color_at(&self, t: Value) -> Srgba;
}

impl<F> ColorSource for F
where
    F: Fn(Value) -> Srgba,
{
    fn color_at(&self, t: Value) -> Srgba {
        self(t)
    }
}

/// Looks up color sources by identifier.
pub trait ColorAssetResolver {
    fn resolve(&self, id: &str) -> Option<Arc<dyn ColorSource + Send + Sync>>;
}

/// What [`ColorMap::lookup`] returns for data beyond the first/last control point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutOfRangePolicy {
    /// Stretch the end colors over everything outside the map.
    #[default]
    Clamp,
    /// Return [`ColorMapSettings::out_of_range_color`].
    SpecialColor,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorMapSettings {
    /// When set, this range is stretched over the control points instead of
    /// their own first/last values.
    pub custom_range: Option<DataRange>,
    pub out_of_range: OutOfRangePolicy,
    /// Returned for out-of-range data under [`OutOfRangePolicy::SpecialColor`],
    /// and by an empty map.
    pub out_of_range_color: Srgba,
}

impl Default for ColorMapSettings {
    fn default() -> Self {
        Self {
            custom_range: None,
            out_of_range: OutOfRangePolicy::Clamp,
            out_of_range_color: Srgba::BLACK,
        }
    }
}

/// Where a [`ColorMap`] takes its initial control points from.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorMapInit {
    /// A color asset resolved by identifier, sampled [`DEFAULT_SAMPLE_COUNT`] times.
    Asset(String),
    /// One row of texels, left to right.
    Gradient(Vec<Srgba>),
    /// ParaView color map XML.
    Xml(String),
    ControlPoints(Vec<ControlPoint>),
}

/// Piecewise color function defined by control points.
///
/// Control points are unique by value and always sorted ascending. Colors
/// between two control points are blended in CIE L\*a\*b\*, so the midpoint of
/// black and white is a perceptual mid-grey rather than the RGB average.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorMap {
    points: Vec<ControlPoint>,
    pub settings: ColorMapSettings,
}

impl ColorMap {
    pub fn new(points: impl IntoIterator<Item = ControlPoint>) -> Self {
        let mut map = Self::default();
        map.set_control_points(points);
        map
    }

    pub fn from_color_source(source: &dyn ColorSource, samples: usize) -> Self {
        let mut map = Self::default();
        map.set_from_color_source(source, samples);
        map
    }

    pub fn from_gradient(texels: &[Srgba], samples: usize) -> Self {
        let mut map = Self::default();
        map.set_from_gradient(texels, samples);
        map
    }

    pub fn from_paraview_xml(xml: &str) -> Result<Self> {
        Ok(Self::new(colormap_xml::parse_control_points(xml)?))
    }

    pub fn with_settings(mut self, settings: ColorMapSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn control_points(&self) -> &[ControlPoint] {
        &self.points
    }

    /// Replaces all control points.
    pub fn set_control_points(&mut self, points: impl IntoIterator<Item = ControlPoint>) {
        self.points.clear();
        for p in points {
            self.add_control_point(p.value, p.color);
        }
    }

    /// Inserts a control point, replacing any point with exactly this value.
    pub fn add_control_point(&mut self, value: Value, color: Srgba) {
        self.remove_point(value);
        self.points.push(ControlPoint::new(value, color));
        self.points.sort_by(|a, b| a.value.total_cmp(&b.value));
    }

    /// Removes the control point with exactly this value.
    ///
    /// Returns `false` (and logs a warning) if there is none.
    pub fn remove_control_point(&mut self, value: Value) -> bool {
        let found = self.remove_point(value);
        if !found {
            warn!("No color map control point with data value {value}");
        }
        found
    }

    fn remove_point(&mut self, value: Value) -> bool {
        match self.points.iter().position(|p| p.value == value) {
            Some(i) => {
                self.points.remove(i);
                true
            }
            None => false,
        }
    }

    /// Samples `source` at `samples` evenly spaced positions in `[0, 1]`.
    pub fn set_from_color_source(&mut self, source: &dyn ColorSource, samples: usize) {
        self.set_control_points(
            sample_positions(samples).map(|t| ControlPoint::new(t, source.color_at(t))),
        );
    }

    /// Samples a row of texels left to right with linear filtering.
    ///
    /// Texel `i` of `n` sits at `u = (i + 0.5) / n`; positions before the first
    /// or after the last texel center take that texel's color.
    pub fn set_from_gradient(&mut self, texels: &[Srgba], samples: usize) {
        if texels.is_empty() {
            warn!("Building a color map from an empty gradient");
            self.points.clear();
            return;
        }
        let sample = |u: Value| {
            let x = u * texels.len() as Value - 0.5;
            let last = texels.len() - 1;
            let i0 = (x.floor().max(0.0) as usize).min(last);
            let i1 = (i0 + 1).min(last);
            let t = (x - i0 as Value).clamp(0.0, 1.0);
            texels[i0].mix(&texels[i1], t)
        };
        self.set_control_points(sample_positions(samples).map(|u| ControlPoint::new(u, sample(u))));
    }

    /// Replaces the control points with those of a ParaView color map document.
    ///
    /// On error the map is left unchanged.
    pub fn set_from_paraview_xml(&mut self, xml: &str) -> Result<()> {
        let points = colormap_xml::parse_control_points(xml)?;
        self.set_control_points(points);
        Ok(())
    }

    /// Samples the color asset registered under `id`.
    pub fn set_from_asset(&mut self, assets: &dyn ColorAssetResolver, id: &str) -> Result<()> {
        let source = assets
            .resolve(id)
            .ok_or_else(|| ProbeError::UnknownColorAsset(id.to_owned()))?;
        self.set_from_color_source(source.as_ref(), DEFAULT_SAMPLE_COUNT);
        Ok(())
    }

    pub fn initialize(
        &mut self,
        init: &ColorMapInit,
        assets: &dyn ColorAssetResolver,
    ) -> Result<()> {
        match init {
            ColorMapInit::Asset(id) => self.set_from_asset(assets, id),
            ColorMapInit::Gradient(texels) => {
                self.set_from_gradient(texels, DEFAULT_SAMPLE_COUNT);
                Ok(())
            }
            ColorMapInit::Xml(xml) => self.set_from_paraview_xml(xml),
            ColorMapInit::ControlPoints(points) => {
                self.set_control_points(points.iter().copied());
                Ok(())
            }
        }
    }

    /// Re-expresses `value` from the custom range (if any) in the control points' own range.
    pub fn remap_to_control_range(&self, value: Value) -> Value {
        match (self.settings.custom_range, self.points.first(), self.points.last()) {
            (Some(range), Some(first), Some(last)) => {
                let t = normalize(value, range.min, range.max);
                first.value + t * (last.value - first.value)
            }
            _ => value,
        }
    }

    /// Color for a data value.
    ///
    /// ```text
    ///   0 points  →  out_of_range_color (with a warning)
    ///   1 point   →  that point's color
    ///   ≥2 points →  remap, bounds check, blend bracketing pair in Lab
    /// ```
    pub fn lookup(&self, value: Value) -> Srgba {
        let (first, last) = match self.points.as_slice() {
            [] => {
                warn!("Color lookup on an empty color map");
                return self.settings.out_of_range_color;
            }
            [only] => return only.color,
            [first, .., last] => (first, last),
        };

        let value = self.remap_to_control_range(value);
        let outside = value < first.value || value > last.value;
        if outside && self.settings.out_of_range == OutOfRangePolicy::SpecialColor {
            return self.settings.out_of_range_color;
        }
        if value >= last.value {
            return last.color;
        }
        if value <= first.value {
            return first.color;
        }

        // first point strictly above the value; exists because value < last
        let upper = self
            .points
            .iter()
            .position(|p| p.value > value)
            .unwrap_or(self.points.len() - 1);
        let (lo, hi) = (&self.points[upper - 1], &self.points[upper]);
        let alpha = (value - lo.value) / (hi.value - lo.value);
        if alpha <= 0.0 {
            return lo.color;
        }

        let blended = Laba::from(lo.color).mix(&Laba::from(hi.color), alpha);
        Srgba::from(blended)
    }
}

fn sample_positions(samples: usize) -> impl Iterator<Item = Value> {
    (0..samples).map(move |i| {
        if samples > 1 {
            i as Value / (samples - 1) as Value
        } else {
            0.0
        }
    })
}
