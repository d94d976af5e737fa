use std::sync::Arc;

use ndarray::{Array3, ArrayView3};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    error::{ProbeError, Result},
    normalize::DataRange,
    transform::GroupFrame,
    types::{Aabb, COLOR_CHANNEL, Point, Scalars, Value},
};

/// The three spatial representations a source can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Lines,
    Surface,
    Volume,
}

/// Borrowed raw geometry of a source.
#[derive(Debug, Clone, Copy)]
pub enum SourceGeometry<'a> {
    Lines {
        lines: &'a [Vec<Point>],
        scalars: &'a [Vec<Scalars>],
    },
    Surface {
        points: &'a [Point],
        scalars: &'a [Scalars],
    },
    /// Indexed `[z, y, x]`.
    Volume(ArrayView3<'a, Value>),
}

impl SourceGeometry<'_> {
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Lines { .. } => SourceKind::Lines,
            Self::Surface { .. } => SourceKind::Surface,
            Self::Volume(_) => SourceKind::Volume,
        }
    }
}

/// Read-only view of one loaded dataset, as handed out by a [`SourceResolver`].
pub trait DataSource: Send + Sync {
    /// Identifier the source was loaded under, e.g. `"Fire/KeyData/Wind_18"`.
    fn key_path(&self) -> &str;

    /// Extent of the data in data space.
    fn bounding_box(&self) -> Aabb;

    /// Placement of the data in the scene.
    fn frame(&self) -> GroupFrame;

    /// Scalar at a flat vertex or voxel index. `None` past the end or for a missing channel.
    fn scalar_at(&self, index: usize, channel: usize) -> Option<Value>;

    /// Range of the variable mapped to `channel`.
    fn channel_range(&self, channel: usize) -> Option<DataRange>;

    fn geometry(&self) -> SourceGeometry<'_>;
}

/// Supplies the currently loaded sources of one kind.
///
/// Called on every refresh, so the set may change between ticks.
pub trait SourceResolver: Send + Sync {
    fn sources(&self, kind: SourceKind) -> Vec<Arc<dyn DataSource>>;
}

/// How a configured key path is compared against a source's key path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyMatch {
    /// The source key must start with the configured path. Lets a path select
    /// whatever timestep suffix is currently loaded.
    #[default]
    Prefix,
    Exact,
}

impl KeyMatch {
    pub fn matches(&self, key: &str, path: &str) -> bool {
        match self {
            Self::Prefix => key.starts_with(path),
            Self::Exact => key == path,
        }
    }
}

/// Picks the source to bind among `candidates`.
///
/// A single candidate is used whatever its key. With several, the last one
/// whose key matches `key_path` wins; if none match, a warning is logged and
/// nothing is bound.
pub fn select_source(
    candidates: &[Arc<dyn DataSource>],
    key_path: &str,
    key_match: KeyMatch,
    kind: SourceKind,
) -> Option<Arc<dyn DataSource>> {
    match candidates {
        [] => None,
        [only] => Some(Arc::clone(only)),
        _ => {
            let found = candidates
                .iter()
                .rev()
                .find(|s| key_match.matches(s.key_path(), key_path))
                .cloned();
            if found.is_none() {
                warn!(
                    "{} {kind:?} sources are loaded but none matches key path '{key_path}'; \
                     set the key path of the accessor to the source you want",
                    candidates.len()
                );
            }
            found
        }
    }
}

/// Min/max of every channel present in `tuples`, indexed by channel.
fn channel_ranges<'a>(tuples: impl IntoIterator<Item = &'a Scalars>) -> Vec<DataRange> {
    let mut ranges: Vec<DataRange> = Vec::new();
    for tuple in tuples {
        for (c, &v) in tuple.iter().enumerate() {
            match ranges.get_mut(c) {
                Some(r) => {
                    r.min = r.min.min(v);
                    r.max = r.max.max(v);
                }
                None => ranges.push(DataRange::new(v, v)),
            }
        }
    }
    ranges
}

#[derive(Debug, Clone, PartialEq)]
struct SourceMeta {
    key_path: String,
    frame: GroupFrame,
    bounds: Aabb,
    ranges: Vec<DataRange>,
}

impl SourceMeta {
    fn set_range(&mut self, channel: usize, range: DataRange) {
        if self.ranges.len() <= channel {
            self.ranges.resize(channel + 1, range);
        }
        self.ranges[channel] = range;
    }
}

macro_rules! impl_source_builders {
    ($ty:ty) => {
        impl $ty {
            pub fn with_frame(mut self, frame: GroupFrame) -> Self {
                self.meta.frame = frame;
                self
            }

            /// Overrides the bounds computed from the data.
            pub fn with_bounds(mut self, bounds: Aabb) -> Self {
                self.meta.bounds = bounds;
                self
            }

            /// Overrides the range computed from the data, e.g. with a range
            /// shared by every timestep of a series.
            pub fn with_range(mut self, channel: usize, range: DataRange) -> Self {
                self.meta.set_range(channel, range);
                self
            }
        }
    };
}

/// A set of polylines with per-vertex scalars.
#[derive(Debug, Clone, PartialEq)]
pub struct LineSet {
    meta: SourceMeta,
    lines: Vec<Vec<Point>>,
    scalars: Vec<Vec<Scalars>>,
}

impl LineSet {
    /// Returns [`ProbeError::MismatchedLengths`] if the number of lines or the
    /// vertex count of any line differs between `lines` and `scalars`.
    pub fn new(
        key_path: impl Into<String>,
        lines: Vec<Vec<Point>>,
        scalars: Vec<Vec<Scalars>>,
    ) -> Result<Self> {
        if lines.len() != scalars.len() {
            return Err(ProbeError::MismatchedLengths {
                points: lines.len(),
                scalars: scalars.len(),
            });
        }
        if let Some((l, s)) = lines
            .iter()
            .zip(&scalars)
            .find(|(l, s)| l.len() != s.len())
        {
            return Err(ProbeError::MismatchedLengths {
                points: l.len(),
                scalars: s.len(),
            });
        }
        let meta = SourceMeta {
            key_path: key_path.into(),
            frame: GroupFrame::default(),
            bounds: Aabb::from_points(lines.iter().flatten()),
            ranges: channel_ranges(scalars.iter().flatten()),
        };
        Ok(Self {
            meta,
            lines,
            scalars,
        })
    }

    pub fn lines(&self) -> &[Vec<Point>] {
        &self.lines
    }

    pub fn scalars(&self) -> &[Vec<Scalars>] {
        &self.scalars
    }
}

impl_source_builders!(LineSet);

impl DataSource for LineSet {
    fn key_path(&self) -> &str {
        &self.meta.key_path
    }

    fn bounding_box(&self) -> Aabb {
        self.meta.bounds
    }

    fn frame(&self) -> GroupFrame {
        self.meta.frame
    }

    /// `index` counts vertices across all lines in order.
    fn scalar_at(&self, index: usize, channel: usize) -> Option<Value> {
        self.scalars.iter().flatten().nth(index)?.get(channel).copied()
    }

    fn channel_range(&self, channel: usize) -> Option<DataRange> {
        self.meta.ranges.get(channel).copied()
    }

    fn geometry(&self) -> SourceGeometry<'_> {
        SourceGeometry::Lines {
            lines: &self.lines,
            scalars: &self.scalars,
        }
    }
}

/// Vertices of a surface mesh with per-vertex scalars.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfacePoints {
    meta: SourceMeta,
    points: Vec<Point>,
    scalars: Vec<Scalars>,
}

impl SurfacePoints {
    pub fn new(
        key_path: impl Into<String>,
        points: Vec<Point>,
        scalars: Vec<Scalars>,
    ) -> Result<Self> {
        if points.len() != scalars.len() {
            return Err(ProbeError::MismatchedLengths {
                points: points.len(),
                scalars: scalars.len(),
            });
        }
        let meta = SourceMeta {
            key_path: key_path.into(),
            frame: GroupFrame::default(),
            bounds: Aabb::from_points(&points),
            ranges: channel_ranges(&scalars),
        };
        Ok(Self {
            meta,
            points,
            scalars,
        })
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn scalars(&self) -> &[Scalars] {
        &self.scalars
    }
}

impl_source_builders!(SurfacePoints);

impl DataSource for SurfacePoints {
    fn key_path(&self) -> &str {
        &self.meta.key_path
    }

    fn bounding_box(&self) -> Aabb {
        self.meta.bounds
    }

    fn frame(&self) -> GroupFrame {
        self.meta.frame
    }

    fn scalar_at(&self, index: usize, channel: usize) -> Option<Value> {
        self.scalars.get(index)?.get(channel).copied()
    }

    fn channel_range(&self, channel: usize) -> Option<DataRange> {
        self.meta.ranges.get(channel).copied()
    }

    fn geometry(&self) -> SourceGeometry<'_> {
        SourceGeometry::Surface {
            points: &self.points,
            scalars: &self.scalars,
        }
    }
}

/// A regular grid of scalars covering `bounds`.
///
/// Holds a single channel, the variable mapped to color.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeGrid {
    meta: SourceMeta,
    values: Array3<Value>,
}

impl VolumeGrid {
    /// Wraps a flat x-fastest array with dimensions `[nx, ny, nz]`.
    ///
    /// Returns [`ProbeError::GridShape`] if `values.len() != nx·ny·nz`.
    pub fn new(
        key_path: impl Into<String>,
        values: Vec<Value>,
        dims: [usize; 3],
        bounds: Aabb,
    ) -> Result<Self> {
        let [nx, ny, nz] = dims;
        let values = Array3::from_shape_vec((nz, ny, nx), values)?;
        let (min, max) = values
            .iter()
            .fold((Value::INFINITY, Value::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let ranges = if values.is_empty() {
            Vec::new()
        } else {
            vec![DataRange::new(min, max)]
        };
        let meta = SourceMeta {
            key_path: key_path.into(),
            frame: GroupFrame::default(),
            bounds,
            ranges,
        };
        Ok(Self { meta, values })
    }

    /// `[nx, ny, nz]`
    pub fn dims(&self) -> [usize; 3] {
        let (nz, ny, nx) = self.values.dim();
        [nx, ny, nz]
    }

    pub fn values(&self) -> ArrayView3<'_, Value> {
        self.values.view()
    }
}

impl_source_builders!(VolumeGrid);

impl DataSource for VolumeGrid {
    fn key_path(&self) -> &str {
        &self.meta.key_path
    }

    fn bounding_box(&self) -> Aabb {
        self.meta.bounds
    }

    fn frame(&self) -> GroupFrame {
        self.meta.frame
    }

    fn scalar_at(&self, index: usize, channel: usize) -> Option<Value> {
        if channel != COLOR_CHANNEL {
            return None;
        }
        self.values.as_slice()?.get(index).copied()
    }

    fn channel_range(&self, channel: usize) -> Option<DataRange> {
        self.meta.ranges.get(channel).copied()
    }

    fn geometry(&self) -> SourceGeometry<'_> {
        SourceGeometry::Volume(self.values.view())
    }
}
