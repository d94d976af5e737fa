use nalgebra::{Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Scalar data value sampled from a line, surface or volume.
pub type Value = f32;

/// A 3D point with [`Value`] components.
pub type Point = Point3<Value>;

/// A 3D vector with [`Value`] components.
pub type Vector = Vector3<Value>;

/// A homogeneous 4×4 affine transform.
pub type Matrix = Matrix4<Value>;

/// Per-vertex scalar tuple, one entry per mapped channel.
pub type Scalars = SmallVec<[Value; 2]>;

/// Channel holding the variable mapped to color.
pub const COLOR_CHANNEL: usize = 0;

/// Channel holding the variable mapped to the texture / pattern.
pub const TEXTURE_CHANNEL: usize = 1;

/// Value returned by queries when no data can be read.
pub const DEFAULT_OUT_OF_RANGE: Value = -9999.0;

/// Axis-aligned bounding box in data space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Point,
    pub max: Point,
}

impl Default for Aabb {
    /// An empty box at the origin.
    fn default() -> Self {
        Self {
            min: Point::origin(),
            max: Point::origin(),
        }
    }
}

impl Aabb {
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    /// Smallest box enclosing every point, or the empty default box when `points` is empty.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point>) -> Self {
        let mut iter = points.into_iter();
        let Some(first) = iter.next() else {
            return Self::default();
        };
        iter.fold(Self::new(*first, *first), |bounds, p| Self {
            min: bounds.min.inf(p),
            max: bounds.max.sup(p),
        })
    }

    pub fn size(&self) -> Vector {
        self.max - self.min
    }

    pub fn center(&self) -> Point {
        nalgebra::center(&self.min, &self.max)
    }

    /// Inclusive on both faces.
    pub fn contains(&self, p: &Point) -> bool {
        (0..3).all(|a| p[a] >= self.min[a] && p[a] <= self.max[a])
    }
}
