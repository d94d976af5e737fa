use serde::{Deserialize, Serialize};

use crate::{
    error::{ProbeError, Result},
    types::{Aabb, Matrix, Point, Value, Vector},
};

/// Placement of a data source inside the scene.
///
/// ```text
///   world  --root⁻¹-->  group  --group_to_data-->  data
/// ```
///
/// `root` is the group root's local-to-world matrix (what the scene graph
/// calls the global transform of the group). `group_to_data` undoes whatever
/// scale/offset the visualization applied to fit the data into the group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupFrame {
    pub root: Matrix,
    pub group_to_data: Matrix,
}

impl Default for GroupFrame {
    fn default() -> Self {
        Self {
            root: Matrix::identity(),
            group_to_data: Matrix::identity(),
        }
    }
}

impl GroupFrame {
    pub fn new(root: Matrix, group_to_data: Matrix) -> Self {
        Self {
            root,
            group_to_data,
        }
    }
}

/// Maps data space onto fractional voxel indices.
///
/// A point at `bounds.min` lands on voxel `0`, a point at `bounds.max` lands
/// on `dims` (one past the last voxel index).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoxelFrame {
    pub bounds: Aabb,
    pub dims: [usize; 3],
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct BoundChain {
    world_to_data: Matrix,
    data_to_world: Matrix,
    voxel: Option<VoxelFrame>,
}

/// Converts points between world, data and voxel space for one bound source.
///
/// An unbound chain (the [`Default`]) returns every input unchanged, so read
/// paths never have to check whether data is loaded before converting.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameChain {
    bound: Option<BoundChain>,
}

impl FrameChain {
    /// Builds the chain for a source placed by `frame`, optionally backed by a voxel grid.
    ///
    /// Returns [`ProbeError::SingularTransform`] if the composed world→data
    /// matrix cannot be inverted.
    pub fn new(frame: &GroupFrame, voxel: Option<VoxelFrame>) -> Result<Self> {
        let group_to_world = frame.root;
        let data_to_world = group_to_world
            * frame
                .group_to_data
                .try_inverse()
                .ok_or(ProbeError::SingularTransform)?;
        let world_to_data = data_to_world
            .try_inverse()
            .ok_or(ProbeError::SingularTransform)?;
        Ok(Self {
            bound: Some(BoundChain {
                world_to_data,
                data_to_world,
                voxel,
            }),
        })
    }

    /// The identity chain used while no source is bound.
    pub fn unbound() -> Self {
        Self::default()
    }

    pub fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    pub fn voxel_frame(&self) -> Option<&VoxelFrame> {
        self.bound.as_ref().and_then(|b| b.voxel.as_ref())
    }

    pub fn world_to_data(&self, p: &Point) -> Point {
        match &self.bound {
            Some(b) => b.world_to_data.transform_point(p),
            None => *p,
        }
    }

    pub fn data_to_world(&self, p: &Point) -> Point {
        match &self.bound {
            Some(b) => b.data_to_world.transform_point(p),
            None => *p,
        }
    }

    /// Transforms a direction; translation is ignored.
    pub fn world_vector_to_data(&self, v: &Vector) -> Vector {
        match &self.bound {
            Some(b) => b.world_to_data.transform_vector(v),
            None => *v,
        }
    }

    /// Length in data units of a world-space radius, measured along world +X.
    pub fn world_radius_to_data(&self, radius: Value) -> Value {
        self.world_vector_to_data(&Vector::new(radius, 0.0, 0.0)).norm()
    }

    /// Normalizes against the data bounds and scales by the grid dimensions.
    ///
    /// No clamping: a result below `0` or at/above `dims` means the point lies
    /// outside the grid.
    pub fn data_to_voxel(&self, p: &Point) -> Point {
        match self.voxel_frame() {
            Some(v) => {
                let size = v.bounds.size();
                let axis = |a: usize| (p[a] - v.bounds.min[a]) / size[a] * v.dims[a] as Value;
                Point::new(axis(0), axis(1), axis(2))
            }
            None => *p,
        }
    }

    /// Inverse of [`data_to_voxel`](FrameChain::data_to_voxel), axis by axis.
    pub fn voxel_to_data(&self, p: &Point) -> Point {
        match self.voxel_frame() {
            Some(v) => {
                let size = v.bounds.size();
                let axis = |a: usize| v.bounds.min[a] + p[a] / v.dims[a] as Value * size[a];
                Point::new(axis(0), axis(1), axis(2))
            }
            None => *p,
        }
    }

    pub fn world_to_voxel(&self, p: &Point) -> Point {
        self.data_to_voxel(&self.world_to_data(p))
    }

    pub fn voxel_to_world(&self, p: &Point) -> Point {
        self.data_to_world(&self.voxel_to_data(p))
    }
}
