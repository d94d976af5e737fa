use ndarray::{ArrayView3, ErrorKind, ShapeError};

use crate::{
    error::Result,
    types::{Point, Value},
};

/// Reads scalar values out of a regular voxel grid.
///
/// The grid is borrowed for the lifetime of the sampler. Values are indexed
/// `[z, y, x]`, which for a standard-layout array is the x-fastest flat order
///
/// ```text
/// linear = x + y·nx + z·nx·ny
/// ```
///
/// Voxel `(x, y, z)` is treated as a sample located exactly at integer voxel
/// coordinate `(x, y, z)`.
#[derive(Debug, Clone, Copy)]
pub struct VolumeSampler<'a> {
    grid: ArrayView3<'a, Value>,
    out_of_range: Value,
}

impl<'a> VolumeSampler<'a> {
    pub fn new(grid: ArrayView3<'a, Value>, out_of_range: Value) -> Self {
        Self { grid, out_of_range }
    }

    /// Wraps a flat x-fastest array with dimensions `[nx, ny, nz]`.
    ///
    /// Returns [`ProbeError::GridShape`](crate::error::ProbeError::GridShape)
    /// if `values.len() != nx·ny·nz`.
    pub fn from_slice(values: &'a [Value], dims: [usize; 3], out_of_range: Value) -> Result<Self> {
        let [nx, ny, nz] = dims;
        if values.len() != nx * ny * nz {
            return Err(ShapeError::from_kind(ErrorKind::IncompatibleShape).into());
        }
        let grid = ArrayView3::from_shape((nz, ny, nx), values)?;
        Ok(Self::new(grid, out_of_range))
    }

    /// `[nx, ny, nz]`
    pub fn dims(&self) -> [usize; 3] {
        let (nz, ny, nx) = self.grid.dim();
        [nx, ny, nz]
    }

    pub fn len(&self) -> usize {
        self.grid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grid.is_empty()
    }

    pub fn out_of_range(&self) -> Value {
        self.out_of_range
    }

    /// True if every axis of `p` lies in `[0, dim)`.
    pub fn contains(&self, p: &Point) -> bool {
        let dims = self.dims();
        (0..3).all(|a| p[a] >= 0.0 && p[a] < dims[a] as Value)
    }

    /// Value stored at integer voxel coordinates.
    ///
    /// Only the linear index is bounds-checked, mirroring a flat array read:
    /// an x past the end of a row reads into the next row. Returns the
    /// out-of-range value when the linear index falls outside the grid.
    pub fn sample_exact(&self, voxel: [i64; 3]) -> Value {
        let [nx, ny, _] = self.dims().map(|d| d as i64);
        let [x, y, z] = voxel;
        let linear = z
            .checked_mul(nx * ny)
            .and_then(|zi| y.checked_mul(nx)?.checked_add(zi))
            .and_then(|yz| yz.checked_add(x));
        let Some(linear) = linear.filter(|&l| l >= 0 && l < self.len() as i64) else {
            return self.out_of_range;
        };
        let linear = linear as usize;
        let (nx, ny) = (nx as usize, ny as usize);
        let index = (linear / (nx * ny), (linear / nx) % ny, linear % nx);
        self.grid.get(index).copied().unwrap_or(self.out_of_range)
    }

    /// Value of the voxel nearest to `p`, no interpolation.
    ///
    /// Points outside the grid (see [`contains`](VolumeSampler::contains))
    /// return the out-of-range value. Halfway coordinates round to even.
    pub fn sample_nearest(&self, p: &Point) -> Value {
        if !self.contains(p) {
            return self.out_of_range;
        }
        let dims = self.dims();
        let voxel: [i64; 3] = std::array::from_fn(|a| {
            (p[a].round_ties_even() as i64).clamp(0, dims[a] as i64 - 1)
        });
        self.sample_exact(voxel)
    }

    /// Trilinear interpolation of the 8 voxels surrounding `p`.
    ///
    /// Corner indices are clamped into the grid, so points outside take the
    /// value of the nearest face/edge/corner rather than being extrapolated.
    ///
    /// ```text
    /// 1. along x:  v000,v100 → vx00   v001,v101 → vx01
    ///              v010,v110 → vx10   v011,v111 → vx11
    /// 2. along z:  vx00,vx01 → vx0z   vx10,vx11 → vx1z
    /// 3. along y:  vx0z,vx1z → result
    /// ```
    ///
    /// The evaluation order is fixed; reordering the axes changes rounding.
    pub fn sample_trilinear(&self, p: &Point) -> Value {
        let dims = self.dims();
        let bracket = |a: usize| {
            let last = dims[a] as i64 - 1;
            let lo = (p[a].floor() as i64).clamp(0, last.max(0));
            let hi = (p[a].ceil() as i64).clamp(0, last.max(0));
            let frac = (p[a] - lo as Value).max(0.0);
            (lo, hi, frac)
        };
        let (x0, x1, xf) = bracket(0);
        let (y0, y1, yf) = bracket(1);
        let (z0, z1, zf) = bracket(2);

        let v000 = self.sample_exact([x0, y0, z0]);
        let v100 = self.sample_exact([x1, y0, z0]);
        let v010 = self.sample_exact([x0, y1, z0]);
        let v110 = self.sample_exact([x1, y1, z0]);
        let v001 = self.sample_exact([x0, y0, z1]);
        let v101 = self.sample_exact([x1, y0, z1]);
        let v011 = self.sample_exact([x0, y1, z1]);
        let v111 = self.sample_exact([x1, y1, z1]);

        let vx00 = v000 + xf * (v100 - v000);
        let vx01 = v001 + xf * (v101 - v001);
        let vx10 = v010 + xf * (v110 - v010);
        let vx11 = v011 + xf * (v111 - v011);

        let vx0z = vx00 + zf * (vx01 - vx00);
        let vx1z = vx10 + zf * (vx11 - vx10);

        vx0z + yf * (vx1z - vx0z)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    const OOR: Value = -9999.0;

    fn cube() -> Vec<Value> {
        (0..8).map(|v| v as Value).collect()
    }

    #[test]
    fn shape_mismatch_is_an_error() {
        let values = cube();
        assert!(VolumeSampler::from_slice(&values, [2, 2, 3], OOR).is_err());
    }

    #[test]
    fn exact_uses_x_fastest_order() {
        let values = cube();
        let s = VolumeSampler::from_slice(&values, [2, 2, 2], OOR).unwrap();
        assert_eq!(s.sample_exact([1, 0, 0]), 1.0);
        assert_eq!(s.sample_exact([0, 1, 0]), 2.0);
        assert_eq!(s.sample_exact([0, 0, 1]), 4.0);
        assert_eq!(s.sample_exact([1, 1, 1]), 7.0);
        assert_eq!(s.sample_exact([2, 1, 1]), OOR);
        assert_eq!(s.sample_exact([-1, 0, 0]), OOR);
        // row overflow is only caught by the linear bound
        assert_eq!(s.sample_exact([2, 0, 0]), 2.0);
    }

    #[test]
    fn exact_with_huge_coordinates_is_out_of_range() {
        let values = cube();
        let s = VolumeSampler::from_slice(&values, [2, 2, 2], OOR).unwrap();
        assert_eq!(s.sample_exact([0, 0, i64::MAX / 2]), OOR);
        assert_eq!(s.sample_exact([0, i64::MAX, 0]), OOR);
        assert_eq!(s.sample_exact([i64::MAX, 1, 0]), OOR);
        assert_eq!(s.sample_exact([i64::MIN, 0, 0]), OOR);
    }

    #[test]
    fn trilinear_centre_of_cube_is_mean() {
        let values = cube();
        let s = VolumeSampler::from_slice(&values, [2, 2, 2], OOR).unwrap();
        assert_relative_eq!(s.sample_trilinear(&Point::new(0.5, 0.5, 0.5)), 3.5);
    }

    #[test]
    fn trilinear_is_linear_along_each_axis() {
        // v = x + 2y + 4z is reproduced exactly by trilinear interpolation
        let values = cube();
        let s = VolumeSampler::from_slice(&values, [2, 2, 2], OOR).unwrap();
        let p = Point::new(0.25, 0.6, 0.1);
        assert_relative_eq!(s.sample_trilinear(&p), 0.25 + 1.2 + 0.4, epsilon = 1e-5);
    }

    #[test]
    fn trilinear_matches_exact_on_grid_points() {
        let values: Vec<Value> = (0..60).map(|v| (v as Value).sin()).collect();
        let s = VolumeSampler::from_slice(&values, [5, 4, 3], OOR).unwrap();
        for z in 0..3 {
            for y in 0..4 {
                for x in 0..5 {
                    let p = Point::new(x as Value, y as Value, z as Value);
                    assert_eq!(s.sample_trilinear(&p), s.sample_exact([x, y, z]));
                }
            }
        }
    }

    #[test]
    fn trilinear_holds_values_outside() {
        let values = cube();
        let s = VolumeSampler::from_slice(&values, [2, 2, 2], OOR).unwrap();
        assert_eq!(s.sample_trilinear(&Point::new(-3.0, 0.0, 0.0)), 0.0);
        assert_eq!(s.sample_trilinear(&Point::new(7.0, 7.0, 7.0)), 7.0);
        assert_ne!(s.sample_trilinear(&Point::new(-1.0, 9.0, 0.5)), OOR);
    }

    #[test]
    fn nearest_rounds_and_rejects_outside() {
        let values = cube();
        let s = VolumeSampler::from_slice(&values, [2, 2, 2], OOR).unwrap();
        assert_eq!(s.sample_nearest(&Point::new(0.4, 0.6, 0.2)), 2.0);
        assert_eq!(s.sample_nearest(&Point::new(1.9, 1.9, 1.9)), 7.0);
        // ties go to the even neighbour
        assert_eq!(s.sample_nearest(&Point::new(0.5, 0.0, 0.0)), 0.0);
        assert_eq!(s.sample_nearest(&Point::new(2.0, 0.0, 0.0)), OOR);
        assert_eq!(s.sample_nearest(&Point::new(-0.1, 0.0, 0.0)), OOR);
    }

    #[test]
    fn contains_is_half_open() {
        let values = cube();
        let s = VolumeSampler::from_slice(&values, [2, 2, 2], OOR).unwrap();
        assert!(s.contains(&Point::new(0.0, 0.0, 0.0)));
        assert!(s.contains(&Point::new(1.99, 1.99, 1.99)));
        assert!(!s.contains(&Point::new(2.0, 1.0, 1.0)));
    }
}
