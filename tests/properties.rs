//! Property-based tests for the query and color mapping cores.
//!
//! Run with: cargo test --test properties

use bevy::color::Srgba;
use bevy_data_probe::{
    colormap::{ColorMap, ControlPoint},
    locate::{nearest_point, points_within_radius},
    sampler::VolumeSampler,
    transform::{FrameChain, GroupFrame, VoxelFrame},
    types::{Aabb, Matrix, Point, Value, Vector},
};
use nalgebra::{Rotation3, Translation3};
use proptest::prelude::*;

// =============================================================================
// Strategies
// =============================================================================

fn arb_point(extent: Value) -> impl Strategy<Value = Point> {
    prop::array::uniform3(-extent..extent).prop_map(|[x, y, z]| Point::new(x, y, z))
}

/// Rigid motion plus a positive scale, i.e. something a scene graph can produce.
fn arb_frame() -> impl Strategy<Value = GroupFrame> {
    (
        arb_point(50.0),
        prop::array::uniform3(-3.0..3.0 as Value),
        0.1..10.0 as Value,
        prop::array::uniform3(0.5..20.0 as Value),
    )
        .prop_map(|(t, [roll, pitch, yaw], scale, data_scale)| {
            let root = Translation3::new(t.x, t.y, t.z).to_homogeneous()
                * Rotation3::from_euler_angles(roll, pitch, yaw).to_homogeneous()
                * Matrix::new_scaling(scale);
            let group_to_data = Matrix::new_nonuniform_scaling(&Vector::from(data_scale));
            GroupFrame::new(root, group_to_data)
        })
}

fn arb_color() -> impl Strategy<Value = Srgba> {
    prop::array::uniform3(0.0..=1.0 as Value).prop_map(|[r, g, b]| Srgba::rgb(r, g, b))
}

fn arb_color_map() -> impl Strategy<Value = ColorMap> {
    prop::collection::vec((-100.0..100.0 as Value, arb_color()), 2..8).prop_map(|points| {
        ColorMap::new(points.into_iter().map(|(v, c)| ControlPoint::new(v, c)))
    })
}

fn arb_grid() -> impl Strategy<Value = ([usize; 3], Vec<Value>)> {
    prop::array::uniform3(1..5usize).prop_flat_map(|dims| {
        let len = dims[0] * dims[1] * dims[2];
        prop::collection::vec(-50.0..50.0 as Value, len).prop_map(move |values| (dims, values))
    })
}

fn arb_lines() -> impl Strategy<Value = Vec<Vec<Point>>> {
    prop::collection::vec(prop::collection::vec(arb_point(10.0), 1..6), 1..6)
}

// =============================================================================
// Frames
// =============================================================================

proptest! {
    #[test]
    fn world_data_round_trip(frame in arb_frame(), p in arb_point(100.0)) {
        let chain = FrameChain::new(&frame, None).unwrap();
        let back = chain.data_to_world(&chain.world_to_data(&p));
        prop_assert!(nalgebra::distance(&back, &p) < 1e-2 * (1.0 + p.coords.norm()));
    }

    #[test]
    fn voxel_data_round_trip(
        min in arb_point(10.0),
        size in prop::array::uniform3(0.5..10.0 as Value),
        dims in prop::array::uniform3(1..64usize),
        v in prop::array::uniform3(0.0..64.0 as Value),
    ) {
        let max = min + Vector::from(size);
        let chain = FrameChain::new(
            &GroupFrame::default(),
            Some(VoxelFrame { bounds: Aabb::new(min, max), dims }),
        ).unwrap();
        let v = Point::from(v);
        let back = chain.data_to_voxel(&chain.voxel_to_data(&v));
        prop_assert!(nalgebra::distance(&back, &v) < 2e-2);
    }
}

// =============================================================================
// Nearest point and radius queries
// =============================================================================

proptest! {
    #[test]
    fn nearest_point_is_minimal_with_lowest_index(
        points in prop::collection::vec(arb_point(10.0), 1..32),
        q in arb_point(10.0),
    ) {
        let best = nearest_point(&points, &q).unwrap();
        let best_d = nalgebra::distance_squared(&points[best], &q);
        for (i, p) in points.iter().enumerate() {
            let d = nalgebra::distance_squared(p, &q);
            prop_assert!(d >= best_d);
            if i < best {
                prop_assert!(d > best_d);
            }
        }
    }

    #[test]
    fn radius_results_are_monotone_and_exact(
        lines in arb_lines(),
        q in arb_point(10.0),
        r1 in 0.0..10.0 as Value,
        extra in 0.0..10.0 as Value,
    ) {
        let small = points_within_radius(&lines, &q, r1);
        let large = points_within_radius(&lines, &q, r1 + extra);
        prop_assert!(small.iter().all(|l| large.contains(l)));
        for (l, line) in lines.iter().enumerate() {
            let touched = line.iter().any(|p| nalgebra::distance(p, &q) < r1);
            prop_assert_eq!(touched, small.contains(&l));
        }
        prop_assert!(small.windows(2).all(|w| w[0] < w[1]));
    }
}

// =============================================================================
// Volume sampling
// =============================================================================

proptest! {
    #[test]
    fn trilinear_equals_exact_on_grid((dims, values) in arb_grid()) {
        let s = VolumeSampler::from_slice(&values, dims, -9999.0).unwrap();
        for z in 0..dims[2] {
            for y in 0..dims[1] {
                for x in 0..dims[0] {
                    let p = Point::new(x as Value, y as Value, z as Value);
                    let voxel = [x as i64, y as i64, z as i64];
                    prop_assert_eq!(s.sample_trilinear(&p), s.sample_exact(voxel));
                }
            }
        }
    }

    #[test]
    fn trilinear_stays_within_data_range(
        (dims, values) in arb_grid(),
        p in arb_point(8.0),
    ) {
        let s = VolumeSampler::from_slice(&values, dims, -9999.0).unwrap();
        let lo = values.iter().copied().fold(Value::INFINITY, Value::min);
        let hi = values.iter().copied().fold(Value::NEG_INFINITY, Value::max);
        let v = s.sample_trilinear(&p);
        prop_assert!(v >= lo - 1e-3 && v <= hi + 1e-3, "{v} outside {lo}..{hi}");
    }

    #[test]
    fn trilinear_is_continuous_across_voxel_faces(
        (dims, values) in arb_grid(),
        p in prop::array::uniform3(0.0..4.0 as Value),
        axis in 0..3usize,
    ) {
        let s = VolumeSampler::from_slice(&values, dims, -9999.0).unwrap();
        let mut at = Point::from(p);
        at[axis] = at[axis].floor();
        let mut below = at;
        below[axis] -= 1e-3;
        let a = s.sample_trilinear(&at);
        let b = s.sample_trilinear(&below);
        // the steepest possible slope is the full value range per voxel
        prop_assert!((a - b).abs() <= 100.0 * 1e-3 + 1e-3);
    }
}

// =============================================================================
// Color maps
// =============================================================================

proptest! {
    #[test]
    fn control_points_are_sorted_unique_and_exact(map in arb_color_map()) {
        let points = map.control_points();
        prop_assert!(points.windows(2).all(|w| w[0].value < w[1].value));
        for p in points {
            prop_assert_eq!(map.lookup(p.value), p.color);
        }
    }

    #[test]
    fn add_then_lookup_returns_color(
        mut map in arb_color_map(),
        value in -200.0..200.0 as Value,
        color in arb_color(),
    ) {
        map.add_control_point(value, color);
        prop_assert_eq!(map.lookup(value), color);
    }

    #[test]
    fn values_beyond_ends_take_end_colors(map in arb_color_map(), past in 0.001..1000.0 as Value) {
        let points = map.control_points();
        let (first, last) = (points[0], points[points.len() - 1]);
        prop_assert_eq!(map.lookup(first.value - past), first.color);
        prop_assert_eq!(map.lookup(last.value + past), last.color);
    }
}
