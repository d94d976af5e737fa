//! Brute-force nearest-vertex and radius queries.
//!
//! Every query is a linear scan. Datasets are small enough (and queries are
//! made at most a few times per frame) that building a spatial index would
//! cost more than it saves.

use crate::types::{Point, Scalars, Value};

/// Index of the point closest to `query`, or `None` if `points` is empty.
///
/// Ties resolve to the lowest index: a later point must be strictly closer to
/// replace the current best.
pub fn nearest_point(points: &[Point], query: &Point) -> Option<usize> {
    let mut best: Option<(usize, Value)> = None;
    for (i, p) in points.iter().enumerate() {
        let d = nalgebra::distance_squared(p, query);
        match best {
            Some((_, best_d)) if d >= best_d => {}
            _ => best = Some((i, d)),
        }
    }
    best.map(|(i, _)| i)
}

/// Index of the line owning the vertex closest to `query`.
///
/// This is a vertex test, not a segment test: a line whose segments pass
/// nearer to the query can lose to a line with a closer vertex. Returns
/// `None` when there are no vertices at all.
pub fn nearest_in_line_set(lines: &[Vec<Point>], query: &Point) -> Option<usize> {
    let mut best: Option<(usize, Value)> = None;
    for (l, line) in lines.iter().enumerate() {
        for p in line {
            let d = nalgebra::distance_squared(p, query);
            match best {
                Some((_, best_d)) if d >= best_d => {}
                _ => best = Some((l, d)),
            }
        }
    }
    best.map(|(l, _)| l)
}

/// Indices of every line with at least one vertex strictly closer than `radius`.
///
/// Each line appears once, in ascending order (the order lines are first
/// touched by the scan).
pub fn points_within_radius(lines: &[Vec<Point>], query: &Point, radius: Value) -> Vec<usize> {
    lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.iter().any(|p| nalgebra::distance(p, query) < radius))
        .map(|(l, _)| l)
        .collect()
}

/// Scalar on `channel` at the vertex nearest to `query`.
///
/// Returns `out_of_range` when there are no points or the nearest vertex has
/// no value on that channel.
pub fn nearest_surface_scalar(
    points: &[Point],
    scalars: &[Scalars],
    query: &Point,
    channel: usize,
    out_of_range: Value,
) -> Value {
    nearest_point(points, query)
        .and_then(|i| scalars.get(i))
        .and_then(|tuple| tuple.get(channel).copied())
        .unwrap_or(out_of_range)
}

/// Mean of `channel` over the vertices of one line, `None` for an empty line.
pub fn average_scalar(line_scalars: &[Scalars], channel: usize) -> Option<Value> {
    if line_scalars.is_empty() {
        return None;
    }
    let sum: Value = line_scalars
        .iter()
        .map(|tuple| tuple.get(channel).copied().unwrap_or(0.0))
        .sum();
    Some(sum / line_scalars.len() as Value)
}
