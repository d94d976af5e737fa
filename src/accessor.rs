//! Per-kind views onto whichever source is currently loaded.
//!
//! An accessor is configured with a key path and re-resolves its source on
//! every [`refresh`](DataAccessor::refresh), so it follows sources that are
//! swapped at runtime (a new timestep, a reloaded file). While nothing is
//! bound every query degrades to a sentinel: `out_of_range_value` for
//! scalars, `false` for predicates, the identity for frame conversions.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    context::ProbeContext,
    locate,
    normalize::{DataRange, normalize},
    sampler::VolumeSampler,
    source::{DataSource, KeyMatch, SourceGeometry, SourceKind, select_source},
    transform::{FrameChain, VoxelFrame},
    types::{Aabb, COLOR_CHANNEL, DEFAULT_OUT_OF_RANGE, Point, Scalars, TEXTURE_CHANNEL, Value},
    visibility::{RenderTrigger, Visibility},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessorConfig {
    /// Key of the source to bind when more than one of this kind is loaded.
    pub key_path: String,
    pub key_match: KeyMatch,
    /// Returned by scalar queries that cannot read data.
    pub out_of_range_value: Value,
}

impl Default for AccessorConfig {
    fn default() -> Self {
        Self {
            key_path: String::new(),
            key_match: KeyMatch::Prefix,
            out_of_range_value: DEFAULT_OUT_OF_RANGE,
        }
    }
}

impl AccessorConfig {
    pub fn with_key_path(key_path: impl Into<String>) -> Self {
        Self {
            key_path: key_path.into(),
            ..Default::default()
        }
    }
}

/// The source an accessor is bound to, with its frame chain and visibility.
pub struct SourceBinding {
    kind: SourceKind,
    pub config: AccessorConfig,
    source: Option<Arc<dyn DataSource>>,
    frames: FrameChain,
    visibility: Visibility,
}

impl SourceBinding {
    pub fn new(kind: SourceKind, config: AccessorConfig) -> Self {
        Self {
            kind,
            config,
            source: None,
            frames: FrameChain::unbound(),
            visibility: Visibility::new(0),
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn source(&self) -> Option<&dyn DataSource> {
        self.source.as_deref()
    }

    pub fn frames(&self) -> &FrameChain {
        &self.frames
    }

    pub fn visibility(&self) -> &Visibility {
        &self.visibility
    }

    pub fn visibility_mut(&mut self) -> &mut Visibility {
        &mut self.visibility
    }

    /// Re-runs source selection against the context's resolver.
    pub fn refresh(&mut self, ctx: &ProbeContext) {
        let candidates = ctx.sources(self.kind);
        let selected = select_source(
            &candidates,
            &self.config.key_path,
            self.config.key_match,
            self.kind,
        )
        .filter(|s| {
            let kind = s.geometry().kind();
            if kind != self.kind {
                warn!(
                    "Source '{}' holds {kind:?} data, expected {:?}",
                    s.key_path(),
                    self.kind
                );
            }
            kind == self.kind
        });
        self.bind(selected, ctx.render.as_ref());
    }

    /// Binds `source` directly, bypassing selection.
    ///
    /// Per-index visibility survives only if the new source has the same key
    /// and the same number of indices. A discarded per-index mask is replaced
    /// by "all visible", which is published for the new source.
    pub fn bind(&mut self, source: Option<Arc<dyn DataSource>>, render: &RenderTrigger) {
        let Some(source) = source else {
            self.unbind();
            return;
        };

        let (len, voxel) = match source.geometry() {
            SourceGeometry::Lines { lines, .. } => (lines.len(), None),
            SourceGeometry::Surface { points, .. } => (points.len(), None),
            SourceGeometry::Volume(values) => {
                let (nz, ny, nx) = values.dim();
                let voxel = VoxelFrame {
                    bounds: source.bounding_box(),
                    dims: [nx, ny, nz],
                };
                (values.len(), Some(voxel))
            }
        };

        let frames = match FrameChain::new(&source.frame(), voxel) {
            Ok(frames) => frames,
            Err(e) => {
                warn!("Cannot place source '{}' in the scene: {e}", source.key_path());
                self.unbind();
                return;
            }
        };

        let same_source = self
            .source
            .as_ref()
            .is_some_and(|old| old.key_path() == source.key_path());
        if !same_source || self.visibility.len() != len {
            debug!("Bound {:?} source '{}'", self.kind, source.key_path());
            let discarded = self.visibility.is_per_index();
            self.visibility = Visibility::new(len);
            if discarded {
                self.visibility.commit(source.key_path(), render);
            }
        }
        self.frames = frames;
        self.source = Some(source);
    }

    pub fn unbind(&mut self) {
        if let Some(old) = self.source.take() {
            debug!("Unbound {:?} source '{}'", self.kind, old.key_path());
        }
        self.frames = FrameChain::unbound();
        self.visibility = Visibility::new(0);
    }

    pub fn channel_range(&self, channel: usize) -> Option<DataRange> {
        self.source.as_ref()?.channel_range(channel)
    }

    /// Publishes the visibility of the bound source; a no-op while unbound.
    pub fn commit_visibility(&self, render: &RenderTrigger) {
        if let Some(source) = &self.source {
            self.visibility.commit(source.key_path(), render);
        }
    }

    pub fn reset_visibility(&mut self, render: &RenderTrigger) {
        if let Some(source) = &self.source {
            self.visibility.reset(source.key_path(), render);
        }
    }
}

/// Queries shared by every accessor kind.
pub trait DataAccessor {
    fn binding(&self) -> &SourceBinding;

    fn binding_mut(&mut self) -> &mut SourceBinding;

    /// Call once per update tick.
    fn refresh(&mut self, ctx: &ProbeContext) {
        self.binding_mut().refresh(ctx);
    }

    fn is_data_available(&self) -> bool {
        self.binding().source.is_some()
    }

    /// Changes the key path and re-resolves immediately.
    fn set_key_path(&mut self, key_path: impl Into<String>, ctx: &ProbeContext)
    where
        Self: Sized,
    {
        self.binding_mut().config.key_path = key_path.into();
        self.refresh(ctx);
    }

    fn out_of_range_value(&self) -> Value {
        self.binding().config.out_of_range_value
    }

    /// Extent of the data in data space; an empty box at the origin while unbound.
    fn bounds_in_data_space(&self) -> Aabb {
        self.binding()
            .source()
            .map(|s| s.bounding_box())
            .unwrap_or_default()
    }

    fn world_to_data(&self, p: &Point) -> Point {
        self.binding().frames.world_to_data(p)
    }

    fn data_to_world(&self, p: &Point) -> Point {
        self.binding().frames.data_to_world(p)
    }

    fn contains_world_point(&self, p: &Point) -> bool {
        self.contains_data_point(&self.world_to_data(p))
    }

    fn contains_data_point(&self, p: &Point) -> bool {
        self.is_data_available() && self.bounds_in_data_space().contains(p)
    }

    /// Minimum of `channel`, or the out-of-range value.
    fn min_value(&self, channel: usize) -> Value {
        self.binding()
            .channel_range(channel)
            .map_or(self.out_of_range_value(), |r| r.min)
    }

    /// Maximum of `channel`, or the out-of-range value.
    fn max_value(&self, channel: usize) -> Value {
        self.binding()
            .channel_range(channel)
            .map_or(self.out_of_range_value(), |r| r.max)
    }

    /// `value` relative to the range of `channel`, unclamped.
    fn normalize_value(&self, channel: usize, value: Value) -> Value {
        normalize(value, self.min_value(channel), self.max_value(channel))
    }

    fn min_color_value(&self) -> Value {
        self.min_value(COLOR_CHANNEL)
    }

    fn max_color_value(&self) -> Value {
        self.max_value(COLOR_CHANNEL)
    }

    fn normalize_color_value(&self, value: Value) -> Value {
        self.normalize_value(COLOR_CHANNEL, value)
    }

    fn min_texture_value(&self) -> Value {
        self.min_value(TEXTURE_CHANNEL)
    }

    fn max_texture_value(&self) -> Value {
        self.max_value(TEXTURE_CHANNEL)
    }

    fn normalize_texture_value(&self, value: Value) -> Value {
        self.normalize_value(TEXTURE_CHANNEL, value)
    }
}

macro_rules! accessor {
    ($name:ident, $kind:expr) => {
        impl $name {
            pub fn new(config: AccessorConfig) -> Self {
                Self {
                    binding: SourceBinding::new($kind, config),
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new(AccessorConfig::default())
            }
        }

        impl DataAccessor for $name {
            fn binding(&self) -> &SourceBinding {
                &self.binding
            }

            fn binding_mut(&mut self) -> &mut SourceBinding {
                &mut self.binding
            }
        }
    };
}

/// Queries over a set of polylines.
pub struct LineAccessor {
    binding: SourceBinding,
}

accessor!(LineAccessor, SourceKind::Lines);

impl LineAccessor {
    fn lines(&self) -> Option<(&[Vec<Point>], &[Vec<Scalars>])> {
        match self.binding.source()?.geometry() {
            SourceGeometry::Lines { lines, scalars } => Some((lines, scalars)),
            _ => None,
        }
    }

    pub fn line_count(&self) -> usize {
        self.lines().map_or(0, |(lines, _)| lines.len())
    }

    /// Index of the line with the vertex nearest to a world-space point.
    pub fn closest_line_world(&self, p: &Point) -> Option<usize> {
        self.closest_line_data(&self.world_to_data(p))
    }

    pub fn closest_line_data(&self, p: &Point) -> Option<usize> {
        let (lines, _) = self.lines()?;
        locate::nearest_in_line_set(lines, p)
    }

    /// Lines passing within `radius` of `p`, both in world units.
    pub fn nearby_lines_world(&self, p: &Point, radius: Value) -> Vec<usize> {
        let radius = self.binding.frames.world_radius_to_data(radius);
        self.nearby_lines_data(&self.world_to_data(p), radius)
    }

    pub fn nearby_lines_data(&self, p: &Point, radius: Value) -> Vec<usize> {
        self.lines()
            .map(|(lines, _)| locate::points_within_radius(lines, p, radius))
            .unwrap_or_default()
    }

    /// Mean of `channel` over every vertex of `line`.
    ///
    /// Returns the out-of-range value if nothing is bound or the line does not
    /// exist or has no vertices.
    pub fn average_scalar_on_line(&self, line: usize, channel: usize) -> Value {
        self.lines()
            .and_then(|(_, scalars)| scalars.get(line))
            .and_then(|s| locate::average_scalar(s, channel))
            .unwrap_or(self.out_of_range_value())
    }

    pub fn average_color_value_on_line(&self, line: usize) -> Value {
        self.average_scalar_on_line(line, COLOR_CHANNEL)
    }

    pub fn average_texture_value_on_line(&self, line: usize) -> Value {
        self.average_scalar_on_line(line, TEXTURE_CHANNEL)
    }

    /// Shows exactly the listed lines, hides the rest and publishes.
    pub fn set_visible_lines(&mut self, indices: &[usize], ctx: &ProbeContext) {
        if !self.is_data_available() {
            return;
        }
        self.binding.visibility_mut().set_visible_only(indices);
        self.binding.commit_visibility(ctx.render.as_ref());
    }

    pub fn reset_line_visibility(&mut self, ctx: &ProbeContext) {
        self.binding.reset_visibility(ctx.render.as_ref());
    }
}

/// Queries over the vertices of a surface.
pub struct SurfaceAccessor {
    binding: SourceBinding,
}

accessor!(SurfaceAccessor, SourceKind::Surface);

impl SurfaceAccessor {
    /// Scalar on `channel` at the vertex nearest to a data-space point.
    pub fn value_at_closest_data(&self, p: &Point, channel: usize) -> Value {
        let oor = self.out_of_range_value();
        match self.binding.source().map(|s| s.geometry()) {
            Some(SourceGeometry::Surface { points, scalars }) => {
                locate::nearest_surface_scalar(points, scalars, p, channel, oor)
            }
            _ => oor,
        }
    }

    pub fn color_value_at_closest_world(&self, p: &Point) -> Value {
        self.color_value_at_closest_data(&self.world_to_data(p))
    }

    pub fn color_value_at_closest_data(&self, p: &Point) -> Value {
        self.value_at_closest_data(p, COLOR_CHANNEL)
    }

    pub fn pattern_value_at_closest_world(&self, p: &Point) -> Value {
        self.pattern_value_at_closest_data(&self.world_to_data(p))
    }

    pub fn pattern_value_at_closest_data(&self, p: &Point) -> Value {
        self.value_at_closest_data(p, TEXTURE_CHANNEL)
    }
}

/// Queries over a voxel grid.
///
/// Voxel space places voxel `(i, j, k)` at integer coordinates `(i, j, k)`;
/// fractional coordinates address points between voxels.
pub struct VolumeAccessor {
    binding: SourceBinding,
}

accessor!(VolumeAccessor, SourceKind::Volume);

impl VolumeAccessor {
    /// Sampler over the bound grid, `None` while unbound.
    pub fn sampler(&self) -> Option<VolumeSampler<'_>> {
        match self.binding.source()?.geometry() {
            SourceGeometry::Volume(values) => {
                Some(VolumeSampler::new(values, self.out_of_range_value()))
            }
            _ => None,
        }
    }

    /// `[nx, ny, nz]`, all zero while unbound.
    pub fn dimensions(&self) -> [usize; 3] {
        self.sampler().map_or([0; 3], |s| s.dims())
    }

    pub fn world_to_voxel(&self, p: &Point) -> Point {
        self.binding.frames.world_to_voxel(p)
    }

    pub fn data_to_voxel(&self, p: &Point) -> Point {
        self.binding.frames.data_to_voxel(p)
    }

    pub fn voxel_to_data(&self, p: &Point) -> Point {
        self.binding.frames.voxel_to_data(p)
    }

    pub fn voxel_to_world(&self, p: &Point) -> Point {
        self.binding.frames.voxel_to_world(p)
    }

    pub fn contains_voxel_point(&self, p: &Point) -> bool {
        self.sampler().is_some_and(|s| s.contains(p))
    }

    /// Trilinear sample at a world-space point.
    pub fn value_at_world(&self, p: &Point) -> Value {
        self.value_at_voxel_point(&self.world_to_voxel(p))
    }

    /// Trilinear sample at a data-space point.
    pub fn value_at_data(&self, p: &Point) -> Value {
        self.value_at_voxel_point(&self.data_to_voxel(p))
    }

    /// Trilinear sample at fractional voxel coordinates.
    pub fn value_at_voxel_point(&self, p: &Point) -> Value {
        self.sampler()
            .map_or(self.out_of_range_value(), |s| s.sample_trilinear(p))
    }

    /// Value of the nearest voxel, no interpolation.
    pub fn value_at_nearest_voxel(&self, p: &Point) -> Value {
        self.sampler()
            .map_or(self.out_of_range_value(), |s| s.sample_nearest(p))
    }

    /// Value stored at integer voxel coordinates.
    pub fn value_at_voxel(&self, voxel: [i64; 3]) -> Value {
        self.sampler()
            .map_or(self.out_of_range_value(), |s| s.sample_exact(voxel))
    }

    /// Shows or hides one voxel.
    ///
    /// Nothing is published until [`apply_voxel_visibility`](Self::apply_voxel_visibility),
    /// so filters can touch every voxel and render once.
    pub fn set_voxel_visibility(&mut self, voxel: [usize; 3], visible: bool) {
        let [nx, ny, _] = self.dimensions();
        if !self.is_data_available() {
            return;
        }
        let [x, y, z] = voxel;
        let index = z
            .checked_mul(nx * ny)
            .and_then(|zi| y.checked_mul(nx)?.checked_add(zi))
            .and_then(|yz| yz.checked_add(x));
        if let Some(index) = index {
            self.binding.visibility_mut().set_visible(index, visible);
        }
    }

    pub fn apply_voxel_visibility(&self, ctx: &ProbeContext) {
        self.binding.commit_visibility(ctx.render.as_ref());
    }

    pub fn reset_voxel_visibility(&mut self, ctx: &ProbeContext) {
        self.binding.reset_visibility(ctx.render.as_ref());
    }
}
