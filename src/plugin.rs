use bevy::prelude::*;

use tracing::warn;

use crate::{
    accessor::{AccessorConfig, DataAccessor, LineAccessor, SurfaceAccessor, VolumeAccessor},
    colormap::ColorMap,
    context::ProbeContext,
    normalize::ScaleMapping,
    probe::{DataProbe, ProbeEvent},
    source::{KeyMatch, SourceKind},
    timestep::TimestepSequence,
    transform::GroupFrame,
    types::{Matrix, Point, Value},
};

/// System sets for the probe pipeline.
///
/// Use these to order your own systems relative to sampling:
///
/// ```rust,ignore
/// // Load data into the registry before accessors re-resolve:
/// app.add_systems(Update, load_sources.before(ProbeSet::Refresh));
/// ```
///
/// ```text
/// ProbeSet::Refresh  →  ProbeSet::Sample  →  [your systems]  →  ProbeSet::Apply
/// ```
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProbeSet {
    /// Steps [`TimestepPlayback`], then re-resolves every accessor in
    /// [`ProbeAccessors`] against [`ProbeContextRes`].
    Refresh,
    /// Samples [`VolumeProbe`]s, writes [`ProbeMessage`]s and runs
    /// [`NearbyLineFilter`]s.
    Sample,
    /// Applies [`ScaleFromData`] and [`ColorFromData`].
    Apply,
}

/// The host's collaborators, see [`ProbeContext`].
///
/// Not inserted by the plugin. Until the host inserts it, accessors stay unbound.
#[derive(Resource)]
pub struct ProbeContextRes(pub ProbeContext);

/// One accessor of each kind, refreshed every frame.
#[derive(Resource, Default)]
pub struct ProbeAccessors {
    pub lines: LineAccessor,
    pub surface: SurfaceAccessor,
    pub volume: VolumeAccessor,
}

/// Runtime configuration for the probe pipeline.
///
/// Inserted as a resource by [`DataProbePlugin`]. Changes are picked up on the
/// next [`ProbeSet::Refresh`]:
///
/// ```rust,ignore
/// fn select_temperature(mut config: ResMut<ProbeConfig>) {
///     config.volume.key_path = "Fire/KeyData/Temperature".into();
/// }
/// ```
#[derive(Resource, Debug, Clone, Default, PartialEq)]
pub struct ProbeConfig {
    pub lines: AccessorConfig,
    pub surface: AccessorConfig,
    pub volume: AccessorConfig,
}

impl ProbeConfig {
    pub fn for_kind(&self, kind: SourceKind) -> &AccessorConfig {
        match kind {
            SourceKind::Lines => &self.lines,
            SourceKind::Surface => &self.surface,
            SourceKind::Volume => &self.volume,
        }
    }

    pub fn for_kind_mut(&mut self, kind: SourceKind) -> &mut AccessorConfig {
        match kind {
            SourceKind::Lines => &mut self.lines,
            SourceKind::Surface => &mut self.surface,
            SourceKind::Volume => &mut self.volume,
        }
    }
}

/// Turns an entity into a probe of the volume in [`ProbeAccessors::volume`].
///
/// Sampled at the translation of its [`GlobalTransform`].
#[derive(Component, Debug, Default, Clone, Copy)]
pub struct VolumeProbe(pub DataProbe);

/// A [`ProbeEvent`] raised by the [`VolumeProbe`] on `entity`.
#[derive(Message, Debug, Clone, Copy, PartialEq)]
pub struct ProbeMessage {
    pub entity: Entity,
    pub event: ProbeEvent,
}

/// Scales the entity's [`Transform`] according to `value`.
///
/// If the entity is also a [`VolumeProbe`], `value` follows the probe reading
/// while the probe is inside the volume.
#[derive(Component, Debug, Default, Clone, Copy)]
#[require(Transform)]
pub struct ScaleFromData {
    pub mapping: ScaleMapping,
    pub value: Value,
}

/// Colors the entity's [`StandardMaterial`] by looking `value` up in `map`.
///
/// Like [`ScaleFromData`], `value` follows the reading of a [`VolumeProbe`] on
/// the same entity while the probe is inside the volume.
#[derive(Component, Debug, Default, Clone)]
pub struct ColorFromData {
    pub map: ColorMap,
    pub value: Value,
}

/// Shows only the lines of [`ProbeAccessors::lines`] that pass within
/// `radius` world units of the entity.
///
/// With several filters a line is shown if any of them is close to it.
#[derive(Component, Debug, Clone, Copy)]
pub struct NearbyLineFilter {
    pub radius: Value,
}

impl Default for NearbyLineFilter {
    fn default() -> Self {
        Self { radius: 75.0 }
    }
}

/// Timestep animation driven by [`Time`].
///
/// The accessors of every kind in `targets` are pointed at the data of the
/// current timestep, `sequence.key_path_for(number)`. Timesteps without data
/// are dropped the first time sources of a target kind are available.
///
/// Not inserted by the plugin:
///
/// ```rust,ignore
/// let wind = TimestepSequence::new(TimestepRange { first: 4, last: 74, step: 14 })
///     .with_base_key_path("LANL/FireSim/KeyData/Wind_");
/// app.insert_resource(TimestepPlayback::new(wind, [SourceKind::Lines]));
/// ```
#[derive(Resource, Debug, Clone)]
pub struct TimestepPlayback {
    pub sequence: TimestepSequence,
    pub targets: Vec<SourceKind>,
    checked: bool,
}

impl TimestepPlayback {
    pub fn new(sequence: TimestepSequence, targets: impl IntoIterator<Item = SourceKind>) -> Self {
        Self {
            sequence,
            targets: targets.into_iter().collect(),
            checked: false,
        }
    }
}

/// The timestep shown by [`TimestepPlayback`] changed.
#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestepMessage(pub i32);

/// Bevy plugin that keeps accessors bound and probes sampled.
///
/// When the `auto_refresh` feature is enabled the pipeline runs every frame:
///
/// ```text
/// TimestepPlayback ticked                   (ProbeSet::Refresh)
///   → timestep key path written to config   (ProbeSet::Refresh)
///   → accessor configs updated if changed   (ProbeSet::Refresh)
///   → accessors re-resolved                 (ProbeSet::Refresh)
///   → VolumeProbe sampled, ProbeMessages    (ProbeSet::Sample)
///   → NearbyLineFilter applied              (ProbeSet::Sample)
///   → [your systems here]
///   → Transform scaled from data            (ProbeSet::Apply)
///   → material colored from data            (ProbeSet::Apply)
/// ```
#[derive(Default)]
pub struct DataProbePlugin {
    /// Initial value for [`ProbeConfig`].
    pub config: ProbeConfig,
}

impl Plugin for DataProbePlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(self.config.clone())
            .init_resource::<ProbeAccessors>()
            .add_message::<ProbeMessage>()
            .add_message::<TimestepMessage>();

        #[cfg(feature = "auto_refresh")]
        app.configure_sets(
            Update,
            (ProbeSet::Refresh, ProbeSet::Sample, ProbeSet::Apply).chain(),
        )
        .add_systems(
            Update,
            (
                (tick_timesteps, follow_timestep, refresh_accessors)
                    .chain()
                    .in_set(ProbeSet::Refresh),
                (sample_probes, filter_nearby_lines)
                    .chain()
                    .in_set(ProbeSet::Sample),
                (apply_scale_from_data, apply_color_from_data).in_set(ProbeSet::Apply),
            ),
        );
    }
}

/// Converts a scene transform into the matrix type used by [`GroupFrame`].
pub fn matrix_from_transform(transform: &GlobalTransform) -> Matrix {
    let mat = Mat4::from(transform.affine());
    Matrix::from_column_slice(&mat.to_cols_array())
}

/// Placement of a source whose group root is the entity at `root`.
pub fn group_frame(root: &GlobalTransform, group_to_data: Matrix) -> GroupFrame {
    GroupFrame::new(matrix_from_transform(root), group_to_data)
}

/// Copies [`ProbeConfig`] into the accessors when it changed, then re-resolves them.
pub fn refresh_accessors(
    config: Res<ProbeConfig>,
    context: Option<Res<ProbeContextRes>>,
    mut accessors: ResMut<ProbeAccessors>,
) {
    if config.is_changed() {
        accessors.lines.binding_mut().config = config.lines.clone();
        accessors.surface.binding_mut().config = config.surface.clone();
        accessors.volume.binding_mut().config = config.volume.clone();
    }

    let Some(context) = context else {
        return;
    };
    let ctx = &context.0;
    accessors.lines.refresh(ctx);
    accessors.surface.refresh(ctx);
    accessors.volume.refresh(ctx);
}

/// Samples every [`VolumeProbe`] at its global translation.
pub fn sample_probes(
    accessors: Res<ProbeAccessors>,
    mut probes: Query<(Entity, &mut VolumeProbe, &GlobalTransform)>,
    mut messages: MessageWriter<ProbeMessage>,
) {
    for (entity, mut probe, transform) in probes.iter_mut() {
        let t = transform.translation();
        let position = Point::new(t.x, t.y, t.z);
        for event in probe.0.update(&accessors.volume, &position) {
            messages.write(ProbeMessage { entity, event });
        }
    }
}

/// Sets [`Transform::scale`] from each [`ScaleFromData`].
pub fn apply_scale_from_data(
    mut query: Query<(&mut ScaleFromData, &mut Transform, Option<&VolumeProbe>)>,
) {
    for (mut scale, mut transform, probe) in query.iter_mut() {
        if let Some(probe) = probe.filter(|p| p.0.is_inside()) {
            scale.value = probe.0.value();
        }
        let s = scale.mapping.scale_for(scale.value);
        transform.scale = Vec3::new(s.x, s.y, s.z);
    }
}

/// Shows the lines near any [`NearbyLineFilter`] and hides the rest.
pub fn filter_nearby_lines(
    context: Option<Res<ProbeContextRes>>,
    mut accessors: ResMut<ProbeAccessors>,
    filters: Query<(&NearbyLineFilter, &GlobalTransform)>,
) {
    let Some(context) = context else {
        return;
    };
    if filters.is_empty() || !accessors.lines.is_data_available() {
        return;
    }
    let mut nearby = Vec::new();
    for (filter, transform) in filters.iter() {
        let t = transform.translation();
        let position = Point::new(t.x, t.y, t.z);
        nearby.extend(accessors.lines.nearby_lines_world(&position, filter.radius));
    }
    nearby.sort_unstable();
    nearby.dedup();
    accessors.lines.set_visible_lines(&nearby, &context.0);
}

/// Sets the base color of each [`ColorFromData`] entity's material.
pub fn apply_color_from_data(
    mut query: Query<(
        &mut ColorFromData,
        Option<&VolumeProbe>,
        Option<&MeshMaterial3d<StandardMaterial>>,
    )>,
    materials: Option<ResMut<Assets<StandardMaterial>>>,
) {
    let Some(mut materials) = materials else {
        return;
    };
    for (mut color, probe, material) in query.iter_mut() {
        if let Some(probe) = probe.filter(|p| p.0.is_inside()) {
            color.value = probe.0.value();
        }
        let Some(material) = material else {
            continue;
        };
        let base_color = Color::from(color.map.lookup(color.value));
        if materials
            .get(&material.0)
            .is_some_and(|m| m.base_color == base_color)
        {
            continue;
        }
        if let Some(m) = materials.get_mut(&material.0).as_deref_mut() {
            m.base_color = base_color;
        }
    }
}

/// Steps [`TimestepPlayback`] at its configured rate.
pub fn tick_timesteps(
    time: Res<Time>,
    context: Option<Res<ProbeContextRes>>,
    playback: Option<ResMut<TimestepPlayback>>,
    mut messages: MessageWriter<TimestepMessage>,
) {
    let Some(mut playback) = playback else {
        return;
    };
    if !playback.checked {
        let Some(context) = context else {
            return;
        };
        let playback = &mut *playback;
        if !playback.targets.is_empty() {
            let available: Vec<String> = playback
                .targets
                .iter()
                .flat_map(|&kind| context.0.sources(kind))
                .map(|s| s.key_path().to_owned())
                .collect();
            // wait until the host has loaded something
            if available.is_empty() {
                return;
            }
            playback
                .sequence
                .retain_available(|key| available.iter().any(|k| k == key));
            if playback.sequence.numbers().is_empty() {
                warn!(
                    "No data found for any timestep under '{}'",
                    playback.sequence.base_key_path
                );
            }
        }
        playback.checked = true;
    }
    if let Some(number) = playback.sequence.tick(time.elapsed()) {
        messages.write(TimestepMessage(number));
    }
}

/// Points the accessors targeted by [`TimestepPlayback`] at the current
/// timestep's data.
pub fn follow_timestep(
    playback: Option<Res<TimestepPlayback>>,
    mut config: ResMut<ProbeConfig>,
) {
    let Some(playback) = playback else {
        return;
    };
    let Some(key_path) = playback.sequence.current_key_path() else {
        return;
    };
    for &kind in &playback.targets {
        let current = config.for_kind(kind);
        if current.key_path == key_path && current.key_match == KeyMatch::Exact {
            continue;
        }
        let target = config.for_kind_mut(kind);
        target.key_path.clone_from(&key_path);
        target.key_match = KeyMatch::Exact;
    }
}
