//! Drives the accessors through a `ProbeContext` built from fake collaborators.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use approx::assert_relative_eq;
use bevy::color::Srgba;
use bevy_data_probe::{
    AccessorConfig, ColorMap, DataAccessor, LineAccessor, ProbeContext, VolumeAccessor,
    colormap::{ColorAssetResolver, ColorMapInit, ColorSource},
    normalize::DataRange,
    probe::{DataProbe, ProbeEvent},
    source::{DataSource, KeyMatch, LineSet, SourceGeometry, SourceKind, SourceResolver, VolumeGrid},
    transform::GroupFrame,
    types::{Aabb, Matrix, Point, Value, Vector},
    visibility::VisibilityMask,
};
use smallvec::smallvec;

/// Hands out whatever is in `current`, counting every call.
#[derive(Default)]
struct FakeResolver {
    current: Mutex<Vec<(SourceKind, Arc<dyn DataSource>)>>,
    calls: AtomicUsize,
}

impl FakeResolver {
    fn set(&self, sources: Vec<(SourceKind, Arc<dyn DataSource>)>) {
        *self.current.lock().unwrap() = sources;
    }
}

/// Lets the test keep a handle on the resolver the context owns.
struct Shared(Arc<FakeResolver>);

impl SourceResolver for Shared {
    fn sources(&self, kind: SourceKind) -> Vec<Arc<dyn DataSource>> {
        self.0.calls.fetch_add(1, Ordering::Relaxed);
        self.0
            .current
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, s)| Arc::clone(s))
            .collect()
    }
}

/// A volume defined by a closure instead of stored values, to check that
/// accessors only go through the `DataSource` trait.
struct AnalyticVolume {
    values: ndarray::Array3<Value>,
}

impl AnalyticVolume {
    fn new(f: impl Fn(usize, usize, usize) -> Value) -> Self {
        Self {
            values: ndarray::Array3::from_shape_fn((4, 4, 4), |(z, y, x)| f(x, y, z)),
        }
    }
}

impl DataSource for AnalyticVolume {
    fn key_path(&self) -> &str {
        "Analytic/Ramp"
    }

    fn bounding_box(&self) -> Aabb {
        Aabb::new(Point::origin(), Point::new(4.0, 4.0, 4.0))
    }

    fn frame(&self) -> GroupFrame {
        // drawn at twice the data size, shifted up by 10
        let root = Matrix::new_translation(&Vector::new(0.0, 10.0, 0.0)) * Matrix::new_scaling(2.0);
        GroupFrame::new(root, Matrix::identity())
    }

    fn scalar_at(&self, index: usize, _channel: usize) -> Option<Value> {
        self.values.as_slice()?.get(index).copied()
    }

    fn channel_range(&self, _channel: usize) -> Option<DataRange> {
        Some(DataRange::new(0.0, 3.0))
    }

    fn geometry(&self) -> SourceGeometry<'_> {
        SourceGeometry::Volume(self.values.view())
    }
}

struct Palette;

impl ColorAssetResolver for Palette {
    fn resolve(&self, id: &str) -> Option<Arc<dyn ColorSource + Send + Sync>> {
        (id == "ramp").then(|| {
            let ramp: Arc<dyn ColorSource + Send + Sync> = Arc::new(|t: Value| Srgba::rgb(t, t, t));
            ramp
        })
    }
}

fn wind(step: u32) -> Arc<dyn DataSource> {
    let offset = step as Value;
    Arc::new(
        LineSet::new(
            format!("Fire/Wind_{step}"),
            vec![
                vec![Point::new(0.0, 0.0, 0.0), Point::new(1.0, 0.0, 0.0)],
                vec![Point::new(0.0, 1.0, 0.0), Point::new(1.0, 1.0, 0.0)],
                vec![Point::new(0.0, 2.0, 0.0), Point::new(1.0, 2.0, 0.0)],
            ],
            vec![
                vec![smallvec![offset], smallvec![offset]],
                vec![smallvec![offset + 1.0], smallvec![offset + 1.0]],
                vec![smallvec![offset + 2.0], smallvec![offset + 2.0]],
            ],
        )
        .unwrap(),
    )
}

#[test]
fn refresh_consults_the_resolver_every_tick() {
    let resolver = Arc::new(FakeResolver::default());
    let ctx = ProbeContext::new(Shared(Arc::clone(&resolver)));
    let mut acc = LineAccessor::default();
    for _ in 0..3 {
        acc.refresh(&ctx);
    }
    assert_eq!(resolver.calls.load(Ordering::Relaxed), 3);
}

#[test]
fn timestep_swap_is_followed_and_resets_visibility() {
    let resolver = Arc::new(FakeResolver::default());
    let published = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&published);
    let ctx = ProbeContext::new(Shared(Arc::clone(&resolver))).with_render_trigger(
        move |key: &str, m: &VisibilityMask| {
            sink.lock().unwrap().push((key.to_owned(), m.clone()))
        },
    );

    let mut acc = LineAccessor::new(AccessorConfig::with_key_path("Fire/Wind"));
    resolver.set(vec![(SourceKind::Lines, wind(4))]);
    acc.refresh(&ctx);
    assert_eq!(acc.average_color_value_on_line(2), 6.0);

    acc.set_visible_lines(&[0, 2], &ctx);
    assert!(!acc.binding().visibility().is_visible(1));
    assert_eq!(published.lock().unwrap().len(), 1);

    // next timestep replaces the source under a new key
    resolver.set(vec![(SourceKind::Lines, wind(18))]);
    acc.refresh(&ctx);
    assert_eq!(acc.average_color_value_on_line(2), 20.0);
    assert!(acc.binding().visibility().is_visible(1));

    // the renderer is told to drop the old per-line mask, for the new source
    let published = published.lock().unwrap();
    assert_eq!(published.len(), 2);
    assert_eq!(published[0].0, "Fire/Wind_4");
    assert_eq!(
        published[1],
        ("Fire/Wind_18".to_owned(), VisibilityMask::Uniform(true))
    );
}

#[test]
fn rebinding_without_per_index_edits_publishes_nothing() {
    let resolver = Arc::new(FakeResolver::default());
    let published = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&published);
    let ctx = ProbeContext::new(Shared(Arc::clone(&resolver))).with_render_trigger(
        move |_: &str, _: &VisibilityMask| {
            sink.fetch_add(1, Ordering::Relaxed);
        },
    );

    let mut acc = LineAccessor::default();
    for step in [4, 18, 32] {
        resolver.set(vec![(SourceKind::Lines, wind(step))]);
        acc.refresh(&ctx);
    }
    assert_eq!(published.load(Ordering::Relaxed), 0);
}

#[test]
fn exact_key_match_with_several_sources() {
    let resolver = Arc::new(FakeResolver::default());
    resolver.set(vec![
        (SourceKind::Lines, wind(4)),
        (SourceKind::Lines, wind(18)),
    ]);
    let ctx = ProbeContext::new(Shared(Arc::clone(&resolver)));

    let mut acc = LineAccessor::new(AccessorConfig {
        key_path: "Fire/Wind_4".into(),
        key_match: KeyMatch::Exact,
        ..Default::default()
    });
    acc.refresh(&ctx);
    assert_eq!(acc.min_color_value(), 4.0);

    acc.set_key_path("Fire/Wind_1", &ctx);
    assert!(!acc.is_data_available());
    assert_eq!(acc.closest_line_world(&Point::origin()), None);
    assert!(acc.nearby_lines_world(&Point::origin(), 10.0).is_empty());
}

#[test]
fn custom_source_probe_and_color_end_to_end() {
    let resolver = Arc::new(FakeResolver::default());
    let ramp: Arc<dyn DataSource> = Arc::new(AnalyticVolume::new(|x, _, _| x as Value));
    resolver.set(vec![(SourceKind::Volume, ramp)]);
    let ctx = ProbeContext::new(Shared(Arc::clone(&resolver))).with_color_assets(Palette);
    let mut volume = VolumeAccessor::default();
    volume.refresh(&ctx);

    // world (3, 12, 0) is data (1.5, 1, 0)
    let world = Point::new(3.0, 12.0, 0.0);
    assert_relative_eq!(volume.world_to_data(&world), Point::new(1.5, 1.0, 0.0), epsilon = 1e-5);
    assert_relative_eq!(volume.value_at_world(&world), 1.5, epsilon = 1e-5);
    assert_relative_eq!(volume.voxel_to_world(&Point::new(1.5, 1.0, 0.0)), world, epsilon = 1e-5);

    let mut probe = DataProbe::default();
    let events = probe.update(&volume, &world);
    assert_eq!(events.len(), 3);
    assert_eq!(events[0], ProbeEvent::Entered);
    assert!(matches!(events[1], ProbeEvent::ValueChanged(_)));
    assert_relative_eq!(probe.value(), 1.5, epsilon = 1e-5);
    assert_relative_eq!(probe.normalized_value(), 0.5, epsilon = 1e-5);

    let mut colors = ColorMap::default();
    colors
        .initialize(&ColorMapInit::Asset("ramp".into()), ctx.color_assets.as_ref())
        .unwrap();
    let grey = colors.lookup(probe.normalized_value());
    assert_relative_eq!(grey.red, 0.5, epsilon = 1e-3);
    assert_relative_eq!(grey.blue, 0.5, epsilon = 1e-3);

    // leaving the group's bounds
    let events = probe.update(&volume, &Point::new(3.0, 0.0, 0.0));
    assert_eq!(events.as_slice(), &[ProbeEvent::Exited]);
}

#[test]
fn grid_with_wrong_length_is_rejected() {
    let err = VolumeGrid::new("bad", vec![0.0; 5], [2, 2, 2], Aabb::default());
    assert!(err.is_err());
}
