use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use crate::{
    colormap::{ColorAssetResolver, ColorSource},
    source::{DataSource, SourceKind, SourceResolver},
    visibility::{RenderTrigger, VisibilityMask},
};

/// Collaborators shared by every accessor: where sources come from, who
/// renders visibility changes, and where named color assets live.
pub struct ProbeContext {
    pub resolver: Box<dyn SourceResolver>,
    pub render: Box<RenderTrigger>,
    pub color_assets: Box<dyn ColorAssetResolver + Send + Sync>,
}

impl ProbeContext {
    pub fn new(resolver: impl SourceResolver + 'static) -> Self {
        Self {
            resolver: Box::new(resolver),
            render: Box::new(|_: &str, _: &VisibilityMask| {}),
            color_assets: Box::new(ColorAssets::default()),
        }
    }

    pub fn with_render_trigger(
        mut self,
        render: impl Fn(&str, &VisibilityMask) + Send + Sync + 'static,
    ) -> Self {
        self.render = Box::new(render);
        self
    }

    pub fn with_color_assets(
        mut self,
        assets: impl ColorAssetResolver + Send + Sync + 'static,
    ) -> Self {
        self.color_assets = Box::new(assets);
        self
    }

    pub fn sources(&self, kind: SourceKind) -> Vec<Arc<dyn DataSource>> {
        self.resolver.sources(kind)
    }
}

/// An in-memory registry of sources, keyed by kind.
///
/// Hosts that load data themselves can push sources here and hand the
/// registry to a [`ProbeContext`]; it also serves as a test double.
#[derive(Default, Clone)]
pub struct SourceRegistry {
    sources: HashMap<SourceKind, Vec<Arc<dyn DataSource>>>,
}

impl SourceRegistry {
    pub fn insert(&mut self, kind: SourceKind, source: Arc<dyn DataSource>) {
        self.sources.entry(kind).or_default().push(source);
    }

    /// Drops every source with this key path.
    pub fn remove(&mut self, key_path: &str) {
        for list in self.sources.values_mut() {
            list.retain(|s| s.key_path() != key_path);
        }
    }

    pub fn clear(&mut self) {
        self.sources.clear();
    }
}

impl SourceResolver for SourceRegistry {
    fn sources(&self, kind: SourceKind) -> Vec<Arc<dyn DataSource>> {
        self.sources.get(&kind).cloned().unwrap_or_default()
    }
}

/// A registry the host keeps a handle to while the context owns a clone.
pub type SharedRegistry = Arc<RwLock<SourceRegistry>>;

impl SourceResolver for SharedRegistry {
    fn sources(&self, kind: SourceKind) -> Vec<Arc<dyn DataSource>> {
        match self.read() {
            Ok(registry) => registry.sources(kind),
            Err(_) => {
                tracing::warn!("Source registry lock is poisoned; no {kind:?} sources available");
                Vec::new()
            }
        }
    }
}

/// Named color sources registered by the host.
#[derive(Default, Clone)]
pub struct ColorAssets {
    assets: HashMap<String, Arc<dyn ColorSource + Send + Sync>>,
}

impl ColorAssets {
    pub fn insert(&mut self, id: impl Into<String>, source: Arc<dyn ColorSource + Send + Sync>) {
        self.assets.insert(id.into(), source);
    }
}

impl ColorAssetResolver for ColorAssets {
    fn resolve(&self, id: &str) -> Option<Arc<dyn ColorSource + Send + Sync>> {
        self.assets.get(id).cloned()
    }
}
