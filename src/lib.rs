pub mod accessor;
pub mod colormap;
pub mod colormap_xml;
pub mod context;
pub mod error;
pub mod locate;
pub mod normalize;
pub mod plugin;
pub mod probe;
pub mod sampler;
pub mod source;
pub mod timestep;
pub mod transform;
pub mod types;
pub mod visibility;

pub use accessor::{AccessorConfig, DataAccessor, LineAccessor, SurfaceAccessor, VolumeAccessor};
pub use colormap::{ColorMap, ColorMapSettings, ControlPoint, OutOfRangePolicy};
pub use context::ProbeContext;
pub use error::{ProbeError, Result};
pub use plugin::DataProbePlugin;
