// Hearth Volume - paged volume rendering
//
// Volumes are cut into 2D pages or 3D sub-cubes, colored through a
// transfer function and drawn as back-to-front slices.
// - voxel / clut / texture: CPU-side data and texture construction
// - resource: per-GL-context texture lifetimes
// - paging: the 2D page handler and the 3D sub-cube grid
// - render: backends and the `VolumeRender` entry point

// Core modules
pub mod config;
pub mod error;
pub mod math;

// Volume data and color lookup
pub mod clut;
pub mod reader;
pub mod voxel;

// GPU resources and rendering
pub mod paging;
pub mod render;
pub mod resource;
pub mod texture;

pub use clut::{AlphaUse, Clut, ClutCache, ColorMapType, PredefinedMap, TransferFunction};
pub use config::VolumeRenderConfig;
pub use error::{EngineError, EngineResult, ErrorContext, OptionExt};
pub use math::{Plane, Ray, RayPick, AABB};
pub use paging::{PassStats, SetType};
pub use reader::VolFile;
pub use render::{
    pick_volume, AbortCode, CompositionMode, GlBackend, NumSlicesControl, RenderContext,
    RenderPath, RenderSession, RenderSettings, SoftwareBackend, ViewState, VolumeRender,
    VoxelPick, WgpuBackend,
};
pub use voxel::{make_test_volume, UnitSize, VolumeData, VolumeDescriptor, VolumeId};

// Re-export wgpu for hosts driving the wgpu backend
pub use wgpu;

/// Initialize env_logger with `info` as the default level. `RUST_LOG`
/// still overrides it. Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
