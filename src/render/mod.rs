//! Rendering
//!
//! `GlBackend` is the seam to the graphics context. `SoftwareBackend`
//! records draws and composites them on the CPU; `WgpuBackend` uploads to
//! a wgpu device. `VolumeRender` is the entry point a host calls per frame.

pub mod backend;
pub mod composition;
pub mod render_context;
pub mod render_lock;
pub mod software_backend;
pub mod volume_render;
pub mod wgpu_backend;

pub use backend::{DrawStyle, GlBackend, GlCapabilities, SliceVertex};
pub use composition::{AbortCallback, AbortCode, CompositionMode, NumSlicesControl};
pub use render_context::{RenderContext, RenderSession, ViewState};
pub use render_lock::{acquire_render_lock, try_acquire_render_lock};
pub use software_backend::SoftwareBackend;
pub use volume_render::{pick_volume, RenderPath, RenderSettings, VolumeRender, VoxelPick};
pub use wgpu_backend::WgpuBackend;
