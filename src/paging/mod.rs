//! Level-of-detail paging
//!
//! The 2D path cuts the volume into slices along the dominant viewing axis
//! and each slice into fixed-size pages. The 3D path cuts it into a grid
//! of sub-cubes and intersects view-aligned slices, oblique planes and
//! polygon sets with every sub-cube. Built textures come from the texture
//! cache; the 2D path keeps resident page memory under a budget with LRU
//! eviction.

pub mod lru;
pub mod page_handler;
pub mod sub_cube;
pub mod tex_cube;
pub mod tex_page;
pub mod voxel_space;

pub use lru::{select_lru_victim, LruCandidate};
pub use page_handler::{dominant_axis, PageHandler};
pub use sub_cube::SubCube;
pub use tex_cube::{clamp_sub_cube_size, CubeItem, SetType, TexCube};
pub use tex_page::{SubPageItem, SubPageKey, TexPage};
pub use voxel_space::VoxelSpace;

use crate::clut::{Clut, TransferFunction};
use crate::config::VolumeRenderConfig;
use crate::render::backend::DrawStyle;
use crate::render::composition::CompositionMode;
use crate::voxel::VolumeDescriptor;
use std::sync::Arc;

/// Inputs shared by every slice of one render call
pub struct PassParams<'p, 'v> {
    pub volume: &'p VolumeDescriptor<'v>,
    pub transfer_function: &'p TransferFunction,
    pub clut: &'p Arc<Clut>,
    pub composition: CompositionMode,
    /// Already resolved from the slice count policy
    pub num_slices: u32,
    pub paletted: bool,
    /// Paletted 3D textures carry a gradient for lighting
    pub lighting: bool,
}

/// What a render call did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub slices_total: u32,
    pub slices_drawn: u32,
    pub slices_skipped: u32,
    pub aborted: bool,
    /// Triangle fans handed to the backend
    pub fans_drawn: u32,
    pub textures_built: u32,
}

/// How slices are drawn, from the debug switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceStyle {
    pub draw: DrawStyle,
    /// Also outline each page or sub-cube
    pub outlines: bool,
}

impl SliceStyle {
    pub fn from_config(config: &VolumeRenderConfig) -> Self {
        match config.debug_slice_render_style {
            2 => SliceStyle {
                draw: DrawStyle::Wireframe,
                outlines: false,
            },
            1 => SliceStyle {
                draw: DrawStyle::Filled,
                outlines: true,
            },
            _ => SliceStyle {
                draw: DrawStyle::Filled,
                outlines: config.subcube_frames,
            },
        }
    }
}
