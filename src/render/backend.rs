//! The GL seam
//!
//! Everything the renderer needs from a graphics context goes through
//! `GlBackend`: texture upload and deletion, palette setup, composition
//! state and slice geometry.

use super::composition::CompositionMode;
use crate::clut::ClutTextureType;
use crate::error::EngineResult;
use crate::resource::GlTextureName;
use bytemuck::{Pod, Zeroable};

/// What the context can do, probed once per context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlCapabilities {
    pub paletted_textures: bool,
    pub fragment_programs: bool,
    pub textures_3d: bool,
    pub max_texture_size: u32,
    pub max_3d_texture_size: u32,
    /// MAX and SUM blend equations
    pub blend_min_max: bool,
}

impl Default for GlCapabilities {
    fn default() -> Self {
        Self {
            paletted_textures: false,
            fragment_programs: false,
            textures_3d: false,
            max_texture_size: 2048,
            max_3d_texture_size: 256,
            blend_min_max: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureDimension {
    D1,
    D2,
    D3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TexelFormat {
    /// One palette index per texel
    Index8,
    Rgba8,
    /// Palette index followed by a packed gradient
    IndexGradient8,
}

impl TexelFormat {
    pub fn bytes_per_texel(self) -> usize {
        match self {
            TexelFormat::Index8 => 1,
            TexelFormat::Rgba8 | TexelFormat::IndexGradient8 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TextureUpload<'a> {
    pub dimension: TextureDimension,
    /// Unused trailing axes are 1
    pub size: [u32; 3],
    pub format: TexelFormat,
    pub data: &'a [u8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawStyle {
    Filled,
    Wireframe,
}

/// Slice vertex: object-space position plus 3D texture coordinate
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SliceVertex {
    pub position: [f32; 3],
    pub texcoord: [f32; 3],
}

static_assertions::const_assert_eq!(std::mem::size_of::<SliceVertex>(), 24);

pub trait GlBackend {
    fn capabilities(&self) -> GlCapabilities;

    fn create_texture(&mut self, upload: &TextureUpload<'_>) -> EngineResult<GlTextureName>;

    fn bind_texture(&mut self, name: GlTextureName);

    fn delete_textures(&mut self, names: &[GlTextureName]);

    /// Hardware palette for the next paletted draws
    fn set_color_table(&mut self, target: ClutTextureType, rgba: &[u8]);

    /// 1D lookup texture sampled by the palette fragment program
    fn bind_palette_lookup(&mut self, name: GlTextureName, target: ClutTextureType);

    fn unbind_palette_lookup(&mut self);

    fn set_composition(&mut self, mode: CompositionMode);

    /// Convex polygon as a triangle fan around `vertices[0]`
    fn draw_triangle_fan(&mut self, vertices: &[SliceVertex], style: DrawStyle);

    /// Line segments, two points each, untextured
    fn draw_lines(&mut self, points: &[[f32; 3]]);
}
