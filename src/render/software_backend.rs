//! CPU implementation of `GlBackend`
//!
//! Keeps uploaded textures in memory and records every draw together with
//! the palette and composition state it was issued under. Filled slices
//! can be composited along an axis-aligned ray, which is enough to check
//! rendered intensities and blend order without a GPU.

use super::backend::{
    DrawStyle, GlBackend, GlCapabilities, SliceVertex, TexelFormat, TextureDimension,
    TextureUpload,
};
use super::composition::{blend, CompositionMode};
use crate::clut::ClutTextureType;
use crate::error::{EngineError, EngineResult};
use crate::resource::GlTextureName;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone)]
pub struct SoftwareTexture {
    pub dimension: TextureDimension,
    pub size: [u32; 3],
    pub format: TexelFormat,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct DrawRecord {
    pub vertices: Vec<SliceVertex>,
    pub style: DrawStyle,
    pub texture: Option<GlTextureName>,
    /// RGBA palette in effect for paletted textures
    pub palette: Option<Vec<u8>>,
    pub composition: CompositionMode,
}

pub struct SoftwareBackend {
    pub capabilities: GlCapabilities,
    pub textures: FxHashMap<GlTextureName, SoftwareTexture>,
    pub deleted_textures: Vec<GlTextureName>,
    pub draws: Vec<DrawRecord>,
    pub lines: Vec<[f32; 3]>,
    next_name: GlTextureName,
    bound_texture: Option<GlTextureName>,
    color_table: Option<Vec<u8>>,
    palette_lookup: Option<GlTextureName>,
    composition: CompositionMode,
}

impl Default for SoftwareBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareBackend {
    /// Backend with 3D textures and fragment program palettes
    pub fn new() -> Self {
        Self::with_capabilities(GlCapabilities {
            paletted_textures: true,
            fragment_programs: true,
            textures_3d: true,
            max_texture_size: 4096,
            max_3d_texture_size: 512,
            blend_min_max: true,
        })
    }

    pub fn with_capabilities(capabilities: GlCapabilities) -> Self {
        Self {
            capabilities,
            textures: FxHashMap::default(),
            deleted_textures: Vec::new(),
            draws: Vec::new(),
            lines: Vec::new(),
            next_name: 1,
            bound_texture: None,
            color_table: None,
            palette_lookup: None,
            composition: CompositionMode::AlphaBlending,
        }
    }

    pub fn clear_draws(&mut self) {
        self.draws.clear();
        self.lines.clear();
    }

    pub fn filled_draws(&self) -> impl Iterator<Item = &DrawRecord> {
        self.draws.iter().filter(|d| d.style == DrawStyle::Filled)
    }

    /// Composite every filled draw crossed by the line parallel to `axis`
    /// through `coords` (the two remaining axes in increasing order), in
    /// draw order, starting from transparent black.
    pub fn composite_pixel(&self, axis: usize, coords: [f32; 2]) -> [f32; 4] {
        let (a, b) = other_axes(axis);
        let mut result = [0.0f32; 4];
        for record in self.filled_draws() {
            if let Some(texcoord) = fan_texcoord_at(&record.vertices, a, b, coords) {
                let color = self.sample(record, texcoord);
                result = blend(record.composition, result, color);
            }
        }
        result
    }

    /// Nearest-texel color of a draw at `texcoord`
    pub fn sample(&self, record: &DrawRecord, texcoord: [f32; 3]) -> [f32; 4] {
        let Some(texture) = record.texture.and_then(|n| self.textures.get(&n)) else {
            return [1.0; 4];
        };
        let texel = |coord: f32, n: u32| -> usize {
            ((coord * n as f32).floor().max(0.0) as usize).min(n as usize - 1)
        };
        let x = texel(texcoord[0], texture.size[0]);
        let y = texel(texcoord[1], texture.size[1]);
        let z = if texture.dimension == TextureDimension::D3 {
            texel(texcoord[2], texture.size[2])
        } else {
            0
        };
        let i = (z * texture.size[1] as usize + y) * texture.size[0] as usize + x;
        let bpt = texture.format.bytes_per_texel();
        let rgba = match texture.format {
            TexelFormat::Rgba8 => [
                texture.data[i * 4],
                texture.data[i * 4 + 1],
                texture.data[i * 4 + 2],
                texture.data[i * 4 + 3],
            ],
            TexelFormat::Index8 | TexelFormat::IndexGradient8 => {
                let idx = texture.data[i * bpt] as usize;
                match &record.palette {
                    Some(p) if idx * 4 + 3 < p.len() => {
                        [p[idx * 4], p[idx * 4 + 1], p[idx * 4 + 2], p[idx * 4 + 3]]
                    }
                    Some(_) => [0; 4],
                    None => [idx as u8; 4],
                }
            }
        };
        rgba.map(|c| c as f32 / 255.0)
    }

    /// Color table set through the palette extension path
    pub fn color_table(&self) -> Option<&[u8]> {
        self.color_table.as_deref()
    }

    fn active_palette(&self) -> Option<Vec<u8>> {
        if let Some(name) = self.palette_lookup {
            return self.textures.get(&name).map(|t| t.data.clone());
        }
        self.color_table.clone()
    }
}

fn other_axes(axis: usize) -> (usize, usize) {
    match axis {
        0 => (1, 2),
        1 => (0, 2),
        _ => (0, 1),
    }
}

/// Interpolated texcoord of the fan at the projected point, if covered
fn fan_texcoord_at(vertices: &[SliceVertex], a: usize, b: usize, p: [f32; 2]) -> Option<[f32; 3]> {
    if vertices.len() < 3 {
        return None;
    }
    let v0 = &vertices[0];
    for pair in vertices[1..].windows(2) {
        let (v1, v2) = (&pair[0], &pair[1]);
        let (x0, y0) = (v0.position[a], v0.position[b]);
        let (x1, y1) = (v1.position[a], v1.position[b]);
        let (x2, y2) = (v2.position[a], v2.position[b]);
        let det = (y1 - y2) * (x0 - x2) + (x2 - x1) * (y0 - y2);
        if det.abs() < 1e-12 {
            continue;
        }
        let l0 = ((y1 - y2) * (p[0] - x2) + (x2 - x1) * (p[1] - y2)) / det;
        let l1 = ((y2 - y0) * (p[0] - x2) + (x0 - x2) * (p[1] - y2)) / det;
        let l2 = 1.0 - l0 - l1;
        let eps = -1e-5;
        if l0 >= eps && l1 >= eps && l2 >= eps {
            let mut tc = [0.0f32; 3];
            for (k, t) in tc.iter_mut().enumerate() {
                *t = l0 * v0.texcoord[k] + l1 * v1.texcoord[k] + l2 * v2.texcoord[k];
            }
            return Some(tc);
        }
    }
    None
}

impl GlBackend for SoftwareBackend {
    fn capabilities(&self) -> GlCapabilities {
        self.capabilities
    }

    fn create_texture(&mut self, upload: &TextureUpload<'_>) -> EngineResult<GlTextureName> {
        let limit = match upload.dimension {
            TextureDimension::D3 => self.capabilities.max_3d_texture_size,
            _ => self.capabilities.max_texture_size,
        };
        if upload.size.iter().any(|s| *s > limit) {
            return Err(EngineError::TextureUploadFailed {
                size: upload.size,
                error: format!("exceeds maximum texture size {}", limit),
            });
        }
        let expected = upload.size.iter().map(|s| *s as usize).product::<usize>()
            * upload.format.bytes_per_texel();
        if upload.data.len() != expected {
            return Err(EngineError::TextureUploadFailed {
                size: upload.size,
                error: format!("expected {} bytes, got {}", expected, upload.data.len()),
            });
        }

        let name = self.next_name;
        self.next_name += 1;
        self.textures.insert(
            name,
            SoftwareTexture {
                dimension: upload.dimension,
                size: upload.size,
                format: upload.format,
                data: upload.data.to_vec(),
            },
        );
        Ok(name)
    }

    fn bind_texture(&mut self, name: GlTextureName) {
        self.bound_texture = Some(name);
    }

    fn delete_textures(&mut self, names: &[GlTextureName]) {
        for name in names {
            self.textures.remove(name);
            if self.bound_texture == Some(*name) {
                self.bound_texture = None;
            }
        }
        self.deleted_textures.extend_from_slice(names);
    }

    fn set_color_table(&mut self, _target: ClutTextureType, rgba: &[u8]) {
        self.color_table = Some(rgba.to_vec());
    }

    fn bind_palette_lookup(&mut self, name: GlTextureName, _target: ClutTextureType) {
        self.palette_lookup = Some(name);
    }

    fn unbind_palette_lookup(&mut self) {
        self.palette_lookup = None;
    }

    fn set_composition(&mut self, mode: CompositionMode) {
        self.composition = mode;
    }

    fn draw_triangle_fan(&mut self, vertices: &[SliceVertex], style: DrawStyle) {
        let palette = self.active_palette();
        self.draws.push(DrawRecord {
            vertices: vertices.to_vec(),
            style,
            texture: self.bound_texture,
            palette,
            composition: self.composition,
        });
    }

    fn draw_lines(&mut self, points: &[[f32; 3]]) {
        self.lines.extend_from_slice(points);
    }
}
