//! `GlBackend` on top of wgpu
//!
//! Textures live on the device; slice geometry is collected into a
//! triangle-list vertex stream with one batch per state change. The host
//! application owns the render pass and draws the batches with its own
//! pipelines, sampling palette indices through the bound lookup texture.

use super::backend::{
    DrawStyle, GlBackend, GlCapabilities, SliceVertex, TexelFormat, TextureDimension,
    TextureUpload,
};
use super::composition::CompositionMode;
use crate::clut::ClutTextureType;
use crate::error::{EngineError, EngineResult};
use crate::resource::GlTextureName;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Contiguous run of vertices drawn with the same state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawBatch {
    pub texture: Option<GlTextureName>,
    pub palette_lookup: Option<GlTextureName>,
    pub composition: CompositionMode,
    pub style: DrawStyle,
    pub first_vertex: u32,
    pub vertex_count: u32,
}

pub struct WgpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub format: TexelFormat,
}

pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    textures: FxHashMap<GlTextureName, WgpuTexture>,
    next_name: GlTextureName,
    bound_texture: Option<GlTextureName>,
    palette_lookup: Option<GlTextureName>,
    /// Lookup texture holding the last hardware-style color table
    color_table_texture: Option<GlTextureName>,
    composition: CompositionMode,
    vertices: Vec<SliceVertex>,
    batches: Vec<DrawBatch>,
    lines: Vec<[f32; 3]>,
}

impl WgpuBackend {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self {
            device,
            queue,
            textures: FxHashMap::default(),
            next_name: 1,
            bound_texture: None,
            palette_lookup: None,
            color_table_texture: None,
            composition: CompositionMode::AlphaBlending,
            vertices: Vec::new(),
            batches: Vec::new(),
            lines: Vec::new(),
        }
    }

    pub fn texture(&self, name: GlTextureName) -> Option<&WgpuTexture> {
        self.textures.get(&name)
    }

    pub fn batches(&self) -> &[DrawBatch] {
        &self.batches
    }

    /// Vertex stream for all batches, ready for a vertex buffer
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn line_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.lines)
    }

    /// Start a new frame
    pub fn clear_frame(&mut self) {
        self.vertices.clear();
        self.batches.clear();
        self.lines.clear();
    }

    fn push_batch(&mut self, style: DrawStyle, count: u32) {
        let first = self.vertices.len() as u32 - count;
        let state = (
            self.bound_texture,
            self.palette_lookup,
            self.composition,
            style,
        );
        if let Some(last) = self.batches.last_mut() {
            if (last.texture, last.palette_lookup, last.composition, last.style) == state
                && last.first_vertex + last.vertex_count == first
            {
                last.vertex_count += count;
                return;
            }
        }
        self.batches.push(DrawBatch {
            texture: state.0,
            palette_lookup: state.1,
            composition: state.2,
            style,
            first_vertex: first,
            vertex_count: count,
        });
    }
}

fn wgpu_format(format: TexelFormat) -> wgpu::TextureFormat {
    match format {
        TexelFormat::Index8 => wgpu::TextureFormat::R8Unorm,
        TexelFormat::Rgba8 | TexelFormat::IndexGradient8 => wgpu::TextureFormat::Rgba8Unorm,
    }
}

fn wgpu_dimension(dimension: TextureDimension) -> wgpu::TextureDimension {
    match dimension {
        TextureDimension::D1 => wgpu::TextureDimension::D1,
        TextureDimension::D2 => wgpu::TextureDimension::D2,
        TextureDimension::D3 => wgpu::TextureDimension::D3,
    }
}

impl GlBackend for WgpuBackend {
    fn capabilities(&self) -> GlCapabilities {
        let limits = self.device.limits();
        GlCapabilities {
            paletted_textures: false,
            fragment_programs: true,
            textures_3d: true,
            max_texture_size: limits.max_texture_dimension_2d,
            max_3d_texture_size: limits.max_texture_dimension_3d,
            blend_min_max: true,
        }
    }

    fn create_texture(&mut self, upload: &TextureUpload<'_>) -> EngineResult<GlTextureName> {
        let [width, height, depth] = upload.size;
        let bpt = upload.format.bytes_per_texel() as u32;
        let expected = (width * height * depth * bpt) as usize;
        if upload.data.len() != expected {
            return Err(EngineError::TextureUploadFailed {
                size: upload.size,
                error: format!("expected {} bytes, got {}", expected, upload.data.len()),
            });
        }
        let limits = self.device.limits();
        let limit = match upload.dimension {
            TextureDimension::D1 => limits.max_texture_dimension_1d,
            TextureDimension::D2 => limits.max_texture_dimension_2d,
            TextureDimension::D3 => limits.max_texture_dimension_3d,
        };
        if upload.size.iter().any(|s| *s > limit) {
            log::warn!(
                "[WgpuBackend::create_texture] {:?} exceeds device limit {}",
                upload.size,
                limit
            );
            return Err(EngineError::TextureUploadFailed {
                size: upload.size,
                error: format!("exceeds device limit {}", limit),
            });
        }

        let extent = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: depth,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Volume Texture"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu_dimension(upload.dimension),
            format: wgpu_format(upload.format),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            upload.data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(width * bpt),
                rows_per_image: Some(height),
            },
            extent,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let name = self.next_name;
        self.next_name += 1;
        self.textures.insert(
            name,
            WgpuTexture {
                texture,
                view,
                format: upload.format,
            },
        );
        Ok(name)
    }

    fn bind_texture(&mut self, name: GlTextureName) {
        self.bound_texture = Some(name);
    }

    fn delete_textures(&mut self, names: &[GlTextureName]) {
        for name in names {
            if let Some(t) = self.textures.remove(name) {
                t.texture.destroy();
            }
            if self.bound_texture == Some(*name) {
                self.bound_texture = None;
            }
            if self.palette_lookup == Some(*name) {
                self.palette_lookup = None;
            }
        }
    }

    fn set_color_table(&mut self, target: ClutTextureType, rgba: &[u8]) {
        // No hardware palettes: emulate with a lookup texture
        if let Some(old) = self.color_table_texture.take() {
            self.delete_textures(&[old]);
        }
        let upload = TextureUpload {
            dimension: TextureDimension::D1,
            size: [(rgba.len() / 4) as u32, 1, 1],
            format: TexelFormat::Rgba8,
            data: rgba,
        };
        match self.create_texture(&upload) {
            Ok(name) => {
                self.color_table_texture = Some(name);
                self.bind_palette_lookup(name, target);
            }
            Err(e) => log::error!("[WgpuBackend::set_color_table] {}", e),
        }
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
        if vertices.len() < 3 {
            return;
        }
        let before = self.vertices.len();
        match style {
            DrawStyle::Filled => {
                for pair in vertices[1..].windows(2) {
                    self.vertices.extend_from_slice(&[vertices[0], pair[0], pair[1]]);
                }
            }
            DrawStyle::Wireframe => {
                // Closed outline as a line list
                for (i, v) in vertices.iter().enumerate() {
                    self.vertices.push(*v);
                    self.vertices.push(vertices[(i + 1) % vertices.len()]);
                }
            }
        }
        let count = (self.vertices.len() - before) as u32;
        self.push_batch(style, count);
    }

    fn draw_lines(&mut self, points: &[[f32; 3]]) {
        self.lines.extend_from_slice(points);
    }
}
