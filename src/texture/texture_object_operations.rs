//! Texture Object Operations
//!
//! Free functions over the tagged `TextureObject`.

use super::texture_object_data::{TextureKind, TextureObject};
use crate::clut::{self, Clut, ClutTextureType, PaletteStrategy};
use crate::error::{EngineError, EngineResult, ErrorContext, OptionExt};
use crate::render::backend::{GlBackend, TexelFormat, TextureDimension, TextureUpload};
use crate::resource::{self, ContextId, ContextRegistry, GlTextureName, HolderId};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::path::Path;
use std::sync::Arc;

pub fn is_paletted(kind: TextureKind) -> bool {
    matches!(
        kind,
        TextureKind::Palette2D | TextureKind::Palette3D | TextureKind::Palette3DGradient
    )
}

/// CLUT whose colors end up in the texels of a `kind` texture. Paletted
/// kinds store indices only, so the table never becomes part of them.
pub fn baked_clut(kind: TextureKind, clut: &Clut) -> Option<HolderId> {
    if is_paletted(kind) {
        None
    } else {
        Some(clut.holder)
    }
}

pub fn is_3d(kind: TextureKind) -> bool {
    !matches!(kind, TextureKind::Palette2D | TextureKind::Rgba2D)
}

pub fn bytes_per_texel(kind: TextureKind) -> usize {
    match kind {
        TextureKind::Palette2D | TextureKind::Palette3D => 1,
        TextureKind::Rgba2D | TextureKind::Rgba3D | TextureKind::Palette3DGradient => 4,
    }
}

pub fn texel_count(dimensions: [u32; 3]) -> usize {
    dimensions.iter().map(|d| *d as usize).product()
}

/// Power-of-two texture size holding `size` voxels. 2D kinds keep depth 1.
pub fn texture_dimensions(kind: TextureKind, size: [u32; 3]) -> [u32; 3] {
    let depth = if is_3d(kind) {
        size[2].max(1).next_power_of_two()
    } else {
        1
    };
    [
        size[0].max(1).next_power_of_two(),
        size[1].max(1).next_power_of_two(),
        depth,
    ]
}

pub fn create_texture_object(
    kind: TextureKind,
    dimensions: [u32; 3],
    used: [u32; 3],
    texels: Vec<u8>,
) -> EngineResult<TextureObject> {
    let expected = texel_count(dimensions) * bytes_per_texel(kind);
    if texels.len() != expected {
        return Err(EngineError::BufferSizeMismatch {
            expected,
            actual: texels.len(),
        });
    }
    Ok(TextureObject {
        kind,
        dimensions,
        used,
        texels,
        holder: resource::next_holder_id(),
        gl_names: Mutex::new(FxHashMap::default()),
    })
}

pub fn get_buffer(texture: &TextureObject) -> &[u8] {
    &texture.texels
}

pub fn texture_byte_size(texture: &TextureObject) -> usize {
    texture.texels.len()
}

/// Zero every texel outside the `used` region
pub fn blank_unused(texels: &mut [u8], kind: TextureKind, dimensions: [u32; 3], used: [u32; 3]) {
    let bpt = bytes_per_texel(kind);
    let [w, h, d] = dimensions.map(|v| v as usize);
    let [uw, uh, ud] = used.map(|v| v as usize);
    if uw >= w && uh >= h && ud >= d {
        return;
    }
    for z in 0..d {
        for y in 0..h {
            let row = (z * h + y) * w * bpt;
            let start = if z < ud && y < uh { uw.min(w) * bpt } else { 0 };
            texels[row + start..row + w * bpt].fill(0);
        }
    }
}

/// Write the first layer of the texture as PNG. Paletted textures are
/// written as grayscale indices.
pub fn dump_debug_image(texture: &TextureObject, path: &Path) -> EngineResult<()> {
    let [w, h, _] = texture.dimensions;
    let layer = texel_count([w, h, 1]) * bytes_per_texel(texture.kind);
    let pixels = texture.texels[..layer].to_vec();

    let result = match texture.kind {
        TextureKind::Palette2D | TextureKind::Palette3D => image::GrayImage::from_raw(w, h, pixels)
            .map(|img| img.save(path)),
        _ => image::RgbaImage::from_raw(w, h, pixels).map(|img| img.save(path)),
    };
    match result {
        Some(Ok(())) => {
            log::debug!("[TextureObject::dump_debug_image] Wrote {}", path.display());
            Ok(())
        }
        Some(Err(e)) => Err(EngineError::IoError {
            path: path.display().to_string(),
            error: e.to_string(),
        }),
        None => Err(EngineError::Internal {
            message: format!("texture buffer does not match {}x{}", w, h),
        }),
    }
}

fn upload_format(kind: TextureKind) -> (TextureDimension, TexelFormat) {
    match kind {
        TextureKind::Palette2D => (TextureDimension::D2, TexelFormat::Index8),
        TextureKind::Rgba2D => (TextureDimension::D2, TexelFormat::Rgba8),
        TextureKind::Palette3D => (TextureDimension::D3, TexelFormat::Index8),
        TextureKind::Rgba3D => (TextureDimension::D3, TexelFormat::Rgba8),
        TextureKind::Palette3DGradient => (TextureDimension::D3, TexelFormat::IndexGradient8),
    }
}

/// Bind the texture in `context_id`, uploading it on first use there.
/// Paletted textures also activate `clut`, which they require.
pub fn activate_texture(
    texture: &Arc<TextureObject>,
    clut: Option<&Arc<Clut>>,
    context_id: ContextId,
    palette_strategy: PaletteStrategy,
    registry: &mut ContextRegistry,
    backend: &mut dyn GlBackend,
) -> EngineResult<GlTextureName> {
    let palette = if is_paletted(texture.kind) {
        Some(clut.ok_or_engine(|| EngineError::MissingClut {
            texture: format!("{:?} {:?}", texture.kind, texture.dimensions),
        })?)
    } else {
        None
    };

    let existing = texture.gl_names.lock().get(&context_id).copied();
    let name = match existing {
        Some(name) => name,
        None => upload_texture(texture, context_id, registry, backend)?,
    };
    backend.bind_texture(name);

    if let Some(clut) = palette {
        let target = if is_3d(texture.kind) {
            ClutTextureType::Texture3D
        } else {
            ClutTextureType::Texture2D
        };
        clut::activate_clut(clut, context_id, palette_strategy, target, registry, backend)?;
    }
    Ok(name)
}

fn upload_texture(
    texture: &Arc<TextureObject>,
    context_id: ContextId,
    registry: &mut ContextRegistry,
    backend: &mut dyn GlBackend,
) -> EngineResult<GlTextureName> {
    let (dimension, format) = upload_format(texture.kind);
    let name = backend.create_texture(&TextureUpload {
        dimension,
        size: texture.dimensions,
        format,
        data: &texture.texels,
    })?;
    texture.gl_names.lock().insert(context_id, name);

    let weak = Arc::downgrade(texture);
    let data = resource::manager(registry, context_id);
    resource::set_resource(
        data,
        texture.holder,
        name,
        Some(Box::new(move |d: &mut resource::ResourceManagerData, holder: HolderId| {
            if let Some(texture) = weak.upgrade() {
                texture.gl_names.lock().remove(&d.context_id);
            }
            if let Some(name) = resource::remove_resource(d, holder) {
                resource::kill_texture(d, name);
            }
        })),
    )
    .with_context(|| format!("registering texture {} in context {}", name, context_id))?;
    Ok(name)
}

/// Queue the texture's GL names for deletion in every context
pub fn release_texture_gl(texture: &TextureObject, registry: &mut ContextRegistry) {
    let contexts: Vec<ContextId> = texture.gl_names.lock().drain().map(|(c, _)| c).collect();
    for ctx in contexts {
        resource::release_holder(registry, ctx, texture.holder);
    }
}
