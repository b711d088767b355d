//! Texture Object Data Structures
//!
//! NO METHODS. Just data.

use crate::resource::{ContextId, GlTextureName, HolderId};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    Palette2D,
    Rgba2D,
    Palette3D,
    Rgba3D,
    /// Palette index plus a packed gradient per texel
    Palette3DGradient,
}

/// CPU-side texture with power-of-two dimensions. Texels past the source
/// data are zero. Paletted kinds hold indices only; the color table is
/// supplied when the texture is activated.
#[derive(Debug)]
pub struct TextureObject {
    pub kind: TextureKind,
    /// Texture size; 2D kinds have depth 1
    pub dimensions: [u32; 3],
    /// Extent actually covered by voxel data
    pub used: [u32; 3],
    pub texels: Vec<u8>,
    pub holder: HolderId,
    /// Uploaded texture name per GL context
    pub gl_names: Mutex<FxHashMap<ContextId, GlTextureName>>,
}
