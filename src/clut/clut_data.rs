//! CLUT Data Structures
//!
//! NO METHODS. Just data.

use crate::resource::{ContextId, GlTextureName, HolderId};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// How the table's alpha channel is used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlphaUse {
    AsIs,
    Opaque,
    Binary,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClutEntries {
    /// RGBA, 4 bytes per entry
    Bytes(Vec<u8>),
    /// `nrcomponents` floats in [0, 1] per entry
    Floats(Vec<f32>),
}

/// How a GL context turns palette indices into colors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaletteStrategy {
    /// 1D lookup texture sampled by a fragment program
    FragmentProgram,
    /// Hardware color table
    PaletteExtension,
    /// Neither; callers fall back to RGBA textures
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClutTextureType {
    Texture2D,
    Texture3D,
}

#[derive(Debug)]
pub struct Clut {
    pub nrentries: usize,
    pub nrcomponents: usize,
    pub entries: ClutEntries,
    pub alpha_policy: AlphaUse,
    /// Inclusive [low, high] range of visible entries
    pub thresholds: [u32; 2],
    /// Checksum over the raw entries
    pub crc32: u32,
    /// Final RGBA table, `nrentries * 4` bytes
    pub glcolors: Vec<u8>,
    pub holder: HolderId,
    /// 1D lookup texture per context, fragment program strategy only
    pub palette_lookup_textures: Mutex<FxHashMap<ContextId, GlTextureName>>,
}
