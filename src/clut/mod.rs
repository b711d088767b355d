//! Color lookup tables
//!
//! Maps voxel values to RGBA with transparency thresholds and an alpha
//! policy, and uploads the table to each GL context either as a hardware
//! palette or as a 1D lookup texture.

pub mod clut_cache;
pub mod clut_data;
pub mod clut_operations;
pub mod gimp_gradient;
pub mod predefined_gradients;
pub mod transfer_function;

pub use clut_cache::ClutCache;
pub use clut_data::{AlphaUse, Clut, ClutEntries, ClutTextureType, PaletteStrategy};
pub use clut_operations::*;
pub use transfer_function::{make_clut, ColorMapType, PredefinedMap, TransferFunction};

/// Hardware palettes top out at 256 entries
pub const MAX_CLUT_ENTRIES: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum ClutError {
    #[error("Color table has {0} entries, at most 256 are supported")]
    TooManyEntries(usize),

    #[error("Color table needs at least one entry")]
    Empty,

    #[error("Unsupported component count {0}, expected 1, 2 or 4")]
    BadComponentCount(usize),

    #[error("Float table length {len} is not a multiple of {components} components")]
    ComponentMismatch { len: usize, components: usize },

    #[error("Byte table length {0} is not a multiple of 4")]
    ByteLength(usize),

    #[error("Thresholds low={low} high={high} are out of order")]
    ThresholdOrder { low: u32, high: u32 },

    #[error("Malformed GIMP gradient: {0}")]
    Gradient(String),
}
