//! GPU-shaped textures and the texture cache

pub mod texture_cache;
pub mod texture_object_data;
pub mod texture_object_operations;

pub use texture_cache::{CacheStats, CutParameters, TextureCache, TextureKey, TextureRequest};
pub use texture_object_data::{TextureKind, TextureObject};
pub use texture_object_operations::*;
