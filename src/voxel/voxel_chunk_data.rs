//! Voxel Chunk Data Structures
//!
//! NO METHODS. Just data.

use super::volume_data::UnitSize;
use std::borrow::Cow;

/// A block of raw voxels, x fastest, then y, then z. Borrows the volume
/// buffer when it wraps a whole volume; cuts own their copy.
#[derive(Debug, Clone)]
pub struct VoxelChunk<'a> {
    pub dimensions: [u32; 3],
    pub unit_size: UnitSize,
    pub buffer: Cow<'a, [u8]>,
}
