//! Voxel volumes and chunks
//!
//! A `VolumeDescriptor` borrows the caller's voxel buffer for one render
//! pass. `VoxelChunk`s are cut out of it page by page or cube by cube and
//! transferred into texture objects.

pub mod gradient;
pub mod test_volume;
pub mod volume_data;
pub mod voxel_box;
pub mod voxel_chunk_data;
pub mod voxel_chunk_operations;

pub use gradient::central_difference_gradient;
pub use test_volume::make_test_volume;
pub use volume_data::{
    next_node_id, next_volume_id, UnitSize, VolumeData, VolumeDescriptor, VolumeId,
};
pub use voxel_box::{VoxelBox2, VoxelBox3};
pub use voxel_chunk_data::VoxelChunk;
pub use voxel_chunk_operations::*;

#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    #[error("Slice {index} out of range along axis {axis} (size {size})")]
    SliceOutOfRange { axis: usize, index: u32, size: u32 },

    #[error("Cut {cut} exceeds chunk {dims:?}")]
    CutOutOfBounds { cut: String, dims: [u32; 3] },

    #[error("Zero-sized cut {cut}")]
    EmptyCut { cut: String },

    #[error("Buffer holds {actual} bytes, dimensions need {expected}")]
    BufferSize { expected: usize, actual: usize },

    #[error("Invalid axis {0}")]
    InvalidAxis(usize),

    #[error("Unit size {bytes} not supported for {operation}")]
    UnsupportedUnitSize { bytes: usize, operation: &'static str },
}
