//! Volume descriptors
//!
//! The renderer never copies a whole volume. Each pass gets a
//! `VolumeDescriptor` borrowing the raw voxels; `node_id` changes whenever
//! the owner replaces the data, and caches compare it before reuse.

use super::ChunkError;
use crate::math::{aabb_centered, AABB};
use cgmath::Vector3;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitSize {
    U8 = 1,
    U16 = 2,
    /// Pre-colored RGBA voxels
    U32 = 4,
}

impl UnitSize {
    pub fn bytes(self) -> usize {
        self as usize
    }

    pub fn from_bytes(bytes: usize) -> Option<Self> {
        match bytes {
            1 => Some(UnitSize::U8),
            2 => Some(UnitSize::U16),
            4 => Some(UnitSize::U32),
            _ => None,
        }
    }
}

/// Identity of a volume owner, stable across data changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VolumeId(pub u64);

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

pub fn next_volume_id() -> VolumeId {
    VolumeId(next_id())
}

/// Fresh node id for volume data owned outside `VolumeData`
pub fn next_node_id() -> u64 {
    next_id()
}

#[derive(Debug, Clone, Copy)]
pub struct VolumeDescriptor<'a> {
    pub id: VolumeId,
    pub node_id: u64,
    pub dimensions: [u32; 3],
    pub unit_size: UnitSize,
    pub data: &'a [u8],
    /// Object-space extent of the volume
    pub bounds: AABB,
}

pub fn voxel_count(dimensions: [u32; 3]) -> usize {
    dimensions[0] as usize * dimensions[1] as usize * dimensions[2] as usize
}

/// Check dimensions against the buffer length
pub fn validate_volume(
    dimensions: [u32; 3],
    unit_size: UnitSize,
    data: &[u8],
) -> Result<(), ChunkError> {
    if dimensions.iter().any(|d| *d == 0) {
        return Err(ChunkError::EmptyCut {
            cut: format!("volume {:?}", dimensions),
        });
    }
    let expected = voxel_count(dimensions) * unit_size.bytes();
    if expected != data.len() {
        return Err(ChunkError::BufferSize {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

impl<'a> VolumeDescriptor<'a> {
    pub fn new(
        id: VolumeId,
        node_id: u64,
        dimensions: [u32; 3],
        unit_size: UnitSize,
        data: &'a [u8],
        bounds: AABB,
    ) -> Result<Self, ChunkError> {
        validate_volume(dimensions, unit_size, data)?;
        Ok(Self {
            id,
            node_id,
            dimensions,
            unit_size,
            data,
            bounds,
        })
    }

    /// Size of one voxel in object space
    pub fn voxel_size(&self) -> Vector3<f32> {
        let size = self.bounds.max - self.bounds.min;
        Vector3::new(
            size.x / self.dimensions[0] as f32,
            size.y / self.dimensions[1] as f32,
            size.z / self.dimensions[2] as f32,
        )
    }
}

/// An owned volume, for callers without their own storage
#[derive(Debug, Clone)]
pub struct VolumeData {
    pub id: VolumeId,
    pub node_id: u64,
    pub dimensions: [u32; 3],
    pub unit_size: UnitSize,
    pub data: Vec<u8>,
    pub bounds: AABB,
}

impl VolumeData {
    /// Bounds default to one unit per voxel, centered on the origin
    pub fn new(
        dimensions: [u32; 3],
        unit_size: UnitSize,
        data: Vec<u8>,
    ) -> Result<Self, ChunkError> {
        validate_volume(dimensions, unit_size, &data)?;
        let bounds = aabb_centered(Vector3::new(
            dimensions[0] as f32,
            dimensions[1] as f32,
            dimensions[2] as f32,
        ));
        Ok(Self {
            id: next_volume_id(),
            node_id: next_id(),
            dimensions,
            unit_size,
            data,
            bounds,
        })
    }

    pub fn with_bounds(mut self, bounds: AABB) -> Self {
        self.bounds = bounds;
        self.node_id = next_id();
        self
    }

    /// Replace the voxels. Cached textures built from the old data are
    /// invalidated through the new node id.
    pub fn set_data(
        &mut self,
        dimensions: [u32; 3],
        unit_size: UnitSize,
        data: Vec<u8>,
    ) -> Result<(), ChunkError> {
        validate_volume(dimensions, unit_size, &data)?;
        self.dimensions = dimensions;
        self.unit_size = unit_size;
        self.data = data;
        self.node_id = next_id();
        Ok(())
    }

    pub fn descriptor(&self) -> VolumeDescriptor<'_> {
        VolumeDescriptor {
            id: self.id,
            node_id: self.node_id,
            dimensions: self.dimensions,
            unit_size: self.unit_size,
            data: &self.data,
            bounds: self.bounds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_size_validated() {
        let result = VolumeData::new([4, 4, 4], UnitSize::U16, vec![0; 64]);
        assert!(matches!(
            result,
            Err(ChunkError::BufferSize {
                expected: 128,
                actual: 64
            })
        ));
    }

    #[test]
    fn test_set_data_bumps_node_id() {
        let mut volume = VolumeData::new([2, 2, 2], UnitSize::U8, vec![0; 8]).expect("volume");
        let before = volume.descriptor().node_id;
        volume
            .set_data([2, 2, 2], UnitSize::U8, vec![1; 8])
            .expect("same size");
        assert_ne!(volume.descriptor().node_id, before);
        assert_eq!(volume.descriptor().id, volume.id);
    }

    #[test]
    fn test_default_bounds_and_voxel_size() {
        let volume = VolumeData::new([4, 2, 1], UnitSize::U8, vec![0; 8]).expect("volume");
        let desc = volume.descriptor();
        assert_eq!(desc.bounds.min.x, -2.0);
        assert_eq!(desc.voxel_size(), Vector3::new(1.0, 1.0, 1.0));
    }
}
