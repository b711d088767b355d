//! Synthetic test volume

use super::volume_data::{UnitSize, VolumeData};
use super::ChunkError;

pub const TEST_VOLUME_SIZE: u32 = 64;

/// 64^3 byte volume holding `x` along the (y = 0, z = 0) row and zero
/// everywhere else
pub fn make_test_volume() -> Result<VolumeData, ChunkError> {
    let n = TEST_VOLUME_SIZE as usize;
    let mut data = vec![0u8; n * n * n];
    for (x, voxel) in data.iter_mut().take(n).enumerate() {
        *voxel = x as u8;
    }
    VolumeData::new([TEST_VOLUME_SIZE; 3], UnitSize::U8, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let volume = make_test_volume().expect("test volume");
        assert_eq!(volume.data.len(), 64 * 64 * 64);
        assert_eq!(volume.data[0], 0);
        assert_eq!(volume.data[63], 63);
        assert_eq!(volume.data[64], 0);
        assert_eq!(volume.data.iter().map(|v| *v as u32).sum::<u32>(), (0..64).sum());
    }
}
