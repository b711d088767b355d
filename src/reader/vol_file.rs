//! Reader for the VOL format of "Introduction to Volume Rendering"
//! (Lichtenbelt, Crane, Naqvi).
//!
//! Layout, all fields big-endian:
//!
//! ```text
//! u32 magic_number  (0x0b7e7759)
//! u32 header_length (fixed header + description)
//! u32 width, height, images
//! u32 bits_per_voxel, index_bits
//! f32 scale_x, scale_y, scale_z
//! f32 rot_x, rot_y, rot_z
//! description text up to header_length, NUL separated
//! voxel bytes, x fastest
//! ```

use crate::error::{EngineError, EngineResult};
use crate::math::aabb_centered;
use crate::voxel::{next_node_id, next_volume_id, UnitSize, VolumeDescriptor, VolumeId};
use cgmath::Vector3;
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};

pub const VOL_MAGIC: u32 = 0x0b7e_7759;
/// Bytes of the fixed header before the description
pub const VOL_HEADER_SIZE: usize = 52;
const MAX_DIMENSION: u32 = 32767;

#[derive(Debug, thiserror::Error)]
pub enum VolFileError {
    #[error("File too short for a VOL header: {len} bytes")]
    TooShort { len: usize },
    #[error("Bad magic number 0x{0:08x}")]
    BadMagic(u32),
    #[error("Header length {header_length} invalid for a file of {file_len} bytes")]
    BadHeaderLength { header_length: u32, file_len: usize },
    #[error("{axis} of {value} outside 1..=32767")]
    DimensionOutOfRange { axis: &'static str, value: u32 },
    #[error("Unsupported bits per voxel: {0}")]
    UnsupportedBitsPerVoxel(u32),
    #[error("Negative {axis} scale {value}")]
    NegativeScale { axis: &'static str, value: f32 },
    #[error("Voxel data truncated: expected {expected} bytes, got {actual}")]
    TruncatedData { expected: usize, actual: usize },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VolHeader {
    pub header_length: u32,
    pub dimensions: [u32; 3],
    pub bits_per_voxel: u32,
    pub index_bits: u32,
    /// Object-space size of one voxel; a stored 0 reads as 1
    pub scale: [f32; 3],
    pub rotation: [f32; 3],
    pub description: String,
}

impl VolHeader {
    pub fn voxel_bytes(&self) -> usize {
        let voxels: usize = self.dimensions.iter().map(|d| *d as usize).product();
        voxels * (self.bits_per_voxel as usize / 8)
    }
}

fn be_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

fn be_f32(data: &[u8], offset: usize) -> f32 {
    f32::from_bits(be_u32(data, offset))
}

/// Parse and validate the header at the start of `data`, the whole file
pub fn parse_vol_header(data: &[u8]) -> Result<VolHeader, VolFileError> {
    if data.len() < VOL_HEADER_SIZE {
        return Err(VolFileError::TooShort { len: data.len() });
    }

    let magic = be_u32(data, 0);
    if magic != VOL_MAGIC {
        return Err(VolFileError::BadMagic(magic));
    }

    let header_length = be_u32(data, 4);
    if (header_length as usize) < VOL_HEADER_SIZE || header_length as usize > data.len() {
        return Err(VolFileError::BadHeaderLength {
            header_length,
            file_len: data.len(),
        });
    }

    let dimensions = [be_u32(data, 8), be_u32(data, 12), be_u32(data, 16)];
    for (axis, value) in ["width", "height", "images"].into_iter().zip(dimensions) {
        if value == 0 || value > MAX_DIMENSION {
            return Err(VolFileError::DimensionOutOfRange { axis, value });
        }
    }

    let bits_per_voxel = be_u32(data, 20);
    if bits_per_voxel != 8 {
        return Err(VolFileError::UnsupportedBitsPerVoxel(bits_per_voxel));
    }
    let index_bits = be_u32(data, 24);

    let mut scale = [be_f32(data, 28), be_f32(data, 32), be_f32(data, 36)];
    for (axis, value) in ["x", "y", "z"].into_iter().zip(scale.iter_mut()) {
        if *value < 0.0 {
            return Err(VolFileError::NegativeScale { axis, value: *value });
        }
        if *value == 0.0 {
            *value = 1.0;
        }
    }
    let rotation = [be_f32(data, 40), be_f32(data, 44), be_f32(data, 48)];

    let text = &data[VOL_HEADER_SIZE..header_length as usize];
    let description = String::from_utf8_lossy(text)
        .trim_end_matches('\0')
        .replace('\0', "\n");

    let header = VolHeader {
        header_length,
        dimensions,
        bits_per_voxel,
        index_bits,
        scale,
        rotation,
        description,
    };

    let expected = header.voxel_bytes();
    let actual = data.len() - header_length as usize;
    if actual < expected {
        return Err(VolFileError::TruncatedData { expected, actual });
    }
    Ok(header)
}

/// A memory-mapped VOL file. Voxels are borrowed straight from the map.
#[derive(Debug)]
pub struct VolFile {
    path: PathBuf,
    map: Mmap,
    header: VolHeader,
    id: VolumeId,
    node_id: u64,
}

impl VolFile {
    pub fn open(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref().to_path_buf();
        let invalid = |e: VolFileError| EngineError::InvalidVolumeFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        };

        let file = File::open(&path).map_err(|e| EngineError::IoError {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        // SAFETY: The map is read-only and lives as long as the VolFile.
        // Truncating the file underneath it is the caller's problem, as with
        // any mapped file.
        let map = unsafe { Mmap::map(&file) }.map_err(|e| invalid(e.into()))?;
        let header = parse_vol_header(&map).map_err(invalid)?;

        log::info!(
            "[VolFile::open] {}: {:?} voxels, scale {:?}",
            path.display(),
            header.dimensions,
            header.scale
        );
        if !header.description.is_empty() {
            log::debug!("[VolFile::open] Description: {}", header.description);
        }

        Ok(Self {
            path,
            map,
            header,
            id: next_volume_id(),
            node_id: next_node_id(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &VolHeader {
        &self.header
    }

    pub fn voxels(&self) -> &[u8] {
        let start = self.header.header_length as usize;
        &self.map[start..start + self.header.voxel_bytes()]
    }

    /// Object-space size: dimensions times scale
    pub fn volume_size(&self) -> Vector3<f32> {
        let [w, h, d] = self.header.dimensions;
        let [sx, sy, sz] = self.header.scale;
        Vector3::new(w as f32 * sx, h as f32 * sy, d as f32 * sz)
    }

    /// Descriptor over the mapped voxels, centered on the origin
    pub fn descriptor(&self) -> EngineResult<VolumeDescriptor<'_>> {
        let descriptor = VolumeDescriptor::new(
            self.id,
            self.node_id,
            self.header.dimensions,
            UnitSize::U8,
            self.voxels(),
            aabb_centered(self.volume_size()),
        )?;
        Ok(descriptor)
    }
}
