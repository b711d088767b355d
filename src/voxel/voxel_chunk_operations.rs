//! Voxel Chunk Operations
//!
//! Page and cube cuts, and color transfer into texture objects.

use super::gradient::central_difference_gradient;
use super::volume_data::{voxel_count, UnitSize, VolumeDescriptor};
use super::voxel_box::{VoxelBox2, VoxelBox3};
use super::voxel_chunk_data::VoxelChunk;
use super::ChunkError;
use crate::clut::{lookup_rgba, Clut, TransferFunction};
use crate::error::{EngineError, EngineResult, OptionExt};
use crate::texture::texture_object_data::{TextureKind, TextureObject};
use crate::texture::texture_object_operations::{
    blank_unused, bytes_per_texel, create_texture_object, is_3d, texel_count, texture_dimensions,
};
use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;

pub fn create_voxel_chunk<'a>(
    dimensions: [u32; 3],
    unit_size: UnitSize,
    buffer: Cow<'a, [u8]>,
) -> Result<VoxelChunk<'a>, ChunkError> {
    let expected = voxel_count(dimensions) * unit_size.bytes();
    if buffer.len() != expected {
        return Err(ChunkError::BufferSize {
            expected,
            actual: buffer.len(),
        });
    }
    Ok(VoxelChunk {
        dimensions,
        unit_size,
        buffer,
    })
}

/// Wrap a whole volume without copying
pub fn chunk_from_descriptor<'a>(volume: &VolumeDescriptor<'a>) -> VoxelChunk<'a> {
    VoxelChunk {
        dimensions: volume.dimensions,
        unit_size: volume.unit_size,
        buffer: Cow::Borrowed(volume.data),
    }
}

pub fn chunk_buffer_size(chunk: &VoxelChunk<'_>) -> usize {
    voxel_count(chunk.dimensions) * chunk.unit_size.bytes()
}

/// Volume axes spanned by a slice across `axis`: (column axis, row axis).
/// X slices map to (z, y), Y slices to (x, z), Z slices to (x, y).
pub fn page_axes(axis: usize) -> Result<(usize, usize), ChunkError> {
    match axis {
        0 => Ok((2, 1)),
        1 => Ok((0, 2)),
        2 => Ok((0, 1)),
        _ => Err(ChunkError::InvalidAxis(axis)),
    }
}

/// Copy `rect` of slice `slice` across `axis`. The result has dimensions
/// `[rect width, rect height, 1]` in the slice's (column, row) layout.
pub fn build_sub_page(
    chunk: &VoxelChunk<'_>,
    axis: usize,
    slice: u32,
    rect: &VoxelBox2,
) -> Result<VoxelChunk<'static>, ChunkError> {
    let (col_axis, row_axis) = page_axes(axis)?;
    let dims = chunk.dimensions;
    if slice >= dims[axis] {
        return Err(ChunkError::SliceOutOfRange {
            axis,
            index: slice,
            size: dims[axis],
        });
    }
    if rect.is_empty() {
        return Err(ChunkError::EmptyCut {
            cut: rect.to_string(),
        });
    }
    if rect.max[0] > dims[col_axis] || rect.max[1] > dims[row_axis] {
        return Err(ChunkError::CutOutOfBounds {
            cut: rect.to_string(),
            dims,
        });
    }

    let unit = chunk.unit_size.bytes();
    let [w, h] = rect.size();
    let mut out = Vec::with_capacity(w as usize * h as usize * unit);
    let mut voxel = [0u32; 3];
    voxel[axis] = slice;

    for row in rect.min[1]..rect.max[1] {
        voxel[row_axis] = row;
        if col_axis == 0 {
            // Columns run along x and are contiguous in memory
            voxel[0] = rect.min[0];
            let start = voxel_offset(dims, voxel) * unit;
            out.extend_from_slice(&chunk.buffer[start..start + w as usize * unit]);
        } else {
            for col in rect.min[0]..rect.max[0] {
                voxel[col_axis] = col;
                let start = voxel_offset(dims, voxel) * unit;
                out.extend_from_slice(&chunk.buffer[start..start + unit]);
            }
        }
    }

    Ok(VoxelChunk {
        dimensions: [w, h, 1],
        unit_size: chunk.unit_size,
        buffer: Cow::Owned(out),
    })
}

/// Copy a 3D box out of the chunk
pub fn build_sub_cube(
    chunk: &VoxelChunk<'_>,
    cut: &VoxelBox3,
) -> Result<VoxelChunk<'static>, ChunkError> {
    let dims = chunk.dimensions;
    if cut.is_empty() {
        return Err(ChunkError::EmptyCut {
            cut: cut.to_string(),
        });
    }
    if (0..3).any(|i| cut.max[i] > dims[i]) {
        return Err(ChunkError::CutOutOfBounds {
            cut: cut.to_string(),
            dims,
        });
    }

    let unit = chunk.unit_size.bytes();
    let size = cut.size();
    let row_bytes = size[0] as usize * unit;
    let mut out = Vec::with_capacity(voxel_count(size) * unit);
    for z in cut.min[2]..cut.max[2] {
        for y in cut.min[1]..cut.max[1] {
            let start = voxel_offset(dims, [cut.min[0], y, z]) * unit;
            out.extend_from_slice(&chunk.buffer[start..start + row_bytes]);
        }
    }

    Ok(VoxelChunk {
        dimensions: size,
        unit_size: chunk.unit_size,
        buffer: Cow::Owned(out),
    })
}

fn voxel_offset(dims: [u32; 3], v: [u32; 3]) -> usize {
    (v[2] as usize * dims[1] as usize + v[1] as usize) * dims[0] as usize + v[0] as usize
}

/// 8-bit value of voxel `i`; 16-bit voxels contribute their high byte
fn byte_value(chunk: &VoxelChunk<'_>, i: usize) -> u8 {
    match chunk.unit_size {
        UnitSize::U8 => chunk.buffer[i],
        UnitSize::U16 => {
            let v = u16::from_ne_bytes([chunk.buffer[i * 2], chunk.buffer[i * 2 + 1]]);
            (v >> 8) as u8
        }
        UnitSize::U32 => chunk.buffer[i * 4 + 3],
    }
}

/// Palette indices of the whole chunk after the transfer function remap
pub fn chunk_palette_indices(chunk: &VoxelChunk<'_>, tf: &TransferFunction) -> Vec<u8> {
    (0..voxel_count(chunk.dimensions))
        .map(|i| tf.remap_value(byte_value(chunk, i)))
        .collect()
}

/// Color transfer into a power-of-two texture of `kind` (2D or 3D,
/// paletted or RGBA). RGBA voxel data always yields an RGBA texture.
///
/// Returns the texture and whether every texel is fully transparent.
/// Paletted textures are never reported invisible since their palette can
/// change after the fact.
pub fn transfer(
    chunk: &VoxelChunk<'_>,
    tf: &TransferFunction,
    clut: &Arc<Clut>,
    kind: TextureKind,
) -> EngineResult<(TextureObject, bool)> {
    let kind = match (chunk.unit_size, kind) {
        (_, TextureKind::Palette3DGradient) => {
            return Err(EngineError::InvalidArgument {
                name: "kind".to_string(),
                reason: "gradient textures are built by transfer_with_gradient".to_string(),
            })
        }
        (UnitSize::U32, k) if is_3d(k) => TextureKind::Rgba3D,
        (UnitSize::U32, _) => TextureKind::Rgba2D,
        (_, k) => k,
    };
    if !is_3d(kind) && chunk.dimensions[2] != 1 {
        return Err(EngineError::InvalidDimensions {
            dims: chunk.dimensions,
            reason: "2D textures need a single-layer chunk".to_string(),
        });
    }

    let size = chunk.dimensions;
    let texdims = texture_dimensions(kind, size);
    let bpt = bytes_per_texel(kind);
    let mut texels = vec![0u8; texel_count(texdims) * bpt];
    let mut invisible = true;

    let indices = if chunk.unit_size == UnitSize::U32 {
        None
    } else {
        Some(chunk_palette_indices(chunk, tf))
    };

    for z in 0..size[2] as usize {
        for y in 0..size[1] as usize {
            let src_row = (z * size[1] as usize + y) * size[0] as usize;
            let dst_row = (z * texdims[1] as usize + y) * texdims[0] as usize;
            for x in 0..size[0] as usize {
                let src = src_row + x;
                let dst = (dst_row + x) * bpt;
                match (&indices, kind) {
                    (None, _) => {
                        texels[dst..dst + 4].copy_from_slice(&chunk.buffer[src * 4..src * 4 + 4]);
                    }
                    (Some(idx), TextureKind::Palette2D | TextureKind::Palette3D) => {
                        texels[dst] = idx[src];
                    }
                    (Some(idx), _) => {
                        let rgba = lookup_rgba(clut, idx[src]);
                        invisible = invisible && rgba[3] == 0;
                        texels[dst..dst + 4].copy_from_slice(&rgba);
                    }
                }
            }
        }
    }

    let paletted = matches!(kind, TextureKind::Palette2D | TextureKind::Palette3D);
    if paletted || indices.is_none() {
        invisible = false;
    }
    blank_unused(&mut texels, kind, texdims, size);

    let texture = create_texture_object(kind, texdims, size, texels)?;
    Ok((texture, invisible))
}

/// Paletted 3D texture with a central-difference gradient per texel:
/// `[index, gx, gy, gz]`, the gradient mapped from [-1, 1] to [0, 255].
pub fn transfer_with_gradient(
    chunk: &VoxelChunk<'_>,
    tf: &TransferFunction,
    flipped_y: bool,
) -> EngineResult<TextureObject> {
    if chunk.unit_size == UnitSize::U32 {
        return Err(ChunkError::UnsupportedUnitSize {
            bytes: 4,
            operation: "gradient textures",
        }
        .into());
    }
    let kind = TextureKind::Palette3DGradient;
    let size = chunk.dimensions;
    let texdims = texture_dimensions(kind, size);
    let mut texels = vec![0u8; texel_count(texdims) * 4];

    let values: Vec<u8> = (0..voxel_count(size)).map(|i| byte_value(chunk, i)).collect();
    let to_byte = |g: f32| ((g + 1.0) * 127.5) as u8;

    for z in 0..size[2] {
        for y in 0..size[1] {
            for x in 0..size[0] {
                let src = voxel_offset(size, [x, y, z]);
                let dst = voxel_offset(texdims, [x, y, z]) * 4;
                let g = central_difference_gradient(&values, size, flipped_y, x, y, z);
                texels[dst] = tf.remap_value(values[src]);
                texels[dst + 1] = to_byte(g.x);
                texels[dst + 2] = to_byte(g.y);
                texels[dst + 3] = to_byte(g.z);
            }
        }
    }

    create_texture_object(kind, texdims, size, texels)
}

/// Write an 8-bit single-layer chunk as a grayscale PNG
pub fn dump_chunk_debug_image(chunk: &VoxelChunk<'_>, path: &Path) -> EngineResult<()> {
    if chunk.unit_size != UnitSize::U8 || chunk.dimensions[2] != 1 {
        return Err(EngineError::InvalidArgument {
            name: "chunk".to_string(),
            reason: "only 8-bit 2D chunks can be dumped".to_string(),
        });
    }
    let [w, h, _] = chunk.dimensions;
    let img = image::GrayImage::from_raw(w, h, chunk.buffer.to_vec()).ok_or_engine(|| {
        EngineError::Internal {
            message: "chunk buffer does not match its dimensions".to_string(),
        }
    })?;
    img.save(path).map_err(|e| EngineError::IoError {
        path: path.display().to_string(),
        error: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clut::{create_clut_from_bytes, PredefinedMap};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_chunk(dims: [u32; 3], unit: UnitSize, seed: u64) -> VoxelChunk<'static> {
        let mut rng = StdRng::seed_from_u64(seed);
        let data: Vec<u8> = (0..voxel_count(dims) * unit.bytes()).map(|_| rng.gen()).collect();
        create_voxel_chunk(dims, unit, Cow::Owned(data)).expect("chunk")
    }

    fn ramp_clut() -> Arc<Clut> {
        let bytes: Vec<u8> = (0..=255u8).flat_map(|v| [v, v, v, v]).collect();
        Arc::new(create_clut_from_bytes(&bytes).expect("valid clut"))
    }

    fn ramp_transfer(
        chunk: &VoxelChunk<'_>,
        tf: &TransferFunction,
        kind: TextureKind,
    ) -> (TextureObject, bool) {
        transfer(chunk, tf, &ramp_clut(), kind).expect("transfer")
    }

    #[test]
    fn test_sub_page_dimensions() {
        let chunk = random_chunk([5, 6, 7], UnitSize::U8, 1);
        let page = build_sub_page(&chunk, 0, 2, &VoxelBox2::new([1, 2], [4, 6])).expect("page");
        assert_eq!(page.dimensions, [3, 4, 1]);
        assert_eq!(page.unit_size, UnitSize::U8);
    }

    #[test]
    fn test_sub_pages_reassemble_slice() {
        let dims = [13, 9, 11];
        let page = [4u32, 4];
        for unit in [UnitSize::U8, UnitSize::U16] {
            let chunk = random_chunk(dims, unit, 42);
            let bytes = unit.bytes();
            for axis in 0..3 {
                let (ca, ra) = page_axes(axis).expect("axis");
                for slice in [0, dims[axis] / 2, dims[axis] - 1] {
                    let mut rebuilt = vec![0u8; dims[ca] as usize * dims[ra] as usize * bytes];
                    let mut row = 0;
                    while row < dims[ra] {
                        let mut col = 0;
                        while col < dims[ca] {
                            let rect = VoxelBox2::new(
                                [col, row],
                                [(col + page[0]).min(dims[ca]), (row + page[1]).min(dims[ra])],
                            );
                            let sub = build_sub_page(&chunk, axis, slice, &rect).expect("page");
                            let [w, h] = rect.size();
                            assert_eq!(sub.dimensions, [w, h, 1]);
                            let width = dims[ca] as usize;
                            for r in 0..h as usize {
                                for c in 0..w as usize {
                                    let dst =
                                        ((row as usize + r) * width + col as usize + c) * bytes;
                                    let src = (r * w as usize + c) * bytes;
                                    rebuilt[dst..dst + bytes]
                                        .copy_from_slice(&sub.buffer[src..src + bytes]);
                                }
                            }
                            col += page[0];
                        }
                        row += page[1];
                    }

                    let full = VoxelBox2::new([0, 0], [dims[ca], dims[ra]]);
                    let whole = build_sub_page(&chunk, axis, slice, &full).expect("slice");
                    assert_eq!(whole.buffer.as_ref(), rebuilt.as_slice());

                    // Spot-check against direct indexing
                    let mut v = [0u32; 3];
                    v[axis] = slice;
                    v[ca] = dims[ca] - 1;
                    v[ra] = 1;
                    let direct = voxel_offset(dims, v) * bytes;
                    let paged = ((dims[ca] as usize) + dims[ca] as usize - 1) * bytes;
                    assert_eq!(
                        &chunk.buffer[direct..direct + bytes],
                        &rebuilt[paged..paged + bytes]
                    );
                }
            }
        }
    }

    #[test]
    fn test_sub_page_errors() {
        let chunk = random_chunk([4, 4, 4], UnitSize::U8, 3);
        let rect = VoxelBox2::new([0, 0], [4, 4]);
        assert!(matches!(
            build_sub_page(&chunk, 2, 4, &rect),
            Err(ChunkError::SliceOutOfRange { axis: 2, index: 4, size: 4 })
        ));
        assert!(matches!(
            build_sub_page(&chunk, 1, 0, &VoxelBox2::new([0, 0], [5, 4])),
            Err(ChunkError::CutOutOfBounds { .. })
        ));
        assert!(matches!(
            build_sub_page(&chunk, 1, 0, &VoxelBox2::new([2, 0], [2, 4])),
            Err(ChunkError::EmptyCut { .. })
        ));
        assert!(matches!(build_sub_page(&chunk, 3, 0, &rect), Err(ChunkError::InvalidAxis(3))));
    }

    #[test]
    fn test_sub_cube() {
        let chunk = random_chunk([6, 5, 4], UnitSize::U16, 9);
        let cut = VoxelBox3::new([1, 1, 1], [4, 5, 3]);
        let sub = build_sub_cube(&chunk, &cut).expect("cube");
        assert_eq!(sub.dimensions, [3, 4, 2]);
        let src = voxel_offset([6, 5, 4], [3, 4, 2]) * 2;
        let dst = voxel_offset([3, 4, 2], [2, 3, 1]) * 2;
        assert_eq!(&sub.buffer[dst..dst + 2], &chunk.buffer[src..src + 2]);

        assert!(build_sub_cube(&chunk, &VoxelBox3::new([0, 0, 0], [7, 1, 1])).is_err());
        assert!(build_sub_cube(&chunk, &VoxelBox3::new([1, 0, 0], [1, 1, 1])).is_err());
    }

    #[test]
    fn test_transfer_rgba_pads_to_power_of_two() {
        let data: Vec<u8> = (0..15).map(|i| i as u8 * 10).collect();
        let chunk = create_voxel_chunk([5, 3, 1], UnitSize::U8, Cow::Owned(data)).expect("chunk");
        let tf = TransferFunction::default();
        let (texture, invisible) = ramp_transfer(&chunk, &tf, TextureKind::Rgba2D);
        assert!(!invisible);
        assert_eq!(texture.dimensions, [8, 4, 1]);
        assert_eq!(&texture.texels[4..8], &[10, 10, 10, 10]);
        // Padding column and row are zero
        assert!(texture.texels[5 * 4..8 * 4].iter().all(|t| *t == 0));
        assert!(texture.texels[3 * 8 * 4..].iter().all(|t| *t == 0));
    }

    #[test]
    fn test_transfer_invisible() {
        let chunk =
            create_voxel_chunk([2, 2, 1], UnitSize::U8, Cow::Owned(vec![0; 4])).expect("chunk");
        let tf = TransferFunction::default();
        let (_, invisible) = ramp_transfer(&chunk, &tf, TextureKind::Rgba2D);
        assert!(invisible);
        let (palette, invisible) = ramp_transfer(&chunk, &tf, TextureKind::Palette2D);
        assert!(!invisible);
        assert_eq!(palette.kind, TextureKind::Palette2D);
    }

    #[test]
    fn test_transfer_applies_shift_offset() {
        let chunk =
            create_voxel_chunk([2, 1, 1], UnitSize::U8, Cow::Owned(vec![3, 200])).expect("chunk");
        let mut tf = TransferFunction::predefined(PredefinedMap::Grey);
        tf.set_shift_offset(1, 5);
        let (texture, _) = ramp_transfer(&chunk, &tf, TextureKind::Palette2D);
        assert_eq!(texture.texels[0], 11);
        assert_eq!(texture.texels[1], 200u8.wrapping_shl(1).wrapping_add(5));
    }

    #[test]
    fn test_transfer_u16_uses_high_byte() {
        let values: Vec<u8> = [0x1234u16, 0xff00].iter().flat_map(|v| v.to_ne_bytes()).collect();
        let chunk =
            create_voxel_chunk([2, 1, 1], UnitSize::U16, Cow::Owned(values)).expect("chunk");
        let tf = TransferFunction::default();
        let (texture, _) = ramp_transfer(&chunk, &tf, TextureKind::Palette2D);
        assert_eq!(&texture.texels[0..2], &[0x12, 0xff]);
    }

    #[test]
    fn test_transfer_rgba_voxels_pass_through() {
        let data = Cow::Owned(vec![1, 2, 3, 0]);
        let chunk = create_voxel_chunk([1, 1, 1], UnitSize::U32, data).expect("chunk");
        let tf = TransferFunction::default();
        let (texture, invisible) = ramp_transfer(&chunk, &tf, TextureKind::Palette3D);
        assert_eq!(texture.kind, TextureKind::Rgba3D);
        assert_eq!(&texture.texels[..], &[1, 2, 3, 0]);
        assert!(!invisible);
    }

    #[test]
    fn test_transfer_with_gradient() {
        let data: Vec<u8> = (0..8).map(|i| if i % 2 == 0 { 0 } else { 100 }).collect();
        let chunk = create_voxel_chunk([2, 2, 2], UnitSize::U8, Cow::Owned(data)).expect("chunk");
        let tf = TransferFunction::default();
        let texture = transfer_with_gradient(&chunk, &tf, false).expect("gradient texture");
        assert_eq!(texture.kind, TextureKind::Palette3DGradient);
        assert_eq!(texture.dimensions, [2, 2, 2]);
        // Index, then -x gradient mapped to 0, flat y and z at the middle
        assert_eq!(&texture.texels[4..8], &[100, 0, 127, 127]);
    }

    #[test]
    fn test_dump_chunk_debug_image() {
        let dir = tempfile::tempdir().expect("temp dir");
        let chunk = random_chunk([8, 4, 1], UnitSize::U8, 5);
        let path = dir.path().join("chunk.png");
        dump_chunk_debug_image(&chunk, &path).expect("png");
        assert!(path.exists());
        let cube = random_chunk([2, 2, 2], UnitSize::U8, 5);
        assert!(dump_chunk_debug_image(&cube, &dir.path().join("cube.png")).is_err());
    }
}
