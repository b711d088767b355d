//! One slice of the 2D paging grid
//!
//! A slice across `axis` is split into `num_cols * num_rows` pages. Each
//! page slot holds one sub-page per transfer function it was rendered
//! with, so switching color maps back and forth does not rebuild.

use super::lru::LruCandidate;
use crate::render::backend::SliceVertex;
use crate::resource::HolderId;
use crate::texture::{TextureKind, TextureObject};
use crate::voxel::{page_axes, ChunkError, VolumeDescriptor, VoxelBox2};
use std::sync::Arc;

/// What a sub-page was built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubPageKey {
    pub transfer_function: u64,
    /// Only set for kinds with the colors baked in
    pub clut: Option<HolderId>,
    pub kind: TextureKind,
}

#[derive(Debug)]
pub struct SubPageItem {
    pub key: SubPageKey,
    /// `None` when the page is fully transparent
    pub texture: Option<Arc<TextureObject>>,
    pub last_tick: u64,
    pub needed: bool,
}

#[derive(Debug)]
pub struct TexPage {
    pub axis: usize,
    pub slice: u32,
    pub col_axis: usize,
    pub row_axis: usize,
    /// Page size along (column axis, row axis)
    pub page_size: [u32; 2],
    pub num_cols: u32,
    pub num_rows: u32,
    slots: Vec<Vec<SubPageItem>>,
}

impl TexPage {
    pub fn new(
        axis: usize,
        slice: u32,
        dimensions: [u32; 3],
        page_size: [u32; 2],
    ) -> Result<Self, ChunkError> {
        let (col_axis, row_axis) = page_axes(axis)?;
        let num_cols = dimensions[col_axis].div_ceil(page_size[0]);
        let num_rows = dimensions[row_axis].div_ceil(page_size[1]);
        let slots = (0..num_cols * num_rows).map(|_| Vec::new()).collect();
        Ok(Self {
            axis,
            slice,
            col_axis,
            row_axis,
            page_size,
            num_cols,
            num_rows,
            slots,
        })
    }

    pub fn slot_index(&self, col: u32, row: u32) -> usize {
        (row * self.num_cols + col) as usize
    }

    /// Voxel range of a page in (column, row) slice coordinates
    pub fn page_rect(&self, col: u32, row: u32, dimensions: [u32; 3]) -> VoxelBox2 {
        let min = [col * self.page_size[0], row * self.page_size[1]];
        let max = [
            (min[0] + self.page_size[0]).min(dimensions[self.col_axis]),
            (min[1] + self.page_size[1]).min(dimensions[self.row_axis]),
        ];
        VoxelBox2::new(min, max)
    }

    /// Mark the sub-page for `key` as used in pass `tick`
    pub fn touch(&mut self, slot: usize, key: &SubPageKey, tick: u64) -> Option<&SubPageItem> {
        let item = self.slots.get_mut(slot)?.iter_mut().find(|i| i.key == *key)?;
        item.last_tick = tick;
        item.needed = true;
        Some(item)
    }

    pub fn insert(&mut self, slot: usize, item: SubPageItem) {
        if let Some(items) = self.slots.get_mut(slot) {
            items.push(item);
        }
    }

    /// Drop fully transparent sub-pages built for anything but `key`.
    /// They hold no texture, so nothing goes back to the cache.
    pub fn drop_invisible_except(&mut self, key: &SubPageKey) -> usize {
        let mut dropped = 0;
        for items in &mut self.slots {
            let before = items.len();
            items.retain(|i| i.texture.is_some() || i.key == *key);
            dropped += before - items.len();
        }
        dropped
    }

    pub fn sub_page_count(&self) -> usize {
        self.slots.iter().map(Vec::len).sum()
    }

    /// Oldest sub-page with a texture that the current pass does not need
    pub fn lru_sub_page(&self) -> Option<LruCandidate<Arc<TextureObject>>> {
        let mut best: Option<&SubPageItem> = None;
        for item in self.slots.iter().flatten() {
            if item.needed || item.texture.is_none() {
                continue;
            }
            if best.map_or(true, |b| item.last_tick < b.last_tick) {
                best = Some(item);
            }
        }
        best.and_then(|item| {
            item.texture.as_ref().map(|texture| LruCandidate {
                key: texture.clone(),
                last_tick: item.last_tick,
                needed: false,
            })
        })
    }

    /// Remove the sub-page holding `texture`
    pub fn release_sub_page(&mut self, texture: &Arc<TextureObject>) -> Option<Arc<TextureObject>> {
        for items in &mut self.slots {
            let found = items
                .iter()
                .position(|i| i.texture.as_ref().is_some_and(|t| Arc::ptr_eq(t, texture)));
            if let Some(pos) = found {
                return items.swap_remove(pos).texture;
            }
        }
        None
    }

    pub fn clear_needed(&mut self) {
        for item in self.slots.iter_mut().flatten() {
            item.needed = false;
        }
    }

    /// Take every texture out of the page
    pub fn drain_textures(&mut self) -> Vec<Arc<TextureObject>> {
        self.slots
            .iter_mut()
            .flat_map(|items| items.drain(..))
            .filter_map(|item| item.texture)
            .collect()
    }

    /// Object-space corners of a page as a fan, with texture coordinates
    /// covering only the texels that hold voxel data
    pub fn quad(
        &self,
        col: u32,
        row: u32,
        volume: &VolumeDescriptor<'_>,
        texture: &TextureObject,
    ) -> [SliceVertex; 4] {
        let rect = self.page_rect(col, row, volume.dimensions);
        let voxel = volume.voxel_size();
        let min = volume.bounds.min;
        let size = [voxel.x, voxel.y, voxel.z];
        let origin = [min.x, min.y, min.z];

        let depth = origin[self.axis] + (self.slice as f32 + 0.5) * size[self.axis];
        let c = |v: u32| origin[self.col_axis] + v as f32 * size[self.col_axis];
        let r = |v: u32| origin[self.row_axis] + v as f32 * size[self.row_axis];
        let s_max = texture.used[0] as f32 / texture.dimensions[0] as f32;
        let t_max = texture.used[1] as f32 / texture.dimensions[1] as f32;

        let corner = |cv: f32, rv: f32, s: f32, t: f32| {
            let mut position = [0.0f32; 3];
            position[self.axis] = depth;
            position[self.col_axis] = cv;
            position[self.row_axis] = rv;
            SliceVertex {
                position,
                texcoord: [s, t, 0.0],
            }
        };
        [
            corner(c(rect.min[0]), r(rect.min[1]), 0.0, 0.0),
            corner(c(rect.max[0]), r(rect.min[1]), s_max, 0.0),
            corner(c(rect.max[0]), r(rect.max[1]), s_max, t_max),
            corner(c(rect.min[0]), r(rect.max[1]), 0.0, t_max),
        ]
    }

    /// Closed outline of a page for debug drawing
    pub fn outline(&self, col: u32, row: u32, volume: &VolumeDescriptor<'_>) -> Vec<[f32; 3]> {
        let rect = self.page_rect(col, row, volume.dimensions);
        let voxel = volume.voxel_size();
        let min = volume.bounds.min;
        let size = [voxel.x, voxel.y, voxel.z];
        let origin = [min.x, min.y, min.z];
        let depth = origin[self.axis] + (self.slice as f32 + 0.5) * size[self.axis];

        let point = |cv: u32, rv: u32| {
            let mut p = [0.0f32; 3];
            p[self.axis] = depth;
            p[self.col_axis] = origin[self.col_axis] + cv as f32 * size[self.col_axis];
            p[self.row_axis] = origin[self.row_axis] + rv as f32 * size[self.row_axis];
            p
        };
        let corners = [
            point(rect.min[0], rect.min[1]),
            point(rect.max[0], rect.min[1]),
            point(rect.max[0], rect.max[1]),
            point(rect.min[0], rect.max[1]),
        ];
        (0..4).flat_map(|i| [corners[i], corners[(i + 1) % 4]]).collect()
    }
}
