//! 2D texture paging
//!
//! Slices are allocated lazily per axis. Every render pass bumps the tick;
//! sub-pages used in the pass are marked needed so the LRU eviction that
//! keeps resident memory under the budget never touches the working set.

use super::lru::{select_lru_victim, LruCandidate};
use super::tex_page::{SubPageItem, SubPageKey, TexPage};
use super::{PassParams, PassStats, SliceStyle};
use crate::clut::deactivate_clut;
use crate::error::{EngineError, EngineResult};
use crate::render::backend::DrawStyle;
use crate::render::composition::{AbortCallback, AbortCode};
use crate::render::render_context::{RenderContext, RenderSession};
use crate::texture::{
    activate_texture, baked_clut, texture_byte_size, CutParameters, TextureKind, TextureObject,
    TextureRequest,
};
use crate::voxel::{page_axes, VolumeId};
use cgmath::Vector3;
use std::sync::Arc;

/// Axis with the largest absolute component of `to_viewer`. Ties go to
/// the lowest axis index.
pub fn dominant_axis(to_viewer: Vector3<f32>) -> usize {
    let abs = [to_viewer.x.abs(), to_viewer.y.abs(), to_viewer.z.abs()];
    let mut axis = 0;
    for i in 1..3 {
        if abs[i] > abs[axis] {
            axis = i;
        }
    }
    axis
}

fn sub_page_key(params: &PassParams<'_, '_>) -> SubPageKey {
    let kind = if params.paletted {
        TextureKind::Palette2D
    } else {
        TextureKind::Rgba2D
    };
    SubPageKey {
        transfer_function: params.transfer_function.node_id(),
        clut: baked_clut(kind, params.clut),
        kind,
    }
}

pub struct PageHandler {
    volume: Option<(VolumeId, u64, [u32; 3])>,
    /// Sub-page key of the last pass
    current_key: Option<SubPageKey>,
    page_size: [u32; 3],
    slices: [Vec<Option<TexPage>>; 3],
    tick: u64,
    resident_bytes: u64,
    budget: u64,
}

impl PageHandler {
    pub fn new(page_size: [u32; 3], budget: u64) -> Self {
        Self {
            volume: None,
            current_key: None,
            page_size,
            slices: [Vec::new(), Vec::new(), Vec::new()],
            tick: 0,
            resident_bytes: 0,
            budget,
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn page_size(&self) -> [u32; 3] {
        self.page_size
    }

    /// Bytes of page textures currently held
    pub fn resident_bytes(&self) -> u64 {
        self.resident_bytes
    }

    pub fn set_budget(&mut self, budget: u64) {
        self.budget = budget;
    }

    /// Sub-pages held across all slices, transparent ones included
    pub fn sub_page_count(&self) -> usize {
        self.slices
            .iter()
            .flatten()
            .flatten()
            .map(TexPage::sub_page_count)
            .sum()
    }

    /// Pages allocated along `axis`
    pub fn allocated_pages(&self, axis: usize) -> usize {
        self.slices
            .get(axis)
            .map_or(0, |s| s.iter().filter(|p| p.is_some()).count())
    }

    /// Switch to a new page size. Only axes whose slices are cut with a
    /// changed size are released.
    pub fn compare_page_size(&mut self, page_size: [u32; 3], session: &mut RenderSession) {
        if page_size == self.page_size {
            return;
        }
        for axis in 0..3 {
            let Ok((c, r)) = page_axes(axis) else { continue };
            if page_size[c] != self.page_size[c] || page_size[r] != self.page_size[r] {
                self.release_axis(axis, session);
            }
        }
        log::debug!(
            "[PageHandler::compare_page_size] {:?} -> {:?}",
            self.page_size,
            page_size
        );
        self.page_size = page_size;
    }

    /// Slicing axis for the current view
    pub fn slicing_axis(&self, to_viewer: Vector3<f32>, lock_axis: Option<u8>) -> usize {
        match lock_axis {
            Some(axis) if axis <= 2 => axis as usize,
            _ => dominant_axis(to_viewer),
        }
    }

    /// Render `params.num_slices` slices back to front along the slicing
    /// axis. The abort callback is asked before each slice.
    pub fn render(
        &mut self,
        ctx: &mut RenderContext<'_>,
        params: &PassParams<'_, '_>,
        mut abort: Option<&mut AbortCallback<'_>>,
    ) -> EngineResult<PassStats> {
        self.begin_pass(ctx, params)?;
        let to_viewer = ctx.view.to_viewer();
        let axis = self.slicing_axis(to_viewer, ctx.config().lock_axis);
        let dim = params.volume.dimensions[axis];
        let n = params.num_slices.max(1);
        // Viewer on the positive side: the back is the minimum end
        let from_max = to_viewer[axis] < 0.0;

        let mut stats = PassStats {
            slices_total: n,
            ..PassStats::default()
        };
        let mut result = Ok(());
        for i in 0..n {
            if let Some(callback) = abort.as_deref_mut() {
                match callback(n, i) {
                    AbortCode::Continue => {}
                    AbortCode::Skip => {
                        stats.slices_skipped += 1;
                        continue;
                    }
                    AbortCode::Abort => {
                        stats.aborted = true;
                        break;
                    }
                }
            }
            let mut index = ((i as f32 / n as f32) * dim as f32).round() as u32;
            index = index.min(dim - 1);
            if from_max {
                index = dim - index - 1;
            }
            match self.draw_slice(ctx, params, axis, index, &mut stats) {
                Ok(()) => stats.slices_drawn += 1,
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }
        self.end_pass(ctx, params);
        result.map(|_| stats)
    }

    /// Render the single slice `index` across `axis`
    pub fn render_ortho_slice(
        &mut self,
        ctx: &mut RenderContext<'_>,
        params: &PassParams<'_, '_>,
        axis: usize,
        index: u32,
    ) -> EngineResult<PassStats> {
        page_axes(axis)?;
        let dim = params.volume.dimensions[axis];
        if index >= dim {
            return Err(EngineError::SliceOutOfRange {
                axis,
                index,
                size: dim,
            });
        }
        self.begin_pass(ctx, params)?;
        let mut stats = PassStats {
            slices_total: 1,
            ..PassStats::default()
        };
        let result = self.draw_slice(ctx, params, axis, index, &mut stats);
        if result.is_ok() {
            stats.slices_drawn = 1;
        }
        self.end_pass(ctx, params);
        result.map(|_| stats)
    }

    /// Drop every page and hand its textures back to the cache
    pub fn release_all(&mut self, session: &mut RenderSession) {
        for axis in 0..3 {
            self.release_axis(axis, session);
        }
        self.resident_bytes = 0;
    }

    fn release_axis(&mut self, axis: usize, session: &mut RenderSession) {
        let pages = std::mem::take(&mut self.slices[axis]);
        for mut page in pages.into_iter().flatten() {
            for texture in page.drain_textures() {
                self.resident_bytes = self
                    .resident_bytes
                    .saturating_sub(texture_byte_size(&texture) as u64);
                session.textures.release(texture, &mut session.registry);
            }
        }
    }

    fn begin_pass(
        &mut self,
        ctx: &mut RenderContext<'_>,
        params: &PassParams<'_, '_>,
    ) -> EngineResult<()> {
        let volume = params.volume;
        let identity = (volume.id, volume.node_id, volume.dimensions);
        if self.volume != Some(identity) {
            if self.volume.is_some() {
                log::debug!(
                    "[PageHandler] Volume {:?} changed, dropping all pages",
                    volume.id
                );
            }
            self.release_all(ctx.session);
            self.volume = Some(identity);
        }

        let caps = ctx.capabilities();
        let limit = prev_power_of_two(caps.max_texture_size.max(1));
        let wanted = ctx.config().page_size;
        let page_size = wanted.map(|s| s.clamp(1, limit));
        self.compare_page_size(page_size, ctx.session);
        self.budget = ctx.config().texture_memory_budget;

        let key = sub_page_key(params);
        if self.current_key != Some(key) {
            let dropped: usize = self
                .slices
                .iter_mut()
                .flatten()
                .flatten()
                .map(|page| page.drop_invisible_except(&key))
                .sum();
            if dropped > 0 {
                log::debug!(
                    "[PageHandler] Dropped {} transparent sub-pages of earlier transfer functions",
                    dropped
                );
            }
            self.current_key = Some(key);
        }

        self.tick += 1;
        ctx.backend.set_composition(params.composition);
        Ok(())
    }

    fn end_pass(&mut self, ctx: &mut RenderContext<'_>, params: &PassParams<'_, '_>) {
        for page in self.slices.iter_mut().flatten().flatten() {
            page.clear_needed();
        }
        if params.paletted {
            let strategy = ctx.palette_strategy();
            deactivate_clut(strategy, ctx.backend);
        }
    }

    fn draw_slice(
        &mut self,
        ctx: &mut RenderContext<'_>,
        params: &PassParams<'_, '_>,
        axis: usize,
        index: u32,
        stats: &mut PassStats,
    ) -> EngineResult<()> {
        let dims = params.volume.dimensions;
        let (c, r) = page_axes(axis)?;
        let style = SliceStyle::from_config(ctx.config());
        let strategy = ctx.palette_strategy();
        let key = sub_page_key(params);
        let kind = key.kind;

        if self.slices[axis].len() != dims[axis] as usize {
            self.slices[axis] = (0..dims[axis]).map(|_| None).collect();
        }
        let slot_ref = &mut self.slices[axis][index as usize];
        if slot_ref.is_none() {
            *slot_ref = Some(TexPage::new(
                axis,
                index,
                dims,
                [self.page_size[c], self.page_size[r]],
            )?);
        }
        let Some(page) = slot_ref.as_mut() else {
            return Ok(());
        };

        let mut built_any = false;
        for row in 0..page.num_rows {
            for col in 0..page.num_cols {
                let slot = page.slot_index(col, row);
                let texture = match page.touch(slot, &key, self.tick) {
                    Some(item) => item.texture.clone(),
                    None => {
                        let request = TextureRequest {
                            volume: params.volume,
                            transfer_function: params.transfer_function,
                            clut: params.clut,
                            cut: CutParameters::Page {
                                axis: axis as u8,
                                slice: index,
                                rect: page.page_rect(col, row, dims),
                            },
                            kind,
                            flipped_y: false,
                        };
                        let texture = ctx.session.textures.create(&request)?;
                        if let Some(t) = &texture {
                            self.resident_bytes += texture_byte_size(t) as u64;
                            built_any = true;
                        }
                        stats.textures_built += 1;
                        page.insert(
                            slot,
                            SubPageItem {
                                key,
                                texture: texture.clone(),
                                last_tick: self.tick,
                                needed: true,
                            },
                        );
                        texture
                    }
                };

                let Some(texture) = texture else { continue };
                if style.draw == DrawStyle::Filled {
                    activate_texture(
                        &texture,
                        Some(params.clut),
                        ctx.context_id,
                        strategy,
                        &mut ctx.session.registry,
                        ctx.backend,
                    )?;
                }
                let quad = page.quad(col, row, params.volume, &texture);
                ctx.backend.draw_triangle_fan(&quad, style.draw);
                stats.fans_drawn += 1;
                if style.outlines {
                    ctx.backend.draw_lines(&page.outline(col, row, params.volume));
                }
            }
        }

        if built_any && self.resident_bytes > self.budget {
            self.enforce_budget(ctx.session);
        }
        Ok(())
    }

    /// Evict least recently used sub-pages until resident memory fits
    fn enforce_budget(&mut self, session: &mut RenderSession) {
        while self.resident_bytes > self.budget {
            let candidates = self.slices.iter().enumerate().flat_map(|(axis, pages)| {
                pages.iter().enumerate().filter_map(move |(slice, page)| {
                    let candidate = page.as_ref()?.lru_sub_page()?;
                    Some(LruCandidate {
                        key: (axis, slice, candidate.key),
                        last_tick: candidate.last_tick,
                        needed: candidate.needed,
                    })
                })
            });
            let Some((axis, slice, victim)) = select_lru_victim(candidates) else {
                log::warn!(
                    "[PageHandler] Working set of {} bytes exceeds the {} byte budget",
                    self.resident_bytes,
                    self.budget
                );
                return;
            };
            let released = self.slices[axis]
                .get_mut(slice)
                .and_then(|p| p.as_mut())
                .and_then(|page| page.release_sub_page(&victim));
            drop(victim);
            match released {
                Some(texture) => self.evict(texture, session),
                None => return,
            }
        }
    }

    fn evict(&mut self, texture: Arc<TextureObject>, session: &mut RenderSession) {
        let bytes = texture_byte_size(&texture) as u64;
        self.resident_bytes = self.resident_bytes.saturating_sub(bytes);
        log::debug!("[PageHandler] Evicted {} byte sub-page", bytes);
        session.textures.release(texture, &mut session.registry);
    }
}

fn prev_power_of_two(v: u32) -> u32 {
    if v.is_power_of_two() {
        v
    } else {
        v.next_power_of_two() >> 1
    }
}
