//! Texture cache
//!
//! Texture objects are shared between requests with the same key. A hit
//! hands out another reference without cutting or transferring anything;
//! the last `release` of an entry removes it and queues its GL textures
//! for deletion in every context it was uploaded to.

use super::texture_object_data::{TextureKind, TextureObject};
use super::texture_object_operations::{
    baked_clut, release_texture_gl, texel_count, texture_byte_size,
};
use crate::clut::{Clut, TransferFunction};
use crate::error::EngineResult;
use crate::resource::{ContextRegistry, HolderId};
use crate::voxel::{
    build_sub_cube, build_sub_page, chunk_from_descriptor, transfer, transfer_with_gradient,
    VolumeDescriptor, VolumeId, VoxelBox2, VoxelBox3,
};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Exactly which part of the volume a texture was cut from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CutParameters {
    Page { axis: u8, slice: u32, rect: VoxelBox2 },
    Cube { cube: VoxelBox3 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureKey {
    pub volume: VolumeId,
    pub volume_node: u64,
    pub cut: CutParameters,
    pub transfer_function: u64,
    /// Only set for kinds with the colors baked in
    pub clut: Option<HolderId>,
    pub kind: TextureKind,
}

pub struct TextureRequest<'r, 'v> {
    pub volume: &'r VolumeDescriptor<'v>,
    pub transfer_function: &'r TransferFunction,
    pub clut: &'r Arc<Clut>,
    pub cut: CutParameters,
    pub kind: TextureKind,
    /// Gradient textures only
    pub flipped_y: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub builds: u64,
    pub hits: u64,
    pub total_texels: u64,
    pub total_bytes: u64,
    pub live_entries: usize,
}

enum CacheSlot {
    Resident(Arc<TextureObject>),
    /// Fully transparent; nothing to draw
    Invisible,
}

#[derive(Default)]
pub struct TextureCache {
    entries: FxHashMap<TextureKey, CacheSlot>,
    stats: CacheStats,
}

pub fn texture_key(request: &TextureRequest<'_, '_>) -> TextureKey {
    TextureKey {
        volume: request.volume.id,
        volume_node: request.volume.node_id,
        cut: request.cut,
        transfer_function: request.transfer_function.node_id(),
        clut: baked_clut(request.kind, request.clut),
        kind: request.kind,
    }
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            live_entries: self.entries.len(),
            ..self.stats
        }
    }

    /// Texture for `request`, or `None` when the cut is fully transparent.
    /// Each returned reference must be handed back through `release`.
    pub fn create(
        &mut self,
        request: &TextureRequest<'_, '_>,
    ) -> EngineResult<Option<Arc<TextureObject>>> {
        let key = texture_key(request);
        if let Some(slot) = self.entries.get(&key) {
            self.stats.hits += 1;
            return Ok(match slot {
                CacheSlot::Resident(texture) => Some(texture.clone()),
                CacheSlot::Invisible => None,
            });
        }

        let chunk = chunk_from_descriptor(request.volume);
        let sub = match request.cut {
            CutParameters::Page { axis, slice, rect } => {
                build_sub_page(&chunk, axis as usize, slice, &rect)?
            }
            CutParameters::Cube { cube } => build_sub_cube(&chunk, &cube)?,
        };

        let (texture, invisible) = if request.kind == TextureKind::Palette3DGradient {
            let texture =
                transfer_with_gradient(&sub, request.transfer_function, request.flipped_y)?;
            (texture, false)
        } else {
            transfer(&sub, request.transfer_function, request.clut, request.kind)?
        };
        self.stats.builds += 1;

        if invisible {
            log::debug!("[TextureCache::create] {:?} is fully transparent", request.cut);
            self.entries.insert(key, CacheSlot::Invisible);
            return Ok(None);
        }

        self.stats.total_texels += texel_count(texture.dimensions) as u64;
        self.stats.total_bytes += texture_byte_size(&texture) as u64;
        let texture = Arc::new(texture);
        self.entries.insert(key, CacheSlot::Resident(texture.clone()));
        Ok(Some(texture))
    }

    /// References held outside the cache
    pub fn ref_count(&self, texture: &Arc<TextureObject>) -> usize {
        Arc::strong_count(texture) - 1
    }

    /// Hand back a reference from `create`. Dropping the last outside
    /// reference destroys the entry.
    pub fn release(&mut self, texture: Arc<TextureObject>, registry: &mut ContextRegistry) {
        let key = self.entries.iter().find_map(|(k, slot)| match slot {
            CacheSlot::Resident(t) if Arc::ptr_eq(t, &texture) => Some(*k),
            _ => None,
        });
        drop_reference(texture, key, self, registry);
    }

    /// Drop every entry of a volume, live references or not
    pub fn purge_volume(&mut self, volume: VolumeId, registry: &mut ContextRegistry) {
        let keys: Vec<TextureKey> = self
            .entries
            .keys()
            .filter(|k| k.volume == volume)
            .copied()
            .collect();
        for key in keys {
            self.remove_entry(&key, registry);
        }
    }

    /// Forget fully transparent results of `volume` that no longer match
    /// its data, `transfer_function` or `clut`. Returns the number dropped.
    pub fn purge_invisible(
        &mut self,
        volume: &VolumeDescriptor<'_>,
        transfer_function: u64,
        clut: HolderId,
    ) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, slot| {
            let stale = key.volume == volume.id
                && (key.volume_node != volume.node_id
                    || key.transfer_function != transfer_function
                    || key.clut.is_some_and(|c| c != clut));
            !(stale && matches!(slot, CacheSlot::Invisible))
        });
        before - self.entries.len()
    }

    pub fn clear(&mut self, registry: &mut ContextRegistry) {
        let keys: Vec<TextureKey> = self.entries.keys().copied().collect();
        for key in keys {
            self.remove_entry(&key, registry);
        }
    }

    fn remove_entry(&mut self, key: &TextureKey, registry: &mut ContextRegistry) {
        if let Some(CacheSlot::Resident(texture)) = self.entries.remove(key) {
            self.stats.total_texels -= texel_count(texture.dimensions) as u64;
            self.stats.total_bytes -= texture_byte_size(&texture) as u64;
            release_texture_gl(&texture, registry);
        }
    }
}

fn drop_reference(
    texture: Arc<TextureObject>,
    key: Option<TextureKey>,
    cache: &mut TextureCache,
    registry: &mut ContextRegistry,
) {
    match key {
        Some(key) => {
            drop(texture);
            let last = matches!(
                cache.entries.get(&key),
                Some(CacheSlot::Resident(t)) if Arc::strong_count(t) == 1
            );
            if last {
                cache.remove_entry(&key, registry);
            }
        }
        None => {
            // Already purged from the cache
            if Arc::strong_count(&texture) == 1 {
                release_texture_gl(&texture, registry);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clut::{make_clut, AlphaUse, PredefinedMap};
    use crate::voxel::{make_test_volume, VolumeData, UnitSize};

    struct Fixture {
        volume: VolumeData,
        tf: TransferFunction,
        clut: Arc<Clut>,
    }

    fn fixture() -> Fixture {
        let volume = make_test_volume().expect("test volume");
        let tf = TransferFunction::predefined(PredefinedMap::Grey);
        let clut = Arc::new(make_clut(&tf, AlphaUse::AsIs).expect("clut"));
        Fixture { volume, tf, clut }
    }

    fn page(slice: u32) -> CutParameters {
        CutParameters::Page {
            axis: 2,
            slice,
            rect: VoxelBox2::new([0, 0], [64, 64]),
        }
    }

    #[test]
    fn test_hit_does_not_rebuild() {
        let f = fixture();
        let mut cache = TextureCache::new();
        let desc = f.volume.descriptor();
        let request = TextureRequest {
            volume: &desc,
            transfer_function: &f.tf,
            clut: &f.clut,
            cut: page(0),
            kind: TextureKind::Rgba2D,
            flipped_y: false,
        };

        let a = cache.create(&request).expect("build").expect("visible");
        let b = cache.create(&request).expect("hit").expect("visible");
        assert!(Arc::ptr_eq(&a, &b));
        let stats = cache.stats();
        assert_eq!(stats.builds, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.live_entries, 1);
        assert_eq!(stats.total_bytes, 64 * 64 * 4);
        assert_eq!(cache.ref_count(&a), 2);
    }

    #[test]
    fn test_different_cut_builds_again() {
        let f = fixture();
        let mut cache = TextureCache::new();
        let desc = f.volume.descriptor();
        let mut request = TextureRequest {
            volume: &desc,
            transfer_function: &f.tf,
            clut: &f.clut,
            cut: page(0),
            kind: TextureKind::Palette2D,
            flipped_y: false,
        };
        let _a = cache.create(&request).expect("build");
        request.cut = page(1);
        let _b = cache.create(&request).expect("build");
        assert_eq!(cache.stats().builds, 2);
    }

    #[test]
    fn test_invisible_cut_is_cached() {
        let f = fixture();
        let mut cache = TextureCache::new();
        let desc = f.volume.descriptor();
        // Slice z = 5 is all zeros, transparent under the grey ramp
        let request = TextureRequest {
            volume: &desc,
            transfer_function: &f.tf,
            clut: &f.clut,
            cut: page(5),
            kind: TextureKind::Rgba2D,
            flipped_y: false,
        };
        assert!(cache.create(&request).expect("build").is_none());
        assert!(cache.create(&request).expect("hit").is_none());
        assert_eq!(cache.stats().builds, 1);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_last_release_destroys_entry() {
        let f = fixture();
        let mut cache = TextureCache::new();
        let mut registry = ContextRegistry::default();
        let desc = f.volume.descriptor();
        let request = TextureRequest {
            volume: &desc,
            transfer_function: &f.tf,
            clut: &f.clut,
            cut: page(0),
            kind: TextureKind::Rgba2D,
            flipped_y: false,
        };
        let a = cache.create(&request).expect("build").expect("visible");
        let b = cache.create(&request).expect("hit").expect("visible");

        cache.release(a, &mut registry);
        assert_eq!(cache.stats().live_entries, 1);
        cache.release(b, &mut registry);
        assert_eq!(cache.stats().live_entries, 0);
        assert_eq!(cache.stats().total_bytes, 0);

        let _c = cache.create(&request).expect("rebuild");
        assert_eq!(cache.stats().builds, 2);
    }

    #[test]
    fn test_new_node_id_misses() {
        let mut f = fixture();
        let mut cache = TextureCache::new();
        {
            let desc = f.volume.descriptor();
            let request = TextureRequest {
                volume: &desc,
                transfer_function: &f.tf,
                clut: &f.clut,
                cut: page(0),
                kind: TextureKind::Palette2D,
                flipped_y: false,
            };
            let _ = cache.create(&request).expect("build");
        }
        f.volume
            .set_data([64, 64, 64], UnitSize::U8, vec![1; 64 * 64 * 64])
            .expect("same size");
        let desc = f.volume.descriptor();
        let request = TextureRequest {
            volume: &desc,
            transfer_function: &f.tf,
            clut: &f.clut,
            cut: page(0),
            kind: TextureKind::Palette2D,
            flipped_y: false,
        };
        let _ = cache.create(&request).expect("build");
        assert_eq!(cache.stats().builds, 2);

        let mut registry = ContextRegistry::default();
        cache.purge_volume(f.volume.id, &mut registry);
        assert_eq!(cache.stats().live_entries, 0);
    }

    #[test]
    fn test_bad_cut_is_error() {
        let f = fixture();
        let mut cache = TextureCache::new();
        let desc = f.volume.descriptor();
        let request = TextureRequest {
            volume: &desc,
            transfer_function: &f.tf,
            clut: &f.clut,
            cut: page(64),
            kind: TextureKind::Rgba2D,
            flipped_y: false,
        };
        assert!(cache.create(&request).is_err());
        assert_eq!(cache.stats().builds, 0);
    }

    #[test]
    fn test_paletted_textures_shared_across_cluts() {
        let f = fixture();
        let mut cache = TextureCache::new();
        let desc = f.volume.descriptor();
        let opaque = Arc::new(make_clut(&f.tf, AlphaUse::Opaque).expect("clut"));
        let mut request = TextureRequest {
            volume: &desc,
            transfer_function: &f.tf,
            clut: &f.clut,
            cut: page(0),
            kind: TextureKind::Palette2D,
            flipped_y: false,
        };
        let a = cache.create(&request).expect("build").expect("visible");
        request.clut = &opaque;
        let b = cache.create(&request).expect("hit").expect("visible");
        assert!(Arc::ptr_eq(&a, &b));

        // RGBA texels depend on the table
        request.kind = TextureKind::Rgba2D;
        let c = cache.create(&request).expect("build").expect("visible");
        request.clut = &f.clut;
        let d = cache.create(&request).expect("build").expect("visible");
        assert!(!Arc::ptr_eq(&c, &d));
        assert_eq!(cache.stats().builds, 3);
    }

    #[test]
    fn test_stale_invisible_results_are_purged() {
        let mut f = fixture();
        let mut cache = TextureCache::new();
        let desc = f.volume.descriptor();
        for slice in 5..10 {
            let request = TextureRequest {
                volume: &desc,
                transfer_function: &f.tf,
                clut: &f.clut,
                cut: page(slice),
                kind: TextureKind::Rgba2D,
                flipped_y: false,
            };
            assert!(cache.create(&request).expect("build").is_none());
        }
        assert_eq!(cache.stats().live_entries, 5);

        // Current transfer function keeps its entries
        assert_eq!(cache.purge_invisible(&desc, f.tf.node_id(), f.clut.holder), 0);

        f.tf.re_map(1, 255).expect("ordered");
        assert_eq!(cache.purge_invisible(&desc, f.tf.node_id(), f.clut.holder), 5);
        assert_eq!(cache.stats().live_entries, 0);
    }
}
