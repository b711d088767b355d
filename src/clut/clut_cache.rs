//! Shares one CLUT per transfer function and alpha policy

use super::clut_data::{AlphaUse, Clut};
use super::clut_operations::release_clut_gl;
use super::transfer_function::{make_clut, TransferFunction};
use super::ClutError;
use crate::resource::ContextRegistry;
use rustc_hash::FxHashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct ClutCache {
    cluts: FxHashMap<(u64, AlphaUse), Arc<Clut>>,
}

impl ClutCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// CLUT for `tf`, built on first request for its node id
    pub fn get(
        &mut self,
        tf: &TransferFunction,
        alpha_use: AlphaUse,
    ) -> Result<Arc<Clut>, ClutError> {
        let key = (tf.node_id(), alpha_use);
        if let Some(clut) = self.cluts.get(&key) {
            return Ok(clut.clone());
        }
        let clut = Arc::new(make_clut(tf, alpha_use)?);
        log::debug!(
            "[ClutCache::get] Built {}-entry CLUT for transfer function {}",
            clut.nrentries,
            tf.node_id()
        );
        self.cluts.insert(key, clut.clone());
        Ok(clut)
    }

    pub fn len(&self) -> usize {
        self.cluts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cluts.is_empty()
    }

    /// Drop CLUTs nobody else references and release their GPU state.
    /// Returns the number dropped.
    pub fn purge_unused(&mut self, registry: &mut ContextRegistry) -> usize {
        let before = self.cluts.len();
        self.cluts.retain(|_, clut| {
            if Arc::strong_count(clut) == 1 {
                release_clut_gl(clut, registry);
                false
            } else {
                true
            }
        });
        before - self.cluts.len()
    }

    /// Drop everything, releasing GPU state
    pub fn clear(&mut self, registry: &mut ContextRegistry) {
        for clut in self.cluts.values() {
            release_clut_gl(clut, registry);
        }
        self.cluts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clut::PredefinedMap;

    #[test]
    fn test_same_transfer_function_shares_clut() {
        let mut cache = ClutCache::new();
        let tf = TransferFunction::predefined(PredefinedMap::Temperature);
        let a = cache.get(&tf, AlphaUse::AsIs).expect("clut");
        let b = cache.get(&tf, AlphaUse::AsIs).expect("clut");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);

        let c = cache.get(&tf, AlphaUse::Opaque).expect("clut");
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_mutated_transfer_function_gets_new_clut() {
        let mut cache = ClutCache::new();
        let mut tf = TransferFunction::predefined(PredefinedMap::Grey);
        let a = cache.get(&tf, AlphaUse::AsIs).expect("clut");
        tf.re_map(10, 20).expect("ordered");
        let b = cache.get(&tf, AlphaUse::AsIs).expect("clut");
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(b.thresholds, [10, 20]);
    }

    #[test]
    fn test_purge_unused() {
        let mut cache = ClutCache::new();
        let mut registry = ContextRegistry::default();
        let tf = TransferFunction::predefined(PredefinedMap::Glow);
        let held = cache.get(&tf, AlphaUse::AsIs).expect("clut");
        let _ = cache.get(&tf, AlphaUse::Binary).expect("clut");

        assert_eq!(cache.purge_unused(&mut registry), 1);
        assert_eq!(cache.len(), 1);
        drop(held);
        assert_eq!(cache.purge_unused(&mut registry), 1);
        assert!(cache.is_empty());
    }
}
