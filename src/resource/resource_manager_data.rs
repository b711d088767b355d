//! Resource Manager Data Structures
//!
//! NO METHODS. Just data.

use super::{ContextId, GlTextureName, HolderId};
use crate::clut::PaletteStrategy;
use rustc_hash::{FxHashMap, FxHashSet};

/// Called when the owning context goes away. Receives the manager so the
/// holder can remove its own entry and queue its texture for deletion.
pub type OnDeleteCallback = Box<dyn FnMut(&mut ResourceManagerData, HolderId) + Send>;

pub struct ResourceEntry {
    pub holder: HolderId,
    pub resource: GlTextureName,
    pub on_delete: Option<OnDeleteCallback>,
}

/// One manager per GL context
pub struct ResourceManagerData {
    pub context_id: ContextId,
    pub entries: Vec<ResourceEntry>,
    /// Texture names waiting for the context to become current
    pub dying_textures: Vec<GlTextureName>,
    pub flush_scheduled: bool,
    /// Palette capability, probed once per context
    pub palette_strategy: Option<PaletteStrategy>,
}

/// All live managers, keyed by context id
#[derive(Default)]
pub struct ContextRegistry {
    pub managers: FxHashMap<ContextId, ResourceManagerData>,
    /// Contexts torn down since they were last used
    pub destroyed_contexts: FxHashSet<ContextId>,
}
