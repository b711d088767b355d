//! Resource Manager Operations
//!
//! Free functions over `ContextRegistry` and `ResourceManagerData`.

use super::resource_manager_data::{
    ContextRegistry, OnDeleteCallback, ResourceEntry, ResourceManagerData,
};
use super::{ContextId, GlTextureName, HolderId, ResourceError};
use crate::render::backend::GlBackend;

pub fn create_manager_data(context_id: ContextId) -> ResourceManagerData {
    ResourceManagerData {
        context_id,
        entries: Vec::new(),
        dying_textures: Vec::new(),
        flush_scheduled: false,
        palette_strategy: None,
    }
}

/// Manager for `context_id`, created on first use
pub fn manager(registry: &mut ContextRegistry, context_id: ContextId) -> &mut ResourceManagerData {
    registry.destroyed_contexts.remove(&context_id);
    registry.managers.entry(context_id).or_insert_with(|| {
        log::debug!("[ResourceManager] Created manager for context {}", context_id);
        create_manager_data(context_id)
    })
}

/// Manager for `context_id` only if it already exists
pub fn find_manager(
    registry: &mut ContextRegistry,
    context_id: ContextId,
) -> Option<&mut ResourceManagerData> {
    registry.managers.get_mut(&context_id)
}

/// True when the context was destroyed and not used since
pub fn is_context_destroyed(registry: &ContextRegistry, context_id: ContextId) -> bool {
    registry.destroyed_contexts.contains(&context_id)
}

/// Register a resource for `holder`. A holder may own one resource per
/// context; registering it twice is an error.
pub fn set_resource(
    data: &mut ResourceManagerData,
    holder: HolderId,
    resource: GlTextureName,
    on_delete: Option<OnDeleteCallback>,
) -> Result<(), ResourceError> {
    if data.entries.iter().any(|e| e.holder == holder) {
        return Err(ResourceError::DuplicateHolder {
            context: data.context_id,
            holder: holder.0,
        });
    }
    data.entries.push(ResourceEntry {
        holder,
        resource,
        on_delete,
    });
    Ok(())
}

pub fn get_resource(data: &ResourceManagerData, holder: HolderId) -> Option<GlTextureName> {
    data.entries
        .iter()
        .find(|e| e.holder == holder)
        .map(|e| e.resource)
}

/// Drop the entry without running its callback
pub fn remove_resource(data: &mut ResourceManagerData, holder: HolderId) -> Option<GlTextureName> {
    let pos = data.entries.iter().position(|e| e.holder == holder)?;
    Some(data.entries.remove(pos).resource)
}

/// Queue a texture for deletion the next time the context is current
pub fn kill_texture(data: &mut ResourceManagerData, name: GlTextureName) {
    if data.dying_textures.is_empty() {
        data.flush_scheduled = true;
    }
    data.dying_textures.push(name);
}

/// Remove `holder` from `context_id` and queue its texture for deletion.
/// Does nothing if the context has no manager.
pub fn release_holder(registry: &mut ContextRegistry, context_id: ContextId, holder: HolderId) {
    if let Some(data) = find_manager(registry, context_id) {
        if let Some(name) = remove_resource(data, holder) {
            kill_texture(data, name);
        }
    }
}

/// Flush deferred deletions for a context that was just made current.
/// Returns the number of texture names handed to the backend.
pub fn context_made_current(
    registry: &mut ContextRegistry,
    context_id: ContextId,
    backend: &mut dyn GlBackend,
) -> usize {
    let Some(data) = find_manager(registry, context_id) else {
        return 0;
    };
    flush_dying_textures(data, backend)
}

fn flush_dying_textures(data: &mut ResourceManagerData, backend: &mut dyn GlBackend) -> usize {
    data.flush_scheduled = false;
    if data.dying_textures.is_empty() {
        return 0;
    }
    let names = std::mem::take(&mut data.dying_textures);
    backend.delete_textures(&names);
    log::debug!(
        "[ResourceManager] Deleted {} textures in context {}",
        names.len(),
        data.context_id
    );
    names.len()
}

/// Tear down the manager of a destroyed context. Callbacks run from the
/// back of the list; a callback may remove its own entry. Entries left in
/// place, or registered without a callback, have their texture killed.
/// The deferred queue is flushed before the manager is dropped.
pub fn context_destroyed(
    registry: &mut ContextRegistry,
    context_id: ContextId,
    backend: &mut dyn GlBackend,
) {
    let Some(mut data) = registry.managers.remove(&context_id) else {
        registry.destroyed_contexts.insert(context_id);
        return;
    };

    let live = data.entries.len();
    while !data.entries.is_empty() {
        let len_before = data.entries.len();
        let last = &mut data.entries[len_before - 1];
        let holder = last.holder;

        match last.on_delete.take() {
            Some(mut callback) => {
                callback(&mut data, holder);
                if data.entries.len() == len_before {
                    if let Some(name) = remove_resource(&mut data, holder) {
                        if !data.dying_textures.contains(&name) {
                            kill_texture(&mut data, name);
                        }
                    }
                }
            }
            None => {
                if let Some(entry) = data.entries.pop() {
                    kill_texture(&mut data, entry.resource);
                }
            }
        }
    }

    let flushed = flush_dying_textures(&mut data, backend);
    registry.destroyed_contexts.insert(context_id);
    log::info!(
        "[ResourceManager] Context {} destroyed: {} live resources, {} textures deleted",
        context_id,
        live,
        flushed
    );
}
