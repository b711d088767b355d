//! Per-GL-context resource tracking
//!
//! Every GPU texture the renderer creates is registered with the manager of
//! the context it lives in. Deletion is deferred until that context is made
//! current again, and tearing a context down force-releases everything it
//! still holds.

pub mod resource_manager_data;
pub mod resource_manager_operations;

pub use resource_manager_data::{
    ContextRegistry, OnDeleteCallback, ResourceEntry, ResourceManagerData,
};
pub use resource_manager_operations::*;

use std::sync::atomic::{AtomicU64, Ordering};

/// Host-assigned GL context identifier
pub type ContextId = u32;

/// GL texture object name
pub type GlTextureName = u32;

/// Identity of an object owning GPU resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HolderId(pub u64);

static NEXT_HOLDER_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-unique holder identity
pub fn next_holder_id() -> HolderId {
    HolderId(NEXT_HOLDER_ID.fetch_add(1, Ordering::Relaxed))
}

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("Holder {holder} already registered in context {context}")]
    DuplicateHolder { context: u32, holder: u64 },
}
