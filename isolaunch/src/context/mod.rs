//! Per-thread context storage.
//!
//! This module provides:
//! - Plain and inheritable context tables owned by each thread
//! - Snapshots of a table and restoration from them
//! - Scoped save/restore for pooled execution
//! - Thread spawning with explicit context propagation

mod accessor;
mod key;
pub mod pooled;
mod restore;
mod snapshot;
pub mod spawn;
mod table;

pub use accessor::{locate, StoreHandle, StoreKind};
pub use key::ContextLocal;
pub use restore::{restore, restore_all, ContextScope};
pub use snapshot::{capture, capture_all, ContextSnapshot, SavedContext};
pub use spawn::Propagation;
pub use table::{ContextValue, Entry, KeyId, Slot, ThreadContextTable};
