//! Typed keys into the per-thread context tables.

use super::accessor::{locate, StoreKind};
use super::table::KeyId;
use crate::errors::ContextError;
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Golden-ratio increment spreading sequential ids across a power-of-two table.
const HASH_INCREMENT: u32 = 0x61c8_8647;

static NEXT_KEY_ID: AtomicU64 = AtomicU64::new(0);

fn next_key_id() -> KeyId {
    let id = NEXT_KEY_ID.fetch_add(1, Ordering::Relaxed);
    // Truncation is intended: only the low bits feed the probe hash.
    #[allow(clippy::cast_possible_truncation)]
    let hash = (id as u32).wrapping_mul(HASH_INCREMENT);
    KeyId::new(id, hash)
}

/// A typed slot in one of the calling thread's context tables.
///
/// Each `ContextLocal` is a distinct key: two instances never observe each
/// other's values, even for the same `T`.
pub struct ContextLocal<T> {
    key: KeyId,
    kind: StoreKind,
    _marker: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for ContextLocal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextLocal")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .finish()
    }
}

impl<T: Any + Send + Sync> ContextLocal<T> {
    /// Creates a new key in the table of the given kind.
    #[must_use]
    pub fn new(kind: StoreKind) -> Self {
        Self {
            key: next_key_id(),
            kind,
            _marker: PhantomData,
        }
    }

    /// Creates a key in the plain table.
    #[must_use]
    pub fn plain() -> Self {
        Self::new(StoreKind::Plain)
    }

    /// Creates a key in the inheritable table.
    #[must_use]
    pub fn inheritable() -> Self {
        Self::new(StoreKind::Inheritable)
    }

    /// Returns the key identity.
    #[must_use]
    pub fn key(&self) -> KeyId {
        self.key
    }

    /// Returns the table kind this key lives in.
    #[must_use]
    pub fn kind(&self) -> StoreKind {
        self.kind
    }

    /// Reads the calling thread's value. Never allocates a table.
    pub fn get(&self) -> Result<Option<Arc<T>>, ContextError> {
        locate(self.kind)?.with_table(|table| {
            table
                .and_then(|t| t.get(self.key))
                .and_then(|value| Arc::clone(value).downcast::<T>().ok())
        })
    }

    /// Stores a value for the calling thread, allocating the table if needed.
    pub fn set(&self, value: T) -> Result<(), ContextError> {
        self.set_arc(Arc::new(value))
    }

    /// Stores an already shared value for the calling thread.
    pub fn set_arc(&self, value: Arc<T>) -> Result<(), ContextError> {
        locate(self.kind)?.with_table_mut(|table| {
            table.get_or_insert_with(Default::default).insert(self.key, value);
        })
    }

    /// Removes the calling thread's value, returning it.
    pub fn remove(&self) -> Result<Option<Arc<T>>, ContextError> {
        locate(self.kind)?.with_table_mut(|table| {
            table
                .as_mut()
                .and_then(|t| t.remove(self.key))
                .and_then(|value| value.downcast::<T>().ok())
        })
    }
}
