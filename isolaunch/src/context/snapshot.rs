//! Point-in-time copies of a thread's context tables.

use super::accessor::{locate, StoreKind};
use super::table::{count_occupied, Slot};
use crate::errors::ContextError;

/// An immutable copy of one table's backing array.
///
/// The slot array is copied; the values inside it are shared with the
/// source table, not cloned. A snapshot carries no link back to the thread
/// it was taken on and is consumed by [`crate::context::restore`].
#[derive(Debug, Clone)]
pub struct ContextSnapshot {
    slots: Vec<Slot>,
}

impl ContextSnapshot {
    pub(crate) fn from_slots(slots: Vec<Slot>) -> Self {
        Self { slots }
    }

    pub(crate) fn into_slots(self) -> Vec<Slot> {
        self.slots
    }

    /// Length of the copied backing array.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live entries captured.
    #[must_use]
    pub fn len(&self) -> usize {
        count_occupied(&self.slots)
    }

    /// Returns true if no live entries were captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Both of a thread's tables, captured together.
#[derive(Debug, Clone, Default)]
pub struct SavedContext {
    /// The plain table, if the thread had one.
    pub plain: Option<ContextSnapshot>,
    /// The inheritable table, if the thread had one.
    pub inheritable: Option<ContextSnapshot>,
}

impl SavedContext {
    /// Returns the snapshot for a kind.
    #[must_use]
    pub fn get(&self, kind: StoreKind) -> Option<&ContextSnapshot> {
        match kind {
            StoreKind::Plain => self.plain.as_ref(),
            StoreKind::Inheritable => self.inheritable.as_ref(),
        }
    }
}

/// Copies the calling thread's table of the given kind.
///
/// Returns `Ok(None)` if the thread never allocated that table. The live
/// table is not modified.
pub fn capture(kind: StoreKind) -> Result<Option<ContextSnapshot>, ContextError> {
    locate(kind)?.with_table(|table| {
        table.map(|t| ContextSnapshot::from_slots(t.slots().to_vec()))
    })
}

/// Copies both of the calling thread's tables.
pub fn capture_all() -> Result<SavedContext, ContextError> {
    Ok(SavedContext {
        plain: capture(StoreKind::Plain)?,
        inheritable: capture(StoreKind::Inheritable)?,
    })
}
