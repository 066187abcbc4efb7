//! Locating the calling thread's context tables.
//!
//! Each thread owns two tables: a plain one and an inheritable one whose
//! contents may be handed to units spawned from the thread (see
//! [`crate::context::spawn`]). Tables are only ever touched by their owning
//! thread.
//!
//! Whether the tables can be reached at all is resolved once per process.
//! A failed resolution is cached, so every later call fails the same way
//! without probing again.

use super::table::ThreadContextTable;
use crate::errors::ContextError;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::sync::OnceLock;
use std::thread::LocalKey;

type TableCell = RefCell<Option<ThreadContextTable>>;

thread_local! {
    static PLAIN_TABLE: TableCell = const { RefCell::new(None) };
    static INHERITABLE_TABLE: TableCell = const { RefCell::new(None) };
}

/// Which of a thread's two tables to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// Private to the owning thread.
    Plain,
    /// May be propagated to units spawned from the owning thread.
    Inheritable,
}

impl StoreKind {
    /// Both kinds, plain first.
    pub const ALL: [Self; 2] = [Self::Plain, Self::Inheritable];
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Inheritable => write!(f, "inheritable"),
        }
    }
}

/// Proof that the thread-local storage was reachable at resolution time.
#[derive(Debug, Clone, Copy)]
struct Capability;

static CAPABILITY: OnceLock<Result<Capability, ContextError>> = OnceLock::new();

fn resolve_capability() -> Result<Capability, ContextError> {
    for kind in StoreKind::ALL {
        cell_for(kind)
            .try_with(|_| ())
            .map_err(|e| ContextError::capability_unavailable(kind, e.to_string()))?;
    }
    tracing::debug!("Context store capability resolved");
    Ok(Capability)
}

fn cell_for(kind: StoreKind) -> &'static LocalKey<TableCell> {
    match kind {
        StoreKind::Plain => &PLAIN_TABLE,
        StoreKind::Inheritable => &INHERITABLE_TABLE,
    }
}

/// Returns a handle to the calling thread's table of the given kind.
///
/// The first call in the process resolves the capability; if that fails,
/// this and every later call return [`ContextError::CapabilityUnavailable`].
pub fn locate(kind: StoreKind) -> Result<StoreHandle, ContextError> {
    let resolved = CAPABILITY.get_or_init(|| {
        let result = resolve_capability();
        if let Err(ref e) = result {
            tracing::error!(error = %e, "Context store disabled for this process");
        }
        result
    });

    match resolved {
        Ok(_) => Ok(StoreHandle {
            kind,
            cell: cell_for(kind),
        }),
        Err(e) => Err(e.clone()),
    }
}

/// Access to one of the calling thread's tables.
///
/// The handle itself is not tied to a thread; each call operates on the
/// table of whichever thread makes it.
#[derive(Clone, Copy)]
pub struct StoreHandle {
    kind: StoreKind,
    cell: &'static LocalKey<TableCell>,
}

impl fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle").field("kind", &self.kind).finish()
    }
}

impl StoreHandle {
    /// Returns the table kind.
    #[must_use]
    pub fn kind(&self) -> StoreKind {
        self.kind
    }

    /// Runs `f` with read access to the table (`None` if never allocated).
    pub fn with_table<R>(
        &self,
        f: impl FnOnce(Option<&ThreadContextTable>) -> R,
    ) -> Result<R, ContextError> {
        self.cell
            .try_with(|cell| {
                cell.try_borrow()
                    .map(|table| f(table.as_ref()))
                    .map_err(|e| ContextError::access_denied(self.kind, e.to_string()))
            })
            .map_err(|e| ContextError::access_denied(self.kind, e.to_string()))?
    }

    /// Runs `f` with write access to the table slot.
    pub fn with_table_mut<R>(
        &self,
        f: impl FnOnce(&mut Option<ThreadContextTable>) -> R,
    ) -> Result<R, ContextError> {
        self.cell
            .try_with(|cell| {
                cell.try_borrow_mut()
                    .map(|mut table| f(&mut *table))
                    .map_err(|e| ContextError::access_denied(self.kind, e.to_string()))
            })
            .map_err(|e| ContextError::access_denied(self.kind, e.to_string()))?
    }

    /// Returns true if the calling thread has allocated this table.
    pub fn is_allocated(&self) -> Result<bool, ContextError> {
        self.with_table(|table| table.is_some())
    }

    /// Allocates the table if the calling thread has none yet.
    pub fn touch(&self) -> Result<(), ContextError> {
        self.with_table_mut(|table| {
            table.get_or_insert_with(ThreadContextTable::new);
        })
    }

    /// Drops the calling thread's table entirely.
    pub fn clear(&self) -> Result<(), ContextError> {
        self.with_table_mut(|table| {
            *table = None;
        })
    }

    /// Number of live entries in the calling thread's table.
    pub fn len(&self) -> Result<usize, ContextError> {
        self.with_table(|table| table.map_or(0, ThreadContextTable::len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_locate_succeeds_on_live_thread() {
        let handle = locate(StoreKind::Plain).unwrap();
        assert_eq!(handle.kind(), StoreKind::Plain);
    }

    #[test]
    fn test_touch_and_clear() {
        thread::spawn(|| {
            let handle = locate(StoreKind::Inheritable).unwrap();
            assert!(!handle.is_allocated().unwrap());

            handle.touch().unwrap();
            assert!(handle.is_allocated().unwrap());
            assert_eq!(handle.len().unwrap(), 0);

            handle.clear().unwrap();
            assert!(!handle.is_allocated().unwrap());
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_reentrant_access_is_denied() {
        thread::spawn(|| {
            let handle = locate(StoreKind::Plain).unwrap();
            let inner = handle
                .with_table_mut(|_| handle.with_table(|_| ()))
                .unwrap();
            let err = inner.unwrap_err();
            assert_eq!(err.code(), "ACCESS_DENIED");
            assert_eq!(err.kind(), StoreKind::Plain);
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_kinds_are_independent() {
        thread::spawn(|| {
            locate(StoreKind::Plain).unwrap().touch().unwrap();
            assert!(!locate(StoreKind::Inheritable)
                .unwrap()
                .is_allocated()
                .unwrap());
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_store_kind_display() {
        assert_eq!(StoreKind::Plain.to_string(), "plain");
        assert_eq!(StoreKind::Inheritable.to_string(), "inheritable");
    }
}
