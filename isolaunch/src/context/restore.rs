//! Putting captured context back onto the calling thread.

use super::accessor::{locate, StoreKind};
use super::snapshot::{capture_all, ContextSnapshot, SavedContext};
use super::table::ThreadContextTable;
use crate::errors::ContextError;

/// Replaces the calling thread's table of the given kind.
///
/// `None` drops the table entirely. `Some` allocates a table if the thread
/// has none, then overwrites its backing array with the snapshot's and
/// recounts the live entries.
pub fn restore(kind: StoreKind, snapshot: Option<ContextSnapshot>) -> Result<(), ContextError> {
    let handle = locate(kind)?;
    match snapshot {
        None => handle.clear(),
        Some(snapshot) => {
            handle.touch()?;
            handle.with_table_mut(|table| {
                table
                    .get_or_insert_with(ThreadContextTable::new)
                    .replace_slots(snapshot.into_slots());
            })
        }
    }
}

/// Restores both tables from a [`SavedContext`].
pub fn restore_all(saved: SavedContext) -> Result<(), ContextError> {
    restore(StoreKind::Plain, saved.plain)?;
    restore(StoreKind::Inheritable, saved.inheritable)
}

/// Saves the calling thread's context and restores it when the scope ends.
///
/// Work run inside the scope may add, remove or clear entries freely; on
/// [`ContextScope::exit`] or drop the thread is back to exactly what it had
/// on entry. A scope must be dropped on the thread that entered it.
#[derive(Debug)]
#[must_use = "the context is restored when the scope is dropped"]
pub struct ContextScope {
    saved: Option<SavedContext>,
}

impl ContextScope {
    /// Captures both tables of the calling thread.
    pub fn enter() -> Result<Self, ContextError> {
        Ok(Self {
            saved: Some(capture_all()?),
        })
    }

    /// Restores the captured context, reporting failure.
    pub fn exit(mut self) -> Result<(), ContextError> {
        match self.saved.take() {
            Some(saved) => restore_all(saved),
            None => Ok(()),
        }
    }
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            if let Err(e) = restore_all(saved) {
                tracing::error!(error = %e, "Failed to restore thread context on scope exit");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::snapshot::capture;
    use crate::context::table::{Entry, KeyId, Slot};
    use crate::context::ContextLocal;
    use pretty_assertions::assert_eq;
    use rand::{Rng, SeedableRng};
    use std::sync::Arc;
    use std::thread;

    fn on_fresh_thread(f: impl FnOnce() + Send + 'static) {
        thread::spawn(f).join().unwrap();
    }

    fn observed(locals: &[ContextLocal<u64>]) -> Vec<Option<u64>> {
        locals.iter().map(|l| l.get().unwrap().map(|v| *v)).collect()
    }

    #[test]
    fn test_restore_absent_clears_table() {
        on_fresh_thread(|| {
            let local = ContextLocal::<u64>::plain();
            local.set(5).unwrap();

            restore(StoreKind::Plain, None).unwrap();

            let handle = locate(StoreKind::Plain).unwrap();
            assert!(!handle.is_allocated().unwrap());
            assert_eq!(handle.len().unwrap(), 0);
            assert!(local.get().unwrap().is_none());
        });
    }

    #[test]
    fn test_restore_onto_thread_without_table_allocates() {
        let snapshot = thread::spawn(|| {
            ContextLocal::<u64>::inheritable().set(9).unwrap();
            capture(StoreKind::Inheritable).unwrap().unwrap()
        })
        .join()
        .unwrap();

        on_fresh_thread(move || {
            let handle = locate(StoreKind::Inheritable).unwrap();
            assert!(!handle.is_allocated().unwrap());

            restore(StoreKind::Inheritable, Some(snapshot)).unwrap();
            assert!(handle.is_allocated().unwrap());
            assert_eq!(handle.len().unwrap(), 1);
        });
    }

    #[test]
    fn test_restore_undoes_arbitrary_mutation() {
        on_fresh_thread(|| {
            let mut rng = rand::rngs::StdRng::seed_from_u64(7);
            let locals: Vec<ContextLocal<u64>> =
                (0..40).map(|_| ContextLocal::plain()).collect();

            for round in 0..50 {
                for local in &locals {
                    if rng.gen_bool(0.5) {
                        local.set(rng.gen()).unwrap();
                    }
                }
                let before = observed(&locals);
                let before_len = locate(StoreKind::Plain).unwrap().len().unwrap();
                let snapshot = capture(StoreKind::Plain).unwrap();

                for _ in 0..rng.gen_range(0..200) {
                    let local = &locals[rng.gen_range(0..locals.len())];
                    if rng.gen_bool(0.6) {
                        local.set(rng.gen()).unwrap();
                    } else {
                        local.remove().unwrap();
                    }
                }

                restore(StoreKind::Plain, snapshot).unwrap();
                assert_eq!(observed(&locals), before, "round {round}");
                assert_eq!(locate(StoreKind::Plain).unwrap().len().unwrap(), before_len);
            }
        });
    }

    #[test]
    fn test_live_count_matches_slots_after_restore() {
        on_fresh_thread(|| {
            let mut rng = rand::rngs::StdRng::seed_from_u64(42);
            for _ in 0..200 {
                let capacity = 1usize << rng.gen_range(1..8);
                let slots: Vec<Slot> = (0..capacity)
                    .map(|i| match rng.gen_range(0..3) {
                        0 => Slot::Empty,
                        1 => Slot::Vacated,
                        _ => Slot::Occupied(Entry {
                            key: KeyId::new(i as u64, rng.gen()),
                            value: Arc::new(i),
                        }),
                    })
                    .collect();
                let expected = slots.iter().filter(|s| s.is_occupied()).count();

                restore(StoreKind::Inheritable, Some(ContextSnapshot::from_slots(slots))).unwrap();

                let (len, consistent) = locate(StoreKind::Inheritable)
                    .unwrap()
                    .with_table(|t| {
                        let t = t.unwrap();
                        (t.len(), t.is_consistent())
                    })
                    .unwrap();
                assert_eq!(len, expected);
                assert!(consistent);
            }
        });
    }

    #[test]
    fn test_context_scope_restores_on_drop() {
        on_fresh_thread(|| {
            let plain = ContextLocal::<u64>::plain();
            let inheritable = ContextLocal::<u64>::inheritable();
            plain.set(1).unwrap();
            inheritable.set(2).unwrap();

            {
                let _scope = ContextScope::enter().unwrap();
                plain.set(10).unwrap();
                inheritable.remove().unwrap();
                restore(StoreKind::Plain, None).unwrap();
            }

            assert_eq!(*plain.get().unwrap().unwrap(), 1);
            assert_eq!(*inheritable.get().unwrap().unwrap(), 2);
        });
    }

    #[test]
    fn test_context_scope_restores_on_panic() {
        on_fresh_thread(|| {
            let plain = ContextLocal::<u64>::plain();
            plain.set(1).unwrap();

            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                let _scope = ContextScope::enter().unwrap();
                plain.set(99).unwrap();
                panic!("boom");
            }));

            assert!(result.is_err());
            assert_eq!(*plain.get().unwrap().unwrap(), 1);
        });
    }

    #[test]
    fn test_context_scope_exit_restores_absent_tables() {
        on_fresh_thread(|| {
            let scope = ContextScope::enter().unwrap();
            ContextLocal::<u64>::plain().set(3).unwrap();
            scope.exit().unwrap();

            assert!(!locate(StoreKind::Plain).unwrap().is_allocated().unwrap());
        });
    }
}
