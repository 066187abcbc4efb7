//! Spawning threads with explicit context propagation.
//!
//! Nothing is inherited implicitly: a child starts with empty tables unless
//! the caller asks for [`Propagation::Inherit`], in which case the spawning
//! thread's inheritable table is copied into the child before its closure
//! runs. The plain table never crosses threads.

use super::restore::restore;
use super::snapshot::{capture, ContextSnapshot};
use super::StoreKind;
use crate::errors::IsolaunchError;
use serde::{Deserialize, Serialize};
use std::thread::{self, JoinHandle, Scope, ScopedJoinHandle};

/// What a spawned unit receives from its parent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Propagation {
    /// Start with empty tables.
    #[default]
    Isolated,
    /// Copy the parent's inheritable table.
    Inherit,
}

/// A `std::thread::Builder` that propagates context explicitly.
#[derive(Debug)]
pub struct Builder {
    inner: thread::Builder,
    propagation: Propagation,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    /// Creates a builder with [`Propagation::Isolated`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: thread::Builder::new(),
            propagation: Propagation::Isolated,
        }
    }

    /// Names the thread.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.inner = self.inner.name(name.into());
        self
    }

    /// Sets the stack size.
    #[must_use]
    pub fn stack_size(mut self, size: usize) -> Self {
        self.inner = self.inner.stack_size(size);
        self
    }

    /// Sets the propagation mode.
    #[must_use]
    pub fn propagation(mut self, propagation: Propagation) -> Self {
        self.propagation = propagation;
        self
    }

    /// Spawns the thread.
    ///
    /// With [`Propagation::Inherit`] the parent's inheritable table is
    /// captured here, on the calling thread.
    pub fn spawn<F, T>(self, f: F) -> Result<JoinHandle<T>, IsolaunchError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let inherited = self.inherited()?;
        let handle = self.inner.spawn(move || {
            install(inherited);
            f()
        })?;
        Ok(handle)
    }

    /// Spawns a scoped thread that may borrow from the caller's stack.
    pub fn spawn_scoped<'scope, 'env, F, T>(
        self,
        scope: &'scope Scope<'scope, 'env>,
        f: F,
    ) -> Result<ScopedJoinHandle<'scope, T>, IsolaunchError>
    where
        F: FnOnce() -> T + Send + 'scope,
        T: Send + 'scope,
    {
        let inherited = self.inherited()?;
        let handle = self.inner.spawn_scoped(scope, move || {
            install(inherited);
            f()
        })?;
        Ok(handle)
    }

    fn inherited(&self) -> Result<Option<ContextSnapshot>, IsolaunchError> {
        Ok(match self.propagation {
            Propagation::Isolated => None,
            Propagation::Inherit => capture(StoreKind::Inheritable)?,
        })
    }
}

fn install(inherited: Option<ContextSnapshot>) {
    if let Some(snapshot) = inherited {
        if let Err(e) = restore(StoreKind::Inheritable, Some(snapshot)) {
            tracing::error!(error = %e, "Could not install inherited context");
        }
    }
}

/// Spawns a thread that copies the caller's inheritable table.
pub fn spawn_inheriting<F, T>(f: F) -> Result<JoinHandle<T>, IsolaunchError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    Builder::new().propagation(Propagation::Inherit).spawn(f)
}

/// Spawns a thread with empty tables.
pub fn spawn_isolated<F, T>(f: F) -> Result<JoinHandle<T>, IsolaunchError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    Builder::new().spawn(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{locate, ContextLocal};
    use std::sync::Arc;

    #[test]
    fn test_isolated_child_sees_nothing() {
        thread::spawn(|| {
            let local = Arc::new(ContextLocal::<u32>::inheritable());
            local.set(1).unwrap();

            let child_local = Arc::clone(&local);
            let seen = spawn_isolated(move || child_local.get().unwrap())
                .unwrap()
                .join()
                .unwrap();
            assert!(seen.is_none());
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_inheriting_child_sees_inheritable_only() {
        thread::spawn(|| {
            let inheritable = Arc::new(ContextLocal::<u32>::inheritable());
            let plain = Arc::new(ContextLocal::<u32>::plain());
            inheritable.set(1).unwrap();
            plain.set(2).unwrap();

            let (i, p) = (Arc::clone(&inheritable), Arc::clone(&plain));
            let (seen_inheritable, seen_plain) =
                spawn_inheriting(move || (i.get().unwrap(), p.get().unwrap()))
                    .unwrap()
                    .join()
                    .unwrap();

            assert_eq!(seen_inheritable.as_deref(), Some(&1));
            assert!(seen_plain.is_none());
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_child_changes_do_not_leak_back() {
        thread::spawn(|| {
            let local = Arc::new(ContextLocal::<u32>::inheritable());
            local.set(1).unwrap();

            let child_local = Arc::clone(&local);
            spawn_inheriting(move || child_local.set(2).unwrap())
                .unwrap()
                .join()
                .unwrap();

            assert_eq!(*local.get().unwrap().unwrap(), 1);
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_scoped_spawn_borrows_and_inherits() {
        thread::spawn(|| {
            let local = ContextLocal::<u32>::inheritable();
            local.set(5).unwrap();

            let seen = thread::scope(|scope| {
                Builder::new()
                    .propagation(Propagation::Inherit)
                    .spawn_scoped(scope, || local.get().unwrap())
                    .unwrap()
                    .join()
                    .unwrap()
            });
            assert_eq!(seen.as_deref(), Some(&5));
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_inherit_from_thread_without_table() {
        thread::spawn(|| {
            let allocated = Builder::new()
                .name("child")
                .propagation(Propagation::Inherit)
                .spawn(|| {
                    assert_eq!(thread::current().name(), Some("child"));
                    locate(StoreKind::Inheritable).unwrap().is_allocated().unwrap()
                })
                .unwrap()
                .join()
                .unwrap();
            assert!(!allocated);
        })
        .join()
        .unwrap();
    }
}
