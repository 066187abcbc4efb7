//! Context-neutral execution on tokio's blocking pool.
//!
//! Blocking-pool threads are reused across unrelated tasks, so whatever one
//! task leaves in a thread's tables would otherwise be visible to the next.
//! Each task here runs inside a [`ContextScope`] on the pool thread.

use super::restore::{restore, ContextScope};
use super::snapshot::capture;
use super::spawn::Propagation;
use super::StoreKind;
use crate::errors::IsolaunchError;

/// Runs `f` on the blocking pool and leaves the pool thread's context as it
/// found it.
///
/// With [`Propagation::Inherit`] the caller's inheritable table is captured
/// before dispatch and installed on the pool thread for the duration of
/// `f`. With [`Propagation::Isolated`] `f` sees an empty inheritable table.
pub async fn spawn_blocking_with_context<F, R>(
    propagation: Propagation,
    f: F,
) -> Result<R, IsolaunchError>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let inherited = match propagation {
        Propagation::Isolated => None,
        Propagation::Inherit => capture(StoreKind::Inheritable)?,
    };

    let joined = tokio::task::spawn_blocking(move || -> Result<R, IsolaunchError> {
        let scope = ContextScope::enter()?;
        restore(StoreKind::Inheritable, inherited)?;
        let output = f();
        scope.exit()?;
        Ok(output)
    })
    .await;

    match joined {
        Ok(result) => result,
        Err(e) => Err(IsolaunchError::Join(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextLocal;
    use std::sync::Arc;

    fn single_thread_pool() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .max_blocking_threads(1)
            .build()
            .unwrap()
    }

    #[test]
    fn test_pool_thread_state_does_not_leak_between_tasks() {
        let runtime = single_thread_pool();
        let local = Arc::new(ContextLocal::<u32>::plain());

        runtime.block_on(async {
            let l = Arc::clone(&local);
            spawn_blocking_with_context(Propagation::Isolated, move || l.set(5).unwrap())
                .await
                .unwrap();

            let l = Arc::clone(&local);
            let seen = spawn_blocking_with_context(Propagation::Isolated, move || l.get().unwrap())
                .await
                .unwrap();
            assert!(seen.is_none());
        });
    }

    #[test]
    fn test_inherit_carries_caller_context() {
        let runtime = single_thread_pool();
        let local = Arc::new(ContextLocal::<String>::inheritable());

        runtime.block_on(async {
            local.set("caller".to_string()).unwrap();

            let l = Arc::clone(&local);
            let seen = spawn_blocking_with_context(Propagation::Inherit, move || l.get().unwrap())
                .await
                .unwrap();
            assert_eq!(seen.as_deref().map(String::as_str), Some("caller"));

            let l = Arc::clone(&local);
            let isolated = spawn_blocking_with_context(Propagation::Isolated, move || l.get().unwrap())
                .await
                .unwrap();
            assert!(isolated.is_none());

            local.remove().unwrap();
        });
    }

    #[tokio::test]
    async fn test_panicking_task_reports_join_error() {
        let result: Result<(), IsolaunchError> =
            spawn_blocking_with_context(Propagation::Isolated, || panic!("boom")).await;
        assert_eq!(result.unwrap_err().code(), "POOLED_JOIN_FAILED");
    }
}
