//! The ambient identity of the calling thread.
//!
//! The identity lives in the inheritable context table, so it travels with
//! [`Propagation::Inherit`](crate::context::Propagation::Inherit) spawns and
//! with inheritable snapshots. Downstream authorization code reads it with
//! [`current`].

use crate::context::{capture, restore, ContextLocal, StoreKind};
use crate::errors::ContextError;
use crate::utils::generate_uuid;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Credentials attached to an [`Authentication`]. Never printed.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials(String);

impl Credentials {
    /// Wraps a secret.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Returns the secret.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns true if no secret is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "Credentials(<empty>)")
        } else {
            write!(f, "Credentials(<redacted>)")
        }
    }
}

/// A principal and its credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authentication {
    /// The principal name.
    pub principal: String,
    /// The credentials. Not serialized.
    #[serde(skip)]
    pub credentials: Credentials,
    /// True for a throwaway identity that must never be trusted.
    #[serde(default)]
    pub forged: bool,
}

impl Authentication {
    /// Creates an authentication for a real principal.
    #[must_use]
    pub fn new(principal: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            principal: principal.into(),
            credentials,
            forged: false,
        }
    }

    /// Creates a non-privileged identity with a random principal and no
    /// credentials. Every call yields a different principal.
    #[must_use]
    pub fn forged() -> Self {
        Self {
            principal: generate_uuid().to_string(),
            credentials: Credentials::default(),
            forged: true,
        }
    }
}

fn identity_local() -> &'static ContextLocal<Authentication> {
    static IDENTITY: OnceLock<ContextLocal<Authentication>> = OnceLock::new();
    IDENTITY.get_or_init(ContextLocal::inheritable)
}

/// Returns the calling thread's identity, if any.
pub fn current() -> Result<Option<Arc<Authentication>>, ContextError> {
    identity_local().get()
}

/// Sets the calling thread's identity.
pub fn set_current(auth: Authentication) -> Result<(), ContextError> {
    identity_local().set(auth)
}

/// Removes the calling thread's identity.
pub fn clear_current() -> Result<Option<Arc<Authentication>>, ContextError> {
    identity_local().remove()
}

/// Replaces the calling thread's identity with a freshly forged one and
/// returns it.
///
/// Anything that later consults the ambient identity on this thread, or on
/// threads it spawns with inheritance, is challenged instead of trusting an
/// identity that was never meant for it.
pub fn poison() -> Result<Arc<Authentication>, ContextError> {
    let forged = Arc::new(Authentication::forged());
    identity_local().set_arc(Arc::clone(&forged))?;
    tracing::debug!(principal = %forged.principal, "Installed forged identity");
    Ok(forged)
}

/// Runs `f` with `auth` as the calling thread's identity.
///
/// The whole inheritable table is restored afterwards, including when `f`
/// panics.
pub fn with_identity<R>(auth: Authentication, f: impl FnOnce() -> R) -> Result<R, ContextError> {
    struct Restore(Option<Option<crate::context::ContextSnapshot>>);

    impl Drop for Restore {
        fn drop(&mut self) {
            if let Some(saved) = self.0.take() {
                if let Err(e) = restore(StoreKind::Inheritable, saved) {
                    tracing::error!(error = %e, "Failed to restore identity context");
                }
            }
        }
    }

    let mut guard = Restore(Some(capture(StoreKind::Inheritable)?));
    set_current(auth)?;
    let output = f();
    if let Some(saved) = guard.0.take() {
        restore(StoreKind::Inheritable, saved)?;
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::spawn::{spawn_inheriting, spawn_isolated};
    use std::thread;

    fn alice() -> Authentication {
        Authentication::new("alice", Credentials::new("s3cret"))
    }

    #[test]
    fn test_forged_identities_are_unique_and_empty() {
        let a = Authentication::forged();
        let b = Authentication::forged();
        assert_ne!(a.principal, b.principal);
        assert!(a.credentials.is_empty());
        assert!(a.forged);
        assert!(uuid::Uuid::parse_str(&a.principal).is_ok());
    }

    #[test]
    fn test_credentials_are_redacted() {
        let debug = format!("{:?}", alice());
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("<redacted>"));

        let json = serde_json::to_string(&alice()).unwrap();
        assert!(!json.contains("s3cret"));
    }

    #[test]
    fn test_set_and_clear() {
        thread::spawn(|| {
            assert!(current().unwrap().is_none());
            set_current(alice()).unwrap();
            assert_eq!(current().unwrap().unwrap().principal, "alice");
            clear_current().unwrap();
            assert!(current().unwrap().is_none());
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_poison_replaces_real_identity() {
        thread::spawn(|| {
            set_current(alice()).unwrap();
            let forged = poison().unwrap();
            let now = current().unwrap().unwrap();
            assert_eq!(now, forged);
            assert_ne!(*now, alice());
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_identity_follows_explicit_propagation_only() {
        thread::spawn(|| {
            set_current(alice()).unwrap();

            let inherited = spawn_inheriting(|| current().unwrap())
                .unwrap()
                .join()
                .unwrap();
            assert_eq!(inherited.unwrap().principal, "alice");

            let isolated = spawn_isolated(|| current().unwrap())
                .unwrap()
                .join()
                .unwrap();
            assert!(isolated.is_none());
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_with_identity_restores_previous() {
        thread::spawn(|| {
            set_current(alice()).unwrap();

            let seen = with_identity(Authentication::new("bob", Credentials::default()), || {
                current().unwrap().unwrap().principal.clone()
            })
            .unwrap();

            assert_eq!(seen, "bob");
            assert_eq!(current().unwrap().unwrap().principal, "alice");
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_with_identity_restores_on_panic() {
        thread::spawn(|| {
            set_current(alice()).unwrap();

            let result = std::panic::catch_unwind(|| {
                with_identity(Authentication::forged(), || -> u8 { panic!("boom") }).unwrap();
            });

            assert!(result.is_err());
            assert_eq!(current().unwrap().unwrap().principal, "alice");
        })
        .join()
        .unwrap();
    }
}
