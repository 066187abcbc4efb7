//! # Isolaunch
//!
//! Per-thread context capture and restore, and isolated launch of an
//! embedded runtime inside a host process.
//!
//! Isolaunch provides:
//!
//! - **Context tables**: plain and inheritable key-value tables owned by each thread
//! - **Capture/restore**: snapshot a thread's tables and put them back after
//!   running unrelated work on a reused thread
//! - **Explicit propagation**: spawned threads receive context only when asked
//! - **Isolated launch**: start a sub-runtime under a forged, disposable identity
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use isolaunch::prelude::*;
//!
//! let scope = ContextScope::enter()?;
//! run_pooled_task();
//! scope.exit()?;
//!
//! let boot = EmbeddedRuntimeBoot::new(BootConfig::from_env(), factory);
//! if !boot.startup(&SessionContext::new("system")) {
//!     // degraded mode
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod context;
pub mod errors;
pub mod identity;
pub mod launch;
pub mod logging;
pub mod ports;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{BootConfig, SystemProperties};
    pub use crate::context::pooled::spawn_blocking_with_context;
    pub use crate::context::spawn::{spawn_inheriting, spawn_isolated, Builder as ThreadBuilder};
    pub use crate::context::{
        capture, capture_all, restore, restore_all, ContextLocal, ContextScope, ContextSnapshot,
        Propagation, SavedContext, StoreKind,
    };
    pub use crate::errors::{
        ConfigError, ContextError, IsolaunchError, LaunchError, PortError,
    };
    pub use crate::identity::{Authentication, Credentials};
    pub use crate::launch::{
        EmbeddedRuntimeBoot, LaunchMode, RuntimeFactory, RuntimeState, SessionContext, SubRuntime,
        SystemListener,
    };
    pub use crate::logging::{init_logging, LoggingConfig};
    pub use crate::ports::{PortMap, PortProbe, TcpProbe};
}
