//! Isolated launch of the embedded runtime.
//!
//! The lifecycle is `Unstarted -> Starting -> {Running, Failed}`, with
//! `Running -> Stopped` on shutdown. See [`EmbeddedRuntimeBoot`] for the
//! startup sequence and [`IsolatedLauncher`] for how the caller's identity
//! is kept out of the runtime.

mod boot;
mod isolated;
mod listener;
mod runtime;
mod state;


pub use boot::EmbeddedRuntimeBoot;
pub use isolated::{IsolatedLauncher, LaunchMode};
pub use listener::{SessionContext, SystemListener};
pub use runtime::{LaunchRequest, RuntimeFactory, SubRuntime};
pub use state::{RuntimeState, StateMachine, StateTransition};
