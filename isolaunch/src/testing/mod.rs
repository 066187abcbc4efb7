//! Testing utilities for embedded runtime boots.
//!
//! This module provides:
//! - A recording runtime factory with scripted launch outcomes
//! - A port probe with a fixed set of busy ports
//! - On-disk runtime distribution fixtures

mod fixtures;
mod mocks;

pub use fixtures::RuntimeFixture;
pub use mocks::{FixedProbe, LaunchBehavior, LaunchObservation, RecordingFactory, RecordingRuntime};
