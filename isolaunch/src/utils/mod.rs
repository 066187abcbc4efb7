//! Small helpers for ids and timestamps.

pub mod timestamps;

pub use timestamps::{format_iso, now_utc, Timestamp};

use uuid::Uuid;

/// Generates a new UUID v4.
#[must_use]
pub fn generate_uuid() -> Uuid {
    Uuid::new_v4()
}
