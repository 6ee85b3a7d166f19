//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - IDs are serialised as hex strings.
//! - Realtime messages are tagged with their event name.

pub mod event;
pub mod id;
pub mod lunch_crew;

/// Is this required text field effectively missing?
pub(crate) fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
