//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in an DB-friendly way, e.g.:
//!
//! - IDs are serialised in MongoDB's own format.
//! - Field names follow the persisted camelCase layout.

pub mod lunch_crew;
