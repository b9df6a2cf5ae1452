//! AWS-oriented adapters and handlers for the device-tracking integrations.
//!
//! This crate owns runtime integration details (Lambda handlers, the graph
//! API clients, key-value lookups, and topic publishing) and keeps the
//! domain primitives in `uva_integrations_core`.

pub mod adapters;
pub mod handlers;
