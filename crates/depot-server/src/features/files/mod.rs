//! File operations
//!
//! The command/query handlers here are scope-agnostic: they receive a
//! resolved [`Scope`](crate::features::shared::scope::Scope) and run the
//! permission check against its absolute path. `routes.rs` wires them to
//! the legacy global tree rooted at the data directory; the zones feature
//! reuses the same handlers under zone roots.

pub mod commands;
pub mod queries;
pub mod routes;

pub use routes::{files_routes, folders_routes};
