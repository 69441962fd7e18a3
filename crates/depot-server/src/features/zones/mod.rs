//! Zone-scoped file surface: accessible-zone discovery, per-zone file
//! operations (delegating to the `files` handlers under the zone root),
//! and bulk delete/move.

pub mod commands;
pub mod queries;
pub mod routes;

pub use routes::zones_routes;
