//! Snapshot policy administration. The scheduler itself lives in
//! `crate::snapshots` and shares its per-policy locks with the manual run
//! endpoint here.

pub mod commands;
pub mod routes;

pub use routes::snapshots_routes;
