//! Admin management of storage pools and share zones.

pub mod commands;
pub mod routes;

pub use routes::storage_routes;
