//! Authentication feature: login, logout, refresh, current user,
//! password rotation, and the first-run setup gate.

pub mod commands;
pub mod routes;

pub use routes::auth_routes;
