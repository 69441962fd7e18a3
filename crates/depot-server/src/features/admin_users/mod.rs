//! Admin user management.

pub mod commands;
pub mod routes;

pub use routes::admin_users_routes;
