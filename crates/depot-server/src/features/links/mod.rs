//! Share-link management (owner-scoped). The anonymous consumption side
//! lives in the `shares` feature.

pub mod commands;
pub mod routes;

pub use routes::links_routes;
