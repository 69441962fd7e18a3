//! System administration: settings and the privileged-command streamer.

pub mod commands;
pub mod routes;

pub use routes::system_routes;
