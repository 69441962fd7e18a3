//! Resumable chunked-upload surface over the upload engine.

pub mod commands;
pub mod routes;

pub use routes::upload_routes;
