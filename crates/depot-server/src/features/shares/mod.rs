//! Public share surface (`/s/{token}`)
//!
//! Anonymous, token-addressed access. The link row itself is the grant:
//! the permission engine is bypassed, and the path resolver runs with the
//! link's target as the envelope root, so even a hostile subpath cannot
//! leave the shared tree.

pub mod access;
pub mod routes;

pub use routes::shares_routes;
