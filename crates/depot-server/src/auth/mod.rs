//! Session authentication
//!
//! Bearer tokens are HS256 JWTs whose validation is dual-gated: the
//! signature and expiry prove the token was minted here, and a session-row
//! lookup proves it has not been revoked. Logout and administrative
//! revocation therefore take effect on the very next request.

pub mod identity;
pub mod middleware;
pub mod tokens;

pub use identity::{HostIdentity, IdentityProvider, StoreIdentity};
pub use middleware::CurrentUser;
pub use tokens::TokenSigner;

use crate::config::AuthConfig;
use crate::models::User;

/// Effective administrator status: the stored flag, or membership in any of
/// the configured admin groups.
pub fn is_effective_admin(user: &User, auth: &AuthConfig) -> bool {
    user.is_admin || user.groups.0.iter().any(|g| auth.admin_groups.contains(g))
}
