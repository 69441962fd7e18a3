//! Identity provider seam
//!
//! The host authenticator (PAM or otherwise) is an external collaborator;
//! the serving plane only needs this trait. The shipped implementation
//! verifies against the metadata store's bcrypt hashes, which also serves
//! deployments that never enable host-account login.

use async_trait::async_trait;
use depot_common::DepotError;
use sqlx::SqlitePool;

use crate::db;

/// What the host knows about an authenticated account.
#[derive(Debug, Clone)]
pub struct HostIdentity {
    pub username: String,
    pub groups: Vec<String>,
}

/// Validates credentials and reports group membership.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn authenticate(&self, username: &str, password: &str)
        -> Result<HostIdentity, DepotError>;
}

/// Metadata-store-backed provider: bcrypt against the stored hash.
pub struct StoreIdentity {
    db: SqlitePool,
}

impl StoreIdentity {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl IdentityProvider for StoreIdentity {
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<HostIdentity, DepotError> {
        // Same failure for unknown user and wrong password.
        let invalid = || DepotError::Unauthenticated("invalid credentials".into());

        let user = db::users::get_by_username(&self.db, username)
            .await
            .map_err(|_| invalid())?;

        if user.password_hash.is_empty() {
            return Err(invalid());
        }

        let password = password.to_string();
        let hash = user.password_hash.clone();
        let ok = tokio::task::spawn_blocking(move || bcrypt::verify(&password, &hash))
            .await
            .map_err(|e| DepotError::Storage(format!("verify task failed: {e}")))?
            .map_err(|e| DepotError::Storage(format!("bcrypt failure: {e}")))?;

        if !ok {
            return Err(invalid());
        }

        Ok(HostIdentity {
            username: user.username,
            groups: user.groups.0,
        })
    }
}

/// Hash a password off the async runtime.
pub async fn hash_password(password: &str) -> Result<String, DepotError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(&password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| DepotError::Storage(format!("hash task failed: {e}")))?
        .map_err(|e| DepotError::Storage(format!("bcrypt failure: {e}")))
}

/// Verify a password off the async runtime.
pub async fn verify_password(password: &str, hash: &str) -> Result<bool, DepotError> {
    let password = password.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || bcrypt::verify(&password, &hash))
        .await
        .map_err(|e| DepotError::Storage(format!("verify task failed: {e}")))?
        .map_err(|e| DepotError::Storage(format!("bcrypt failure: {e}")))
}
