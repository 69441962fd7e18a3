//! Application state shared across handlers

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::auth::{IdentityProvider, TokenSigner};
use crate::config::Config;
use crate::fsgate::FsGateway;
use crate::snapshots::SnapshotRunner;
use crate::uploads::UploadEngine;

/// Everything a request handler can reach.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<Config>,
    pub signer: Arc<TokenSigner>,
    pub identity: Arc<dyn IdentityProvider>,
    pub fsgate: FsGateway,
    pub uploads: UploadEngine,
    pub snapshots: Arc<SnapshotRunner>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        config: Arc<Config>,
        identity: Arc<dyn IdentityProvider>,
        snapshots: Arc<SnapshotRunner>,
    ) -> Self {
        let signer = Arc::new(TokenSigner::new(&config.auth.jwt_secret));
        let uploads = UploadEngine::new(db.clone(), config.storage.uploads_dir());
        Self {
            db,
            config,
            signer,
            identity,
            fsgate: FsGateway::new(),
            uploads,
            snapshots,
        }
    }
}
