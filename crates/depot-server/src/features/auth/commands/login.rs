//! Login command
//!
//! Delegates credential checking to the identity provider. A host account
//! that authenticates but has no user row yet is provisioned as a non-admin
//! on the spot; group membership reported by the host is persisted so the
//! permission engine and the admin-group rule see it.

use chrono::{DateTime, Utc};
use depot_common::DepotError;
use serde::{Deserialize, Serialize};

use crate::auth::{self, identity};
use crate::db::{self, users::NewUser};
use crate::models::User;
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginCommand {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

impl LoginCommand {
    pub fn validate(&self) -> Result<(), DepotError> {
        if self.username.trim().is_empty() {
            return Err(DepotError::Invalid("username is required".into()));
        }
        if self.password.is_empty() {
            return Err(DepotError::Invalid("password is required".into()));
        }
        Ok(())
    }
}

#[tracing::instrument(skip(state, command), fields(username = %command.username))]
pub async fn handle(state: AppState, command: LoginCommand) -> Result<LoginResponse, DepotError> {
    command.validate()?;

    let host = state
        .identity
        .authenticate(&command.username, &command.password)
        .await?;

    let mut user = match db::users::get_by_username(&state.db, &host.username).await {
        Ok(user) => user,
        // Authenticated at the host but unknown here: provision a plain
        // account carrying the host's group memberships.
        Err(db::DbError::NotFound(_)) => {
            let hash = identity::hash_password(&command.password).await?;
            let user = db::users::create(
                &state.db,
                NewUser {
                    username: host.username.clone(),
                    password_hash: hash,
                    email: String::new(),
                    is_admin: false,
                    groups: host.groups.clone(),
                    must_change_password: false,
                },
            )
            .await?;
            tracing::info!(username = %user.username, "provisioned host account");
            user
        },
        Err(e) => return Err(e.into()),
    };

    user.is_admin = auth::is_effective_admin(&user, &state.config.auth);

    let (token, expires_at) = state.signer.mint(
        user.id,
        &user.username,
        user.is_admin,
        state.config.auth.session_ttl_hours,
    )?;

    db::sessions::insert(&state.db, &token, user.id, expires_at).await?;

    tracing::info!(username = %user.username, is_admin = user.is_admin, "login");

    Ok(LoginResponse {
        token,
        expires_at,
        user,
    })
}
