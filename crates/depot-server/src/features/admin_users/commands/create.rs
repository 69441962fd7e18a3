//! Create a user (admin)

use depot_common::DepotError;
use serde::Deserialize;

use crate::auth::identity;
use crate::db::{self, users::NewUser};
use crate::models::User;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateUserCommand {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub groups: Vec<String>,
    /// Force a rotation on first login; on for admin-created accounts by
    /// default.
    #[serde(default = "default_must_change")]
    pub must_change_password: bool,
}

fn default_must_change() -> bool {
    true
}

impl CreateUserCommand {
    pub fn validate(&self) -> Result<(), DepotError> {
        if self.username.trim().is_empty() {
            return Err(DepotError::Invalid("username is required".into()));
        }
        if self.username.len() > 64 {
            return Err(DepotError::Invalid("username is too long".into()));
        }
        if self.password.len() < 8 {
            return Err(DepotError::Invalid(
                "password must be at least 8 characters".into(),
            ));
        }
        Ok(())
    }
}

#[tracing::instrument(skip(state, command), fields(username = %command.username))]
pub async fn handle(state: &AppState, command: CreateUserCommand) -> Result<User, DepotError> {
    command.validate()?;

    let hash = identity::hash_password(&command.password).await?;
    let user = db::users::create(
        &state.db,
        NewUser {
            username: command.username.trim().to_string(),
            password_hash: hash,
            email: command.email,
            is_admin: command.is_admin,
            groups: command.groups,
            must_change_password: command.must_change_password,
        },
    )
    .await?;

    tracing::info!(user = %user.id, "user created");
    Ok(user)
}
