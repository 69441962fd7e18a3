//! First-run setup
//!
//! Until `setup_complete` is set, the instance has no accounts and the
//! setup endpoint is open; running it creates the first administrator and
//! closes the gate permanently.

use depot_common::DepotError;
use serde::{Deserialize, Serialize};

use crate::auth::identity;
use crate::db::{self, users::NewUser};
use crate::models::User;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetupCommand {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct SetupStatus {
    pub setup_complete: bool,
}

impl SetupCommand {
    pub fn validate(&self) -> Result<(), DepotError> {
        if self.username.trim().is_empty() {
            return Err(DepotError::Invalid("username is required".into()));
        }
        if self.password.len() < 8 {
            return Err(DepotError::Invalid(
                "password must be at least 8 characters".into(),
            ));
        }
        Ok(())
    }
}

pub async fn status(state: &AppState) -> Result<SetupStatus, DepotError> {
    Ok(SetupStatus {
        setup_complete: db::settings::setup_complete(&state.db).await?,
    })
}

#[tracing::instrument(skip(state, command), fields(username = %command.username))]
pub async fn handle(state: AppState, command: SetupCommand) -> Result<User, DepotError> {
    command.validate()?;

    if db::settings::setup_complete(&state.db).await? {
        return Err(DepotError::Conflict("setup is already complete".into()));
    }

    let hash = identity::hash_password(&command.password).await?;
    let admin = db::users::create(
        &state.db,
        NewUser {
            username: command.username,
            password_hash: hash,
            email: command.email,
            is_admin: true,
            groups: Vec::new(),
            must_change_password: false,
        },
    )
    .await?;

    db::settings::mark_setup_complete(&state.db).await?;
    tracing::info!(username = %admin.username, "initial administrator created");

    Ok(admin)
}
