//! Password rotation for the current user

use depot_common::DepotError;
use serde::Deserialize;

use crate::auth::identity;
use crate::db;
use crate::models::User;
use crate::state::AppState;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangePasswordCommand {
    pub current_password: String,
    pub new_password: String,
}

impl ChangePasswordCommand {
    pub fn validate(&self) -> Result<(), DepotError> {
        if self.new_password.len() < MIN_PASSWORD_LEN {
            return Err(DepotError::Invalid(format!(
                "new password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if self.new_password == self.current_password {
            return Err(DepotError::Invalid(
                "new password must differ from the current one".into(),
            ));
        }
        Ok(())
    }
}

#[tracing::instrument(skip_all, fields(username = %user.username))]
pub async fn handle(
    state: AppState,
    user: &User,
    command: ChangePasswordCommand,
) -> Result<(), DepotError> {
    command.validate()?;

    if !identity::verify_password(&command.current_password, &user.password_hash).await? {
        return Err(DepotError::Unauthenticated("current password is wrong".into()));
    }

    let hash = identity::hash_password(&command.new_password).await?;
    db::users::set_password_hash(&state.db, user.id, &hash, false).await?;

    tracing::info!("password changed");
    Ok(())
}
