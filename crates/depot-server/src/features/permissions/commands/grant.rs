//! Grant a permission

use depot_common::paths::normalize_rule_path;
use depot_common::DepotError;
use serde::Deserialize;

use crate::db::{self, permissions::NewPermission};
use crate::models::{PermType, Permission};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrantCommand {
    pub path: String,
    #[serde(rename = "type")]
    pub perm_type: PermType,
    #[serde(default)]
    pub username: String,
    #[serde(default, rename = "group")]
    pub group_name: String,
}

impl GrantCommand {
    pub fn validate(&self) -> Result<(), DepotError> {
        let has_user = !self.username.trim().is_empty();
        let has_group = !self.group_name.trim().is_empty();
        if has_user == has_group {
            return Err(DepotError::Invalid(
                "exactly one of username or group must be set".into(),
            ));
        }
        Ok(())
    }
}

#[tracing::instrument(skip(state, command), fields(path = %command.path))]
pub async fn handle(state: &AppState, command: GrantCommand) -> Result<Permission, DepotError> {
    command.validate()?;

    let path = normalize_rule_path(&command.path).map_err(|_| DepotError::Traversal)?;

    let permission = db::permissions::grant(
        &state.db,
        NewPermission {
            path,
            perm_type: command.perm_type,
            username: command.username.trim().to_string(),
            group_name: command.group_name.trim().to_string(),
        },
    )
    .await?;

    tracing::info!(
        permission = %permission.id,
        perm_type = %permission.perm_type,
        "permission granted"
    );
    Ok(permission)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_one_subject() {
        let both = GrantCommand {
            path: "/x".into(),
            perm_type: PermType::Read,
            username: "alice".into(),
            group_name: "staff".into(),
        };
        assert!(both.validate().is_err());

        let neither = GrantCommand {
            path: "/x".into(),
            perm_type: PermType::Read,
            username: String::new(),
            group_name: String::new(),
        };
        assert!(neither.validate().is_err());

        let user_only = GrantCommand {
            path: "/x".into(),
            perm_type: PermType::Read,
            username: "alice".into(),
            group_name: String::new(),
        };
        assert!(user_only.validate().is_ok());
    }
}
