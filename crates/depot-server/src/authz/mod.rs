//! Permission engine
//!
//! Decides `(subject, path, action)` for non-admins from the stored grant
//! rows. User-scoped rows are consulted first; only if none applies do
//! group-scoped rows get a say. Within a scope the governing rows are the
//! ones whose path is the longest ancestor of the request path, and the
//! decision is whether that set contains the action's required type.
//! No applicable row means deny.
//!
//! Types are independent: holding `write` at a prefix grants nothing for
//! reads at that prefix.

use depot_common::paths::{is_path_ancestor, normalize_rule_path};
use depot_common::DepotError;
use sqlx::SqlitePool;

use crate::db;
use crate::models::{PermType, Permission, User};

/// Operations the HTTP surface maps onto permission types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    List,
    Download,
    Preview,
    Write,
    Upload,
    Mkdir,
    RenameDestination,
    Delete,
    RenameSource,
}

impl Action {
    pub fn required_type(self) -> PermType {
        match self {
            Action::Read | Action::List | Action::Download | Action::Preview => PermType::Read,
            Action::Write | Action::Upload | Action::Mkdir | Action::RenameDestination => {
                PermType::Write
            },
            Action::Delete | Action::RenameSource => PermType::Delete,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Action::Read => "read",
            Action::List => "list",
            Action::Download => "download",
            Action::Preview => "preview",
            Action::Write => "write",
            Action::Upload => "upload",
            Action::Mkdir => "mkdir",
            Action::RenameDestination => "rename-destination",
            Action::Delete => "delete",
            Action::RenameSource => "rename-source",
        };
        write!(f, "{name}")
    }
}

/// Pure decision over an already-loaded permission set. `path` must be
/// normalised (see `normalize_rule_path`).
pub fn decide(
    username: &str,
    groups: &[String],
    permissions: &[Permission],
    path: &str,
    action: Action,
) -> bool {
    let required = action.required_type();

    for user_scoped in [true, false] {
        let applicable: Vec<&Permission> = permissions
            .iter()
            .filter(|p| p.is_user_scoped() == user_scoped)
            .filter(|p| p.matches_subject(username, groups))
            .filter(|p| is_path_ancestor(&p.path, path))
            .collect();

        if applicable.is_empty() {
            continue;
        }

        // Ancestors of one path form a chain, so the longest governing
        // prefix is a single path value; multiple rows at it (one per type)
        // union.
        let longest = applicable.iter().map(|p| p.path.len()).max().unwrap_or(0);
        return applicable
            .iter()
            .filter(|p| p.path.len() == longest)
            .any(|p| p.perm_type == required);
    }

    false
}

/// Full check for a request: admins pass unconditionally, everyone else goes
/// through the stored rows. `path` is the absolute host path being touched.
pub async fn authorize(
    db: &SqlitePool,
    user: &User,
    path: &str,
    action: Action,
) -> Result<(), DepotError> {
    if user.is_admin {
        return Ok(());
    }

    let normalized = normalize_rule_path(path).map_err(|_| DepotError::Traversal)?;
    let rows = db::permissions::list_for_subject(db, &user.username, &user.groups.0).await?;

    if decide(&user.username, &user.groups.0, &rows, &normalized, action) {
        Ok(())
    } else {
        tracing::debug!(
            user = %user.username,
            path = %normalized,
            action = %action,
            "permission denied"
        );
        Err(DepotError::Forbidden(format!("{action} not permitted")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn perm(path: &str, perm_type: PermType, username: &str, group_name: &str) -> Permission {
        Permission {
            id: Uuid::new_v4(),
            path: path.to_string(),
            perm_type,
            username: username.to_string(),
            group_name: group_name.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn groups(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn default_deny() {
        assert!(!decide("alice", &[], &[], "/srv/pool/team", Action::Read));
    }

    #[test]
    fn group_grant_allows_matching_action() {
        let perms = vec![perm("/srv/pool/team", PermType::Read, "", "staff")];
        let staff = groups(&["staff"]);

        assert!(decide("alice", &staff, &perms, "/srv/pool/team", Action::List));
        assert!(decide("alice", &staff, &perms, "/srv/pool/team/report.pdf", Action::Download));
        // write requires write, which was not granted
        assert!(!decide("alice", &staff, &perms, "/srv/pool/team/file.txt", Action::Upload));
        // bob is not in staff
        assert!(!decide("bob", &[], &perms, "/srv/pool/team/report.pdf", Action::Read));
    }

    #[test]
    fn write_does_not_imply_read() {
        let perms = vec![perm("/data", PermType::Write, "alice", "")];
        assert!(decide("alice", &[], &perms, "/data/doc", Action::Write));
        assert!(!decide("alice", &[], &perms, "/data/doc", Action::Read));
        assert!(!decide("alice", &[], &perms, "/data/doc", Action::Delete));
    }

    #[test]
    fn longest_prefix_wins_within_scope() {
        // read everywhere under /data, but the deeper rule for /data/secret
        // grants only write, so reads there are denied
        let perms = vec![
            perm("/data", PermType::Read, "alice", ""),
            perm("/data/secret", PermType::Write, "alice", ""),
        ];

        assert!(decide("alice", &[], &perms, "/data/public/x", Action::Read));
        assert!(!decide("alice", &[], &perms, "/data/secret/x", Action::Read));
        assert!(decide("alice", &[], &perms, "/data/secret/x", Action::Write));
    }

    #[test]
    fn user_rows_shadow_group_rows() {
        // the group may read the tree, but a user-scoped row anywhere on the
        // path takes the decision away from group rows entirely
        let perms = vec![
            perm("/data", PermType::Read, "", "staff"),
            perm("/data/inbox", PermType::Write, "alice", ""),
        ];
        let staff = groups(&["staff"]);

        assert!(decide("alice", &staff, &perms, "/data/elsewhere", Action::Read));
        assert!(!decide("alice", &staff, &perms, "/data/inbox/f", Action::Read));
        assert!(decide("alice", &staff, &perms, "/data/inbox/f", Action::Write));
    }

    #[test]
    fn equal_prefix_rows_union_types() {
        let perms = vec![
            perm("/data", PermType::Read, "alice", ""),
            perm("/data", PermType::Delete, "alice", ""),
        ];

        assert!(decide("alice", &[], &perms, "/data/f", Action::Read));
        assert!(decide("alice", &[], &perms, "/data/f", Action::Delete));
        assert!(!decide("alice", &[], &perms, "/data/f", Action::Write));
    }

    #[test]
    fn permission_path_applies_to_itself() {
        let perms = vec![perm("/data/file.txt", PermType::Read, "alice", "")];
        assert!(decide("alice", &[], &perms, "/data/file.txt", Action::Read));
    }

    #[test]
    fn root_rule_covers_everything() {
        let perms = vec![perm("/", PermType::Read, "", "everyone")];
        let everyone = groups(&["everyone"]);
        assert!(decide("alice", &everyone, &perms, "/any/path/at/all", Action::Read));
    }

    #[test]
    fn sibling_prefix_does_not_match() {
        let perms = vec![perm("/srv/pool", PermType::Read, "alice", "")];
        assert!(!decide("alice", &[], &perms, "/srv/pool2/f", Action::Read));
    }

    #[test]
    fn rename_maps_to_two_types() {
        let perms = vec![
            perm("/data", PermType::Delete, "alice", ""),
            perm("/data", PermType::Write, "alice", ""),
        ];
        assert!(decide("alice", &[], &perms, "/data/old", Action::RenameSource));
        assert!(decide("alice", &[], &perms, "/data/new", Action::RenameDestination));
    }
}
