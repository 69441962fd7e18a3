//! Safe path resolution
//!
//! Every filesystem operation in depot goes through [`resolve`]: a
//! user-supplied string is lexically cleaned, anchored below a root
//! directory, and checked against symlink escapes before any I/O uses it.
//!
//! The clean step is purely lexical (no syscalls), so the envelope check
//! cannot be influenced by filesystem state; the symlink check afterwards
//! compares real paths of the existing portion.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Path resolution failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    /// The cleaned path would land outside the root.
    #[error("path escapes its root")]
    Traversal,

    /// Malformed input (NUL bytes, non-directory root, unreadable root).
    #[error("invalid path: {0}")]
    Invalid(String),
}

/// Lexically clean a relative path: drop empty and `.` segments, apply `..`
/// against earlier segments only. Returns `None` when `..` would climb above
/// the start.
pub fn clean_relative(user_path: &str) -> Option<Vec<String>> {
    let mut stack: Vec<String> = Vec::new();

    for segment in user_path.split('/') {
        match segment {
            "" | "." => {},
            ".." => {
                stack.pop()?;
            },
            other => stack.push(other.to_string()),
        }
    }

    Some(stack)
}

/// Resolve `user_path` against `root`.
///
/// `root` must be an absolute directory. `user_path` is any string, with or
/// without a leading `/`; it is always interpreted relative to `root`.
/// The result is lexically inside `root` (equal to it, or below it), and the
/// existing portion of the result is verified not to escape `root` through
/// symlinks.
///
/// The resolved leaf may not exist; creation operations resolve first and
/// create after.
pub fn resolve(root: &Path, user_path: &str) -> Result<PathBuf, PathError> {
    if user_path.contains('\0') {
        return Err(PathError::Invalid("NUL byte in path".into()));
    }
    if !root.is_absolute() {
        return Err(PathError::Invalid(format!(
            "root must be absolute: {}",
            root.display()
        )));
    }

    let segments = clean_relative(user_path).ok_or(PathError::Traversal)?;

    let mut resolved = root.to_path_buf();
    for segment in &segments {
        resolved.push(segment);
    }

    // Envelope check on the lexical result. Redundant with the stack-based
    // clean above but kept as the authoritative gate.
    if resolved != root && !resolved.starts_with(root) {
        return Err(PathError::Traversal);
    }

    verify_real_containment(root, &resolved)?;

    Ok(resolved)
}

/// Normalise a permission path: collapse to a canonical absolute form with
/// no trailing slash (except the root itself).
pub fn normalize_rule_path(path: &str) -> Result<String, PathError> {
    if path.contains('\0') {
        return Err(PathError::Invalid("NUL byte in path".into()));
    }
    if !path.starts_with('/') {
        return Err(PathError::Invalid("permission path must be absolute".into()));
    }

    let segments = clean_relative(path).ok_or(PathError::Traversal)?;
    if segments.is_empty() {
        return Ok("/".to_string());
    }
    Ok(format!("/{}", segments.join("/")))
}

/// True when `candidate` equals `ancestor` or sits below it, segment-wise.
pub fn is_path_ancestor(ancestor: &str, candidate: &str) -> bool {
    if ancestor == "/" {
        return candidate.starts_with('/');
    }
    candidate == ancestor
        || (candidate.starts_with(ancestor)
            && candidate.as_bytes().get(ancestor.len()) == Some(&b'/'))
}

/// Walk the deepest existing ancestor of `resolved` and require its real
/// path to stay under the real path of `root`. Rejects escapes through
/// symlinked intermediate directories.
fn verify_real_containment(root: &Path, resolved: &Path) -> Result<(), PathError> {
    let real_root = root
        .canonicalize()
        .map_err(|e| PathError::Invalid(format!("unresolvable root {}: {e}", root.display())))?;

    let mut probe: &Path = resolved;
    loop {
        match probe.canonicalize() {
            Ok(real) => {
                if real == real_root || real.starts_with(&real_root) {
                    return Ok(());
                }
                return Err(PathError::Traversal);
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                match probe.parent() {
                    Some(parent) => probe = parent,
                    // Ran out of parents without finding the root: the
                    // lexical check already guarantees this cannot happen
                    // for inputs that passed it.
                    None => return Err(PathError::Traversal),
                }
            },
            Err(e) => return Err(PathError::Invalid(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn root() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().canonicalize().unwrap();
        (dir, path)
    }

    #[test]
    fn empty_path_resolves_to_root() {
        let (_guard, root) = root();
        assert_eq!(resolve(&root, "").unwrap(), root);
        assert_eq!(resolve(&root, "/").unwrap(), root);
        assert_eq!(resolve(&root, "./").unwrap(), root);
    }

    #[test]
    fn plain_join() {
        let (_guard, root) = root();
        assert_eq!(resolve(&root, "a/b.txt").unwrap(), root.join("a/b.txt"));
        assert_eq!(resolve(&root, "/a/b.txt").unwrap(), root.join("a/b.txt"));
    }

    #[test]
    fn dot_segments_collapse() {
        let (_guard, root) = root();
        assert_eq!(resolve(&root, "a/./b/../c").unwrap(), root.join("a/c"));
        assert_eq!(resolve(&root, "a//b///c").unwrap(), root.join("a/b/c"));
    }

    #[test]
    fn parent_escape_fails() {
        let (_guard, root) = root();
        assert_eq!(resolve(&root, ".."), Err(PathError::Traversal));
        assert_eq!(resolve(&root, "../etc/passwd"), Err(PathError::Traversal));
        assert_eq!(resolve(&root, "a/../../etc"), Err(PathError::Traversal));
        assert_eq!(resolve(&root, "a/b/../../../x"), Err(PathError::Traversal));
    }

    #[test]
    fn nul_byte_is_invalid() {
        let (_guard, root) = root();
        assert!(matches!(
            resolve(&root, "a\0b"),
            Err(PathError::Invalid(_))
        ));
    }

    #[test]
    fn relative_root_is_invalid() {
        assert!(matches!(
            resolve(Path::new("relative/root"), "a"),
            Err(PathError::Invalid(_))
        ));
    }

    #[test]
    fn non_ascii_segments_round_trip() {
        let (_guard, root) = root();
        let resolved = resolve(&root, "докумénty/рёпорт 𝛼.pdf").unwrap();
        assert_eq!(resolved, root.join("докумénty/рёпорт 𝛼.pdf"));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escape_is_rejected() {
        let outside = TempDir::new().unwrap();
        let (_guard, root) = root();
        std::os::unix::fs::symlink(outside.path(), root.join("link")).unwrap();

        assert_eq!(
            resolve(&root, "link/secret.txt"),
            Err(PathError::Traversal)
        );
    }

    #[cfg(unix)]
    #[test]
    fn internal_symlink_is_allowed() {
        let (_guard, root) = root();
        std::fs::create_dir(root.join("real")).unwrap();
        std::os::unix::fs::symlink(root.join("real"), root.join("alias")).unwrap();

        assert!(resolve(&root, "alias/file.txt").is_ok());
    }

    #[test]
    fn nonexistent_leaf_is_allowed() {
        let (_guard, root) = root();
        assert_eq!(
            resolve(&root, "new-dir/new-file.bin").unwrap(),
            root.join("new-dir/new-file.bin")
        );
    }

    #[test]
    fn normalize_rule_paths() {
        assert_eq!(normalize_rule_path("/").unwrap(), "/");
        assert_eq!(normalize_rule_path("/a/b/").unwrap(), "/a/b");
        assert_eq!(normalize_rule_path("/a//b/./c").unwrap(), "/a/b/c");
        assert_eq!(normalize_rule_path("/a/../b").unwrap(), "/b");
        assert!(normalize_rule_path("relative").is_err());
        assert_eq!(normalize_rule_path("/.."), Err(PathError::Traversal));
    }

    #[test]
    fn ancestor_checks() {
        assert!(is_path_ancestor("/", "/anything"));
        assert!(is_path_ancestor("/srv/pool", "/srv/pool"));
        assert!(is_path_ancestor("/srv/pool", "/srv/pool/team/file"));
        assert!(!is_path_ancestor("/srv/pool", "/srv/pool2"));
        assert!(!is_path_ancestor("/srv/pool/team", "/srv/pool"));
    }
}
