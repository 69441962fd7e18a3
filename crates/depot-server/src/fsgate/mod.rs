//! Filesystem gateway
//!
//! The only module that touches the disk on behalf of requests. Every path
//! handed in here has already passed `depot_common::paths::resolve` against
//! a caller-supplied root; the gateway performs the I/O, decorates entries
//! with cached owner/group names, and keeps bulk operations per-path
//! (one bad entry never fails the batch).

use chrono::{DateTime, Utc};
use depot_common::DepotError;
use serde::Serialize;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

pub mod ownership;

use ownership::OwnerCache;

/// One directory entry / stat result.
#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub name: String,
    /// Path relative to the listing root, as the client addresses it.
    pub path: String,
    pub size: i64,
    pub is_dir: bool,
    pub mod_time: DateTime<Utc>,
    /// Octal permission bits, e.g. "0644".
    pub mode: String,
    pub owner: String,
    pub group: String,
}

/// Create-exclusive vs truncate for `open_write`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    CreateNew,
    Truncate,
}

/// Per-path outcome of a bulk operation.
#[derive(Debug, Clone, Serialize)]
pub struct BulkResult {
    pub path: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// False when a cross-filesystem move degraded to copy+delete.
    pub atomic: bool,
}

#[derive(Clone, Default)]
pub struct FsGateway {
    owners: Arc<OwnerCache>,
}

impl FsGateway {
    pub fn new() -> Self {
        Self {
            owners: Arc::new(OwnerCache::new()),
        }
    }

    fn entry_from_metadata(
        &self,
        name: String,
        rel_path: String,
        meta: &std::fs::Metadata,
    ) -> FileEntry {
        let mod_time = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        FileEntry {
            name,
            path: rel_path,
            size: meta.len() as i64,
            is_dir: meta.is_dir(),
            mod_time,
            mode: format!("{:04o}", meta.mode() & 0o7777),
            owner: self.owners.user_name(meta.uid()),
            group: self.owners.group_name(meta.gid()),
        }
    }

    /// List a directory. `rel_prefix` is the client-visible path of `dir`
    /// ("" for the root) and prefixes each entry's `path`.
    pub async fn list(&self, dir: &Path, rel_prefix: &str) -> Result<Vec<FileEntry>, DepotError> {
        let mut read_dir = tokio::fs::read_dir(dir).await?;
        let mut entries = Vec::new();

        while let Some(dirent) = read_dir.next_entry().await? {
            let name = dirent.file_name().to_string_lossy().into_owned();
            // Entries that vanish mid-listing are skipped, not fatal.
            let meta = match dirent.metadata().await {
                Ok(meta) => meta,
                Err(_) => continue,
            };
            let rel_path = if rel_prefix.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", rel_prefix.trim_end_matches('/'), name)
            };
            entries.push(self.entry_from_metadata(name, rel_path, &meta));
        }

        entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));
        Ok(entries)
    }

    pub async fn stat(&self, path: &Path, rel_path: &str) -> Result<FileEntry, DepotError> {
        let meta = tokio::fs::metadata(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "/".to_string());
        Ok(self.entry_from_metadata(name, rel_path.to_string(), &meta))
    }

    /// Open a file for reading. Returns the handle and its current length.
    pub async fn open_read(&self, path: &Path) -> Result<(tokio::fs::File, u64), DepotError> {
        let file = tokio::fs::File::open(path).await?;
        let meta = file.metadata().await?;
        if meta.is_dir() {
            return Err(DepotError::Invalid("is a directory".into()));
        }
        Ok((file, meta.len()))
    }

    pub async fn open_write(
        &self,
        path: &Path,
        mode: WriteMode,
    ) -> Result<tokio::fs::File, DepotError> {
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true);
        match mode {
            WriteMode::CreateNew => options.create_new(true),
            WriteMode::Truncate => options.create(true).truncate(true),
        };
        Ok(options.open(path).await?)
    }

    /// Write a whole body and flush it to the file.
    pub async fn write_all(
        &self,
        path: &Path,
        mode: WriteMode,
        bytes: &[u8],
    ) -> Result<(), DepotError> {
        let mut file = self.open_write(path, mode).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        Ok(())
    }

    pub async fn mkdir(&self, path: &Path, recursive: bool) -> Result<(), DepotError> {
        if recursive {
            tokio::fs::create_dir_all(path).await?;
        } else {
            tokio::fs::create_dir(path).await?;
        }
        Ok(())
    }

    pub async fn remove(&self, path: &Path, recursive: bool) -> Result<(), DepotError> {
        let meta = tokio::fs::symlink_metadata(path).await?;
        if meta.is_dir() {
            if recursive {
                tokio::fs::remove_dir_all(path).await?;
            } else {
                tokio::fs::remove_dir(path).await?;
            }
        } else {
            tokio::fs::remove_file(path).await?;
        }
        Ok(())
    }

    /// Rename; falls back to copy+delete across filesystems. Returns true
    /// when the move was a single atomic rename.
    pub async fn rename(&self, src: &Path, dst: &Path) -> Result<bool, DepotError> {
        match tokio::fs::rename(src, dst).await {
            Ok(()) => Ok(true),
            Err(e) if is_cross_device(&e) => {
                copy_recursive(src, dst).await?;
                self.remove(src, true).await?;
                Ok(false)
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Delete many entries; failures are reported per path.
    pub async fn bulk_delete(&self, targets: Vec<(String, PathBuf)>) -> Vec<BulkResult> {
        let mut results = Vec::with_capacity(targets.len());
        for (client_path, abs_path) in targets {
            let outcome = self.remove(&abs_path, true).await;
            results.push(BulkResult {
                path: client_path,
                ok: outcome.is_ok(),
                error: outcome.err().map(|e| e.to_string()),
                atomic: true,
            });
        }
        results
    }

    /// Move many entries into `dst_dir`; failures reported per path.
    pub async fn bulk_move(
        &self,
        targets: Vec<(String, PathBuf)>,
        dst_dir: &Path,
    ) -> Vec<BulkResult> {
        let mut results = Vec::with_capacity(targets.len());
        for (client_path, abs_path) in targets {
            let result = match abs_path.file_name() {
                None => BulkResult {
                    path: client_path,
                    ok: false,
                    error: Some("path has no file name".into()),
                    atomic: true,
                },
                Some(file_name) => {
                    let dst = dst_dir.join(file_name);
                    match self.rename(&abs_path, &dst).await {
                        Ok(atomic) => BulkResult {
                            path: client_path,
                            ok: true,
                            error: None,
                            atomic,
                        },
                        Err(e) => BulkResult {
                            path: client_path,
                            ok: false,
                            error: Some(e.to_string()),
                            atomic: true,
                        },
                    }
                },
            };
            results.push(result);
        }
        results
    }

    /// Recursive apparent size of a directory tree, for quota reporting.
    pub async fn tree_size(&self, path: &Path) -> Result<u64, DepotError> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || tree_size_sync(&path))
            .await
            .map_err(|e| DepotError::Storage(format!("size task failed: {e}")))?
    }
}

fn is_cross_device(err: &std::io::Error) -> bool {
    err.raw_os_error() == Some(nix::libc::EXDEV)
}

fn tree_size_sync(path: &Path) -> Result<u64, DepotError> {
    let meta = std::fs::symlink_metadata(path)?;
    if !meta.is_dir() {
        return Ok(meta.len());
    }

    let mut total = 0u64;
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        if meta.is_dir() {
            total += tree_size_sync(&entry.path())?;
        } else {
            total += meta.len();
        }
    }
    Ok(total)
}

/// Copy a file or directory tree. Used only for the cross-device rename
/// fallback, so fsync cost is acceptable.
fn copy_recursive<'a>(
    src: &'a Path,
    dst: &'a Path,
) -> futures::future::BoxFuture<'a, Result<(), DepotError>> {
    Box::pin(async move {
        let meta = tokio::fs::symlink_metadata(src).await?;
        if meta.is_dir() {
            tokio::fs::create_dir_all(dst).await?;
            let mut read_dir = tokio::fs::read_dir(src).await?;
            while let Some(entry) = read_dir.next_entry().await? {
                let name = entry.file_name();
                copy_recursive(&entry.path(), &dst.join(name)).await?;
            }
        } else {
            tokio::fs::copy(src, dst).await?;
            let file = tokio::fs::File::open(dst).await?;
            file.sync_all().await?;
        }
        Ok(())
    })
}
