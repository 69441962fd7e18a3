//! Chunked upload engine
//!
//! A session accumulates fixed-size chunks under
//! `<DATA_DIR>/chunked_uploads/<session_id>/chunk.<n>` until every index has
//! arrived, then finalize concatenates them in order and renames the result
//! into the destination. Chunk writes are atomic (tmp + fsync + rename) and
//! idempotent by index, so clients retry freely after a disconnect.
//!
//! State machine: active -> finalizing -> completed, or active -> cancelled.
//! The active->finalizing edge is a conditional UPDATE; concurrent finalize
//! callers race on it and the loser gets `Conflict`. Assembly failures step
//! the session back to active so the client can retry.

use depot_common::DepotError;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::db::{self, upload_sessions::NewUploadSession};
use crate::models::{UploadSession, UploadState};

#[derive(Clone)]
pub struct UploadEngine {
    db: SqlitePool,
    root: PathBuf,
}

/// Progress snapshot returned to clients.
#[derive(Debug, Clone, serde::Serialize)]
pub struct UploadProgress {
    pub received: i64,
    pub total: i64,
    pub bytes: i64,
}

impl UploadEngine {
    pub fn new(db: SqlitePool, root: PathBuf) -> Self {
        Self { db, root }
    }

    /// Create the chunk root. Called once at startup.
    pub async fn init(&self) -> Result<(), DepotError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    fn session_dir(&self, id: Uuid) -> PathBuf {
        self.root.join(id.to_string())
    }

    fn chunk_path(dir: &Path, index: i64) -> PathBuf {
        dir.join(format!("chunk.{index}"))
    }

    pub async fn create_session(
        &self,
        owner_id: Uuid,
        zone_id: Option<Uuid>,
        destination_path: String,
        file_name: String,
        total_size: i64,
        chunk_size: i64,
    ) -> Result<UploadSession, DepotError> {
        if file_name.trim().is_empty() {
            return Err(DepotError::Invalid("file name is required".into()));
        }
        if file_name.contains('/') || file_name.contains('\0') {
            return Err(DepotError::Invalid("file name must be a single path segment".into()));
        }
        if total_size < 0 {
            return Err(DepotError::Invalid("total size must be non-negative".into()));
        }
        if chunk_size <= 0 {
            return Err(DepotError::Invalid("chunk size must be positive".into()));
        }

        let total_chunks = (total_size + chunk_size - 1) / chunk_size;

        let session = db::upload_sessions::create(
            &self.db,
            NewUploadSession {
                owner_id,
                zone_id,
                destination_path,
                file_name,
                total_size,
                chunk_size,
                total_chunks,
            },
        )
        .await?;

        tokio::fs::create_dir_all(self.session_dir(session.id)).await?;

        tracing::info!(
            session = %session.id,
            file = %session.file_name,
            size = session.total_size,
            chunks = session.total_chunks,
            "upload session created"
        );

        Ok(session)
    }

    pub async fn get(&self, id: Uuid) -> Result<UploadSession, DepotError> {
        Ok(db::upload_sessions::get(&self.db, id).await?)
    }

    pub async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<UploadSession>, DepotError> {
        Ok(db::upload_sessions::list_active_for_owner(&self.db, owner_id).await?)
    }

    /// Store one chunk. Re-receiving an index overwrites the previous bytes;
    /// the set update and the atomic file swap make the operation safe to
    /// retry and safe under concurrent receipts of distinct indices.
    pub async fn receive_chunk(
        &self,
        id: Uuid,
        index: i64,
        bytes: &[u8],
    ) -> Result<UploadSession, DepotError> {
        let session = db::upload_sessions::get(&self.db, id).await?;

        if session.state != UploadState::Active {
            return Err(DepotError::Conflict(format!(
                "upload session is {}",
                state_name(session.state)
            )));
        }
        if index < 0 || index >= session.total_chunks {
            return Err(DepotError::Invalid(format!(
                "chunk index {index} out of range 0..{}",
                session.total_chunks
            )));
        }

        let expected = expected_chunk_len(&session, index);
        if bytes.len() as i64 != expected {
            return Err(DepotError::Invalid(format!(
                "chunk {index} must be {expected} bytes, got {}",
                bytes.len()
            )));
        }

        let dir = self.session_dir(id);
        let final_path = Self::chunk_path(&dir, index);
        let tmp_path = dir.join(format!("chunk.{index}.tmp"));

        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp_path, &final_path).await?;

        Ok(db::upload_sessions::record_chunk(&self.db, id, index).await?)
    }

    pub async fn progress(&self, id: Uuid) -> Result<UploadProgress, DepotError> {
        let session = db::upload_sessions::get(&self.db, id).await?;
        Ok(UploadProgress {
            received: session.received_count(),
            total: session.total_chunks,
            bytes: session.bytes_received(),
        })
    }

    /// Assemble and publish into `dest`, an absolute path the caller has
    /// already resolved and permission-checked. On success the temp
    /// directory is gone and the session is `completed`.
    pub async fn finalize(&self, id: Uuid, dest: &Path) -> Result<(), DepotError> {
        if !db::upload_sessions::try_begin_finalize(&self.db, id).await? {
            let session = db::upload_sessions::get(&self.db, id).await?;
            return Err(DepotError::Conflict(format!(
                "upload session is {}",
                state_name(session.state)
            )));
        }

        let session = db::upload_sessions::get(&self.db, id).await?;

        match self.assemble_and_publish(&session, dest).await {
            Ok(()) => {
                db::upload_sessions::set_state(&self.db, id, UploadState::Completed).await?;
                let _ = tokio::fs::remove_dir_all(self.session_dir(id)).await;
                tracing::info!(session = %id, dest = %dest.display(), "upload finalized");
                Ok(())
            },
            Err(e) => {
                // Step back so the client can repair (missing chunk, full
                // disk, bad destination) and retry finalize.
                db::upload_sessions::set_state(&self.db, id, UploadState::Active).await?;
                Err(e)
            },
        }
    }

    async fn assemble_and_publish(
        &self,
        session: &UploadSession,
        dest: &Path,
    ) -> Result<(), DepotError> {
        if !session.is_complete() {
            return Err(DepotError::Invalid(format!(
                "upload incomplete: {}/{} chunks received",
                session.received_count(),
                session.total_chunks
            )));
        }

        let dir = self.session_dir(session.id);
        tokio::fs::create_dir_all(&dir).await?;
        let assembled = dir.join("assembled");

        let mut out = tokio::fs::File::create(&assembled).await?;
        for index in 0..session.total_chunks {
            let mut chunk = tokio::fs::File::open(Self::chunk_path(&dir, index)).await?;
            tokio::io::copy(&mut chunk, &mut out).await?;
        }
        out.sync_all().await?;
        drop(out);

        let written = tokio::fs::metadata(&assembled).await?.len() as i64;
        if written != session.total_size {
            return Err(DepotError::Storage(format!(
                "assembled {written} bytes, expected {}",
                session.total_size
            )));
        }

        match tokio::fs::rename(&assembled, dest).await {
            Ok(()) => Ok(()),
            Err(e) if e.raw_os_error() == Some(nix::libc::EXDEV) => {
                tokio::fs::copy(&assembled, dest).await?;
                let file = tokio::fs::File::open(dest).await?;
                file.sync_all().await?;
                tokio::fs::remove_file(&assembled).await?;
                Ok(())
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Cancel and clean up. Finalizing sessions cannot be cancelled.
    pub async fn cancel(&self, id: Uuid) -> Result<(), DepotError> {
        let session = db::upload_sessions::get(&self.db, id).await?;
        match session.state {
            UploadState::Active | UploadState::Cancelled => {},
            other => {
                return Err(DepotError::Conflict(format!(
                    "upload session is {}",
                    state_name(other)
                )))
            },
        }

        db::upload_sessions::set_state(&self.db, id, UploadState::Cancelled).await?;
        let _ = tokio::fs::remove_dir_all(self.session_dir(id)).await;
        Ok(())
    }

    /// Drop sessions idle past `cutoff` along with their temp directories.
    /// Returns how many were collected.
    pub async fn collect_stale(
        &self,
        cutoff: chrono::DateTime<chrono::Utc>,
    ) -> Result<u64, DepotError> {
        let stale = db::upload_sessions::list_stale(&self.db, cutoff).await?;
        let mut collected = 0u64;

        for session in stale {
            // Finalizing sessions are in the middle of publishing; leave
            // them for the next sweep.
            if session.state == UploadState::Finalizing {
                continue;
            }
            let _ = tokio::fs::remove_dir_all(self.session_dir(session.id)).await;
            db::upload_sessions::delete(&self.db, session.id).await?;
            collected += 1;
        }

        Ok(collected)
    }
}

fn state_name(state: UploadState) -> &'static str {
    match state {
        UploadState::Active => "active",
        UploadState::Finalizing => "finalizing",
        UploadState::Completed => "completed",
        UploadState::Cancelled => "cancelled",
    }
}

/// Every chunk is exactly chunk_size bytes except the last, which carries
/// the remainder.
fn expected_chunk_len(session: &UploadSession, index: i64) -> i64 {
    if index == session.total_chunks - 1 {
        session.total_size - session.chunk_size * index
    } else {
        session.chunk_size
    }
}
