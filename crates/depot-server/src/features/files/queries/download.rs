//! File download query
//!
//! Streams bytes with HTTP range support (single range). The body is a
//! `ReaderStream` over the opened file, so large downloads never buffer in
//! memory; cancellation drops the stream and closes the file.

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use depot_common::DepotError;
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::authz::Action;
use crate::features::shared::scope::{self, Scope};
use crate::fsgate::FsGateway;
use crate::models::User;
use crate::state::AppState;

/// A parsed `bytes=` range, clamped to the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    /// Inclusive.
    pub end: u64,
}

/// Parse a single-range `Range` header against a file of `len` bytes.
/// Returns `Ok(None)` when the header is absent or not a bytes range,
/// `Err(())` when it is syntactically a bytes range but unsatisfiable.
pub fn parse_range(header: Option<&str>, len: u64) -> Result<Option<ByteRange>, ()> {
    let Some(raw) = header else { return Ok(None) };
    let Some(spec) = raw.strip_prefix("bytes=") else {
        return Ok(None);
    };
    // Multi-range requests are served whole.
    if spec.contains(',') {
        return Ok(None);
    }
    let (start_s, end_s) = spec.split_once('-').ok_or(())?;

    if len == 0 {
        return Err(());
    }

    let range = if start_s.is_empty() {
        // suffix form: last N bytes
        let suffix: u64 = end_s.parse().map_err(|_| ())?;
        if suffix == 0 {
            return Err(());
        }
        let start = len.saturating_sub(suffix);
        ByteRange { start, end: len - 1 }
    } else {
        let start: u64 = start_s.parse().map_err(|_| ())?;
        if start >= len {
            return Err(());
        }
        let end = if end_s.is_empty() {
            len - 1
        } else {
            end_s.parse::<u64>().map_err(|_| ())?.min(len - 1)
        };
        if end < start {
            return Err(());
        }
        ByteRange { start, end }
    };

    Ok(Some(range))
}

/// Build the streaming response for an already-authorized absolute path.
pub async fn stream_file(
    fsgate: &FsGateway,
    abs: &Path,
    file_name: &str,
    range_header: Option<&str>,
    inline: bool,
) -> Result<Response, DepotError> {
    let (mut file, len) = fsgate.open_read(abs).await?;

    let mime = mime_guess::from_path(file_name).first_or_octet_stream();
    let disposition = if inline {
        format!("inline; filename=\"{}\"", sanitize_filename(file_name))
    } else {
        format!("attachment; filename=\"{}\"", sanitize_filename(file_name))
    };

    let range = match parse_range(range_header, len) {
        Ok(range) => range,
        Err(()) => {
            let mut response = StatusCode::RANGE_NOT_SATISFIABLE.into_response();
            if let Ok(value) = HeaderValue::from_str(&format!("bytes */{len}")) {
                response.headers_mut().insert(header::CONTENT_RANGE, value);
            }
            return Ok(response);
        },
    };

    let mut builder = Response::builder()
        .header(header::CONTENT_TYPE, mime.as_ref())
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_DISPOSITION, disposition);

    let (status, body_len) = match range {
        Some(range) => {
            file.seek(std::io::SeekFrom::Start(range.start)).await?;
            let body_len = range.end - range.start + 1;
            builder = builder.header(
                header::CONTENT_RANGE,
                format!("bytes {}-{}/{len}", range.start, range.end),
            );
            (StatusCode::PARTIAL_CONTENT, body_len)
        },
        None => (StatusCode::OK, len),
    };

    let stream = ReaderStream::new(file.take(body_len));
    let response = builder
        .status(status)
        .header(header::CONTENT_LENGTH, body_len)
        .body(Body::from_stream(stream))
        .map_err(|e| DepotError::Storage(format!("response build failed: {e}")))?;

    Ok(response)
}

/// Permission-checked download for the authenticated surface.
#[tracing::instrument(skip(state, user, scope), fields(path = %scope.rel))]
pub async fn handle(
    state: &AppState,
    user: &User,
    scope: &Scope,
    range_header: Option<&str>,
) -> Result<Response, DepotError> {
    scope::authorize(state, user, scope, Action::Download).await?;

    let file_name = scope
        .abs
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string());

    stream_file(&state.fsgate, &scope.abs, &file_name, range_header, false).await
}

fn sanitize_filename(name: &str) -> String {
    name.replace(['"', '\r', '\n'], "_")
}
