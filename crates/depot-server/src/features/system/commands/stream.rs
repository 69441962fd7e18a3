//! Subprocess streamer
//!
//! Runs one allowlisted host command per request and relays stdout/stderr
//! as server-sent events (`output` / `error`), always ending with a
//! `complete` event carrying the exit status. Both pipes are drained to EOF
//! before `wait`, so no tail output is lost. When the client disconnects,
//! the process group gets SIGTERM and, after a grace period, SIGKILL.

use depot_common::DepotError;
use futures::stream::Stream;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

/// Host binaries the streamer may launch. Everything else is rejected
/// before a process exists.
const ALLOWED_COMMANDS: &[&str] = &[
    "apt-get",
    "dnf",
    "lsblk",
    "mkfs.ext4",
    "mkfs.xfs",
    "mount",
    "parted",
    "smartctl",
    "umount",
    "zfs",
    "zpool",
];

const TERM_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunCommandRequest {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// One streamed event.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StreamEvent {
    Output { line: String },
    Error { line: String },
    Complete { success: bool, exit_code: Option<i32> },
}

impl StreamEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            StreamEvent::Output { .. } => "output",
            StreamEvent::Error { .. } => "error",
            StreamEvent::Complete { .. } => "complete",
        }
    }
}

impl RunCommandRequest {
    pub fn validate(&self) -> Result<(), DepotError> {
        if !ALLOWED_COMMANDS.contains(&self.command.as_str()) {
            return Err(DepotError::Invalid(format!(
                "command {} is not permitted",
                self.command
            )));
        }
        if self.args.iter().any(|a| a.contains('\0')) {
            return Err(DepotError::Invalid("NUL byte in argument".into()));
        }
        Ok(())
    }
}

/// Spawn the command and return the event stream. The returned stream owns
/// a cancellation guard: dropping it (client gone) tears the process down.
pub fn run(
    request: RunCommandRequest,
) -> Result<impl Stream<Item = StreamEvent> + Send + 'static, DepotError> {
    request.validate()?;

    let mut child = Command::new(&request.command)
        .args(&request.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .spawn()
        .map_err(|e| DepotError::Storage(format!("failed to spawn {}: {e}", request.command)))?;

    let pid = child.id().map(|id| Pid::from_raw(id as i32));
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (tx, rx) = mpsc::channel::<StreamEvent>(64);
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();

    tokio::spawn(async move {
        let stdout_task = spawn_line_reader(stdout, tx.clone(), false);
        let stderr_task = spawn_line_reader(stderr, tx.clone(), true);

        // both pipes must hit EOF before wait
        let pipes_done = async {
            let _ = stdout_task.await;
            let _ = stderr_task.await;
        };

        let cancelled = tokio::select! {
            _ = pipes_done => false,
            _ = cancel.cancelled() => true,
        };

        if cancelled {
            tracing::info!(command = %request.command, "client gone, terminating process group");
            terminate(pid).await;
        }

        let status = child.wait().await;

        let (success, exit_code) = match status {
            Ok(status) => (status.success(), status.code()),
            Err(e) => {
                tracing::error!(error = %e, "wait failed");
                (false, None)
            },
        };

        let _ = tx.send(StreamEvent::Complete { success, exit_code }).await;
    });

    let stream = ReceiverStream::new(rx);
    // the guard rides inside the map closure: dropping the stream cancels
    let stream = futures::StreamExt::map(stream, move |event| {
        let _hold = &guard;
        event
    });

    Ok(stream)
}

fn spawn_line_reader<R>(
    pipe: Option<R>,
    tx: mpsc::Sender<StreamEvent>,
    is_stderr: bool,
) -> tokio::task::JoinHandle<()>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(pipe) = pipe else { return };
        let mut lines = BufReader::new(pipe).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let event = if is_stderr {
                StreamEvent::Error { line }
            } else {
                StreamEvent::Output { line }
            };
            if tx.send(event).await.is_err() {
                // receiver gone; keep draining so the pipe reaches EOF
                continue;
            }
        }
    })
}

async fn terminate(pid: Option<Pid>) {
    let Some(pid) = pid else { return };
    let _ = killpg(pid, Signal::SIGTERM);
    tokio::time::sleep(TERM_GRACE).await;
    let _ = killpg(pid, Signal::SIGKILL);
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn rejects_unlisted_commands() {
        let request = RunCommandRequest {
            command: "rm".into(),
            args: vec!["-rf".into(), "/".into()],
        };
        assert!(request.validate().is_err());
    }

    #[tokio::test]
    async fn streams_output_and_completes() {
        // lsblk may not exist in minimal environments; spawn failure is an
        // acceptable outcome, the contract under test is event ordering.
        let request = RunCommandRequest {
            command: "lsblk".into(),
            args: vec!["--version".into()],
        };
        let Ok(stream) = run(request) else { return };

        let events: Vec<StreamEvent> = stream.collect().await;
        let last = events.last().expect("at least the complete event");
        assert!(matches!(last, StreamEvent::Complete { .. }));
        // complete is emitted exactly once, as the final event
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, StreamEvent::Complete { .. }))
                .count(),
            1
        );
    }
}
