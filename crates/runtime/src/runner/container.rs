//! Container runner adapter.
//!
//! The container reads a single JSON document
//! `{inputs, params, context}` on stdin and emits newline-delimited JSON
//! events on stdout: `{"type":"progress",…}`, `{"type":"result",…}`,
//! `{"type":"error",…}`. Exit code 0 means success; non-zero without a
//! result is a `ContainerError`. The caller enforces the attempt deadline
//! by dropping this future — the child is spawned with `kill_on_drop`, so
//! dropping is the hard kill.

use std::process::Stdio;

use palisade_component::{ComponentError, ProgressEvent};
use palisade_core::{ErrorKind, EventLevel};
use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How to start the container process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable to spawn.
    pub program: String,
    /// Arguments.
    pub args: Vec<String>,
}

impl CommandSpec {
    /// The standard docker invocation for an image + command.
    #[must_use]
    pub fn docker(image: &str, command: &[String]) -> Self {
        let mut args = vec![
            "run".to_owned(),
            "--rm".to_owned(),
            "-i".to_owned(),
            image.to_owned(),
        ];
        args.extend(command.iter().cloned());
        Self {
            program: "docker".to_owned(),
            args,
        }
    }

    /// A raw process invocation, used by tests and local development.
    #[must_use]
    pub fn raw(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

/// One NDJSON event on the container's stdout.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireEvent {
    Progress {
        #[serde(default)]
        level: EventLevel,
        message: String,
        #[serde(default)]
        data: Option<Value>,
    },
    Result {
        output: Value,
    },
    Error {
        message: String,
        #[serde(default)]
        kind: Option<String>,
        #[serde(default)]
        details: Option<Value>,
    },
}

/// Run a container attempt to completion.
///
/// `payload` goes to stdin unredacted (sensitive values are redacted from
/// logs, never from the wire). Progress events are forwarded through
/// `on_progress` until a terminal line is seen; stdout is always read to
/// drain.
pub async fn run(
    launch: CommandSpec,
    payload: Value,
    cancel: &CancellationToken,
    on_progress: impl Fn(ProgressEvent),
) -> Result<Value, ComponentError> {
    let child = spawn(&launch)?;
    let driven = drive(child, payload, on_progress);
    tokio::select! {
        outcome = driven => outcome,
        () = cancel.cancelled() => {
            // Dropping `driven` drops the child; kill_on_drop reaps it.
            Err(ComponentError::cancelled())
        }
    }
}

fn spawn(launch: &CommandSpec) -> Result<Child, ComponentError> {
    Command::new(&launch.program)
        .args(&launch.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            ComponentError::container(format!("failed to start `{}`: {e}", launch.program))
        })
}

async fn drive(
    mut child: Child,
    payload: Value,
    on_progress: impl Fn(ProgressEvent),
) -> Result<Value, ComponentError> {
    if let Some(mut stdin) = child.stdin.take() {
        let bytes = serde_json::to_vec(&payload)
            .map_err(|e| ComponentError::internal(format!("encoding container stdin: {e}")))?;
        // Written concurrently with stdout draining so neither pipe stalls.
        tokio::spawn(async move {
            let _ = stdin.write_all(&bytes).await;
            let _ = stdin.write_all(b"\n").await;
            let _ = stdin.shutdown().await;
        });
    }

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ComponentError::container("container stdout was not captured"))?;
    let stderr = child.stderr.take();

    let stderr_drain = async move {
        let mut buffer = String::new();
        if let Some(stderr) = stderr {
            let _ = BufReader::new(stderr).read_to_string(&mut buffer).await;
        }
        buffer
    };

    let stdout_drain = async move {
        let mut lines = BufReader::new(stdout).lines();
        let mut result: Option<Value> = None;
        let mut error: Option<ComponentError> = None;
        loop {
            let line = lines
                .next_line()
                .await
                .map_err(|e| ComponentError::container(format!("reading container stdout: {e}")))?;
            let Some(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<WireEvent>(&line) {
                Ok(WireEvent::Progress {
                    level,
                    message,
                    data,
                }) => {
                    // Progress after a terminal line is drained, not forwarded.
                    if result.is_none() && error.is_none() {
                        let mut event = ProgressEvent {
                            level,
                            message,
                            data: None,
                        };
                        if let Some(data) = data {
                            event = event.with_data(data);
                        }
                        on_progress(event);
                    }
                }
                Ok(WireEvent::Result { output }) => {
                    if result.is_none() {
                        result = Some(output);
                    }
                }
                Ok(WireEvent::Error {
                    message,
                    kind,
                    details,
                }) => {
                    if error.is_none() {
                        let kind = kind
                            .as_deref()
                            .and_then(ErrorKind::from_tag)
                            .unwrap_or(ErrorKind::Container);
                        let mut err = ComponentError::new(kind, message);
                        if let Some(details) = details {
                            err = err.with_details(details);
                        }
                        error = Some(err);
                    }
                }
                Err(parse_err) => {
                    debug!(%parse_err, "ignoring non-event line on container stdout");
                }
            }
        }
        Ok::<_, ComponentError>((result, error))
    };

    let (stdout_outcome, stderr_text) = tokio::join!(stdout_drain, stderr_drain);
    let (result, error) = stdout_outcome?;

    let status = child
        .wait()
        .await
        .map_err(|e| ComponentError::container(format!("waiting for container: {e}")))?;

    if let Some(error) = error {
        return Err(error);
    }
    if let Some(result) = result {
        if !status.success() {
            warn!(code = ?status.code(), "container emitted a result but exited non-zero");
        }
        return Ok(result);
    }
    if status.success() {
        return Err(ComponentError::container(
            "container exited 0 without emitting a result",
        ));
    }
    Err(ComponentError::container(format!(
        "container exited with {}: {}",
        status.code().map_or_else(|| "signal".to_owned(), |c| c.to_string()),
        tail(&stderr_text, 512),
    )))
}

/// Last `max` bytes of captured stderr, for the error message.
fn tail(text: &str, max: usize) -> &str {
    let trimmed = text.trim();
    if trimmed.len() <= max {
        trimmed
    } else {
        let start = trimmed.len() - max;
        // Stay on a char boundary.
        let start = (start..trimmed.len())
            .find(|&i| trimmed.is_char_boundary(i))
            .unwrap_or(start);
        &trimmed[start..]
    }
}
