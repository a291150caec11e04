//! External tool execution.
//!
//! Every cloud interaction goes through a CLI (`aws`, `cdk`). This module runs
//! those programs, captures their output, and turns failures into [`ToolError`].

use std::collections::BTreeMap;
use std::io;

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Failure markers printed by the cloud CLIs when the target does not exist.
const NOT_FOUND_MARKERS: &[&str] = &[
  "NoSuchBucket",
  "RepositoryNotFoundException",
  "does not exist",
  "NotFound",
];

/// Errors raised while running an external tool.
#[derive(Debug, Error)]
pub enum ToolError {
  /// The program could not be started at all.
  #[error("failed to spawn {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: io::Error,
  },

  /// The program ran and exited unsuccessfully.
  #[error("{program} {args} exited with code {code:?}: {stderr}")]
  Failed {
    program: String,
    args: String,
    code: Option<i32>,
    stderr: String,
  },

  /// The program succeeded but its output was not what we expected.
  #[error("unexpected output from {what}: {message}")]
  Decode { what: String, message: String },
}

impl ToolError {
  /// Whether the failure means the targeted resource is already gone.
  pub fn is_not_found(&self) -> bool {
    match self {
      ToolError::Failed { stderr, .. } => NOT_FOUND_MARKERS.iter().any(|m| stderr.contains(m)),
      _ => false,
    }
  }

  pub(crate) fn decode(what: impl Into<String>, message: impl ToString) -> Self {
    ToolError::Decode {
      what: what.into(),
      message: message.to_string(),
    }
  }
}

/// Run `program` with `args` and return its trimmed stdout.
///
/// The child inherits the caller's environment; `env` entries are layered on
/// top. On a non-zero exit the captured stderr is logged and returned in the
/// error.
pub async fn run_tool(program: &str, args: &[String], env: Option<&BTreeMap<String, String>>) -> Result<String, ToolError> {
  debug!(program = %program, args = %args.join(" "), "running tool");

  let mut command = Command::new(program);
  command.args(args).kill_on_drop(true);

  if let Some(extra) = env {
    for (key, value) in extra {
      command.env(key, value);
    }
  }

  let output = command.output().await.map_err(|source| ToolError::Spawn {
    program: program.to_string(),
    source,
  })?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let stdout = String::from_utf8_lossy(&output.stdout);

    if !stderr.is_empty() {
      debug!(stderr = %stderr, "tool stderr");
    }
    if !stdout.is_empty() {
      debug!(stdout = %stdout, "tool stdout");
    }

    return Err(ToolError::Failed {
      program: program.to_string(),
      args: args.join(" "),
      code: output.status.code(),
      stderr,
    });
  }

  Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Build an owned argument vector from string slices.
pub(crate) fn args<const N: usize>(parts: [&str; N]) -> Vec<String> {
  parts.iter().map(|p| p.to_string()).collect()
}
