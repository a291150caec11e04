//! Workflow error taxonomy.
//!
//! Every variant is fatal for the run: the orchestrator tears down and the
//! process exits non-zero. Poll loops are the only retry mechanism.

use thiserror::Error;

use crate::cloud::InstanceId;
use crate::context::ContextError;
use crate::exec::ToolError;
use crate::infra::ProvisionError;
use crate::trigger::windows::PackageError;

pub type Result<T> = std::result::Result<T, WorkflowError>;

#[derive(Debug, Error)]
pub enum WorkflowError {
  #[error("invalid deploy configuration: {0}")]
  Context(#[from] ContextError),

  #[error(transparent)]
  Provision(#[from] ProvisionError),

  #[error("failed to start build project {project}: {source}")]
  BuildStart {
    project: String,
    #[source]
    source: ToolError,
  },

  #[error("failed to package build scripts: {0}")]
  Package(#[from] PackageError),

  #[error("failed to stage build scripts to s3://{bucket}/{key}: {source}")]
  Staging {
    bucket: String,
    key: String,
    #[source]
    source: ToolError,
  },

  #[error("no instance tagged {key}={value}: {reason}")]
  InstanceNotFound { key: String, value: String, reason: String },

  #[error("instance {instance_id} management agent not online after {attempts} attempts")]
  InstanceNotReady { instance_id: InstanceId, attempts: u32 },

  #[error("failed to dispatch remote command to {instance_id}: {source}")]
  CommandDispatch {
    instance_id: InstanceId,
    #[source]
    source: ToolError,
  },

  #[error("artifacts missing from repository {repository} after {attempts} attempts: {}", .missing.join(", "))]
  ArtifactTimeout {
    repository: String,
    attempts: u32,
    missing: Vec<String>,
  },

  #[error("interrupted by signal")]
  Interrupted,

  #[error("deploy aborted by an unexpected fault: {0}")]
  Panicked(String),

  #[error("teardown failed: {0}")]
  Teardown(#[source] ProvisionError),
}
