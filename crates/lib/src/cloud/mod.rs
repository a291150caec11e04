//! Cloud service seams.
//!
//! The orchestration code talks to the build service, the artifact registry,
//! staging storage and the compute fleet through these traits. [`AwsCli`]
//! implements all of them by driving the `aws` command line; tests use
//! in-memory fakes.

mod aws;

pub use aws::AwsCli;

use std::fmt;
use std::future::Future;
use std::path::Path;

use serde::Serialize;

use crate::context::InstanceTag;
use crate::exec::ToolError;

/// Identifier of a provisioned compute instance.
///
/// Only meaningful between the provisioner's create and destroy steps of the
/// run that resolved it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceId(pub String);

impl fmt::Display for InstanceId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// A remote command execution request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
  pub instance_id: InstanceId,
  pub document: String,
  pub output_bucket: String,
  pub output_prefix: String,
}

/// Managed build service.
pub trait BuildService {
  /// Start a build of `project` and return the build id without waiting.
  fn start_build(&self, project: &str) -> impl Future<Output = Result<String, ToolError>>;
}

/// Versioned artifact storage.
pub trait ArtifactRegistry {
  /// Raw image listing for `repository`, treated as opaque text.
  fn describe_images(&self, repository: &str) -> impl Future<Output = Result<String, ToolError>>;

  /// Delete `repository` and its images. Returns `false` if it did not exist.
  fn delete_repository(&self, repository: &str) -> impl Future<Output = Result<bool, ToolError>>;
}

/// Object storage used to stage build inputs and collect command output.
pub trait StagingStore {
  fn upload(&self, local: &Path, bucket: &str, key: &str) -> impl Future<Output = Result<(), ToolError>>;

  fn list_buckets(&self, prefix: &str) -> impl Future<Output = Result<Vec<String>, ToolError>>;

  /// Empty and delete `bucket`. Returns `false` if it did not exist.
  fn remove_bucket(&self, bucket: &str) -> impl Future<Output = Result<bool, ToolError>>;
}

/// Compute instances and their management agent.
pub trait InstanceManager {
  fn find_instance(&self, tag: &InstanceTag) -> impl Future<Output = Result<Option<InstanceId>, ToolError>>;

  /// Agent ping status (`Online`, `ConnectionLost`, ...), `None` if the agent
  /// has not registered yet.
  fn ping_status(&self, instance: &InstanceId) -> impl Future<Output = Result<Option<String>, ToolError>>;

  /// Dispatch a remote command and return its command id.
  fn send_command(&self, request: &CommandRequest) -> impl Future<Output = Result<String, ToolError>>;
}

/// Everything a deploy needs from the cloud.
pub trait CloudBackend: BuildService + ArtifactRegistry + StagingStore + InstanceManager {}

impl<T> CloudBackend for T where T: BuildService + ArtifactRegistry + StagingStore + InstanceManager {}
