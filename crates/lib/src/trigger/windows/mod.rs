//! Windows build trigger.
//!
//! Windows images are built on a compute instance provisioned for the run.
//! The trigger stages the build scripts, waits for the instance's management
//! agent, then hands the build to a remote command whose output lands in the
//! staging bucket.

mod package;

pub use package::{PackageError, ScriptArchive, package_scripts, package_scripts_blocking};

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cloud::{CommandRequest, InstanceId, InstanceManager, StagingStore};
use crate::consts::{COMMAND_OUTPUT_PREFIX, PING_STATUS_ONLINE, SCRIPTS_ARCHIVE_KEY};
use crate::context::DeploymentContext;
use crate::error::{Result, WorkflowError};
use crate::poll::{Clock, PollOutcome, PollSettings, PollState};

/// A remote build accepted by the Windows instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowsDispatch {
  pub instance_id: InstanceId,
  pub command_id: String,
  pub readiness_attempts: u32,
}

pub struct WindowsBuildTrigger<'a, B, C> {
  cloud: &'a B,
  clock: &'a C,
  ctx: &'a DeploymentContext,
  boot_wait: Duration,
  readiness: PollSettings,
}

impl<'a, B, C> WindowsBuildTrigger<'a, B, C>
where
  B: StagingStore + InstanceManager,
  C: Clock,
{
  pub fn new(cloud: &'a B, clock: &'a C, ctx: &'a DeploymentContext, boot_wait: Duration, readiness: PollSettings) -> Self {
    Self {
      cloud,
      clock,
      ctx,
      boot_wait,
      readiness,
    }
  }

  /// Package, stage, wait for the instance and dispatch the remote build.
  ///
  /// Returns as soon as the command is accepted. Fails with
  /// [`WorkflowError::InstanceNotReady`] if the agent never reports online
  /// within the readiness budget.
  pub async fn start_windows_build(&self) -> Result<WindowsDispatch> {
    let archive = package_scripts_blocking(&self.ctx.windows_scripts_dir).await?;
    info!(
      dir = %self.ctx.windows_scripts_dir.display(),
      files = archive.file_count(),
      "packaged windows build scripts"
    );

    let bucket = &self.ctx.staging_bucket;
    self
      .cloud
      .upload(archive.path(), bucket, SCRIPTS_ARCHIVE_KEY)
      .await
      .map_err(|source| WorkflowError::Staging {
        bucket: bucket.clone(),
        key: SCRIPTS_ARCHIVE_KEY.to_string(),
        source,
      })?;

    info!(wait = ?self.boot_wait, "waiting for windows instance to boot");
    self.clock.sleep(self.boot_wait).await;

    let instance_id = self.discover_instance().await?;
    let attempts = self.await_agent_online(&instance_id).await?;

    let request = CommandRequest {
      instance_id: instance_id.clone(),
      document: self.ctx.command_document.clone(),
      output_bucket: bucket.clone(),
      output_prefix: COMMAND_OUTPUT_PREFIX.to_string(),
    };
    let command_id = self
      .cloud
      .send_command(&request)
      .await
      .map_err(|source| WorkflowError::CommandDispatch {
        instance_id: instance_id.clone(),
        source,
      })?;

    info!(instance_id = %instance_id, command_id = %command_id, "windows build dispatched");
    Ok(WindowsDispatch {
      instance_id,
      command_id,
      readiness_attempts: attempts,
    })
  }

  async fn discover_instance(&self) -> Result<InstanceId> {
    let tag = &self.ctx.instance_tag;
    let not_found = |reason: String| WorkflowError::InstanceNotFound {
      key: tag.key.clone(),
      value: tag.value.clone(),
      reason,
    };

    match self.cloud.find_instance(tag).await {
      Ok(Some(id)) => {
        info!(instance_id = %id, "found windows build instance");
        Ok(id)
      }
      Ok(None) => Err(not_found("no running instance carries the run tag".to_string())),
      Err(err) => Err(not_found(err.to_string())),
    }
  }

  async fn await_agent_online(&self, instance_id: &InstanceId) -> Result<u32> {
    let outcome = PollState::new(self.readiness)
      .run(self.clock, |attempt| async move {
        match self.cloud.ping_status(instance_id).await {
          Ok(Some(status)) if status == PING_STATUS_ONLINE => Ok::<_, WorkflowError>(Some(())),
          Ok(status) => {
            debug!(instance_id = %instance_id, attempt, status = ?status, "agent not online yet");
            Ok(None)
          }
          Err(err) => {
            warn!(instance_id = %instance_id, attempt, error = %err, "failed to query agent status");
            Ok(None)
          }
        }
      })
      .await?;

    match outcome {
      PollOutcome::Ready { attempts, .. } => {
        info!(instance_id = %instance_id, attempts, "management agent online");
        Ok(attempts)
      }
      PollOutcome::Exhausted { attempts } => Err(WorkflowError::InstanceNotReady {
        instance_id: instance_id.clone(),
        attempts,
      }),
    }
  }
}
