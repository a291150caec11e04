use serde::Serialize;
use tracing::info;

use crate::cloud::BuildService;
use crate::context::DeploymentContext;
use crate::error::{Result, WorkflowError};

/// A build job accepted by the managed build service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartedBuild {
  pub arch: &'static str,
  pub project: String,
  pub build_id: String,
}

pub struct LinuxBuildTrigger<'a, B> {
  builds: &'a B,
  ctx: &'a DeploymentContext,
}

impl<'a, B: BuildService> LinuxBuildTrigger<'a, B> {
  pub fn new(builds: &'a B, ctx: &'a DeploymentContext) -> Self {
    Self { builds, ctx }
  }

  /// Start one build per Linux architecture and return once each start
  /// request is accepted.
  ///
  /// The first rejected start aborts the workflow; there is no retry.
  pub async fn start_linux_builds(&self) -> Result<Vec<StartedBuild>> {
    let mut started = Vec::new();

    for project in self.ctx.linux_build_projects() {
      let build_id = self
        .builds
        .start_build(&project.project)
        .await
        .map_err(|source| WorkflowError::BuildStart {
          project: project.project.clone(),
          source,
        })?;

      info!(arch = project.arch, project = %project.project, build_id = %build_id, "linux build started");
      started.push(StartedBuild {
        arch: project.arch,
        project: project.project,
        build_id,
      });
    }

    Ok(started)
  }
}
