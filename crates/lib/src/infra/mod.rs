//! Infra provisioning.
//!
//! The declared resource set (registries, build projects, the Windows build
//! instance, the staging bucket and the command document) lives in an
//! external infra description. [`Provisioner`] applies it, tears it down and
//! previews it through an [`InfraTool`].

mod cdk;

pub use cdk::CdkCli;

use std::collections::BTreeMap;
use std::future::Future;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::cloud::{ArtifactRegistry, StagingStore};
use crate::context::DeploymentContext;
use crate::exec::ToolError;

/// A tool that applies a declarative infra description, addressed by stack
/// name patterns.
pub trait InfraTool {
  fn deploy(&self, pattern: &str, env: &BTreeMap<String, String>) -> impl Future<Output = Result<(), ToolError>>;

  fn destroy(&self, pattern: &str, env: &BTreeMap<String, String>) -> impl Future<Output = Result<(), ToolError>>;

  fn diff(&self, pattern: &str, env: &BTreeMap<String, String>) -> impl Future<Output = Result<String, ToolError>>;

  fn synth(&self, pattern: &str, env: &BTreeMap<String, String>) -> impl Future<Output = Result<String, ToolError>>;
}

#[derive(Debug, Error)]
pub enum ProvisionError {
  #[error("infra apply failed for {pattern}: {source}")]
  Apply {
    pattern: String,
    #[source]
    source: ToolError,
  },

  #[error("infra preview failed for {pattern}: {source}")]
  Preview {
    pattern: String,
    #[source]
    source: ToolError,
  },

  #[error("teardown incomplete: {}", .failures.join("; "))]
  Destroy { failures: Vec<String> },
}

/// Which resources a destroy targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Namespace {
  /// Ephemeral stacks and the staging bucket of the current run.
  Run,
  /// Everything the project owns, across runs.
  LongLived,
}

/// What a destroy removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DestroyReport {
  pub stack_pattern: String,
  pub buckets_removed: Vec<String>,
  pub repositories_removed: Vec<String>,
}

pub struct Provisioner<'a, T, S> {
  tool: &'a T,
  cloud: &'a S,
  ctx: &'a DeploymentContext,
}

impl<'a, T, S> Provisioner<'a, T, S>
where
  T: InfraTool,
  S: StagingStore + ArtifactRegistry,
{
  pub fn new(tool: &'a T, cloud: &'a S, ctx: &'a DeploymentContext) -> Self {
    Self { tool, cloud, ctx }
  }

  /// Apply the registry stacks, then the run's build stacks.
  ///
  /// Re-applying an existing stack is a no-op. A failure is returned as is;
  /// cleaning up a partial apply is left to [`Provisioner::destroy`].
  pub async fn create(&self) -> Result<(), ProvisionError> {
    let env = self.ctx.infra_env();

    for pattern in [self.ctx.registry_stack_pattern(), self.ctx.ephemeral_stack_pattern()] {
      info!(stacks = %pattern, "applying infra");
      self
        .tool
        .deploy(&pattern, &env)
        .await
        .map_err(|source| ProvisionError::Apply {
          pattern: pattern.clone(),
          source,
        })?;
    }

    Ok(())
  }

  /// Remove everything in `namespace`.
  ///
  /// Every step is attempted even if an earlier one failed. Resources that
  /// are already gone are not errors.
  pub async fn destroy(&self, namespace: Namespace) -> Result<DestroyReport, ProvisionError> {
    let env = self.ctx.infra_env();
    let mut failures = Vec::new();

    let stack_pattern = match namespace {
      Namespace::Run => self.ctx.ephemeral_stack_pattern(),
      Namespace::LongLived => self.ctx.long_lived_stack_pattern(),
    };
    let mut report = DestroyReport {
      stack_pattern: stack_pattern.clone(),
      ..Default::default()
    };

    info!(stacks = %stack_pattern, namespace = ?namespace, "destroying infra");
    if let Err(err) = self.tool.destroy(&stack_pattern, &env).await {
      warn!(stacks = %stack_pattern, error = %err, "stack destroy failed");
      failures.push(format!("stacks {stack_pattern}: {err}"));
    }

    // Stack destroy leaves buckets and registries behind.
    let buckets = match namespace {
      Namespace::Run => vec![self.ctx.staging_bucket.clone()],
      Namespace::LongLived => match self.cloud.list_buckets(&self.ctx.staging_bucket_prefix()).await {
        Ok(buckets) => buckets,
        Err(err) => {
          failures.push(format!("list buckets: {err}"));
          Vec::new()
        }
      },
    };

    for bucket in buckets {
      match self.cloud.remove_bucket(&bucket).await {
        Ok(true) => report.buckets_removed.push(bucket),
        Ok(false) => {}
        Err(err) => {
          warn!(bucket = %bucket, error = %err, "bucket removal failed");
          failures.push(format!("bucket {bucket}: {err}"));
        }
      }
    }

    if namespace == Namespace::LongLived {
      for family in self.ctx.families() {
        match self.cloud.delete_repository(&family.repository).await {
          Ok(true) => report.repositories_removed.push(family.repository.clone()),
          Ok(false) => {}
          Err(err) => {
            warn!(repository = %family.repository, error = %err, "repository removal failed");
            failures.push(format!("repository {}: {err}", family.repository));
          }
        }
      }
    }

    if failures.is_empty() {
      Ok(report)
    } else {
      Err(ProvisionError::Destroy { failures })
    }
  }

  /// Read-only diff of every project stack against the deployed state.
  pub async fn diff(&self) -> Result<String, ProvisionError> {
    let pattern = self.ctx.long_lived_stack_pattern();
    self
      .tool
      .diff(&pattern, &self.ctx.infra_env())
      .await
      .map_err(|source| ProvisionError::Preview { pattern, source })
  }

  /// Render the infra description without touching the account.
  pub async fn synth(&self) -> Result<String, ProvisionError> {
    let pattern = self.ctx.long_lived_stack_pattern();
    self
      .tool
      .synth(&pattern, &self.ctx.infra_env())
      .await
      .map_err(|source| ProvisionError::Preview { pattern, source })
  }
}
