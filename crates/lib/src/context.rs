//! Run configuration.
//!
//! [`DeploymentContext`] is resolved once at startup and threaded by reference
//! through every component. Nothing downstream reads the process environment.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::consts::{DEFAULT_WINDOWS_SCRIPTS_DIR, WINDOWS_SCRIPTS_DIR_VAR};
use crate::family::{ArtifactFamily, FamilyKind};

/// S3 bucket names are limited to 63 characters.
const MAX_BUCKET_NAME_LEN: usize = 63;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContextError {
  #[error("{0} must not be empty")]
  Empty(&'static str),

  #[error("invalid account id '{0}': expected 12 digits")]
  InvalidAccount(String),

  #[error("staging bucket name '{0}' is longer than {MAX_BUCKET_NAME_LEN} characters")]
  BucketNameTooLong(String),
}

/// Positional inputs identifying the target account and source repository.
#[derive(Debug, Clone)]
pub struct ContextArgs {
  pub account: String,
  pub region: String,
  pub repo_owner: String,
  pub repo_name: String,
}

/// Timestamp-derived suffix that namespaces every ephemeral resource of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSuffix(String);

impl RunSuffix {
  pub fn now() -> Self {
    Self::from_time(Utc::now())
  }

  pub fn from_time(time: DateTime<Utc>) -> Self {
    Self(time.format("%Y-%m-%d-%H-%M-%S").to_string())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for RunSuffix {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Tag used to find the compute instance provisioned for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceTag {
  pub key: String,
  pub value: String,
}

/// An architecture-specific managed build project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinuxBuildProject {
  pub arch: &'static str,
  pub project: String,
}

/// Immutable configuration for one workflow run.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentContext {
  pub account: String,
  pub region: String,
  pub repo_owner: String,
  pub repo_name: String,
  pub run_suffix: RunSuffix,
  pub linux_arm: ArtifactFamily,
  pub linux_x86: ArtifactFamily,
  pub windows: ArtifactFamily,
  pub staging_bucket: String,
  pub instance_tag: InstanceTag,
  pub command_document: String,
  pub windows_scripts_dir: PathBuf,
}

impl DeploymentContext {
  /// Resolve the context from the process environment.
  pub fn from_env(args: ContextArgs, run_suffix: RunSuffix) -> Result<Self, ContextError> {
    Self::resolve(args, run_suffix, |key| std::env::var(key).ok())
  }

  /// Resolve the context, consulting `lookup` for optional overrides.
  ///
  /// Overrides that are set but empty count as unset.
  pub fn resolve(
    args: ContextArgs,
    run_suffix: RunSuffix,
    lookup: impl Fn(&str) -> Option<String>,
  ) -> Result<Self, ContextError> {
    let ContextArgs {
      account,
      region,
      repo_owner,
      repo_name,
    } = args;

    for (field, value) in [
      ("account", &account),
      ("region", &region),
      ("repository owner", &repo_owner),
      ("repository name", &repo_name),
    ] {
      if value.trim().is_empty() {
        return Err(ContextError::Empty(field));
      }
    }

    if account.len() != 12 || !account.chars().all(|c| c.is_ascii_digit()) {
      return Err(ContextError::InvalidAccount(account));
    }

    let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    let family = |kind: FamilyKind| {
      let repository = lookup(kind.repository_var()).unwrap_or_else(|| kind.default_repository(&repo_name));
      ArtifactFamily::with_default_tags(kind, repository)
    };
    let linux_arm = family(FamilyKind::LinuxArm);
    let linux_x86 = family(FamilyKind::LinuxX86);
    let windows = family(FamilyKind::Windows);

    let staging_bucket = format!("{}{}", staging_bucket_prefix(&repo_name), run_suffix);

    let instance_tag = InstanceTag {
      key: repo_name.clone(),
      value: format!("{repo_name}-windows-docker-image-build-{run_suffix}"),
    };
    let command_document = format!("windows-ssm-document-{run_suffix}");
    let windows_scripts_dir = lookup(WINDOWS_SCRIPTS_DIR_VAR)
      .map(PathBuf::from)
      .unwrap_or_else(|| PathBuf::from(DEFAULT_WINDOWS_SCRIPTS_DIR));

    Ok(Self {
      account,
      region,
      repo_owner,
      repo_name,
      run_suffix,
      linux_arm,
      linux_x86,
      windows,
      staging_bucket,
      instance_tag,
      command_document,
      windows_scripts_dir,
    })
  }

  /// Checks that only matter when the run creates resources.
  ///
  /// The staging bucket is only created by a deploy, so an overlong bucket
  /// name does not block previews or a long-lived destroy.
  pub fn validate_for_deploy(&self) -> Result<(), ContextError> {
    if self.staging_bucket.len() > MAX_BUCKET_NAME_LEN {
      return Err(ContextError::BucketNameTooLong(self.staging_bucket.clone()));
    }
    Ok(())
  }

  pub fn family(&self, kind: FamilyKind) -> &ArtifactFamily {
    match kind {
      FamilyKind::LinuxArm => &self.linux_arm,
      FamilyKind::LinuxX86 => &self.linux_x86,
      FamilyKind::Windows => &self.windows,
    }
  }

  /// Families in watch order.
  pub fn families(&self) -> [&ArtifactFamily; 3] {
    FamilyKind::ALL.map(|kind| self.family(kind))
  }

  /// One managed build project per Linux architecture.
  pub fn linux_build_projects(&self) -> [LinuxBuildProject; 2] {
    [
      LinuxBuildProject {
        arch: "aarch64",
        project: format!("{}-docker-image-build-linux-aarch", self.repo_name),
      },
      LinuxBuildProject {
        arch: "x86_64",
        project: format!("{}-docker-image-build-linux-x86", self.repo_name),
      },
    ]
  }

  /// Registry stacks. These outlive a run.
  pub fn registry_stack_pattern(&self) -> String {
    format!("{}-ecr-*", self.repo_name)
  }

  /// Stacks created for and destroyed after each deploy.
  pub fn ephemeral_stack_pattern(&self) -> String {
    format!("{}-docker-image-build-*", self.repo_name)
  }

  /// Every stack owned by the project, including long-lived registries.
  pub fn long_lived_stack_pattern(&self) -> String {
    format!("{}-*", self.repo_name)
  }

  pub fn staging_bucket_prefix(&self) -> String {
    staging_bucket_prefix(&self.repo_name)
  }

  /// Environment handed to the infra description when it is synthesized.
  pub fn infra_env(&self) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    env.insert("CDK_DEPLOY_ACCOUNT".to_string(), self.account.clone());
    env.insert("CDK_DEPLOY_REGION".to_string(), self.region.clone());
    env.insert("GITHUB_REPO_OWNER".to_string(), self.repo_owner.clone());
    env.insert("GITHUB_REPO".to_string(), self.repo_name.clone());
    for family in self.families() {
      env.insert(family.kind.repository_var().to_string(), family.repository.clone());
    }
    env.insert("S3_FOR_WIN_DOCKER_IMG_BUILD".to_string(), self.staging_bucket.clone());
    env.insert("WIN_EC2_TAG_KEY".to_string(), self.instance_tag.key.clone());
    env.insert("WIN_EC2_TAG_VALUE".to_string(), self.instance_tag.value.clone());
    env.insert(
      "WIN_DOCKER_BUILD_SSM_DOCUMENT".to_string(),
      self.command_document.clone(),
    );
    env
  }
}

fn staging_bucket_prefix(repo_name: &str) -> String {
  format!("{repo_name}-win-img-stage-")
}
