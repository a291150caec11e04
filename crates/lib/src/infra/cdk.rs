use std::collections::BTreeMap;

use tracing::info;

use super::InfraTool;
use crate::consts::CDK_BIN_VAR;
use crate::exec::{ToolError, args, run_tool};

/// Drives the `cdk` command line against the project's infra app.
#[derive(Debug, Clone)]
pub struct CdkCli {
  program: String,
}

impl CdkCli {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
    }
  }

  /// Uses `$IMGBUILD_CDK_BIN` when set, `cdk` otherwise.
  pub fn from_env() -> Self {
    let program = std::env::var(CDK_BIN_VAR)
      .ok()
      .filter(|p| !p.is_empty())
      .unwrap_or_else(|| "cdk".to_string());
    Self::new(program)
  }
}

impl InfraTool for CdkCli {
  async fn deploy(&self, pattern: &str, env: &BTreeMap<String, String>) -> Result<(), ToolError> {
    let out = run_tool(
      &self.program,
      &args(["deploy", pattern, "--require-approval", "never"]),
      Some(env),
    )
    .await?;
    info!(stacks = %pattern, output = %out, "stacks deployed");
    Ok(())
  }

  async fn destroy(&self, pattern: &str, env: &BTreeMap<String, String>) -> Result<(), ToolError> {
    run_tool(&self.program, &args(["destroy", pattern, "--force"]), Some(env)).await?;
    Ok(())
  }

  async fn diff(&self, pattern: &str, env: &BTreeMap<String, String>) -> Result<String, ToolError> {
    run_tool(&self.program, &args(["diff", pattern]), Some(env)).await
  }

  async fn synth(&self, pattern: &str, env: &BTreeMap<String, String>) -> Result<String, ToolError> {
    run_tool(&self.program, &args(["synth", pattern]), Some(env)).await
  }
}
