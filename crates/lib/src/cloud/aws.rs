//! `aws` command line backend.

use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use super::{ArtifactRegistry, BuildService, CommandRequest, InstanceId, InstanceManager, StagingStore};
use crate::consts::AWS_BIN_VAR;
use crate::context::InstanceTag;
use crate::exec::{ToolError, args, run_tool};

/// Drives the AWS CLI for one region.
#[derive(Debug, Clone)]
pub struct AwsCli {
  program: String,
  region: String,
}

impl AwsCli {
  pub fn new(program: impl Into<String>, region: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      region: region.into(),
    }
  }

  /// Uses `$IMGBUILD_AWS_BIN` when set, `aws` otherwise.
  pub fn from_env(region: impl Into<String>) -> Self {
    let program = std::env::var(AWS_BIN_VAR)
      .ok()
      .filter(|p| !p.is_empty())
      .unwrap_or_else(|| "aws".to_string());
    Self::new(program, region)
  }

  async fn call(&self, mut args: Vec<String>) -> Result<String, ToolError> {
    args.extend(["--region".to_string(), self.region.clone(), "--output".to_string(), "json".to_string()]);
    run_tool(&self.program, &args, None).await
  }
}

impl BuildService for AwsCli {
  async fn start_build(&self, project: &str) -> Result<String, ToolError> {
    let out = self.call(args(["codebuild", "start-build", "--project-name", project])).await?;
    parse_build_id(&out)
  }
}

impl ArtifactRegistry for AwsCli {
  async fn describe_images(&self, repository: &str) -> Result<String, ToolError> {
    self
      .call(args(["ecr", "describe-images", "--repository-name", repository]))
      .await
  }

  async fn delete_repository(&self, repository: &str) -> Result<bool, ToolError> {
    let result = self
      .call(args(["ecr", "delete-repository", "--repository-name", repository, "--force"]))
      .await;
    absent_is_false(result)
  }
}

impl StagingStore for AwsCli {
  async fn upload(&self, local: &Path, bucket: &str, key: &str) -> Result<(), ToolError> {
    let local = local.to_string_lossy();
    let target = format!("s3://{bucket}/{key}");
    info!(source = %local, target = %target, "uploading to staging storage");
    self.call(args(["s3", "cp", &*local, &target])).await?;
    Ok(())
  }

  async fn list_buckets(&self, prefix: &str) -> Result<Vec<String>, ToolError> {
    let out = self.call(args(["s3api", "list-buckets"])).await?;
    parse_bucket_names(&out, prefix)
  }

  async fn remove_bucket(&self, bucket: &str) -> Result<bool, ToolError> {
    let target = format!("s3://{bucket}");
    let result = self.call(args(["s3", "rb", &target, "--force"])).await;
    absent_is_false(result)
  }
}

impl InstanceManager for AwsCli {
  async fn find_instance(&self, tag: &InstanceTag) -> Result<Option<InstanceId>, ToolError> {
    let tag_filter = format!("Name=tag:{},Values={}", tag.key, tag.value);
    let out = self
      .call(args([
        "ec2",
        "describe-instances",
        "--filters",
        &tag_filter,
        "Name=instance-state-name,Values=pending,running",
      ]))
      .await?;
    parse_instance_id(&out)
  }

  async fn ping_status(&self, instance: &InstanceId) -> Result<Option<String>, ToolError> {
    let filter = format!("Key=InstanceIds,Values={instance}");
    let out = self
      .call(args(["ssm", "describe-instance-information", "--filters", &filter]))
      .await?;
    parse_ping_status(&out)
  }

  async fn send_command(&self, request: &CommandRequest) -> Result<String, ToolError> {
    let out = self
      .call(args([
        "ssm",
        "send-command",
        "--instance-ids",
        &request.instance_id.0,
        "--document-name",
        &request.document,
        "--output-s3-bucket-name",
        &request.output_bucket,
        "--output-s3-key-prefix",
        &request.output_prefix,
      ]))
      .await?;
    parse_command_id(&out)
  }
}

fn absent_is_false(result: Result<String, ToolError>) -> Result<bool, ToolError> {
  match result {
    Ok(_) => Ok(true),
    Err(err) if err.is_not_found() => {
      debug!(error = %err, "resource already absent");
      Ok(false)
    }
    Err(err) => Err(err),
  }
}

fn decode<'a, T: Deserialize<'a>>(what: &str, json: &'a str) -> Result<T, ToolError> {
  serde_json::from_str(json).map_err(|e| ToolError::decode(what, e))
}

#[derive(Deserialize)]
struct StartBuildOutput {
  build: BuildInfo,
}

#[derive(Deserialize)]
struct BuildInfo {
  id: String,
}

fn parse_build_id(json: &str) -> Result<String, ToolError> {
  let out: StartBuildOutput = decode("codebuild start-build", json)?;
  Ok(out.build.id)
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListBucketsOutput {
  #[serde(default)]
  buckets: Vec<Bucket>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Bucket {
  name: String,
}

fn parse_bucket_names(json: &str, prefix: &str) -> Result<Vec<String>, ToolError> {
  let out: ListBucketsOutput = decode("s3api list-buckets", json)?;
  Ok(
    out
      .buckets
      .into_iter()
      .map(|b| b.name)
      .filter(|name| name.starts_with(prefix))
      .collect(),
  )
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstancesOutput {
  #[serde(default)]
  reservations: Vec<Reservation>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Reservation {
  #[serde(default)]
  instances: Vec<Instance>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Instance {
  instance_id: String,
}

fn parse_instance_id(json: &str) -> Result<Option<InstanceId>, ToolError> {
  let out: DescribeInstancesOutput = decode("ec2 describe-instances", json)?;
  Ok(
    out
      .reservations
      .into_iter()
      .flat_map(|r| r.instances)
      .map(|i| InstanceId(i.instance_id))
      .next(),
  )
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstanceInformationOutput {
  #[serde(default)]
  instance_information_list: Vec<InstanceInformation>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstanceInformation {
  ping_status: Option<String>,
}

fn parse_ping_status(json: &str) -> Result<Option<String>, ToolError> {
  let out: InstanceInformationOutput = decode("ssm describe-instance-information", json)?;
  Ok(out.instance_information_list.into_iter().next().and_then(|i| i.ping_status))
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SendCommandOutput {
  command: CommandInfo,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CommandInfo {
  command_id: String,
}

fn parse_command_id(json: &str) -> Result<String, ToolError> {
  let out: SendCommandOutput = decode("ssm send-command", json)?;
  Ok(out.command.command_id)
}
