//! Test doubles for imgbuild-lib.
//!
//! In-memory stand-ins for the clock, the infra tool and the cloud backend.
//! Each records the calls it receives so tests can assert on ordering and
//! counts without touching a real account.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::path::Path;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use crate::cloud::{ArtifactRegistry, BuildService, CommandRequest, InstanceId, InstanceManager, StagingStore};
use crate::context::{ContextArgs, DeploymentContext, InstanceTag, RunSuffix};
use crate::exec::ToolError;
use crate::infra::InfraTool;

fn failure(what: &str, stderr: &str) -> ToolError {
  ToolError::Failed {
    program: "fake".to_string(),
    args: what.to_string(),
    code: Some(1),
    stderr: stderr.to_string(),
  }
}

/// Context for account 620771051181 / us-west-2 / aws/aws-lc at a fixed time.
pub fn test_context() -> DeploymentContext {
  let args = ContextArgs {
    account: "620771051181".to_string(),
    region: "us-west-2".to_string(),
    repo_owner: "aws".to_string(),
    repo_name: "aws-lc".to_string(),
  };
  let suffix = RunSuffix::from_time(Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap());
  DeploymentContext::resolve(args, suffix, |_| None).unwrap()
}

/// [`test_context`] pointing at a temporary directory holding one build script.
pub fn test_context_with_scripts() -> (DeploymentContext, TempDir) {
  let scripts = TempDir::new().unwrap();
  std::fs::write(scripts.path().join("build_images.ps1"), "docker build -t vs2017 .").unwrap();
  let mut ctx = test_context();
  ctx.windows_scripts_dir = scripts.path().to_path_buf();
  (ctx, scripts)
}

/// Clock that records sleeps instead of waiting.
///
/// Each sleep yields once to the scheduler so racing futures get polled.
#[derive(Debug, Default)]
pub struct MockClock {
  sleeps: RefCell<Vec<Duration>>,
}

impl MockClock {
  pub fn sleep_count(&self) -> usize {
    self.sleeps.borrow().len()
  }

  pub fn total_slept(&self) -> Duration {
    self.sleeps.borrow().iter().sum()
  }
}

impl crate::poll::Clock for MockClock {
  async fn sleep(&self, duration: Duration) {
    self.sleeps.borrow_mut().push(duration);
    tokio::task::yield_now().await;
  }
}

/// Infra tool that records stack operations.
#[derive(Debug, Default)]
pub struct FakeInfra {
  calls: RefCell<Vec<String>>,
  last_env: RefCell<Option<BTreeMap<String, String>>>,
  fail_deploy: bool,
  fail_destroy: bool,
}

impl FakeInfra {
  pub fn failing_deploy() -> Self {
    Self {
      fail_deploy: true,
      ..Default::default()
    }
  }

  pub fn failing_destroy() -> Self {
    Self {
      fail_destroy: true,
      ..Default::default()
    }
  }

  pub fn calls(&self) -> Vec<String> {
    self.calls.borrow().clone()
  }

  pub fn destroy_count(&self) -> usize {
    self.calls.borrow().iter().filter(|c| c.starts_with("destroy ")).count()
  }

  pub fn last_env(&self) -> Option<BTreeMap<String, String>> {
    self.last_env.borrow().clone()
  }

  fn record(&self, op: &str, pattern: &str, env: &BTreeMap<String, String>) {
    self.calls.borrow_mut().push(format!("{op} {pattern}"));
    *self.last_env.borrow_mut() = Some(env.clone());
  }
}

impl InfraTool for FakeInfra {
  async fn deploy(&self, pattern: &str, env: &BTreeMap<String, String>) -> Result<(), ToolError> {
    self.record("deploy", pattern, env);
    if self.fail_deploy {
      return Err(failure("deploy", "stack rollback complete"));
    }
    Ok(())
  }

  async fn destroy(&self, pattern: &str, env: &BTreeMap<String, String>) -> Result<(), ToolError> {
    self.record("destroy", pattern, env);
    if self.fail_destroy {
      return Err(failure("destroy", "DELETE_FAILED"));
    }
    Ok(())
  }

  async fn diff(&self, pattern: &str, env: &BTreeMap<String, String>) -> Result<String, ToolError> {
    self.record("diff", pattern, env);
    Ok(format!("Stack {pattern}\nThere were no differences"))
  }

  async fn synth(&self, pattern: &str, env: &BTreeMap<String, String>) -> Result<String, ToolError> {
    self.record("synth", pattern, env);
    Ok("Resources: {}".to_string())
  }
}

/// Cloud backend with scripted responses.
///
/// Scripted sequences (listings, ping statuses) repeat their last entry once
/// exhausted. Repositories without a scripted listing return an empty one.
#[derive(Debug, Default)]
pub struct FakeCloud {
  calls: RefCell<Vec<String>>,
  buckets: RefCell<BTreeSet<String>>,
  repositories: RefCell<BTreeSet<String>>,
  listings: RefCell<HashMap<String, VecDeque<Result<String, String>>>>,
  rejected_builds: BTreeSet<String>,
  instance: Option<InstanceId>,
  ping_statuses: RefCell<VecDeque<Option<String>>>,
  sent: RefCell<Vec<CommandRequest>>,
  uploads: RefCell<Vec<String>>,
  panic_on_describe: bool,
  build_counter: Cell<u32>,
}

impl FakeCloud {
  pub fn with_bucket(self, name: &str) -> Self {
    self.buckets.borrow_mut().insert(name.to_string());
    self
  }

  pub fn with_repository(self, name: &str) -> Self {
    self.repositories.borrow_mut().insert(name.to_string());
    self
  }

  pub fn with_listings(self, repository: &str, listings: Vec<Result<String, String>>) -> Self {
    self
      .listings
      .borrow_mut()
      .insert(repository.to_string(), listings.into_iter().collect());
    self
  }

  /// Every family in `ctx` lists all of its expected tags on the first attempt.
  pub fn with_all_artifacts(mut self, ctx: &DeploymentContext) -> Self {
    for family in ctx.families() {
      self = self.with_listings(&family.repository, vec![Ok(family.tags.join(" "))]);
    }
    self
  }

  pub fn reject_build(mut self, project: &str) -> Self {
    self.rejected_builds.insert(project.to_string());
    self
  }

  pub fn with_instance(mut self, id: &str) -> Self {
    self.instance = Some(InstanceId(id.to_string()));
    self
  }

  pub fn with_ping_statuses(self, statuses: Vec<Option<&str>>) -> Self {
    *self.ping_statuses.borrow_mut() = statuses.into_iter().map(|s| s.map(str::to_string)).collect();
    self
  }

  pub fn panicking_registry(mut self) -> Self {
    self.panic_on_describe = true;
    self
  }

  /// Instance `i-0win`, online on the first probe, all artifacts present.
  pub fn healthy(ctx: &DeploymentContext) -> Self {
    Self::default()
      .with_instance("i-0win")
      .with_ping_statuses(vec![Some("Online")])
      .with_all_artifacts(ctx)
      .with_bucket(&ctx.staging_bucket)
  }

  pub fn calls(&self) -> Vec<String> {
    self.calls.borrow().clone()
  }

  pub fn has_bucket(&self, name: &str) -> bool {
    self.buckets.borrow().contains(name)
  }

  pub fn describe_count(&self, repository: &str) -> usize {
    let needle = format!("describe-images {repository}");
    self.calls.borrow().iter().filter(|c| **c == needle).count()
  }

  pub fn ping_count(&self) -> usize {
    self.calls.borrow().iter().filter(|c| c.starts_with("ping ")).count()
  }

  pub fn sent_commands(&self) -> Vec<CommandRequest> {
    self.sent.borrow().clone()
  }

  pub fn uploads(&self) -> Vec<String> {
    self.uploads.borrow().clone()
  }

  fn record(&self, call: String) {
    self.calls.borrow_mut().push(call);
  }
}

/// Pop the next scripted entry, keeping the last one for repeated calls.
fn next_scripted<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
  if queue.len() > 1 {
    queue.pop_front()
  } else {
    queue.front().cloned()
  }
}

impl BuildService for FakeCloud {
  async fn start_build(&self, project: &str) -> Result<String, ToolError> {
    self.record(format!("start-build {project}"));
    if self.rejected_builds.contains(project) {
      return Err(failure("start-build", "AccountLimitExceededException"));
    }
    let n = self.build_counter.get() + 1;
    self.build_counter.set(n);
    Ok(format!("{project}:build-{n}"))
  }
}

impl ArtifactRegistry for FakeCloud {
  async fn describe_images(&self, repository: &str) -> Result<String, ToolError> {
    self.record(format!("describe-images {repository}"));
    if self.panic_on_describe {
      panic!("registry client blew up");
    }
    let mut listings = self.listings.borrow_mut();
    match listings.get_mut(repository).and_then(next_scripted) {
      Some(Ok(listing)) => Ok(listing),
      Some(Err(stderr)) => Err(failure("describe-images", &stderr)),
      None => Ok(String::new()),
    }
  }

  async fn delete_repository(&self, repository: &str) -> Result<bool, ToolError> {
    self.record(format!("delete-repository {repository}"));
    Ok(self.repositories.borrow_mut().remove(repository))
  }
}

impl StagingStore for FakeCloud {
  async fn upload(&self, _local: &Path, bucket: &str, key: &str) -> Result<(), ToolError> {
    let target = format!("s3://{bucket}/{key}");
    self.record(format!("upload {target}"));
    self.uploads.borrow_mut().push(target);
    Ok(())
  }

  async fn list_buckets(&self, prefix: &str) -> Result<Vec<String>, ToolError> {
    self.record(format!("list-buckets {prefix}"));
    Ok(
      self
        .buckets
        .borrow()
        .iter()
        .filter(|b| b.starts_with(prefix))
        .cloned()
        .collect(),
    )
  }

  async fn remove_bucket(&self, bucket: &str) -> Result<bool, ToolError> {
    self.record(format!("remove-bucket {bucket}"));
    Ok(self.buckets.borrow_mut().remove(bucket))
  }
}

impl InstanceManager for FakeCloud {
  async fn find_instance(&self, tag: &InstanceTag) -> Result<Option<InstanceId>, ToolError> {
    self.record(format!("find-instance {}={}", tag.key, tag.value));
    Ok(self.instance.clone())
  }

  async fn ping_status(&self, instance: &InstanceId) -> Result<Option<String>, ToolError> {
    self.record(format!("ping {instance}"));
    Ok(next_scripted(&mut self.ping_statuses.borrow_mut()).flatten())
  }

  async fn send_command(&self, request: &CommandRequest) -> Result<String, ToolError> {
    self.record(format!("send-command {}", request.instance_id));
    self.sent.borrow_mut().push(request.clone());
    Ok("cmd-0001".to_string())
  }
}
