//! Deploy workflow and top-level action dispatch.
//!
//! A deploy walks `Idle -> Provisioning -> BuildsTriggered -> Watching* ->
//! TornDown`. Teardown of the run namespace is registered on entry to
//! `Provisioning` and runs exactly once however the run ends: success, a
//! failed step, an interrupt, or a panic inside the workflow body.

mod action;
mod teardown;

pub use action::{Action, UnsupportedAction};
pub use teardown::Teardown;

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::cloud::CloudBackend;
use crate::consts::{
  INSTANCE_BOOT_WAIT, READINESS_POLL_ATTEMPTS, READINESS_POLL_INTERVAL, REGISTRY_POLL_ATTEMPTS, REGISTRY_POLL_INTERVAL,
};
use crate::context::{DeploymentContext, RunSuffix};
use crate::error::{Result, WorkflowError};
use crate::family::FamilyKind;
use crate::infra::{DestroyReport, InfraTool, Namespace, Provisioner};
use crate::poll::{Clock, PollSettings};
use crate::trigger::linux::StartedBuild;
use crate::trigger::windows::WindowsDispatch;
use crate::trigger::{LinuxBuildTrigger, WindowsBuildTrigger};
use crate::watcher::ArtifactWatcher;

/// Poll budgets and fixed waits for a deploy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
  pub registry: PollSettings,
  pub readiness: PollSettings,
  pub boot_wait: Duration,
}

impl Default for Timing {
  fn default() -> Self {
    Self {
      registry: PollSettings::new(REGISTRY_POLL_ATTEMPTS, REGISTRY_POLL_INTERVAL),
      readiness: PollSettings::new(READINESS_POLL_ATTEMPTS, READINESS_POLL_INTERVAL),
      boot_wait: INSTANCE_BOOT_WAIT,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
  Success,
  Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WorkflowState {
  Idle,
  Provisioning,
  BuildsTriggered,
  WatchingLinuxArm,
  WatchingLinuxX86,
  WatchingWindows,
  TornDown(Outcome),
}

impl WorkflowState {
  fn watching(kind: FamilyKind) -> Self {
    match kind {
      FamilyKind::LinuxArm => WorkflowState::WatchingLinuxArm,
      FamilyKind::LinuxX86 => WorkflowState::WatchingLinuxX86,
      FamilyKind::Windows => WorkflowState::WatchingWindows,
    }
  }
}

impl fmt::Display for WorkflowState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      WorkflowState::TornDown(outcome) => write!(f, "TornDown({outcome:?})"),
      other => write!(f, "{other:?}"),
    }
  }
}

/// Attempts the watcher needed for one family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FamilyWatch {
  pub kind: FamilyKind,
  pub repository: String,
  pub attempts: u32,
}

/// Summary of a successful deploy.
#[derive(Debug, Clone, Serialize)]
pub struct DeployReport {
  pub run_suffix: RunSuffix,
  pub linux_builds: Vec<StartedBuild>,
  pub windows: WindowsDispatch,
  pub watched: Vec<FamilyWatch>,
  pub teardown: DestroyReport,
}

/// What a dispatched action produced.
#[derive(Debug)]
pub enum RunOutcome {
  Deployed(DeployReport),
  Previewed { action: Action, output: String },
  Destroyed(DestroyReport),
  Unsupported(UnsupportedAction),
}

struct BuildSummary {
  linux_builds: Vec<StartedBuild>,
  windows: WindowsDispatch,
  watched: Vec<FamilyWatch>,
}

pub struct Orchestrator<'a, I, B, C> {
  ctx: &'a DeploymentContext,
  infra: &'a I,
  cloud: &'a B,
  clock: &'a C,
  timing: Timing,
  history: Vec<WorkflowState>,
}

impl<'a, I, B, C> Orchestrator<'a, I, B, C>
where
  I: InfraTool,
  B: CloudBackend,
  C: Clock,
{
  pub fn new(ctx: &'a DeploymentContext, infra: &'a I, cloud: &'a B, clock: &'a C, timing: Timing) -> Self {
    Self {
      ctx,
      infra,
      cloud,
      clock,
      timing,
      history: vec![WorkflowState::Idle],
    }
  }

  /// States visited so far, starting with `Idle`.
  pub fn history(&self) -> &[WorkflowState] {
    &self.history
  }

  pub fn state(&self) -> WorkflowState {
    self.history.last().copied().unwrap_or(WorkflowState::Idle)
  }

  /// Run the workflow selected by `action`.
  ///
  /// Only `DEPLOY` provisions, triggers and watches. `DIFF` and `SYNTH` are
  /// read-only previews, `DESTROY` tears down the long-lived namespace. An
  /// unknown keyword is logged and reported as [`RunOutcome::Unsupported`].
  pub async fn dispatch(&mut self, action: &str, interrupt: impl Future<Output = ()>) -> Result<RunOutcome> {
    let action = match action.parse::<Action>() {
      Ok(action) => action,
      Err(unsupported) => {
        warn!(action = %unsupported.0, "unsupported action, nothing to do");
        return Ok(RunOutcome::Unsupported(unsupported));
      }
    };

    info!(action = %action, account = %self.ctx.account, region = %self.ctx.region, "dispatching");
    let provisioner = Provisioner::new(self.infra, self.cloud, self.ctx);

    match action {
      Action::Deploy => Ok(RunOutcome::Deployed(self.deploy(interrupt).await?)),
      Action::Diff => Ok(RunOutcome::Previewed {
        action,
        output: provisioner.diff().await?,
      }),
      Action::Synth => Ok(RunOutcome::Previewed {
        action,
        output: provisioner.synth().await?,
      }),
      Action::Destroy => Ok(RunOutcome::Destroyed(provisioner.destroy(Namespace::LongLived).await?)),
    }
  }

  /// Provision, trigger both builds, watch every family, tear down.
  ///
  /// `interrupt` resolving aborts the in-flight step; teardown still runs.
  /// Configuration that only a deploy depends on is checked before anything
  /// is provisioned, so a rejected run has nothing to tear down.
  pub async fn deploy(&mut self, interrupt: impl Future<Output = ()>) -> Result<DeployReport> {
    self.ctx.validate_for_deploy()?;
    let provisioner = Provisioner::new(self.infra, self.cloud, self.ctx);

    self.transition(WorkflowState::Provisioning);
    let teardown = Teardown::register(Namespace::Run);

    let body = AssertUnwindSafe(self.provision_and_build(&provisioner)).catch_unwind();
    let result = tokio::select! {
      biased;
      () = interrupt => {
        warn!("interrupted, tearing down; further interrupts are ignored until teardown completes");
        Err(WorkflowError::Interrupted)
      }
      caught = body => caught.unwrap_or_else(|panic| Err(WorkflowError::Panicked(panic_message(panic.as_ref())))),
    };

    let torn_down = teardown.run(&provisioner).await;

    match (result, torn_down) {
      (Ok(summary), Ok(teardown)) => {
        self.transition(WorkflowState::TornDown(Outcome::Success));
        Ok(DeployReport {
          run_suffix: self.ctx.run_suffix.clone(),
          linux_builds: summary.linux_builds,
          windows: summary.windows,
          watched: summary.watched,
          teardown,
        })
      }
      (Ok(_), Err(teardown_err)) => {
        self.transition(WorkflowState::TornDown(Outcome::Failure));
        Err(WorkflowError::Teardown(teardown_err))
      }
      (Err(err), torn_down) => {
        if let Err(teardown_err) = torn_down {
          error!(error = %teardown_err, "teardown after failed deploy was incomplete");
        }
        self.transition(WorkflowState::TornDown(Outcome::Failure));
        Err(err)
      }
    }
  }

  async fn provision_and_build(&mut self, provisioner: &Provisioner<'a, I, B>) -> Result<BuildSummary> {
    provisioner.create().await?;

    let linux_builds = LinuxBuildTrigger::new(self.cloud, self.ctx).start_linux_builds().await?;
    let windows = WindowsBuildTrigger::new(
      self.cloud,
      self.clock,
      self.ctx,
      self.timing.boot_wait,
      self.timing.readiness,
    )
    .start_windows_build()
    .await?;
    self.transition(WorkflowState::BuildsTriggered);

    let watcher = ArtifactWatcher::new(self.cloud, self.clock, self.timing.registry);
    let mut watched = Vec::new();
    for family in self.ctx.families() {
      self.transition(WorkflowState::watching(family.kind));
      let attempts = watcher.await_artifacts(&family.repository, &family.tags).await?;
      watched.push(FamilyWatch {
        kind: family.kind,
        repository: family.repository.clone(),
        attempts,
      });
    }

    Ok(BuildSummary {
      linux_builds,
      windows,
      watched,
    })
  }

  fn transition(&mut self, next: WorkflowState) {
    info!(from = %self.state(), to = %next, "workflow state");
    self.history.push(next);
  }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
  if let Some(msg) = panic.downcast_ref::<&str>() {
    msg.to_string()
  } else if let Some(msg) = panic.downcast_ref::<String>() {
    msg.clone()
  } else {
    "unknown panic".to_string()
  }
}
