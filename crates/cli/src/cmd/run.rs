//! Implementation of the top-level `imgbuild <account> <region> <owner> <repo> <ACTION>` run.
//!
//! Builds the run context, wires the `cdk`/`aws` backends into the
//! orchestrator and reports the outcome.

use std::error::Error as _;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Args;
use tracing::warn;

use imgbuild_lib::cloud::AwsCli;
use imgbuild_lib::consts::{READINESS_POLL_ATTEMPTS, REGISTRY_POLL_ATTEMPTS};
use imgbuild_lib::context::{ContextArgs, DeploymentContext, RunSuffix};
use imgbuild_lib::infra::{CdkCli, DestroyReport};
use imgbuild_lib::poll::{PollSettings, TokioClock};
use imgbuild_lib::workflow::{Action, DeployReport, Orchestrator, RunOutcome, Timing, WorkflowState};

use crate::output::{
  OutputFormat, format_elapsed, print_error, print_info, print_json, print_stat, print_success, print_warning, symbols,
};
use crate::signal::interrupt_then_hold;

#[derive(Debug, Args)]
pub struct RunArgs {
  /// AWS account id (12 digits)
  pub account: String,

  /// AWS region, e.g. us-west-2
  pub region: String,

  /// Owner of the source repository
  pub repo_owner: String,

  /// Name of the source repository; prefixes every resource name
  pub repo_name: String,

  /// One of DEPLOY, DIFF, SYNTH, DESTROY
  pub action: String,

  /// Wait before probing the Windows build instance
  #[arg(long, value_parser = humantime::parse_duration, default_value = "10m")]
  pub boot_wait: Duration,

  /// Interval between registry listings while watching for images
  #[arg(long, value_parser = humantime::parse_duration, default_value = "5m")]
  pub registry_interval: Duration,

  /// Interval between management agent status probes
  #[arg(long, value_parser = humantime::parse_duration, default_value = "1m")]
  pub readiness_interval: Duration,
}

impl RunArgs {
  fn timing(&self) -> Timing {
    Timing {
      registry: PollSettings::new(REGISTRY_POLL_ATTEMPTS, self.registry_interval),
      readiness: PollSettings::new(READINESS_POLL_ATTEMPTS, self.readiness_interval),
      boot_wait: self.boot_wait,
    }
  }
}

/// Execute one run.
///
/// Returns the process exit code: success for completed and unsupported
/// actions, failure when the workflow failed. An unsupported action returns
/// before the run context is built. Errors setting up the run itself are
/// returned as `Err`.
pub fn cmd_run(args: RunArgs, output: OutputFormat) -> Result<ExitCode> {
  // Unknown actions never need a valid context.
  if let Err(unsupported) = args.action.parse::<Action>() {
    warn!(action = %unsupported.0, "unsupported action, nothing to do");
    print_warning(&unsupported.to_string());
    return Ok(ExitCode::SUCCESS);
  }

  let timing = args.timing();
  let ctx = DeploymentContext::from_env(
    ContextArgs {
      account: args.account,
      region: args.region,
      repo_owner: args.repo_owner,
      repo_name: args.repo_name,
    },
    RunSuffix::now(),
  )
  .context("Invalid run configuration")?;

  let infra = CdkCli::from_env();
  let cloud = AwsCli::from_env(ctx.region.clone());
  let clock = TokioClock;
  let mut orchestrator = Orchestrator::new(&ctx, &infra, &cloud, &clock, timing);

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let started = Instant::now();
  let result = rt.block_on(orchestrator.dispatch(&args.action, interrupt_then_hold()));
  let elapsed = started.elapsed();

  match result {
    Ok(outcome) => {
      report_outcome(&outcome, orchestrator.history(), elapsed, output.is_json())?;
      Ok(ExitCode::SUCCESS)
    }
    Err(err) => {
      print_error(&format!("{} failed after {}: {}", args.action, format_elapsed(elapsed), err));
      let mut source = err.source();
      while let Some(cause) = source {
        eprintln!("  caused by: {cause}");
        source = cause.source();
      }
      if orchestrator.history().len() > 1 {
        eprintln!("  states: {}", format_history(orchestrator.history()));
      }
      Ok(ExitCode::FAILURE)
    }
  }
}

fn report_outcome(outcome: &RunOutcome, history: &[WorkflowState], elapsed: Duration, json: bool) -> Result<()> {
  match outcome {
    RunOutcome::Unsupported(unsupported) => {
      print_warning(&unsupported.to_string());
      Ok(())
    }
    RunOutcome::Deployed(report) if json => print_json(&serde_json::json!({
      "report": report,
      "states": history,
      "elapsed_secs": elapsed.as_secs(),
    })),
    RunOutcome::Deployed(report) => {
      print_deploy(report, history, elapsed);
      Ok(())
    }
    RunOutcome::Previewed { action, output } if json => print_json(&serde_json::json!({
      "action": action.as_str(),
      "output": output,
    })),
    RunOutcome::Previewed { action, output } => {
      if !output.is_empty() {
        println!("{output}");
      }
      print_success(&format!("{action} complete in {}", format_elapsed(elapsed)));
      Ok(())
    }
    RunOutcome::Destroyed(report) if json => print_json(report),
    RunOutcome::Destroyed(report) => {
      print_destroy(report, elapsed);
      Ok(())
    }
  }
}

fn print_deploy(report: &DeployReport, history: &[WorkflowState], elapsed: Duration) {
  print_success(&format!("Deploy complete in {}", format_elapsed(elapsed)));
  print_stat("Run", report.run_suffix.as_str());
  for build in &report.linux_builds {
    print_stat(&format!("Linux build ({})", build.arch), &build.build_id);
  }
  print_stat("Windows instance", &report.windows.instance_id.to_string());
  print_stat("Windows command", &report.windows.command_id);
  for watch in &report.watched {
    print_stat(
      &format!("{} images", watch.kind),
      &format!("{} after {} attempt(s)", watch.repository, watch.attempts),
    );
  }
  print_stat("States", &format_history(history));
  print_info(&format!("Torn down {}", report.teardown.stack_pattern));
}

fn print_destroy(report: &DestroyReport, elapsed: Duration) {
  print_success(&format!("Destroy complete in {}", format_elapsed(elapsed)));
  print_stat("Stacks", &report.stack_pattern);
  print_stat("Buckets removed", &report.buckets_removed.len().to_string());
  print_stat("Repositories removed", &report.repositories_removed.len().to_string());
}

fn format_history(history: &[WorkflowState]) -> String {
  history
    .iter()
    .map(WorkflowState::to_string)
    .collect::<Vec<_>>()
    .join(&format!(" {} ", symbols::ARROW))
}
