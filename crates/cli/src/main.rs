mod cmd;
mod output;
mod signal;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use crate::cmd::{RunArgs, cmd_run};
use crate::output::{OutputFormat, print_error};

/// imgbuild - Provision, build and verify the CI build images
///
/// DEPLOY provisions the run's infrastructure, triggers the Linux and Windows
/// image builds, waits for every expected image tag and tears the run down.
/// DIFF and SYNTH preview the infrastructure, DESTROY removes everything the
/// project owns.
#[derive(Parser)]
#[command(name = "imgbuild")]
#[command(author, version, about, long_about)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output format for the run report
  #[arg(short = 'o', long, global = true, value_enum, default_value = "text")]
  output: OutputFormat,

  #[command(flatten)]
  run: RunArgs,
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  // RUST_LOG takes precedence over --verbose.
  let level = if cli.verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::builder().with_default_directive(level.into()).from_env_lossy())
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cmd_run(cli.run, cli.output) {
    Ok(code) => code,
    Err(err) => {
      print_error(&format!("{err:#}"));
      ExitCode::FAILURE
    }
  }
}
