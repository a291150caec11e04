//! imgbuild-lib: orchestration of multi-target build-image runs
//!
//! One deploy provisions per-run infrastructure, starts the Linux image
//! builds on both architectures, dispatches the Windows build to a tagged
//! instance and then waits for every expected image tag to show up in its
//! registry before tearing the run down again:
//! - `context`: the immutable per-run [`context::DeploymentContext`]
//! - `infra`: stack create/destroy/diff/synth through an [`infra::InfraTool`]
//! - `trigger`: Linux and Windows build triggers
//! - `watcher`: registry polling for expected tags
//! - `workflow`: the [`workflow::Orchestrator`] state machine and action dispatch

pub mod cloud;
pub mod consts;
pub mod context;
pub mod error;
pub mod exec;
pub mod family;
pub mod infra;
pub mod poll;
pub mod trigger;
pub mod util;
pub mod watcher;
pub mod workflow;
