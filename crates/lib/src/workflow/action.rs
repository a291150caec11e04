use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Top-level actions accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
  Deploy,
  Diff,
  Synth,
  Destroy,
}

impl Action {
  pub fn as_str(&self) -> &'static str {
    match self {
      Action::Deploy => "DEPLOY",
      Action::Diff => "DIFF",
      Action::Synth => "SYNTH",
      Action::Destroy => "DESTROY",
    }
  }
}

impl fmt::Display for Action {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// An action keyword that is not one of [`Action`].
///
/// Not treated as a failure: the run logs a warning and exits successfully.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported action '{0}'; expected one of DEPLOY, DIFF, SYNTH, DESTROY")]
pub struct UnsupportedAction(pub String);

impl FromStr for Action {
  type Err = UnsupportedAction;

  /// Keywords are matched exactly, in upper case.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "DEPLOY" => Ok(Action::Deploy),
      "DIFF" => Ok(Action::Diff),
      "SYNTH" => Ok(Action::Synth),
      "DESTROY" => Ok(Action::Destroy),
      other => Err(UnsupportedAction(other.to_string())),
    }
  }
}
