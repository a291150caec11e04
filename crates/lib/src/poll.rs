//! Fixed-interval polling.
//!
//! All waiting in a deploy is sleep-then-recheck. [`PollState`] owns the
//! attempt budget and interval; the sleeping itself goes through a [`Clock`]
//! so tests can run the loops against simulated time.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// Source of sleeps for poll loops.
pub trait Clock {
  fn sleep(&self, duration: Duration) -> impl Future<Output = ()>;
}

/// Wall-clock sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
  async fn sleep(&self, duration: Duration) {
    tokio::time::sleep(duration).await;
  }
}

/// Attempt budget and interval for one poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
  pub max_attempts: u32,
  pub interval: Duration,
}

impl PollSettings {
  pub const fn new(max_attempts: u32, interval: Duration) -> Self {
    Self { max_attempts, interval }
  }

  /// Upper bound of time spent sleeping when every attempt fails.
  pub fn budget(&self) -> Duration {
    self.interval * self.max_attempts
  }
}

/// How a poll loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
  /// The check was satisfied on attempt `attempts`.
  Ready { value: T, attempts: u32 },
  /// Every attempt ran without the check being satisfied.
  Exhausted { attempts: u32 },
}

/// State of a single poll loop.
///
/// Created at the start of a wait and consumed by [`PollState::run`]; it is
/// discarded on success or exhaustion.
#[derive(Debug)]
pub struct PollState {
  settings: PollSettings,
  attempt: u32,
}

impl PollState {
  pub fn new(settings: PollSettings) -> Self {
    Self { settings, attempt: 0 }
  }

  pub fn is_exhausted(&self) -> bool {
    self.attempt >= self.settings.max_attempts
  }

  /// Run `check` until it yields `Some`, sleeping `interval` after each
  /// unsatisfied attempt.
  ///
  /// `check` receives the 1-based attempt number. Returning `Ok(None)` means
  /// "not yet"; an `Err` stops the loop immediately. No attempt is made past
  /// `max_attempts`.
  pub async fn run<C, F, Fut, T, E>(mut self, clock: &C, mut check: F) -> Result<PollOutcome<T>, E>
  where
    C: Clock,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
  {
    while !self.is_exhausted() {
      self.attempt += 1;

      if let Some(value) = check(self.attempt).await? {
        return Ok(PollOutcome::Ready {
          value,
          attempts: self.attempt,
        });
      }

      debug!(
        attempt = self.attempt,
        max_attempts = self.settings.max_attempts,
        interval = ?self.settings.interval,
        "condition not met, sleeping"
      );
      clock.sleep(self.settings.interval).await;
    }

    Ok(PollOutcome::Exhausted { attempts: self.attempt })
  }
}
