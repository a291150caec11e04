//! Artifact registry watcher.
//!
//! Blocks until every expected tag shows up in a repository's image listing.
//! The match is plain substring containment over the raw listing text, not a
//! structured comparison of image tags.

use std::cell::RefCell;

use tracing::{debug, info, warn};

use crate::cloud::ArtifactRegistry;
use crate::error::{Result, WorkflowError};
use crate::poll::{Clock, PollOutcome, PollSettings, PollState};

/// Expected tags not found anywhere in `listing`.
pub fn missing_tags<'t>(listing: &str, expected: &'t [String]) -> Vec<&'t str> {
  expected
    .iter()
    .map(String::as_str)
    .filter(|tag| !listing.contains(tag))
    .collect()
}

pub struct ArtifactWatcher<'a, R, C> {
  registry: &'a R,
  clock: &'a C,
  settings: PollSettings,
}

impl<'a, R, C> ArtifactWatcher<'a, R, C>
where
  R: ArtifactRegistry,
  C: Clock,
{
  pub fn new(registry: &'a R, clock: &'a C, settings: PollSettings) -> Self {
    Self {
      registry,
      clock,
      settings,
    }
  }

  /// Poll `repository` until all of `expected_tags` are present.
  ///
  /// Returns the number of attempts it took. A listing that cannot be
  /// fetched counts as an unsatisfied attempt.
  pub async fn await_artifacts(&self, repository: &str, expected_tags: &[String]) -> Result<u32> {
    info!(
      repository = %repository,
      tags = expected_tags.len(),
      max_attempts = self.settings.max_attempts,
      "waiting for artifacts"
    );

    let last_missing = RefCell::new(expected_tags.to_vec());

    let outcome = PollState::new(self.settings)
      .run(self.clock, |attempt| {
        let last_missing = &last_missing;
        async move {
          let listing = match self.registry.describe_images(repository).await {
            Ok(listing) => listing,
            Err(err) => {
              warn!(repository = %repository, attempt, error = %err, "failed to list images");
              return Ok::<_, WorkflowError>(None);
            }
          };

          let missing = missing_tags(&listing, expected_tags);
          if missing.is_empty() {
            return Ok(Some(()));
          }

          debug!(repository = %repository, attempt, missing = ?missing, "artifacts not yet available");
          *last_missing.borrow_mut() = missing.into_iter().map(str::to_string).collect();
          Ok(None)
        }
      })
      .await?;

    match outcome {
      PollOutcome::Ready { attempts, .. } => {
        info!(repository = %repository, attempts, "all artifacts present");
        Ok(attempts)
      }
      PollOutcome::Exhausted { attempts } => Err(WorkflowError::ArtifactTimeout {
        repository: repository.to_string(),
        attempts,
        missing: last_missing.into_inner(),
      }),
    }
  }
}
