//! Teardown registration for a deploy.

use tracing::{error, info};

use crate::cloud::{ArtifactRegistry, StagingStore};
use crate::infra::{DestroyReport, InfraTool, Namespace, ProvisionError, Provisioner};

/// A pending destroy of a namespace.
///
/// Registered before the first resource-creating call. [`Teardown::run`]
/// consumes the value, so a registered teardown runs at most once; the deploy
/// flow calls it on every exit path.
#[must_use = "a registered teardown must be run"]
#[derive(Debug)]
pub struct Teardown {
  namespace: Namespace,
  done: bool,
}

impl Teardown {
  pub fn register(namespace: Namespace) -> Self {
    info!(namespace = ?namespace, "teardown registered");
    Self { namespace, done: false }
  }

  pub async fn run<T, S>(mut self, provisioner: &Provisioner<'_, T, S>) -> Result<DestroyReport, ProvisionError>
  where
    T: InfraTool,
    S: StagingStore + ArtifactRegistry,
  {
    self.done = true;
    info!(namespace = ?self.namespace, "running teardown");
    provisioner.destroy(self.namespace).await
  }
}

impl Drop for Teardown {
  fn drop(&mut self) {
    if !self.done {
      error!(namespace = ?self.namespace, "teardown dropped without running; resources may be left behind");
    }
  }
}
