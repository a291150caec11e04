//! Process signal handling.

use tokio::signal;
use tracing::{error, info, warn};

/// Resolves on the first SIGINT, SIGTERM or SIGHUP.
///
/// A handler that cannot be installed never fires.
pub async fn shutdown_signal() {
  let ctrl_c = async {
    match signal::ctrl_c().await {
      Ok(()) => {}
      Err(e) => {
        error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
      Ok(mut signal) => {
        signal.recv().await;
      }
      Err(e) => {
        error!(error = %e, "failed to install SIGTERM handler");
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(unix)]
  let hangup = async {
    match signal::unix::signal(signal::unix::SignalKind::hangup()) {
      Ok(mut signal) => {
        signal.recv().await;
      }
      Err(e) => {
        error!(error = %e, "failed to install SIGHUP handler");
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();
  #[cfg(not(unix))]
  let hangup = std::future::pending::<()>();

  tokio::select! {
    () = ctrl_c => info!("received Ctrl+C"),
    () = terminate => info!("received SIGTERM"),
    () = hangup => info!("received SIGHUP"),
  }
}

/// Resolves on the first shutdown signal, then keeps answering later ones.
///
/// Once the run is interrupted teardown has to finish; every further signal
/// only reports that it is still in progress.
pub async fn interrupt_then_hold() {
  shutdown_signal().await;
  tokio::spawn(async {
    loop {
      shutdown_signal().await;
      warn!("teardown in progress, waiting for it to finish before exiting");
    }
  });
}
