//! Cancellation plumbing shared by the experiment drivers.

use std::future::Future;
use std::time::Duration;

use log::{info, warn};
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::error::{ExperimentError, Result};

/// Resolves once SIGINT (Ctrl+C) or SIGTERM is received.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("can't listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("can't listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! { _ = ctrl_c => {}, _ = terminate => {}, }
    info!("shutdown signal received");
}

/// Returns a token cancelled on the first shutdown signal.
pub fn cancel_on_signal() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        cancel.cancel();
    });
    token
}

/// Drives `fut` to completion unless the token is cancelled first.
pub async fn cancellable<F: Future>(shutdown: &CancellationToken, fut: F) -> Result<F::Output> {
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => Err(ExperimentError::Interrupted),
        output = fut => Ok(output),
    }
}

pub async fn sleep_or_cancel(shutdown: &CancellationToken, duration: Duration) -> Result<()> {
    cancellable(shutdown, tokio::time::sleep(duration)).await
}
