use tokio::select;
use tokio_util::sync::CancellationToken;

/// Turns process signals into a cancellation so every task can settle and
/// persist before exit.
#[cfg(unix)]
pub async fn detect_shutdown(cancellation: CancellationToken) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(e) => {
            tracing::error!("Failed to install SIGTERM handler: {e:?}");
            cancellation.cancelled().await;
            return;
        }
    };

    select! {
        _ = tokio::signal::ctrl_c() => cancellation.cancel(),
        _ = terminate.recv() => cancellation.cancel(),
    };
}

/// Detects signals sent to the process. Detached processes on Windows can't
/// see signals sent to them, so this has limited reach there.
#[cfg(not(unix))]
pub async fn detect_shutdown(cancellation: CancellationToken) {
    select! {
        _ = tokio::signal::ctrl_c() => {
            cancellation.cancel();
        },
    };
}
