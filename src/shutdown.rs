use tokio_util::sync::CancellationToken;

/// Install a signal handler for ctrl-c and, on unix, SIGTERM.
///
/// Returns a `CancellationToken` that is cancelled when either signal
/// arrives. The HTTP server stops accepting connections and drains; the
/// retention sweeper exits. Running child processes are not killed.
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => tracing::info!("received ctrl-c, initiating graceful shutdown"),
            _ = terminate => tracing::info!("received SIGTERM, initiating graceful shutdown"),
        }
        trigger.cancel();
    });

    token
}
