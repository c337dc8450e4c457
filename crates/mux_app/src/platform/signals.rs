use mux_logging::mux_warn;

/// Resolves on the first SIGINT or SIGTERM.
#[cfg(unix)]
pub async fn wait_for_termination() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(err) => {
            mux_warn!("Could not install SIGTERM handler: {}", err);
            ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
pub async fn wait_for_termination() {
    ctrl_c().await;
}

async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        mux_warn!("Could not listen for Ctrl-C: {}", err);
        std::future::pending::<()>().await;
    }
}
