mod signals;

use mux_engine::{DrainOutcome, HttpMux, MuxConfig};
use mux_logging::{mux_error, mux_info, mux_warn};

/// Serves until SIGINT/SIGTERM, then drains within the configured grace.
pub async fn run(config: MuxConfig) -> anyhow::Result<()> {
    let mux = HttpMux::bind(config).await?;
    let coordinator = mux.coordinator();
    let server = tokio::spawn(mux.run());

    signals::wait_for_termination().await;
    mux_info!("Termination signal received");

    match coordinator.shutdown().await {
        DrainOutcome::Drained => mux_info!("Server stopped gracefully."),
        DrainOutcome::DeadlineElapsed { abandoned } => mux_warn!(
            "Error occurred during server shutdown: {} connections did not finish in {:?}",
            abandoned,
            coordinator.grace()
        ),
    }

    match server.await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => {
            mux_error!("Error occurred during HTTP server execution: {}", err);
            Err(err.into())
        }
        Err(err) => {
            mux_error!("Server task failed: {}", err);
            Err(err.into())
        }
    }
}
