use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::Request;
use hyper_util::rt::{TokioIo, TokioTimer};
use mux_logging::{mux_debug, mux_info, mux_warn};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tower::Service;

use crate::{
    router, AcceptError, Dispatcher, FetchPipeline, Fetcher, LimitListener, LimitedConn,
    MuxConfig, ReqwestFetcher, ShutdownCoordinator,
};

const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind port {port}: {source}")]
    Bind { port: u16, source: io::Error },
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// The front end: admission-controlled accept loop feeding the dispatcher.
pub struct HttpMux {
    listener: LimitListener<TcpListener>,
    router: Router,
    coordinator: ShutdownCoordinator,
    config: MuxConfig,
}

impl HttpMux {
    /// Binds `0.0.0.0:<config.port>`.
    pub async fn bind(config: MuxConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(("0.0.0.0", config.port))
            .await
            .map_err(|source| ServerError::Bind {
                port: config.port,
                source,
            })?;
        Self::from_listener(listener, config)
    }

    pub fn from_listener(listener: TcpListener, config: MuxConfig) -> Result<Self, ServerError> {
        let fetcher = ReqwestFetcher::new(config.fetch.clone())?;
        Ok(Self::with_fetcher(listener, config, Arc::new(fetcher)))
    }

    pub fn with_fetcher(listener: TcpListener, config: MuxConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        let coordinator = ShutdownCoordinator::new(config.shutdown_grace);
        let dispatcher = Dispatcher::new(
            FetchPipeline::new(fetcher),
            config.pipeline,
            config.batch_limits(),
            coordinator.clone(),
        );
        if config.max_connections > 0 {
            mux_info!("Max connections set to {}...", config.max_connections);
        }

        Self {
            listener: LimitListener::new(listener, config.max_connections),
            router: router(Arc::new(dispatcher)),
            coordinator,
            config,
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle used to trigger and observe shutdown.
    pub fn coordinator(&self) -> ShutdownCoordinator {
        self.coordinator.clone()
    }

    /// Accepts until the coordinator starts draining. Connections already
    /// admitted keep being served by their own tasks.
    pub async fn run(mut self) -> Result<(), ServerError> {
        let addr = self.listener.local_addr()?;
        let closer = self.listener.closer();
        let draining = self.coordinator.draining_signal();
        mux_info!("HttpMux started. Listening on {}...", addr);

        loop {
            let accepted = tokio::select! {
                biased;
                _ = draining.cancelled() => {
                    closer.close();
                    break;
                }
                accepted = self.listener.accept() => accepted,
            };
            match accepted {
                Ok((conn, remote)) => self.serve(conn, remote),
                Err(AcceptError::Closed) => break,
                Err(AcceptError::Io(err)) => {
                    mux_warn!("Failed to accept connection: {}", err);
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                }
            }
        }

        mux_info!("HttpMux stopped accepting connections.");
        Ok(())
    }

    fn serve(&self, conn: LimitedConn<TcpStream>, remote: SocketAddr) {
        mux_debug!("Incoming connection from {}", remote);
        let router = self.router.clone();
        let draining = self.coordinator.draining_signal();
        let force = self.coordinator.force_signal();
        let mut builder = http1::Builder::new();
        builder
            .timer(TokioTimer::new())
            .header_read_timeout(self.config.header_read_timeout)
            .max_buf_size(self.config.max_header_bytes);

        self.coordinator.spawn_tracked(async move {
            let service = hyper::service::service_fn(move |request: Request<Incoming>| {
                router.clone().call(request)
            });
            let connection = builder.serve_connection(TokioIo::new(conn), service);
            tokio::pin!(connection);

            let served = tokio::select! {
                served = connection.as_mut() => served,
                _ = draining.cancelled() => {
                    connection.as_mut().graceful_shutdown();
                    tokio::select! {
                        served = connection.as_mut() => served,
                        _ = force.cancelled() => {
                            mux_warn!("Force-closing connection from {}", remote);
                            return;
                        }
                    }
                }
            };
            if let Err(err) = served {
                mux_debug!("Connection from {} ended with error: {}", remote, err);
            }
        });
    }
}
