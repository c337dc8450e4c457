//! url-mux engine: fetching, admission, dispatch and shutdown.
mod admission;
mod config;
mod dispatch;
mod fetch;
mod pipeline;
mod server;
mod shutdown;
mod types;

pub use admission::{
    AcceptError, Acceptor, AcceptorCloser, ConnectionSlot, LimitListener, LimitedConn,
};
pub use config::{FetchSettings, MuxConfig, PipelineSettings};
pub use dispatch::{router, DispatchError, Dispatcher};
pub use fetch::{Fetcher, ReqwestFetcher};
pub use pipeline::FetchPipeline;
pub use server::{HttpMux, ServerError};
pub use shutdown::{DrainOutcome, ShutdownCoordinator};
pub use types::{CancelReason, FailureKind, FetchError, PipelineError};
