//! url-mux core: pure batch, job and lifecycle types.
mod batch;
mod job;
mod lifecycle;
mod request;
mod wire;

pub use batch::{dedup_urls, BatchLimits, UrlBatch, ValidationError, DEFAULT_MAX_URLS};
pub use job::{clamp_workers, FetchJob, JobError};
pub use lifecycle::{InvalidTransition, ShutdownEvent, ShutdownState};
pub use request::{RequestId, RequestIds};
pub use wire::{ErrorBody, FetchResult, UrlsRequest};
