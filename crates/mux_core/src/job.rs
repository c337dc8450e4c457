use std::time::Duration;

use thiserror::Error;

use crate::{RequestId, UrlBatch};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("failed to construct a fetch job, urls list is empty")]
    EmptyBatch,
}

/// Parameters of one pipeline run. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchJob {
    rid: RequestId,
    urls: Vec<String>,
    workers: usize,
    batch_timeout: Duration,
    item_timeout: Duration,
}

impl FetchJob {
    /// Deduplicates `batch` and clamps `max_workers` to `[1, distinct urls]`.
    ///
    /// A zero `batch_timeout` or `item_timeout` means no limit at that level.
    pub fn new(
        rid: RequestId,
        batch: impl Into<UrlBatch>,
        max_workers: usize,
        batch_timeout: Duration,
        item_timeout: Duration,
    ) -> Result<Self, JobError> {
        let urls = batch.into().into_distinct();
        if urls.is_empty() {
            return Err(JobError::EmptyBatch);
        }
        let workers = clamp_workers(max_workers, urls.len());

        Ok(Self {
            rid,
            urls,
            workers,
            batch_timeout,
            item_timeout,
        })
    }

    pub fn rid(&self) -> RequestId {
        self.rid
    }

    /// Distinct URLs, first-occurrence order.
    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn batch_timeout(&self) -> Option<Duration> {
        non_zero(self.batch_timeout)
    }

    pub fn item_timeout(&self) -> Option<Duration> {
        non_zero(self.item_timeout)
    }
}

/// Effective worker count: `max(1, min(requested, distinct))`.
pub fn clamp_workers(requested: usize, distinct: usize) -> usize {
    requested.min(distinct).max(1)
}

fn non_zero(timeout: Duration) -> Option<Duration> {
    (!timeout.is_zero()).then_some(timeout)
}
