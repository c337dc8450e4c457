use std::collections::HashSet;

use thiserror::Error;

use crate::UrlsRequest;

/// Default ceiling on URLs accepted in a single request.
pub const DEFAULT_MAX_URLS: usize = 20;

/// URLs as submitted by one client, duplicates included.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UrlBatch {
    urls: Vec<String>,
}

impl UrlBatch {
    pub fn new(urls: Vec<String>) -> Self {
        Self { urls }
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.urls
    }

    /// Consumes the batch, keeping the first occurrence of every URL.
    pub fn into_distinct(self) -> Vec<String> {
        dedup_urls(self.urls)
    }
}

impl From<Vec<String>> for UrlBatch {
    fn from(urls: Vec<String>) -> Self {
        Self::new(urls)
    }
}

impl From<UrlsRequest> for UrlBatch {
    fn from(request: UrlsRequest) -> Self {
        Self::new(request.urls)
    }
}

/// Removes exact duplicates, keeping first occurrences in input order.
pub fn dedup_urls(urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(urls.len());
    urls.into_iter()
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("More than {max} urls in request ({actual})")]
    TooManyUrls { max: usize, actual: usize },
}

/// Per-deployment limits applied to a batch before any job is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    pub max_urls: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_urls: DEFAULT_MAX_URLS,
        }
    }
}

impl BatchLimits {
    /// Checks the raw (not yet deduplicated) batch against the limits.
    ///
    /// An empty batch passes here; it is rejected by `FetchJob::new`.
    pub fn validate(&self, batch: &UrlBatch) -> Result<(), ValidationError> {
        if batch.len() > self.max_urls {
            return Err(ValidationError::TooManyUrls {
                max: self.max_urls,
                actual: batch.len(),
            });
        }
        Ok(())
    }
}
