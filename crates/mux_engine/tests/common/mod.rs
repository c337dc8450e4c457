#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use mux_core::{FetchResult, RequestId};
use mux_engine::{FailureKind, FetchError, Fetcher};

/// In-memory `Fetcher` with per-URL delays, failures and panics.
#[derive(Default)]
pub struct ScriptedFetcher {
    default_delay: Duration,
    delays: HashMap<String, Duration>,
    failures: HashSet<String>,
    panics: HashSet<String>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn with_delay(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.failures.insert(url.to_string());
        self
    }

    pub fn panicking(mut self, url: &str) -> Self {
        self.panics.insert(url.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(
        &self,
        _rid: RequestId,
        url: &str,
        _timeout: Option<Duration>,
    ) -> Result<FetchResult, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self.delays.get(url).copied().unwrap_or(self.default_delay);
        tokio::time::sleep(delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.panics.contains(url) {
            panic!("scripted panic for {url}");
        }
        if self.failures.contains(url) {
            return Err(FetchError::new(url, FailureKind::Network, "connection refused"));
        }
        Ok(FetchResult {
            url: url.to_string(),
            body: format!("body of {url}"),
        })
    }
}

pub fn urls(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|url| url.to_string()).collect()
}

pub fn sorted_urls(results: &[FetchResult]) -> Vec<String> {
    let mut urls: Vec<String> = results.iter().map(|result| result.url.clone()).collect();
    urls.sort();
    urls
}
