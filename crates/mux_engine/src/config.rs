use std::time::Duration;

use mux_core::{BatchLimits, DEFAULT_MAX_URLS};

/// Transport-level settings for outbound fetches.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub max_bytes: u64,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            max_bytes: 5 * 1024 * 1024,
            user_agent: concat!("url-mux/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Limits applied to every pipeline run started by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub max_workers: usize,
    /// Zero disables the batch-wide limit.
    pub batch_timeout: Duration,
    /// Zero disables the per-URL limit.
    pub item_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_workers: 4,
            batch_timeout: Duration::from_secs(10),
            item_timeout: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MuxConfig {
    pub port: u16,
    /// Zero disables admission control.
    pub max_connections: usize,
    pub max_urls_per_request: usize,
    pub shutdown_grace: Duration,
    pub header_read_timeout: Duration,
    pub max_header_bytes: usize,
    pub pipeline: PipelineSettings,
    pub fetch: FetchSettings,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            port: 10000,
            max_connections: 100,
            max_urls_per_request: DEFAULT_MAX_URLS,
            shutdown_grace: Duration::from_secs(5),
            header_read_timeout: Duration::from_secs(1),
            max_header_bytes: 1 << 20,
            pipeline: PipelineSettings::default(),
            fetch: FetchSettings::default(),
        }
    }
}

impl MuxConfig {
    pub fn batch_limits(&self) -> BatchLimits {
        BatchLimits {
            max_urls: self.max_urls_per_request,
        }
    }
}
