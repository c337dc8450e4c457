use std::time::Duration;

use clap::{Parser, ValueEnum};
use mux_engine::MuxConfig;
use mux_logging::LogDestination;

const DEFAULT_PORT: u16 = 10000;
const DEFAULT_MAX_CONNS: usize = 100;
const DEFAULT_GRACE_SECS: u64 = 5;

/// Fetches batches of URLs concurrently and returns their bodies as JSON.
#[derive(Debug, Parser)]
#[command(name = "url_mux", version)]
pub struct Args {
    /// Port to listen on.
    #[arg(short = 'p', long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Max concurrent connections (0 -> no limit).
    #[arg(short = 'm', long = "max-conns", default_value_t = DEFAULT_MAX_CONNS)]
    pub max_conns: usize,

    /// Seconds in-flight requests get to finish after a termination signal.
    #[arg(long = "grace-secs", default_value_t = DEFAULT_GRACE_SECS)]
    pub grace_secs: u64,

    /// Where log output goes.
    #[arg(long, value_enum, default_value_t = LogTarget::Both)]
    pub log: LogTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogTarget {
    File,
    Terminal,
    Both,
}

impl From<LogTarget> for LogDestination {
    fn from(target: LogTarget) -> Self {
        match target {
            LogTarget::File => LogDestination::File,
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::Both => LogDestination::Both,
        }
    }
}

impl Args {
    pub fn into_config(self) -> MuxConfig {
        MuxConfig {
            port: self.port,
            max_connections: self.max_conns,
            shutdown_grace: Duration::from_secs(self.grace_secs),
            ..MuxConfig::default()
        }
    }
}
