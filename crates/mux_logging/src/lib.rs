#![deny(missing_docs)]
//! Shared logging utilities for the url-mux workspace.
//!
//! This crate provides the `mux_*` logging macros used across the codebase,
//! the process logger initialization used by the binary and a minimal test
//! initializer for the global logger.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

/// Directory that holds the process log file, relative to the working directory.
pub const DEFAULT_LOG_DIR: &str = "logs";

/// File name of the combined process log inside the log directory.
pub const LOG_FILE_NAME: &str = "all.log";

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! mux_trace {
    ($($arg:tt)*) => {{
        log::trace!($($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! mux_info {
    ($($arg:tt)*) => {{
        log::info!($($arg)*);
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! mux_debug {
    ($($arg:tt)*) => {{
        log::debug!($($arg)*);
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! mux_warn {
    ($($arg:tt)*) => {{
        log::warn!($($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! mux_error {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
    }};
}

/// Destination for log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogDestination {
    /// Append to `logs/all.log` in the current directory.
    File,
    /// Write to the terminal.
    Terminal,
    /// Write to both the log file and the terminal.
    #[default]
    Both,
}

/// Initialize the process logger with the specified destination.
///
/// For `LogDestination::File` or `Both`, creates the `logs` directory in the
/// current working directory and appends to `logs/all.log`. If the file
/// cannot be opened the logger falls back to the terminal.
pub fn initialize(destination: LogDestination) {
    initialize_with_dir(destination, Path::new(DEFAULT_LOG_DIR));
}

/// Same as [`initialize`], with an explicit log directory.
pub fn initialize_with_dir(destination: LogDestination, log_dir: &Path) {
    let level = LevelFilter::Info;
    let config = build_config();

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    if matches!(destination, LogDestination::File | LogDestination::Both) {
        match open_log_file(log_dir) {
            Ok(file) => loggers.push(WriteLogger::new(level, config.clone(), file)),
            Err(err) => eprintln!(
                "Warning: Could not open log file in {:?}: {}",
                log_dir, err
            ),
        }
    }
    if destination != LogDestination::File || loggers.is_empty() {
        loggers.push(TermLogger::new(
            level,
            config,
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ));
    }

    let _ = CombinedLogger::init(loggers);
}

/// Creates `log_dir` if needed and opens the combined log file for appending.
pub fn open_log_file(log_dir: &Path) -> io::Result<File> {
    fs::create_dir_all(log_dir)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path(log_dir))
}

/// Path of the combined log file inside `log_dir`.
pub fn log_file_path(log_dir: &Path) -> PathBuf {
    log_dir.join(LOG_FILE_NAME)
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build()
}

/// Initializes a simple terminal logger for use in tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
