use std::fmt;

use thiserror::Error;

/// Classification of a failed single fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    Timeout,
    Network,
    Body,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    WorkerPanicked,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Body => write!(f, "failed to read body"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::WorkerPanicked => write!(f, "worker panicked"),
        }
    }
}

/// A failed single fetch: which URL, what kind, and the underlying cause.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to fetch '{url}': {kind}: {message}")]
pub struct FetchError {
    pub url: String,
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(url: impl Into<String>, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind,
            message: message.into(),
        }
    }
}

/// Why a batch was canceled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The caller's cancellation token fired.
    Parent,
    /// The batch-wide timeout elapsed.
    BatchDeadline,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Parent => write!(f, "canceled by caller"),
            CancelReason::BatchDeadline => write!(f, "batch deadline exceeded"),
        }
    }
}

/// Non-success outcome of a pipeline run. Results are never partially delivered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("fetch canceled: {0}")]
    Canceled(CancelReason),
}

impl PipelineError {
    pub fn is_canceled(&self) -> bool {
        matches!(self, PipelineError::Canceled(_))
    }
}
