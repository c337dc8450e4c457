use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque identifier correlating the log lines of one incoming request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rid={}", self.0)
    }
}

/// Monotonic id source owned by whoever dispatches requests.
///
/// Ids start at 1 and are unique per generator, not per process.
#[derive(Debug, Default)]
pub struct RequestIds {
    last: AtomicU64,
}

impl RequestIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> RequestId {
        RequestId(self.last.fetch_add(1, Ordering::Relaxed) + 1)
    }
}
