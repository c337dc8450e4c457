use std::fmt;

use thiserror::Error;

/// Process lifecycle: `Running -> Draining -> Stopped`, never backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownState {
    #[default]
    Running,
    Draining,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownEvent {
    /// A termination signal arrived.
    TerminationRequested,
    /// Every in-flight dispatch finished inside the grace period.
    Drained,
    /// The grace period elapsed with work still outstanding.
    DeadlineElapsed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid shutdown transition: {event:?} while {from}")]
pub struct InvalidTransition {
    pub from: ShutdownState,
    pub event: ShutdownEvent,
}

impl ShutdownState {
    /// Pure transition function.
    pub fn on(self, event: ShutdownEvent) -> Result<ShutdownState, InvalidTransition> {
        match (self, event) {
            (ShutdownState::Running, ShutdownEvent::TerminationRequested) => {
                Ok(ShutdownState::Draining)
            }
            (ShutdownState::Draining, ShutdownEvent::Drained)
            | (ShutdownState::Draining, ShutdownEvent::DeadlineElapsed) => {
                Ok(ShutdownState::Stopped)
            }
            (from, event) => Err(InvalidTransition { from, event }),
        }
    }

    pub fn is_running(self) -> bool {
        self == ShutdownState::Running
    }
}

impl fmt::Display for ShutdownState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownState::Running => write!(f, "running"),
            ShutdownState::Draining => write!(f, "draining"),
            ShutdownState::Stopped => write!(f, "stopped"),
        }
    }
}
