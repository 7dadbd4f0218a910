use serde::{Deserialize, Serialize};

/// Lifecycle state of a container handler
///
/// `Rejected` and `Destroyed` are terminal. Whenever source or sink is
/// missing the handler reports `Initializing` if it has never been coupled
/// and `Reattaching` once it has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandlerState {
    Starting,
    Inspecting,
    Rejected,
    Initializing,
    Active,
    Reattaching,
    Destroyed,
}

impl std::fmt::Display for HandlerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandlerState::Starting => write!(f, "starting"),
            HandlerState::Inspecting => write!(f, "inspecting"),
            HandlerState::Rejected => write!(f, "rejected"),
            HandlerState::Initializing => write!(f, "initializing"),
            HandlerState::Active => write!(f, "active"),
            HandlerState::Reattaching => write!(f, "reattaching"),
            HandlerState::Destroyed => write!(f, "destroyed"),
        }
    }
}

/// Why a handler finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    /// Stop notification, duplicate start, or shutdown
    Stopped,
    /// Required environment keys missing
    Rejected,
    InspectFailed,
    AcquireFailed,
}

/// Summary returned by a finished handler task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerExit {
    pub reason: ExitReason,
    /// Stream acquisitions issued, including the first
    pub attachments: u32,
    /// Frames written to a sink
    pub forwarded_frames: u64,
}
