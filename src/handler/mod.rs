// Handler module - Per-container forwarding actors and their registry

mod registry;
mod state;
mod task;

pub use registry::{HandlerRef, Registration, Registry};
pub use state::{ExitReason, HandlerExit, HandlerState};
pub use task::{Handler, HandlerContext};
