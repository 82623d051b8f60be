pub mod orchestrator;
pub mod replay;

pub use orchestrator::{BackendFailure, FailureKind, Orchestrator, PublishError};
pub use replay::ReplayDriver;
