use formlearn_common::SessionId;
use thiserror::Error;

/// Recoverable conditions reported by the learning engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LearnError {
    /// An operation that needs the Active slot free found a session in it.
    #[error("A learning session is already active: {active}")]
    Conflict { active: SessionId },
    /// The targeted session is not the Active one (finished, cancelled, or unknown).
    #[error("Session is not active: {session_id}")]
    NotActive { session_id: SessionId },
    #[error("No successful sessions to aggregate")]
    NoData,
}
