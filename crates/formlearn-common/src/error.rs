use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed observer message: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Invalid session id: {0}")]
    SessionId(#[from] uuid::Error),
}
