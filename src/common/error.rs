use thiserror::Error;

pub type Result<T> = std::result::Result<T, GossipError>;

/// Maelstrom error codes surfaced in `error` replies.
pub const NOT_SUPPORTED: u32 = 10;
pub const TEMPORARILY_UNAVAILABLE: u32 = 11;
pub const MALFORMED_REQUEST: u32 = 12;
pub const CRASH: u32 = 13;

#[derive(Error, Debug)]
pub enum GossipError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed {kind} body: {reason}")]
    Malformed { kind: String, reason: String },

    #[error("unsupported message type: {0}")]
    NotSupported(String),

    #[error("{0} received before init")]
    NotInitialised(String),

    #[error("outbound channel closed")]
    Closed,
}

impl GossipError {
    pub fn code(&self) -> u32 {
        match self {
            GossipError::NotSupported(_) => NOT_SUPPORTED,
            GossipError::NotInitialised(_) | GossipError::Closed => TEMPORARILY_UNAVAILABLE,
            GossipError::Json(_) | GossipError::Malformed { .. } => MALFORMED_REQUEST,
            GossipError::Io(_) => CRASH,
        }
    }
}
