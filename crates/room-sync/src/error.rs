use room_core::StoreError;
use thiserror::Error;

/// Failure of a session operation.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Can't retrieve peer identity. Perhaps, daemon is not running")]
    InvalidIdentity,

    #[error("No valid address located")]
    NoAddress,

    #[error("Members were not cached previously")]
    NoMembers,

    #[error("Not joined to a room")]
    NotJoined,

    #[error("Invalid room id: {0}")]
    InvalidRoom(String),

    #[error("Rendezvous rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Unknown result {0}")]
    UnexpectedReply(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid members document: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Storage engine error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;
