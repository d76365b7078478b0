use thiserror::Error;

#[derive(Error, Debug)]
pub enum DemesneError {
    #[error("Already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Coordinate already claimed: {0}")]
    AlreadyClaimed(crate::core::types::Coordinate),

    #[error("Not registered: {0}")]
    NotRegistered(String),

    #[error("Not owned by this polity: {0}")]
    NotOwned(crate::core::types::Coordinate),

    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Ambiguous outcome: {0}")]
    AmbiguousOutcome(String),

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Persistence failure: {0}")]
    PersistenceFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DemesneError>;
