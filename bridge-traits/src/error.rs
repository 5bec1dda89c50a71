use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    /// The host refused the operation (autoplay policy, missing user gesture, ...).
    #[error("Bridge operation rejected: {0}")]
    Rejected(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether the host refused the call rather than failing to perform it.
    pub fn is_rejection(&self) -> bool {
        matches!(self, BridgeError::Rejected(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
