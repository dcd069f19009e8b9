use thiserror::Error;

/// Failure reported by a `ControlService` call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The controller answered and refused the request.
    #[error("{message}")]
    Remote { status: u16, message: String },
    /// The request never produced an answer.
    #[error("transport error: {0}")]
    Transport(String),
    /// The answer could not be decoded.
    #[error("unexpected response: {0}")]
    Decode(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControlError {
    /// Rejected before any remote call was made.
    #[error("{0}")]
    Validation(String),
    #[error("output is already running")]
    OutputAlreadyRunning,
    #[error("session has been torn down")]
    TornDown,
    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl ControlError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        ControlError::Validation(message.into())
    }

    pub fn is_local(&self) -> bool {
        !matches!(self, ControlError::Service(_))
    }
}

pub type ControlResult<T> = Result<T, ControlError>;
