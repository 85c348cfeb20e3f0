use folio_sdk::FolioError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Client(#[from] FolioError),
    /// The operation was invoked without a valid target, e.g. delete with no
    /// selection.
    #[error("Invalid state: {0}")]
    InvalidState(String),
    /// A newer fetch of the same view superseded this one, or the view was
    /// torn down.
    #[error("Superseded by a newer request")]
    Cancelled,
}

impl AdminError {
    /// The underlying client error, if any.
    #[must_use]
    pub fn client_error(&self) -> Option<&FolioError> {
        match self {
            Self::Client(error) => Some(error),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_validation(&self) -> bool {
        self.client_error().is_some_and(FolioError::is_validation)
    }

    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        self.client_error().is_some_and(FolioError::is_auth_failure)
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

pub type AdminResult<T> = Result<T, AdminError>;
