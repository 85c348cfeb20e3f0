use crate::ResourceKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FolioError {
    /// A required field was empty (after trimming) before anything was sent.
    #[error("Validation error: {0} is required")]
    MissingField(&'static str),
    /// The input was rejected, either locally or by the backend with a 4xx
    /// status and a message. The message is kept verbatim.
    #[error("Validation error: {0}")]
    Validation(String),
    /// An authenticated call was attempted without a session token.
    #[error("Authentication required")]
    AuthRequired,
    /// The session exists but does not belong to an administrator.
    #[error("Administrator access required")]
    AdminRequired,
    /// The backend rejected the bearer token (Status 401).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    /// The requested record does not exist (Status 404).
    #[error("Not found: {0}")]
    NotFound(String),
    /// The backend is throttling requests (Status 429).
    #[error("Too many requests: {0}")]
    RateLimited(String),
    /// The image host did not accept the upload or did not return a
    /// delivery URL.
    #[error("Image upload failed: {0}")]
    Upload(String),
    /// The proxied image deletion failed.
    #[error("Image deletion failed: {0}")]
    ImageDelete(String),
    /// The backend replied with a success status but `success: false`.
    #[error("Rejected by backend: {0}")]
    Rejected(String),
    /// The request failed to send or its response could not be read.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The request returns a non-OK status code not covered above
    #[error("Status error: {1} (Status {0})")]
    StatusCode(reqwest::StatusCode, String),
    /// The operation is not offered for this resource kind.
    #[error("Unsupported for {0}: {1}")]
    Unsupported(ResourceKind, &'static str),
    /// The backend accepted a write but its reply could not be read, or the
    /// reply never arrived. The write may well have been applied.
    #[error("Write not confirmed: {0}")]
    Unconfirmed(String),
    /// The response from the backend was unexpected.
    #[error("Invariant from {0}: {1}")]
    Invariant(&'static str, String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FolioError {
    /// Errors the user fixes by correcting their input.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::MissingField(_) | Self::Validation(_))
    }

    /// Errors that must end the session and send the user back to login.
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::AuthRequired | Self::AdminRequired | Self::Unauthorized(_)
        )
    }

    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }

    /// Failures worth another attempt after a backoff: everything except auth
    /// failures, which end the session instead.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !self.is_auth_failure()
    }

    /// The backend (or a local check) definitely refused the request, so
    /// nothing was written. Any other failure, a 5xx reply for one, may have
    /// been applied.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        match self {
            Self::MissingField(_)
            | Self::Validation(_)
            | Self::AuthRequired
            | Self::AdminRequired
            | Self::Unauthorized(_)
            | Self::NotFound(_)
            | Self::RateLimited(_)
            | Self::Rejected(_)
            | Self::Unsupported(..)
            | Self::Config(_) => true,
            Self::StatusCode(status, _) => status.is_client_error(),
            _ => false,
        }
    }
}

pub type FolioResult<T> = Result<T, FolioError>;
