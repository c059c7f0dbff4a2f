use thiserror::Error;

/// Failure taxonomy shared by the synchronous and asynchronous paths.
///
/// Synchronous callers receive these with their original status preserved;
/// the consumer pipeline records them in the audit trail before re-raising.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Non-retryable upstream response outside the mapped 4xx codes.
    #[error("upstream returned status {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Connection-level failure, timeout, or 5xx response. The only
    /// retryable variant; `status` is None when no response was received.
    #[error("transient failure: {message}")]
    Transient { status: Option<u16>, message: String },

    #[error("side effect failed: {0}")]
    SideEffect(String),

    #[error("broker error: {0}")]
    Broker(String),

    #[error("datastore error: {0}")]
    Datastore(String),
}

impl ServiceError {
    /// Maps a received HTTP status to the matching variant.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            400 => ServiceError::Validation(message),
            404 => ServiceError::NotFound(message),
            409 => ServiceError::Conflict(message),
            500..=599 => ServiceError::Transient {
                status: Some(status),
                message,
            },
            _ => ServiceError::Upstream { status, message },
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Transient { .. })
    }

    /// Status code re-signalled to the original caller; 500 when the
    /// failure carries no status of its own.
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::Validation(_) => 400,
            ServiceError::NotFound(_) => 404,
            ServiceError::Conflict(_) => 409,
            ServiceError::Upstream { status, .. } => *status,
            ServiceError::Transient { status, .. } => status.unwrap_or(500),
            ServiceError::SideEffect(_) | ServiceError::Broker(_) | ServiceError::Datastore(_) => {
                500
            }
        }
    }
}
