use thiserror::Error;

/// Failures the engine distinguishes between.
///
/// An absent moving average is not represented here: "no data" flows through
/// as `None` and resolves to a neutral signal.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Malformed payload or missing expected fields. Fatal for that event only.
    #[error("decode error: {0}")]
    Decode(String),
    /// Transport or storage failure. Retryable by the caller, never retried here.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The trigger payload as a whole could not be read as a batch.
    #[error("invalid batch envelope: {0}")]
    InvalidEnvelope(String),
}

impl IngestError {
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::StorageUnavailable(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, IngestError::StorageUnavailable(_))
    }
}

impl From<diesel::result::Error> for IngestError {
    fn from(e: diesel::result::Error) -> Self {
        IngestError::StorageUnavailable(e.to_string())
    }
}

impl From<diesel::r2d2::PoolError> for IngestError {
    fn from(e: diesel::r2d2::PoolError) -> Self {
        IngestError::StorageUnavailable(e.to_string())
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(e: serde_json::Error) -> Self {
        IngestError::Decode(e.to_string())
    }
}

pub type IngestResult<T> = Result<T, IngestError>;
