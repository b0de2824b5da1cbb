use taskwarden_core::loader::LoadError;
use taskwarden_core::policy::{DenyReason, PolicyError};
use taskwarden_core::resource::ResourceKind;
use taskwarden_storage::StorageError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("{0} not found")]
    NotFound(ResourceKind),

    #[error("{0}")]
    Denied(DenyReason),

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl ApiError {
    /// Stable machine-readable code; denials expose their reason code.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::Denied(reason) => reason.code(),
            ApiError::Invalid(_) => "invalid_request",
            ApiError::Conflict(_) => "conflict",
            ApiError::Storage(_) => "internal",
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(kind) => ApiError::NotFound(kind),
            StorageError::Conflict(msg) => ApiError::Conflict(msg),
            StorageError::Internal(msg) => ApiError::Storage(msg),
        }
    }
}

impl From<LoadError> for ApiError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::NotFound(kind) => ApiError::NotFound(kind),
            LoadError::Storage(msg) => ApiError::Storage(msg),
        }
    }
}

impl From<PolicyError> for ApiError {
    fn from(err: PolicyError) -> Self {
        ApiError::Invalid(err.to_string())
    }
}
