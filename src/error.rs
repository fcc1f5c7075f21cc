//! Domain error taxonomy shared by the backend, the accessor and the stage engine.

use thiserror::Error;

/// Stable category of a [`CrmError`], used for exit codes and notification routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    PermissionDenied,
    NotFound,
    Validation,
    Transport,
    TenantMissing,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Validation => "validation",
            ErrorKind::Transport => "transport",
            ErrorKind::TenantMissing => "tenant_missing",
        }
    }

    /// Transport failures are internal; everything else is caused by the user or their data.
    pub fn is_internal(&self) -> bool {
        matches!(self, ErrorKind::Transport)
    }
}

#[derive(Debug, Error)]
pub enum CrmError {
    /// Row-level policy rejected the request for the current tenant.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("{0} not found")]
    NotFound(String),

    /// Form or argument input failed validation. Never reaches the stage engine.
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Backend unavailable: {0}")]
    Transport(String),

    #[error("No organization selected for this session")]
    TenantMissing,
}

impl CrmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CrmError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            CrmError::NotFound(_) => ErrorKind::NotFound,
            CrmError::Validation(_) => ErrorKind::Validation,
            CrmError::Transport(_) => ErrorKind::Transport,
            CrmError::TenantMissing => ErrorKind::TenantMissing,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        CrmError::Validation(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        CrmError::NotFound(what.into())
    }
}

impl From<rusqlite::Error> for CrmError {
    fn from(err: rusqlite::Error) -> Self {
        CrmError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for CrmError {
    fn from(err: serde_json::Error) -> Self {
        CrmError::Transport(format!("malformed row: {}", err))
    }
}

pub type CrmResult<T> = Result<T, CrmError>;
