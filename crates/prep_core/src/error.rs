//! crates/prep_core/src/error.rs
//!
//! Error type shared by the core services.

use crate::ports::PortError;
use uuid::Uuid;

/// Errors returned by the core services.
///
/// `Fetch` and `Write` wrap a failed port call and are safe to retry as a
/// whole operation. The remaining variants describe requests that will fail
/// the same way again.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ServiceError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Failed to fetch {what}: {source}")]
    Fetch {
        what: &'static str,
        #[source]
        source: PortError,
    },
    #[error("Failed to write {what}: {source}")]
    Write {
        what: &'static str,
        #[source]
        source: PortError,
    },
    #[error("Data integrity violation: {0}")]
    DataIntegrity(String),
}

impl ServiceError {
    /// Maps a failed read. Missing and conflicting rows keep their meaning.
    pub fn fetch(what: &'static str) -> impl FnOnce(PortError) -> Self {
        move |source| match source {
            PortError::NotFound(msg) => ServiceError::NotFound(msg),
            PortError::Conflict(msg) => ServiceError::Conflict(msg),
            source => ServiceError::Fetch { what, source },
        }
    }

    /// Maps a failed write. Missing and conflicting rows keep their meaning.
    pub fn write(what: &'static str) -> impl FnOnce(PortError) -> Self {
        move |source| match source {
            PortError::NotFound(msg) => ServiceError::NotFound(msg),
            PortError::Conflict(msg) => ServiceError::Conflict(msg),
            source => ServiceError::Write { what, source },
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Fetch { .. } | ServiceError::Write { .. })
    }
}

/// A convenience type alias for `Result<T, ServiceError>`.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Rejects the nil UUID, which stands in for "no user".
pub(crate) fn require_user(user_id: Uuid) -> ServiceResult<()> {
    if user_id.is_nil() {
        return Err(ServiceError::InvalidInput("user id must not be empty".to_string()));
    }
    Ok(())
}
