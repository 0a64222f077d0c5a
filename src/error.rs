//! Error taxonomy for the comparison engine, the live timer and run commits.
//!
//! Application plumbing (CLI, storage, wizard, TUI) uses `anyhow`; these typed
//! errors are what the session loop inspects to decide between retry and abort.

use thiserror::Error;

pub type Result<T, E = SplitsError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum SplitsError {
    /// Historical data does not match the route shape. Indicates a data integrity
    /// bug upstream and is not recoverable by the user.
    #[error("invalid run data: {reason}")]
    InvalidInput { reason: String },

    #[error("route has no segments; add segments before starting a run")]
    EmptyRoute,

    /// Writing a finished run failed. The run stays in memory and can be retried.
    #[error("failed to save run: {reason}")]
    PersistenceFailure {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("cannot {op} while the timer is {status}")]
    InvalidTransition {
        op: &'static str,
        status: &'static str,
    },
}

impl SplitsError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    pub fn persistence(err: anyhow::Error) -> Self {
        Self::PersistenceFailure {
            reason: format!("{err:#}"),
            source: Some(err.into()),
        }
    }

    /// Only a failed commit can be retried; everything else is a caller bug or bad data.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PersistenceFailure { .. })
    }
}
