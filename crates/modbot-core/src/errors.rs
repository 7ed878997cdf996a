use std::time::Duration;

/// Core error type.
///
/// Adapter crates map their specific errors into this type so the bot core
/// can tell refusals (user-facing) apart from transient collaborator failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("configuration error: {0}")]
    Misconfigured(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("{op} timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    /// Timeouts and platform failures: abandon the operation, never retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Timeout { .. } | Error::External(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
