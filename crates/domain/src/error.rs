/// Shared error type used across all spindle crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("store: {0}")]
    Store(#[from] sqlx::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("insufficient capacity: {0}")]
    InsufficientCapacity(String),

    /// A row that should exist was not visible yet. Usually a race between
    /// task pickup and the insert that produced the task; expected to
    /// self-heal on retry.
    #[error("lookup: {0}")]
    Lookup(String),

    /// A semantic generation failure: validation, no-progress, or a
    /// generator error response.
    #[error("processing: {0}")]
    Processing(String),

    /// A malformed payload from a generator backend.
    #[error("validation: {0}")]
    Validation(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A malformed range encoding.
    #[error("malformed range: {0}")]
    Format(String),

    /// A data-integrity problem (e.g. an unknown status string in a row).
    #[error("data integrity: {0}")]
    Data(String),
}

impl Error {
    /// Whether the task runner should retry the failed unit of work.
    ///
    /// Lookup errors are expected to self-heal once the racing insert
    /// lands; processing errors are retried to absorb transient generator
    /// flakiness. Everything else is fatal on first occurrence.
    pub fn retryable(&self) -> bool {
        matches!(self, Error::Lookup(_) | Error::Processing(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_and_processing_are_retryable() {
        assert!(Error::Lookup("missing row".into()).retryable());
        assert!(Error::Processing("no progress".into()).retryable());
    }

    #[test]
    fn capacity_and_validation_are_fatal() {
        assert!(!Error::InsufficientCapacity("no generators".into()).retryable());
        assert!(!Error::Validation("bad entry".into()).retryable());
        assert!(!Error::Format("bad range".into()).retryable());
        assert!(!Error::Data("unknown status".into()).retryable());
    }
}
