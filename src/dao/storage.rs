use std::error::Error;
use thiserror::Error;

/// Result alias for session directory operations.
pub type StorageResult<T> = Result<T, DirectoryError>;

/// Error raised by session directory backends regardless of where sessions live.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The backend could not be reached or answered with a failure.
    #[error("session directory unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A write targeted a session the directory does not know.
    #[error("session `{0}` is not known to the directory")]
    UnknownSession(String),
}

impl DirectoryError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        DirectoryError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
