//! Error types for the Vellum JSON writer.

use thiserror::Error;

/// Errors produced by the buffered JSON audit-file writer.
#[derive(Debug, Error)]
pub enum WriterError {
    /// Invalid writer configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error while opening, writing, rotating or deleting a log file.
    #[error("I/O error: {0}")]
    Io(String),

    /// Failed to serialize an audit event to JSON bytes.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The audit queue is closed because the writer has shut down.
    #[error("Audit queue closed")]
    QueueClosed,
}

impl WriterError {
    /// Create a new Config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a new I/O error.
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }
}

impl From<std::io::Error> for WriterError {
    fn from(err: std::io::Error) -> Self {
        WriterError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for WriterError {
    fn from(err: serde_json::Error) -> Self {
        WriterError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: WriterError = io_err.into();
        assert!(matches!(err, WriterError::Io(_)));
        assert!(err.to_string().contains("read-only"));
    }

    #[test]
    fn config_error_display() {
        let err = WriterError::config("bad interval");
        assert!(err.to_string().contains("Configuration error"));
    }
}
