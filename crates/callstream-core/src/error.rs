//! Centralized error types for the call-stream processor.
//!
//! Errors are classified into the kinds from the error-handling design:
//! protocol errors and resource exhaustion are routine and handled inline by
//! the worker that produced them; storage/child-process errors are logged
//! and alarmed but never retried; configuration and fatal errors abort
//! startup or the whole process. No error crosses a worker boundary — each
//! worker matches on `AppError` and decides locally whether to log, alarm,
//! or exit.

use thiserror::Error;

/// Coarse classification used to decide how an error should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unrecognized signature, unknown message id, truncated record, or
    /// voice for an unknown call. Logged and the parser resynchronizes;
    /// never fatal.
    Protocol,
    /// No free feeder or player of the required type. Reported synchronously
    /// as `NOK` to the requester; never queued.
    ResourceExhausted,
    /// Database insert/update failure. Logged, alarmed, in-memory state
    /// advances without rollback or retry.
    Storage,
    /// Encoder or player launch/termination failure.
    ChildProcess,
    /// Malformed or missing configuration. Fatal at startup.
    Config,
    /// Ingress socket bind failure, oversized record, bus creation failure.
    /// Process exits non-zero.
    Fatal,
}

/// Application-wide error type for the call-stream processor.
#[derive(Debug, Error)]
pub enum AppError {
    /// A protocol-level parsing problem (spec.md §7 `ProtocolError`).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// No compatible free feeder or player was available.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// A relational-store operation failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// A child process (encoder or player) failed to launch, write, or
    /// exited non-zero.
    #[error("child process error: {0}")]
    ChildProcess(String),

    /// Configuration was missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),

    /// An unrecoverable condition; the caller should abort the process.
    #[error("fatal error: {0}")]
    Fatal(String),
}

impl AppError {
    /// Returns the coarse [`ErrorKind`] for this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
            Self::Storage(_) => ErrorKind::Storage,
            Self::ChildProcess(_) => ErrorKind::ChildProcess,
            Self::Config(_) => ErrorKind::Config,
            Self::Fatal(_) => ErrorKind::Fatal,
        }
    }

    /// True if this error should never be retried (storage and child-process
    /// errors advance in-memory state rather than retrying per the
    /// propagation policy in spec.md §7).
    #[must_use]
    pub fn is_terminal_for_operation(&self) -> bool {
        matches!(self.kind(), ErrorKind::Storage | ErrorKind::ChildProcess)
    }
}

/// Convenient `Result` alias for application-wide operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Fatal(err.to_string())
    }
}

impl From<tokio_postgres::Error> for AppError {
    fn from(err: tokio_postgres::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for AppError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_error_has_protocol_kind() {
        let err = AppError::Protocol("bad signature".into());
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert!(!err.is_terminal_for_operation());
    }

    #[test]
    fn storage_error_is_terminal_for_operation() {
        let err = AppError::Storage("insert failed".into());
        assert!(err.is_terminal_for_operation());
    }

    #[test]
    fn io_error_converts_to_fatal() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use");
        let err: AppError = io_err.into();
        assert_eq!(err.kind(), ErrorKind::Fatal);
    }
}
