//! Error taxonomy for the organize pipeline.
//!
//! Only `ScanError` is fatal to a run. Every other error is captured into
//! the per-file outcome and surfaced through the final report.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while scanning the source directory.
///
/// Any of these aborts the whole run: without a readable root there is
/// nothing to process.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("source directory not found: {0}")]
    RootNotFound(PathBuf),

    #[error("source path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("failed to read source directory {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Per-file analysis failure, carrying the offending path.
#[derive(Debug, Error)]
#[error("analysis failed for {path}: {kind}")]
pub struct AnalysisError {
    pub path: PathBuf,
    pub kind: AnalysisErrorKind,
}

#[derive(Debug, Error)]
pub enum AnalysisErrorKind {
    /// Network-level failure (connect, timeout). Worth retrying.
    #[error("request failed: {0}")]
    Transport(String),

    /// Backend said come back later (429 / 5xx). Worth retrying.
    #[error("backend unavailable ({status}): {message}")]
    Unavailable { status: u16, message: String },

    /// Backend rejected the request outright (4xx). Not retryable.
    #[error("backend rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The backend answered but the payload could not be understood.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Retries exhausted; wraps the message of the last attempt.
    #[error("gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

impl AnalysisError {
    pub fn new(path: impl Into<PathBuf>, kind: AnalysisErrorKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// Whether another attempt has a chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            AnalysisErrorKind::Transport(_) | AnalysisErrorKind::Unavailable { .. }
        )
    }
}

/// Per-file matching failure. The file is recorded as unorganized.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("no destination candidates configured")]
    NoCandidates,
}

/// Per-file file-system failure. The original file is left untouched.
#[derive(Debug, Error)]
pub enum FileOperationError {
    #[error("destination already exists: {0}")]
    DestinationExists(PathBuf),

    #[error("source file missing: {0}")]
    SourceMissing(PathBuf),

    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("backup failed for {path}: {source}")]
    Backup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to {operation} {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level run failure. A run only fails outright when the scan does;
/// everything else ends in a completed `WorkflowResult`.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Scan(#[from] ScanError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_retryable() {
        let err = AnalysisError::new(
            "/videos/a.mp4",
            AnalysisErrorKind::Transport("connection reset".into()),
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn rejected_errors_are_not_retryable() {
        let err = AnalysisError::new(
            "/videos/a.mp4",
            AnalysisErrorKind::Rejected {
                status: 400,
                message: "bad request".into(),
            },
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn unavailable_errors_are_retryable() {
        let err = AnalysisError::new(
            "/videos/a.mp4",
            AnalysisErrorKind::Unavailable {
                status: 429,
                message: "rate limited".into(),
            },
        );
        assert!(err.is_retryable());
    }
}
