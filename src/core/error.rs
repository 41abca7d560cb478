//! Error taxonomy for the Forest engine.
//!
//! Mirrors the kinds enumerated in the engine specification: each public
//! operation fails with one of these and a human-readable context string.
//! No panics escape the public API; batches roll back on any
//! non-recoverable error.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Id or reference does not resolve.
    NotFound,
    /// Reference matches multiple nodes.
    Ambiguous,
    /// Invariant violation: self-loop, concurrent write, duplicate tag.
    Conflict,
    /// Input does not satisfy a constraint.
    ValidationFailure,
    /// Embedding or LLM provider unreachable or unauthenticated.
    ProviderFailure,
    /// Disk, file system, or temp-file error.
    IOFailure,
    /// Store file held by another process.
    BusyResource,
    /// Cooperative cancellation between checkpoints.
    Cancelled,
    /// Document edit buffer malformed.
    ParseError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Ambiguous => "ambiguous",
            ErrorKind::Conflict => "conflict",
            ErrorKind::ValidationFailure => "validation_failure",
            ErrorKind::ProviderFailure => "provider_failure",
            ErrorKind::IOFailure => "io_failure",
            ErrorKind::BusyResource => "busy_resource",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::ParseError => "parse_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A candidate surfaced when a reference resolves to more than one node.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: String,
    pub title: String,
}

/// Extra structured detail some error kinds carry alongside `context`.
#[derive(Debug, Clone, Default)]
pub struct ErrorDetail {
    pub candidates: Vec<Candidate>,
    pub line: Option<u32>,
    pub scratch_path: Option<std::path::PathBuf>,
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
    pub detail: ErrorDetail,
}

impl Error {
    pub fn new(kind: ErrorKind, context: impl Into<String>) -> Self {
        Error {
            kind,
            context: context.into(),
            detail: ErrorDetail::default(),
        }
    }

    pub fn not_found(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::NotFound, context)
    }

    pub fn conflict(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Conflict, context)
    }

    pub fn validation(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::ValidationFailure, context)
    }

    pub fn ambiguous(context: impl Into<String>, candidates: Vec<Candidate>) -> Self {
        let mut err = Error::new(ErrorKind::Ambiguous, context);
        err.detail.candidates = candidates;
        err
    }

    pub fn parse_error(context: impl Into<String>, line: Option<u32>) -> Self {
        let mut err = Error::new(ErrorKind::ParseError, context);
        err.detail.line = line;
        err
    }

    pub fn with_scratch_path(mut self, path: std::path::PathBuf) -> Self {
        self.detail.scratch_path = Some(path);
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.context)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::new(ErrorKind::IOFailure, err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::new(ErrorKind::IOFailure, format!("serialization error: {}", err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::new(ErrorKind::IOFailure, format!("json error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_tag() {
        let err = Error::not_found("node abc123");
        let msg = format!("{}", err);
        assert!(msg.contains("not_found"));
        assert!(msg.contains("abc123"));
    }

    #[test]
    fn ambiguous_carries_candidates() {
        let err = Error::ambiguous(
            "prefix matches 2 nodes",
            vec![
                Candidate { id: "abc1".into(), title: "A".into() },
                Candidate { id: "abc2".into(), title: "B".into() },
            ],
        );
        assert_eq!(err.kind, ErrorKind::Ambiguous);
        assert_eq!(err.detail.candidates.len(), 2);
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io_err.into();
        assert_eq!(err.kind, ErrorKind::IOFailure);
    }
}
