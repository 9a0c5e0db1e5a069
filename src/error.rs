//! Error taxonomy shared by the query pipeline.
//!
//! Each error is scoped to a single user action: the UI reports it and the user
//! tries again. Nothing here is fatal to the process.

use std::fmt;
use thiserror::Error;

/// Input field a [`ValidationError`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Mode,
    Keyword,
    SeriesId,
    StartYear,
    EndYear,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Mode => "mode",
            Field::Keyword => "keyword",
            Field::SeriesId => "series_id",
            Field::StartYear => "start_year",
            Field::EndYear => "end_year",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bad or missing input. The user corrects the named field and resubmits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {message}")]
pub struct ValidationError {
    pub field: Field,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: Field, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// What went wrong on the API side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamKind {
    /// Connection, timeout or TLS failure.
    Network,
    /// Non-success HTTP status.
    Status,
    /// The API answered but refused the request (`REQUEST_NOT_PROCESSED`, bad key, quota).
    Rejected,
    /// None of the requested series exist.
    NotFound,
    /// Body could not be decoded as the documented JSON envelope.
    Decode,
}

impl fmt::Display for UpstreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UpstreamKind::Network => "network error",
            UpstreamKind::Status => "http error",
            UpstreamKind::Rejected => "request rejected",
            UpstreamKind::NotFound => "not found",
            UpstreamKind::Decode => "decode error",
        };
        f.write_str(s)
    }
}

/// Failure reported by the API client. Surfaced verbatim, never retried by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("bls api {kind}: {message}")]
pub struct UpstreamError {
    pub kind: UpstreamKind,
    pub message: String,
}

impl UpstreamError {
    pub fn new(kind: UpstreamKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// The raw response did not have the shape expected for the query mode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("record {index}: {message}")]
pub struct ShapeError {
    pub index: usize,
    pub message: String,
}

/// Crate-level error covering one in-flight user action.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error("unexpected response from the BLS API")]
    Shape(#[from] ShapeError),
    #[error("export failed: {0}")]
    Io(#[from] std::io::Error),
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        Error::Io(e.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Io(e.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
