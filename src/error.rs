//! Error types for record writers and converters.
//!
//! Every failure a writer surfaces is classified exactly once:
//! - [`WriterError::Retriable`] - the commit step failed. Nothing became
//!   visible at the destination, so the caller may reopen it and replay
//!   every record.
//! - everything else is fatal for the destination and must not be retried.
//!
//! Records whose view is not a struct are not errors; they are dropped.

use crate::writer::WriterState;
use std::io;
use thiserror::Error;

/// Failure raised by a [`Converter`](crate::convert::Converter).
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("expected a struct value, got {found}")]
    NotAStruct { found: &'static str },

    #[error("required field '{field}' is missing")]
    MissingField { field: String },

    #[error("CSV encoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to encode nested value as JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV buffer flush failed: {message}")]
    Flush { message: String },

    #[error("CSV delimiter must be a single ASCII character, got '{delimiter}'")]
    InvalidDelimiter { delimiter: char },
}

/// Failure raised by a [`RecordWriter`](crate::writer::RecordWriter).
#[derive(Error, Debug)]
pub enum WriterError {
    /// Appending to or closing the stream failed. Not retriable.
    #[error("I/O failure on {destination}: {source}")]
    Fatal {
        destination: String,
        #[source]
        source: io::Error,
    },

    /// Committing the stream failed. The destination may be retried from scratch.
    #[error("commit of {destination} failed, destination can be retried: {source}")]
    Retriable {
        destination: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to convert record from {topic} at offset {offset}: {source}")]
    Conversion {
        topic: String,
        offset: i64,
        #[source]
        source: ConvertError,
    },

    #[error("{operation} called on {destination} after it was {state}")]
    InvalidState {
        destination: String,
        operation: &'static str,
        state: WriterState,
    },
}

impl WriterError {
    pub(crate) fn fatal(destination: &str, source: io::Error) -> Self {
        Self::Fatal {
            destination: destination.to_string(),
            source,
        }
    }

    pub(crate) fn retriable(destination: &str, source: io::Error) -> Self {
        Self::Retriable {
            destination: destination.to_string(),
            source,
        }
    }

    /// Whether the whole destination may be attempted again.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Retriable { .. })
    }
}
