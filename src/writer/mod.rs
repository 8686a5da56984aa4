//! Record writers: the per-destination open / write / commit-or-close lifecycle.
//!
//! A [`RecordWriterProvider`] opens one [`RecordWriter`] per destination. The
//! host then calls [`RecordWriter::write`] any number of times (possibly from
//! several threads) and finishes with exactly one of:
//!
//! - [`RecordWriter::commit`] - make everything written durable and visible;
//! - [`RecordWriter::close`] - abandon the destination; nothing becomes visible.
//!
//! ```text
//!            write*
//!           ┌──────┐
//!           ▼      │
//!  open ──► Open ──┘──► commit ──► Committed
//!             │
//!             └───────► close  ──► Closed
//! ```
//!
//! Every call made after a terminal state fails with
//! [`WriterError::InvalidState`](crate::error::WriterError::InvalidState).

mod csv;

pub use self::csv::{CsvRecordWriter, CsvRecordWriterProvider};

use crate::error::WriterError;
use crate::record::SinkRecord;
use std::fmt;

/// Line terminator written after the header and after every row.
#[cfg(windows)]
pub const LINE_SEPARATOR: &str = "\r\n";
/// Line terminator written after the header and after every row.
#[cfg(not(windows))]
pub const LINE_SEPARATOR: &str = "\n";

/// Lifecycle state of a writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriterState {
    Open,
    Committed,
    Closed,
}

impl WriterState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Open)
    }
}

impl fmt::Display for WriterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "open",
            Self::Committed => "committed",
            Self::Closed => "closed",
        })
    }
}

/// Writes records for a single destination.
pub trait RecordWriter: Send + Sync {
    /// Append one record. Records whose view is not a struct are skipped.
    ///
    /// # Errors
    /// Fatal errors on I/O or conversion failure; `InvalidState` once the
    /// writer has been committed or closed. An I/O failure may leave a partial
    /// row behind, so it also closes the writer. A conversion failure appends
    /// nothing and leaves the writer open.
    fn write(&self, record: &SinkRecord) -> Result<(), WriterError>;

    /// Make every appended row durable and visible, then release the stream.
    ///
    /// # Errors
    /// A retriable error when finalizing fails; `InvalidState` when called
    /// after a terminal state.
    fn commit(&self) -> Result<(), WriterError>;

    /// Release the stream without publishing anything.
    ///
    /// # Errors
    /// A fatal error when closing fails; `InvalidState` when called after a
    /// terminal state.
    fn close(&self) -> Result<(), WriterError>;

    fn destination(&self) -> &str;

    fn state(&self) -> WriterState;

    /// Rows appended so far. Dropped records are not counted.
    fn rows(&self) -> usize;
}

/// Opens writers for destinations.
pub trait RecordWriterProvider: Send + Sync {
    /// Open a writer for `filename`.
    ///
    /// # Errors
    /// A fatal error if the output stream cannot be created.
    fn record_writer(&self, filename: &str) -> Result<Box<dyn RecordWriter>, WriterError>;

    /// Extension of the files this provider produces, compression included.
    fn extension(&self) -> String;
}
