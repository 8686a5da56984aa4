//! End-user helpers for driving writers.
//!
//! [`write_destination`] runs the whole open → write* → commit sequence for
//! one destination, replaying it from scratch after a retriable failure.

use crate::error::WriterError;
use crate::io::cloud::helpers::{RetryConfig, retry_with_backoff};
use crate::record::SinkRecord;
use crate::writer::{RecordWriter, RecordWriterProvider, WriterState};
use tracing::{debug, warn};

/// Write `records` to `filename` and commit, retrying the whole destination
/// on retriable errors.
///
/// Each attempt opens a fresh writer and replays every record. A fatal error
/// closes the writer and is returned at once.
///
/// # Returns
/// The number of rows in the committed destination. Dropped non-struct
/// records are not counted.
///
/// # Errors
/// The first fatal error, or the last retriable one once `retry` is exhausted.
pub fn write_destination(
    provider: &dyn RecordWriterProvider,
    filename: &str,
    records: &[SinkRecord],
    retry: &RetryConfig,
) -> Result<usize, WriterError> {
    retry_with_backoff(retry, || {
        let writer = provider.record_writer(filename)?;
        if let Err(err) = write_all(writer.as_ref(), records) {
            // A failed append already closed the writer.
            if writer.state() == WriterState::Open {
                if let Err(close_err) = writer.close() {
                    warn!(destination = writer.destination(), error = %close_err, "close after failed write");
                }
            }
            return Err(err);
        }
        writer.commit()?;
        let rows = writer.rows();
        debug!(destination = writer.destination(), records = records.len(), rows, "destination written");
        Ok(rows)
    })
}

fn write_all(writer: &dyn RecordWriter, records: &[SinkRecord]) -> Result<(), WriterError> {
    records.iter().try_for_each(|r| writer.write(r))
}
