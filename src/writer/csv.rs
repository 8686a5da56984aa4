//! CSV record writer and its provider.
//!
//! Output layout for one destination:
//!
//! ```text
//! <header>\n      only if at least one struct record was accepted
//! <row 1>\n
//! <row n>\n
//! ```
//!
//! The header is emitted by whichever `write` call first accepts a record.
//! The header flag is tested and set while the stream lock is held, so the
//! header always precedes every row even when writes race.

use super::{LINE_SEPARATOR, RecordWriter, RecordWriterProvider, WriterState};
use crate::convert::Converter;
use crate::error::WriterError;
use crate::io::storage::{CompressedOutput, DurableOutputStream, OutputStorage};
use crate::record::SinkRecord;
use crate::view::{RecordView, ValueView, adjusted_filename};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, trace, warn};

const EXTENSION: &str = ".csv";
const FORMAT: &str = "csv";

/// Both layers of the destination's output stream plus the lifecycle state.
struct Streams {
    state: WriterState,
    rows: usize,
    raw: Box<dyn DurableOutputStream>,
    wrapper: CompressedOutput,
}

/// Writes struct records as CSV rows into one destination.
pub struct CsvRecordWriter {
    destination: String,
    converter: Arc<dyn Converter>,
    view: Arc<dyn RecordView>,
    header_written: AtomicBool,
    streams: Mutex<Streams>,
}

impl CsvRecordWriter {
    /// Open `destination` on `storage` and wrap it for compression.
    ///
    /// # Errors
    /// A fatal error if the stream cannot be created or wrapped.
    pub fn open(
        storage: &dyn OutputStorage,
        destination: impl Into<String>,
        converter: Arc<dyn Converter>,
        view: Arc<dyn RecordView>,
    ) -> Result<Self, WriterError> {
        let destination = destination.into();
        let mut raw = storage
            .create(&destination, true, FORMAT)
            .map_err(|e| WriterError::fatal(&destination, e))?;
        let wrapper = raw
            .wrap_for_compression()
            .map_err(|e| WriterError::fatal(&destination, e))?;
        debug!(
            destination = %destination,
            view = view.name(),
            compression = %storage.compression(),
            "opened record writer"
        );
        Ok(Self {
            destination,
            converter,
            view,
            header_written: AtomicBool::new(false),
            streams: Mutex::new(Streams {
                state: WriterState::Open,
                rows: 0,
                raw,
                wrapper,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Streams> {
        // The state field is consistent even after a panic mid-append.
        self.streams.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_open(&self, streams: &Streams, operation: &'static str) -> Result<(), WriterError> {
        if streams.state.is_terminal() {
            return Err(WriterError::InvalidState {
                destination: self.destination.clone(),
                operation,
                state: streams.state,
            });
        }
        Ok(())
    }

    fn append_line(&self, wrapper: &mut CompressedOutput, bytes: &[u8]) -> Result<(), WriterError> {
        wrapper
            .write_all(bytes)
            .and_then(|()| wrapper.write_all(LINE_SEPARATOR.as_bytes()))
            .map_err(|e| WriterError::fatal(&self.destination, e))
    }

    fn append(
        &self,
        streams: &mut Streams,
        header: Option<&[u8]>,
        row: &[u8],
    ) -> Result<(), WriterError> {
        if let Some(header) = header {
            if !self.header_written.swap(true, Ordering::AcqRel) {
                debug!(destination = %self.destination, header = %String::from_utf8_lossy(header), "writing header");
                self.append_line(&mut streams.wrapper, header)?;
            }
        }
        self.append_line(&mut streams.wrapper, row)
    }

    /// End the writer after a failed append. The stream may hold a partial
    /// row, so it must never be committed.
    fn abandon(&self, streams: &mut Streams, err: WriterError) -> WriterError {
        streams.state = WriterState::Closed;
        if let Err(close_err) = streams.wrapper.close() {
            warn!(destination = %self.destination, error = %close_err, "close after failed append");
        }
        warn!(destination = %self.destination, error = %err, "append failed, writer closed");
        err
    }

    /// Whether the header has been emitted.
    #[must_use]
    pub fn header_written(&self) -> bool {
        self.header_written.load(Ordering::Acquire)
    }
}

impl RecordWriter for CsvRecordWriter {
    fn write(&self, record: &SinkRecord) -> Result<(), WriterError> {
        let mut streams = self.lock();
        self.ensure_open(&streams, "write")?;

        // Only structs become rows; anything else is skipped without error.
        let Some(value) = self.view.view(record).filter(|v| v.is_struct()) else {
            trace!(topic = %record.topic, offset = record.offset, "skipping non-struct record");
            return Ok(());
        };
        let schema = self.view.view_schema(record);
        let conversion = |source| WriterError::Conversion {
            topic: record.topic.clone(),
            offset: record.offset,
            source,
        };
        let row = self
            .converter
            .from_record(&record.topic, schema, value)
            .map_err(conversion)?;
        // The header describes this record's columns.
        let header = if self.header_written.load(Ordering::Acquire) {
            None
        } else {
            Some(self.converter.header_for(schema, value).map_err(conversion)?)
        };

        if let Err(err) = self.append(&mut streams, header.as_deref(), &row) {
            return Err(self.abandon(&mut streams, err));
        }
        streams.rows += 1;
        trace!(destination = %self.destination, offset = record.offset, bytes = row.len(), "wrote row");
        Ok(())
    }

    fn commit(&self) -> Result<(), WriterError> {
        let mut streams = self.lock();
        self.ensure_open(&streams, "commit")?;

        // The raw commit completes the wrapper first, so nothing buffered in
        // the encoder is lost; closing the wrapper afterwards only releases it.
        let result = match streams.raw.commit() {
            Ok(()) => streams.wrapper.close(),
            Err(e) => {
                if let Err(close_err) = streams.wrapper.close() {
                    warn!(destination = %self.destination, error = %close_err, "close after failed commit");
                }
                Err(e)
            }
        };
        match result {
            Ok(()) => {
                streams.state = WriterState::Committed;
                info!(destination = %self.destination, "committed");
                Ok(())
            }
            Err(e) => {
                streams.state = WriterState::Closed;
                warn!(destination = %self.destination, error = %e, "commit failed");
                Err(WriterError::retriable(&self.destination, e))
            }
        }
    }

    fn close(&self) -> Result<(), WriterError> {
        let mut streams = self.lock();
        self.ensure_open(&streams, "close")?;
        streams.state = WriterState::Closed;
        streams
            .wrapper
            .close()
            .map_err(|e| WriterError::fatal(&self.destination, e))?;
        debug!(destination = %self.destination, "closed without commit");
        Ok(())
    }

    fn destination(&self) -> &str {
        &self.destination
    }

    fn state(&self) -> WriterState {
        self.lock().state
    }

    fn rows(&self) -> usize {
        self.lock().rows
    }
}

/// Opens [`CsvRecordWriter`]s on an [`OutputStorage`].
#[derive(Clone)]
pub struct CsvRecordWriterProvider {
    storage: Arc<dyn OutputStorage>,
    converter: Arc<dyn Converter>,
    view: Arc<dyn RecordView>,
}

impl CsvRecordWriterProvider {
    /// A provider serializing the raw record value.
    pub fn new(storage: Arc<dyn OutputStorage>, converter: Arc<dyn Converter>) -> Self {
        Self {
            storage,
            converter,
            view: Arc::new(ValueView),
        }
    }

    #[must_use]
    pub fn with_record_view(mut self, view: Arc<dyn RecordView>) -> Self {
        self.view = view;
        self
    }

    /// Destination name for `filename`, as used by [`Self::open`].
    #[must_use]
    pub fn destination_for(&self, filename: &str) -> String {
        adjusted_filename(self.view.as_ref(), filename, &self.extension())
    }

    /// Open a concrete writer for `filename`.
    ///
    /// # Errors
    /// See [`CsvRecordWriter::open`].
    pub fn open(&self, filename: &str) -> Result<CsvRecordWriter, WriterError> {
        CsvRecordWriter::open(
            self.storage.as_ref(),
            self.destination_for(filename),
            Arc::clone(&self.converter),
            Arc::clone(&self.view),
        )
    }
}

impl RecordWriterProvider for CsvRecordWriterProvider {
    fn record_writer(&self, filename: &str) -> Result<Box<dyn RecordWriter>, WriterError> {
        Ok(Box::new(self.open(filename)?))
    }

    fn extension(&self) -> String {
        format!("{EXTENSION}{}", self.storage.compression().extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::CsvConverter;
    use crate::io::cloud::{FakeObjectIO, ObjectIO};
    use crate::io::compression::CompressionType;
    use crate::io::storage::ObjectStorage;
    use crate::record::Struct;

    fn provider(fake: &FakeObjectIO, compression: CompressionType) -> CsvRecordWriterProvider {
        let storage = ObjectStorage::new(Arc::new(fake.clone()), "bucket")
            .with_compression(compression, None);
        CsvRecordWriterProvider::new(Arc::new(storage), Arc::new(CsvConverter::default()))
    }

    fn row(a: i64, b: &str) -> SinkRecord {
        SinkRecord::new("topic", 0, a, Struct::new().put("a", a).put("b", b))
    }

    #[test]
    fn test_extension_includes_compression() {
        let fake = FakeObjectIO::new();
        assert_eq!(provider(&fake, CompressionType::None).extension(), ".csv");
        assert_eq!(provider(&fake, CompressionType::Gzip).extension(), ".csv.gz");
    }

    #[test]
    fn test_header_written_once_before_rows() {
        let fake = FakeObjectIO::new();
        let writer = provider(&fake, CompressionType::None).open("topic-0001").unwrap();
        assert!(!writer.header_written());

        writer.write(&row(1, "x")).unwrap();
        assert!(writer.header_written());
        writer.write(&row(2, "y")).unwrap();
        writer.commit().unwrap();

        let body = fake.get_object("bucket", "topic-0001.csv").unwrap();
        let expected = ["a,b", "1,x", "2,y"]
            .iter()
            .map(|l| format!("{l}{LINE_SEPARATOR}"))
            .collect::<String>();
        assert_eq!(String::from_utf8(body).unwrap(), expected);
    }

    #[test]
    fn test_calls_after_terminal_state_are_rejected() {
        let fake = FakeObjectIO::new();
        let writer = provider(&fake, CompressionType::None).open("t").unwrap();
        writer.commit().unwrap();
        assert_eq!(writer.state(), WriterState::Committed);

        for err in [
            writer.commit().unwrap_err(),
            writer.close().unwrap_err(),
            writer.write(&row(1, "x")).unwrap_err(),
        ] {
            assert!(matches!(err, WriterError::InvalidState { state: WriterState::Committed, .. }));
            assert!(!err.is_retriable());
        }
    }

    #[test]
    fn test_close_publishes_nothing() {
        let fake = FakeObjectIO::new();
        let writer = provider(&fake, CompressionType::None).open("t").unwrap();
        writer.write(&row(1, "x")).unwrap();
        writer.close().unwrap();
        assert_eq!(writer.state(), WriterState::Closed);
        assert_eq!(fake.object_count(), 0);
    }
}
