//! # Rowsink
//!
//! **Durable CSV record writers** for sink connectors that land records in
//! object storage or a local directory.
//!
//! A writer owns one destination. It turns every struct-valued record into a
//! CSV row, writes a header line once before the first row, and makes the
//! destination visible only when it is committed.
//!
//! ## Key Features
//!
//! - **Commit-or-nothing destinations** - bytes are staged and published by a single commit
//! - **Header written exactly once** - even when `write` is called from several threads
//! - **Non-struct records are dropped** - scalars and tombstones never become rows
//! - **Retriable commits** - a failed commit is classified so the caller can replay
//! - **Pluggable compression** - gzip, zstd, bzip2 and xz (all optional via feature flags)
//! - **Record views** - write the value itself or the `before`/`after` image of a change event
//!
//! ## Quick Start
//!
//! ```
//! use rowsink::*;
//! use rowsink::io::cloud::{FakeObjectIO, ObjectIO};
//! use std::sync::Arc;
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! let store = Arc::new(FakeObjectIO::new());
//! let storage = ObjectStorage::new(store.clone(), "sink-bucket");
//! let provider = CsvRecordWriterProvider::new(Arc::new(storage), Arc::new(CsvConverter::default()));
//!
//! let writer = provider.record_writer("orders+0+0000000000")?;
//! writer.write(&SinkRecord::new("orders", 0, 0, Struct::new().put("a", 1).put("b", "x")))?;
//! writer.write(&SinkRecord::new("orders", 0, 1, 42))?; // not a struct: dropped
//! writer.commit()?;
//!
//! let body = store.get_object("sink-bucket", "orders+0+0000000000.csv")?;
//! assert_eq!(String::from_utf8(body)?.lines().collect::<Vec<_>>(), ["a,b", "1,x"]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Writers and providers
//!
//! A [`RecordWriterProvider`] opens one [`RecordWriter`] per file name and
//! reports the file extension it appends ([`RecordWriterProvider::extension`]).
//! A writer finishes with exactly one of [`commit`](RecordWriter::commit) or
//! [`close`](RecordWriter::close); anything after that is rejected.
//!
//! ### Storage
//!
//! An [`OutputStorage`] hands out [`DurableOutputStream`]s. The writer appends
//! through the stream's compression layer and commits through the raw layer.
//! See [`io::storage`] for the ordering contract between the two.
//!
//! ### Errors
//!
//! [`WriterError::is_retriable`] is true only for commit failures. Write,
//! close and conversion failures are fatal for the destination.
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events (`debug` for lifecycle, `trace` per row,
//! `info` on commit, `warn` on failures and retries). Install any subscriber
//! to see them.

pub mod config;
pub mod convert;
pub mod error;
pub mod helpers;
pub mod io;
pub mod record;
pub mod testing;
pub mod view;
pub mod writer;

// General re-exports
pub use config::SinkConfig;
pub use convert::{Converter, CsvConverter, CsvConverterConfig};
pub use error::{ConvertError, WriterError};
pub use helpers::write_destination;
pub use io::cloud::helpers::RetryConfig;
pub use io::compression::CompressionType;
pub use io::storage::{DurableOutputStream, LocalStorage, ObjectStorage, OutputStorage};
pub use record::{Field, Schema, SinkRecord, Struct, Value};
pub use view::{AfterView, BeforeView, RecordView, RecordViewKind, ValueView};
pub use writer::{
    CsvRecordWriter, CsvRecordWriterProvider, LINE_SEPARATOR, RecordWriter, RecordWriterProvider,
    WriterState,
};
