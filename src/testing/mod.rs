//! Testing utilities for record writers.
//!
//! - **Fixtures**: ready-made records, including change-data envelopes
//! - **Mock I/O**: [`MockStorage`], an [`OutputStorage`](crate::io::storage::OutputStorage)
//!   whose streams can be told to fail at the write, flush or commit step
//!
//! # Quick Start
//!
//! ```
//! use rowsink::testing::*;
//! use rowsink::{CsvConverter, CsvRecordWriterProvider, RecordWriter};
//! use std::sync::Arc;
//!
//! let storage = MockStorage::new();
//! let provider = CsvRecordWriterProvider::new(
//!     Arc::new(storage.clone()),
//!     Arc::new(CsvConverter::default()),
//! );
//! let writer = provider.open("topic-0001").unwrap();
//! for record in scenario_records() {
//!     writer.write(&record).unwrap();
//! }
//! writer.commit().unwrap();
//! assert_eq!(storage.committed_lines("topic-0001.csv").unwrap(), vec!["a,b", "1,x", "2,y"]);
//! ```

mod fixtures;
mod mock_io;

pub use fixtures::*;
pub use mock_io::*;
