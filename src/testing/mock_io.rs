//! In-memory [`OutputStorage`] with injectable failures.
//!
//! Every stream opened from a [`MockStorage`] shares one state block, so a
//! test can keep a clone of the storage, hand another to a provider, and
//! inspect what was published afterwards.

use crate::io::compression::CompressionType;
use crate::io::storage::{
    CompressedOutput, CompressionLayer, DurableOutputStream, OutputStorage, SharedSink,
};
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct MockState {
    committed: HashMap<String, Vec<u8>>,
    opened: Vec<String>,
    fail_writes: bool,
    fail_flush: bool,
    fail_commit: usize,
}

/// Storage that keeps committed destinations in memory.
#[derive(Clone, Default)]
pub struct MockStorage {
    state: Arc<Mutex<MockState>>,
    compression: CompressionType,
}

impl MockStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("mock storage mutex poisoned")
    }

    /// Make every raw write fail from now on.
    pub fn fail_writes(&self, fail: bool) {
        self.state().fail_writes = fail;
    }

    /// Make every raw flush fail from now on.
    pub fn fail_flush(&self, fail: bool) {
        self.state().fail_flush = fail;
    }

    /// Make the next `count` commits fail after the encoder was completed.
    pub fn fail_next_commits(&self, count: usize) {
        self.state().fail_commit = count;
    }

    /// Raw (still compressed) bytes committed at `path`.
    #[must_use]
    pub fn committed(&self, path: &str) -> Option<Vec<u8>> {
        self.state().committed.get(path).cloned()
    }

    /// Decompressed text committed at `path`.
    ///
    /// # Errors
    /// Returns an error if nothing was committed at `path` or the payload
    /// does not decode as UTF-8 in this storage's compression.
    pub fn committed_text(&self, path: &str) -> io::Result<String> {
        let bytes = self.committed(path).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{path} was not committed"))
        })?;
        let decoded = self.compression.decode(&bytes)?;
        String::from_utf8(decoded).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Committed text at `path` split into lines.
    ///
    /// # Errors
    /// See [`Self::committed_text`].
    pub fn committed_lines(&self, path: &str) -> io::Result<Vec<String>> {
        Ok(self
            .committed_text(path)?
            .lines()
            .map(str::to_string)
            .collect())
    }

    /// Committed destinations, sorted.
    #[must_use]
    pub fn committed_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.state().committed.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Every destination opened so far, in order.
    #[must_use]
    pub fn opened(&self) -> Vec<String> {
        self.state().opened.clone()
    }
}

impl OutputStorage for MockStorage {
    fn create(
        &self,
        path: &str,
        overwrite: bool,
        _format: &str,
    ) -> io::Result<Box<dyn DurableOutputStream>> {
        let mut state = self.state();
        if !overwrite && state.committed.contains_key(path) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{path} already exists"),
            ));
        }
        state.opened.push(path.to_string());
        Ok(Box::new(MockOutputStream {
            path: path.to_string(),
            state: Arc::clone(&self.state),
            compression: self.compression,
            staged: Arc::new(Mutex::new(MockSink {
                bytes: Vec::new(),
                state: Arc::clone(&self.state),
            })),
            layer: CompressionLayer::default(),
        }))
    }

    fn compression(&self) -> CompressionType {
        self.compression
    }
}

struct MockSink {
    bytes: Vec<u8>,
    state: Arc<Mutex<MockState>>,
}

impl Write for MockSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.state.lock().expect("mock storage mutex poisoned").fail_writes {
            return Err(io::Error::other("injected write failure"));
        }
        self.bytes.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.state.lock().expect("mock storage mutex poisoned").fail_flush {
            return Err(io::Error::other("injected flush failure"));
        }
        Ok(())
    }
}

struct MockOutputStream {
    path: String,
    state: Arc<Mutex<MockState>>,
    compression: CompressionType,
    staged: Arc<Mutex<MockSink>>,
    layer: CompressionLayer,
}

impl DurableOutputStream for MockOutputStream {
    fn wrap_for_compression(&mut self) -> io::Result<CompressedOutput> {
        let sink = SharedSink::new(Arc::clone(&self.staged));
        self.layer.wrap(&self.path, sink, self.compression, None)
    }

    fn commit(&mut self) -> io::Result<()> {
        self.layer.complete(&self.path)?;
        let bytes = self
            .staged
            .lock()
            .expect("mock sink mutex poisoned")
            .bytes
            .clone();
        let mut state = self.state.lock().expect("mock storage mutex poisoned");
        if state.fail_commit > 0 {
            state.fail_commit -= 1;
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("injected commit failure for {}", self.path),
            ));
        }
        state.committed.insert(self.path.clone(), bytes);
        Ok(())
    }

    fn path(&self) -> &str {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_publishes_and_close_does_not() {
        let storage = MockStorage::new();
        let mut raw = storage.create("a.csv", true, "csv").unwrap();
        let mut out = raw.wrap_for_compression().unwrap();
        out.write_all(b"x\n").unwrap();
        raw.commit().unwrap();
        out.close().unwrap();
        assert_eq!(storage.committed_text("a.csv").unwrap(), "x\n");

        let mut raw = storage.create("b.csv", true, "csv").unwrap();
        let mut out = raw.wrap_for_compression().unwrap();
        out.write_all(b"y\n").unwrap();
        out.close().unwrap();
        assert_eq!(storage.committed_paths(), vec!["a.csv"]);
        assert_eq!(storage.opened(), vec!["a.csv", "b.csv"]);
    }

    #[test]
    fn test_injected_failures() {
        let storage = MockStorage::new();
        let mut raw = storage.create("a.csv", true, "csv").unwrap();
        let mut out = raw.wrap_for_compression().unwrap();

        storage.fail_writes(true);
        assert!(out.write_all(b"x").is_err());
        storage.fail_writes(false);

        storage.fail_next_commits(1);
        assert_eq!(raw.commit().unwrap_err().kind(), io::ErrorKind::TimedOut);
        raw.commit().unwrap();
        assert!(storage.create("a.csv", false, "csv").is_err());
    }
}
