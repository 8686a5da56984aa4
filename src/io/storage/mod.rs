//! Durable output streams.
//!
//! A destination is written through two layers:
//!
//! - the **raw layer**, a [`DurableOutputStream`], which owns the staged bytes
//!   and is the only thing that can make them visible ([`DurableOutputStream::commit`]);
//! - the **compression layer**, a [`CompressedOutput`], through which every
//!   byte is appended and which must be closed to release the encoder.
//!
//! Ordering contract: `commit` completes the compression layer first, so every
//! byte still buffered in the encoder reaches the raw layer before the
//! destination is finalized. Closing the compression layer afterwards only
//! releases it. Closing it *without* a commit never publishes anything.
//!
//! Backends:
//! - [`ObjectStorage`] - any [`ObjectIO`](crate::io::cloud::ObjectIO) store; one upload on commit
//! - [`LocalStorage`] - a directory; temp file renamed into place on commit

mod local;
mod object;

pub use local::{LocalOutputStream, LocalStorage};
pub use object::{ObjectOutputStream, ObjectStorage};

use crate::io::compression::{CompressionType, Encoder};
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

/// Factory for per-destination output streams.
pub trait OutputStorage: Send + Sync {
    /// Open the raw stream for `path`.
    ///
    /// `overwrite = false` refuses a destination that already exists. `format`
    /// is a short tag such as `"csv"` used to describe the content.
    ///
    /// # Errors
    /// Returns an error if the destination cannot be prepared.
    fn create(
        &self,
        path: &str,
        overwrite: bool,
        format: &str,
    ) -> io::Result<Box<dyn DurableOutputStream>>;

    /// Compression applied by streams from this storage.
    fn compression(&self) -> CompressionType;
}

/// The raw layer of one destination.
pub trait DurableOutputStream: Send {
    /// Create the compression layer. May be called once per stream.
    ///
    /// # Errors
    /// Returns an error if the stream was already wrapped or the encoder
    /// cannot be created.
    fn wrap_for_compression(&mut self) -> io::Result<CompressedOutput>;

    /// Complete the compression layer and make the destination visible.
    ///
    /// # Errors
    /// Returns an error if flushing or finalizing fails. Nothing is visible
    /// at the destination in that case.
    fn commit(&mut self) -> io::Result<()>;

    fn path(&self) -> &str;
}

type EncoderSlot = Arc<Mutex<Option<Box<dyn Encoder>>>>;

/// The compression layer of one destination.
pub struct CompressedOutput {
    path: String,
    encoder: EncoderSlot,
}

impl CompressedOutput {
    /// Complete and release the encoder. Closing twice is a no-op.
    ///
    /// # Errors
    /// Returns an error if the encoder's trailing bytes cannot be written.
    pub fn close(&mut self) -> io::Result<()> {
        let encoder = lock(&self.encoder, &self.path)?.take();
        match encoder {
            Some(mut encoder) => encoder.complete(),
            None => Ok(()),
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.encoder.lock().map_or(true, |e| e.is_none())
    }

    fn closed_error(&self) -> io::Error {
        io::Error::new(
            io::ErrorKind::BrokenPipe,
            format!("output stream for {} is closed", self.path),
        )
    }
}

impl Write for CompressedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = lock(&self.encoder, &self.path)?;
        match guard.as_mut() {
            Some(encoder) => encoder.write(buf),
            None => Err(self.closed_error()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = lock(&self.encoder, &self.path)?;
        match guard.as_mut() {
            Some(encoder) => encoder.flush(),
            None => Err(self.closed_error()),
        }
    }
}

/// Compression state held by a raw stream: the encoder slot it shares with
/// its [`CompressedOutput`], once one exists.
///
/// Backends keep one of these per stream, call [`CompressionLayer::wrap`]
/// from `wrap_for_compression` and [`CompressionLayer::complete`] at the
/// start of `commit`.
#[derive(Default)]
pub struct CompressionLayer {
    slot: Option<EncoderSlot>,
}

impl CompressionLayer {
    /// Build the compression layer over `sink`.
    ///
    /// # Errors
    /// Returns an error if this layer already wrapped a sink or the encoder
    /// cannot be created.
    pub fn wrap<W>(
        &mut self,
        path: &str,
        sink: W,
        compression: CompressionType,
        level: Option<u32>,
    ) -> io::Result<CompressedOutput>
    where
        W: Write + Send + 'static,
    {
        if self.slot.is_some() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{path} is already wrapped for compression"),
            ));
        }
        let encoder = compression.wrap_writer(sink, level)?;
        let slot: EncoderSlot = Arc::new(Mutex::new(Some(encoder)));
        self.slot = Some(Arc::clone(&slot));
        Ok(CompressedOutput {
            path: path.to_string(),
            encoder: slot,
        })
    }

    /// Push every encoder-buffered byte into the raw sink.
    ///
    /// # Errors
    /// Returns an error if the encoder cannot write its remaining bytes.
    pub fn complete(&self, path: &str) -> io::Result<()> {
        let Some(slot) = &self.slot else {
            return Ok(());
        };
        match lock(slot, path)?.as_mut() {
            Some(encoder) => encoder.complete(),
            None => Ok(()),
        }
    }
}

/// Raw sink shared between a raw stream and its encoder.
pub struct SharedSink<W>(Arc<Mutex<W>>);

impl<W> SharedSink<W> {
    pub const fn new(inner: Arc<Mutex<W>>) -> Self {
        Self(inner)
    }
}

impl<W: Write + Send> Write for SharedSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        lock(&self.0, "raw sink")?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        lock(&self.0, "raw sink")?.flush()
    }
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> io::Result<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|_| io::Error::other(format!("lock for {what} poisoned")))
}

/// Content type recorded for a format tag.
#[must_use]
pub fn content_type_for(format: &str) -> &'static str {
    match format.to_ascii_lowercase().as_str() {
        "csv" => "text/csv",
        "json" | "jsonl" => "application/json",
        _ => "application/octet-stream",
    }
}
