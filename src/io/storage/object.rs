//! Object-store backed output streams.
//!
//! Bytes are staged in memory and published with a single upload on commit,
//! so a destination is either absent or complete.

use super::{CompressedOutput, CompressionLayer, DurableOutputStream, OutputStorage, SharedSink};
use super::{content_type_for, lock};
use crate::io::cloud::helpers::validate_key_path;
use crate::io::cloud::ObjectIO;
use crate::io::compression::CompressionType;
use std::io;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// [`OutputStorage`] writing into one bucket of an [`ObjectIO`] store.
#[derive(Clone)]
pub struct ObjectStorage {
    store: Arc<dyn ObjectIO>,
    bucket: String,
    compression: CompressionType,
    level: Option<u32>,
}

impl ObjectStorage {
    pub fn new(store: Arc<dyn ObjectIO>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            compression: CompressionType::None,
            level: None,
        }
    }

    #[must_use]
    pub fn with_compression(mut self, compression: CompressionType, level: Option<u32>) -> Self {
        self.compression = compression;
        self.level = level;
        self
    }

    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

impl OutputStorage for ObjectStorage {
    fn create(
        &self,
        path: &str,
        overwrite: bool,
        format: &str,
    ) -> io::Result<Box<dyn DurableOutputStream>> {
        validate_key_path(path)?;
        if !overwrite && self.store.object_exists(&self.bucket, path)? {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{}/{path} already exists", self.bucket),
            ));
        }
        debug!(bucket = %self.bucket, key = path, format, "created object output stream");
        Ok(Box::new(ObjectOutputStream {
            store: Arc::clone(&self.store),
            bucket: self.bucket.clone(),
            key: path.to_string(),
            content_type: content_type_for(format),
            compression: self.compression,
            level: self.level,
            staged: Arc::new(Mutex::new(Vec::new())),
            layer: CompressionLayer::default(),
        }))
    }

    fn compression(&self) -> CompressionType {
        self.compression
    }
}

/// Raw stream for one object.
pub struct ObjectOutputStream {
    store: Arc<dyn ObjectIO>,
    bucket: String,
    key: String,
    content_type: &'static str,
    compression: CompressionType,
    level: Option<u32>,
    staged: Arc<Mutex<Vec<u8>>>,
    layer: CompressionLayer,
}

impl ObjectOutputStream {
    /// Bytes staged so far (after compression).
    #[must_use]
    pub fn staged_len(&self) -> usize {
        self.staged.lock().map_or(0, |s| s.len())
    }
}

impl DurableOutputStream for ObjectOutputStream {
    fn wrap_for_compression(&mut self) -> io::Result<CompressedOutput> {
        let sink = SharedSink(Arc::clone(&self.staged));
        self.layer.wrap(&self.key, sink, self.compression, self.level)
    }

    fn commit(&mut self) -> io::Result<()> {
        self.layer.complete(&self.key)?;
        let staged = lock(&self.staged, &self.key)?;
        self.store
            .put_object_with_type(&self.bucket, &self.key, &staged, self.content_type)?;
        debug!(bucket = %self.bucket, key = %self.key, bytes = staged.len(), "uploaded object");
        Ok(())
    }

    fn path(&self) -> &str {
        &self.key
    }
}
