//! Fake object store for testing.
//!
//! The store lives in memory and can be told to fail upcoming uploads, which
//! is how the retriable commit path is exercised without a real service.

use crate::io::cloud::traits::{CloudIOError, CloudResult, ErrorKind, ObjectIO, ObjectMetadata};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_type: String,
}

// Type aliases for complex nested types
type BucketStorage = Arc<Mutex<HashMap<String, HashMap<String, StoredObject>>>>;

#[derive(Debug, Default)]
struct FaultPlan {
    remaining: usize,
    kind: Option<ErrorKind>,
}

// ============================================================================
// FakeObjectIO
// ============================================================================

/// In-memory [`ObjectIO`]. Clones share the same storage.
#[derive(Clone)]
pub struct FakeObjectIO {
    storage: BucketStorage,
    faults: Arc<Mutex<FaultPlan>>,
    puts: Arc<Mutex<usize>>,
}

impl FakeObjectIO {
    #[must_use]
    pub fn new() -> Self {
        Self {
            storage: Arc::new(Mutex::new(HashMap::new())),
            faults: Arc::new(Mutex::new(FaultPlan::default())),
            puts: Arc::new(Mutex::new(0)),
        }
    }

    /// Make the next `count` uploads fail with `kind`.
    pub fn fail_next_puts(&self, count: usize, kind: ErrorKind) {
        let mut plan = self.faults.lock().expect("fault mutex poisoned");
        plan.remaining = count;
        plan.kind = Some(kind);
    }

    /// Number of upload attempts seen so far, failed ones included.
    #[must_use]
    pub fn put_attempts(&self) -> usize {
        *self.puts.lock().expect("counter mutex poisoned")
    }

    /// Total number of stored objects across all buckets.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.storage
            .lock()
            .expect("storage mutex poisoned")
            .values()
            .map(HashMap::len)
            .sum()
    }

    fn injected_fault(&self, bucket: &str, key: &str) -> Option<CloudIOError> {
        *self.puts.lock().expect("counter mutex poisoned") += 1;
        let mut plan = self.faults.lock().expect("fault mutex poisoned");
        if plan.remaining == 0 {
            return None;
        }
        plan.remaining -= 1;
        let kind = plan.kind.unwrap_or(ErrorKind::ServiceUnavailable);
        Some(CloudIOError::new(
            kind,
            format!("injected failure uploading {bucket}/{key}"),
        ))
    }

    fn metadata(key: &str, object: &StoredObject) -> ObjectMetadata {
        ObjectMetadata {
            key: key.to_string(),
            size: object.data.len() as u64,
            content_type: Some(object.content_type.clone()),
            last_modified: Some(0),
            etag: Some(format!("etag-{key}")),
            custom_metadata: HashMap::new(),
        }
    }
}

impl Default for FakeObjectIO {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectIO for FakeObjectIO {
    fn put_object(&self, bucket: &str, key: &str, data: &[u8]) -> CloudResult<()> {
        self.put_object_with_type(bucket, key, data, DEFAULT_CONTENT_TYPE)
    }

    fn put_object_with_type(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> CloudResult<()> {
        if let Some(err) = self.injected_fault(bucket, key) {
            return Err(err);
        }
        self.storage
            .lock()
            .expect("storage mutex poisoned")
            .entry(bucket.to_string())
            .or_default()
            .insert(
                key.to_string(),
                StoredObject {
                    data: data.to_vec(),
                    content_type: content_type.to_string(),
                },
            );
        Ok(())
    }

    fn get_object(&self, bucket: &str, key: &str) -> CloudResult<Vec<u8>> {
        let storage = self.storage.lock().expect("storage mutex poisoned");
        storage
            .get(bucket)
            .and_then(|b| b.get(key))
            .map(|o| o.data.clone())
            .ok_or_else(|| {
                CloudIOError::new(
                    ErrorKind::NotFound,
                    format!("Object {bucket}/{key} not found"),
                )
            })
    }

    fn delete_object(&self, bucket: &str, key: &str) -> CloudResult<()> {
        if let Some(bucket_map) = self
            .storage
            .lock()
            .expect("storage mutex poisoned")
            .get_mut(bucket)
        {
            bucket_map.remove(key);
        }
        Ok(())
    }

    fn list_objects(&self, bucket: &str, prefix: Option<&str>) -> CloudResult<Vec<ObjectMetadata>> {
        let storage = self.storage.lock().expect("storage mutex poisoned");
        let Some(bucket_map) = storage.get(bucket) else {
            return Ok(Vec::new());
        };

        let mut objects: Vec<ObjectMetadata> = bucket_map
            .iter()
            .filter(|(key, _)| prefix.is_none_or(|p| key.starts_with(p)))
            .map(|(key, object)| Self::metadata(key, object))
            .collect();

        drop(storage);
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    fn object_exists(&self, bucket: &str, key: &str) -> CloudResult<bool> {
        let storage = self.storage.lock().expect("storage mutex poisoned");
        Ok(storage.get(bucket).is_some_and(|b| b.contains_key(key)))
    }

    fn get_metadata(&self, bucket: &str, key: &str) -> CloudResult<ObjectMetadata> {
        let storage = self.storage.lock().expect("storage mutex poisoned");
        storage
            .get(bucket)
            .and_then(|b| b.get(key))
            .map(|object| Self::metadata(key, object))
            .ok_or_else(|| {
                CloudIOError::new(
                    ErrorKind::NotFound,
                    format!("Object {bucket}/{key} not found"),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_injected_failures_are_consumed() {
        let store = FakeObjectIO::new();
        store.fail_next_puts(2, ErrorKind::Network);

        assert_eq!(
            store.put_object("b", "k", b"1").unwrap_err().kind,
            ErrorKind::Network
        );
        assert!(store.put_object("b", "k", b"2").is_err());
        store.put_object("b", "k", b"3").unwrap();

        assert_eq!(store.get_object("b", "k").unwrap(), b"3");
        assert_eq!(store.put_attempts(), 3);
        assert_eq!(store.object_count(), 1);
    }

    #[test]
    fn test_content_type_is_recorded() {
        let store = FakeObjectIO::new();
        store
            .put_object_with_type("b", "a.csv", b"x", "text/csv")
            .unwrap();
        let meta = store.get_metadata("b", "a.csv").unwrap();
        assert_eq!(meta.content_type.as_deref(), Some("text/csv"));
        assert_eq!(meta.size, 1);
    }
}
