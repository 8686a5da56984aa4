//! Sink configuration.
//!
//! A [`SinkConfig`] is read from JSON (every field has a default) and can be
//! overridden from prefixed environment variables:
//!
//! | Variable                      | Field               |
//! |-------------------------------|---------------------|
//! | `{PREFIX}BUCKET`              | `bucket`            |
//! | `{PREFIX}COMPRESSION_TYPE`    | `compression_type`  |
//! | `{PREFIX}COMPRESSION_LEVEL`   | `compression_level` |
//! | `{PREFIX}RECORD_VIEW`         | `record_view`       |
//! | `{PREFIX}CSV_DELIMITER`       | `csv.delimiter`     |
//! | `{PREFIX}CSV_NULL_VALUE`      | `csv.null_value`    |

use crate::convert::{CsvConverter, CsvConverterConfig};
use crate::io::cloud::ObjectIO;
use crate::io::cloud::helpers::config_from_env;
use crate::io::compression::CompressionType;
use crate::io::storage::{LocalStorage, ObjectStorage, OutputStorage};
use crate::view::RecordViewKind;
use crate::writer::CsvRecordWriterProvider;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Everything needed to build a [`CsvRecordWriterProvider`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SinkConfig {
    pub bucket: String,
    pub compression_type: CompressionType,
    pub compression_level: Option<u32>,
    pub record_view: RecordViewKind,
    pub csv: CsvConverterConfig,
}

impl SinkConfig {
    /// Parse and validate a JSON document.
    ///
    /// # Errors
    /// Returns an error on malformed JSON, unknown fields, or invalid values.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("parse sink config")?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or fails [`Self::from_json_str`].
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))?;
        Self::from_json_str(&json).with_context(|| format!("load {}", path.display()))
    }

    /// Apply overrides from environment variables starting with `prefix`.
    ///
    /// # Errors
    /// See [`Self::with_overrides`].
    pub fn from_env(self, prefix: &str) -> Result<Self> {
        self.with_overrides(&config_from_env(prefix))
    }

    /// Apply overrides keyed by lowercase field name (`bucket`,
    /// `compression_type`, `compression_level`, `record_view`,
    /// `csv_delimiter`, `csv_null_value`). Unknown keys are ignored.
    ///
    /// # Errors
    /// Returns an error if a value cannot be parsed or the result is invalid.
    pub fn with_overrides(mut self, overrides: &HashMap<String, String>) -> Result<Self> {
        if let Some(bucket) = overrides.get("bucket") {
            self.bucket.clone_from(bucket);
        }
        if let Some(v) = overrides.get("compression_type") {
            self.compression_type = v.parse().map_err(anyhow::Error::msg)?;
        }
        if let Some(v) = overrides.get("compression_level") {
            self.compression_level = Some(
                v.trim()
                    .parse()
                    .with_context(|| format!("parse compression level '{v}'"))?,
            );
        }
        if let Some(v) = overrides.get("record_view") {
            self.record_view = v.parse().map_err(anyhow::Error::msg)?;
        }
        if let Some(v) = overrides.get("csv_delimiter") {
            let mut chars = v.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => self.csv.delimiter = c,
                _ => bail!("CSV delimiter must be a single character, got '{v}'"),
            }
        }
        if let Some(v) = overrides.get("csv_null_value") {
            self.csv.null_value.clone_from(v);
        }
        self.validate()?;
        Ok(self)
    }

    /// Check values that serde alone cannot.
    ///
    /// # Errors
    /// Returns an error for an out-of-range compression level or a
    /// non-ASCII delimiter.
    pub fn validate(&self) -> Result<()> {
        self.compression_type
            .validate_level(self.compression_level)
            .context("invalid compression_level")?;
        CsvConverter::new(self.csv.clone()).context("invalid csv options")?;
        Ok(())
    }

    /// Provider writing into `self.bucket` of `store`.
    ///
    /// # Errors
    /// Returns an error if no bucket is configured or the CSV options are
    /// invalid.
    pub fn object_provider(&self, store: Arc<dyn ObjectIO>) -> Result<CsvRecordWriterProvider> {
        if self.bucket.is_empty() {
            bail!("bucket must be set for object storage");
        }
        let storage = ObjectStorage::new(store, self.bucket.clone())
            .with_compression(self.compression_type, self.compression_level);
        self.provider(Arc::new(storage))
    }

    /// Provider writing below the local directory `root`.
    ///
    /// # Errors
    /// Returns an error if the CSV options are invalid.
    pub fn local_provider(&self, root: impl AsRef<Path>) -> Result<CsvRecordWriterProvider> {
        let storage = LocalStorage::new(root)
            .with_compression(self.compression_type, self.compression_level);
        self.provider(Arc::new(storage))
    }

    fn provider(&self, storage: Arc<dyn OutputStorage>) -> Result<CsvRecordWriterProvider> {
        let converter = CsvConverter::new(self.csv.clone()).context("invalid csv options")?;
        Ok(CsvRecordWriterProvider::new(storage, Arc::new(converter))
            .with_record_view(self.record_view.into_view()))
    }
}
