//! Record-to-bytes conversion.
//!
//! A [`Converter`] turns one struct value into the bytes of a single row
//! (without a line terminator) and describes the header row for that same
//! value. [`CsvConverter`] is the CSV implementation, built on the `csv` crate.

use crate::error::ConvertError;
use crate::record::{Schema, Struct, Value};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Serializes struct values into rows.
///
/// Converters are shared by every writer of a provider and hold no
/// per-destination state.
pub trait Converter: Send + Sync {
    /// Serialize `value` (which originated from `topic`) into one row.
    ///
    /// # Errors
    /// Returns an error if `value` is not a struct or cannot be encoded.
    fn from_record(
        &self,
        topic: &str,
        schema: Option<&Schema>,
        value: &Value,
    ) -> Result<Vec<u8>, ConvertError>;

    /// Header row describing the columns [`Converter::from_record`] emits
    /// for `value`.
    ///
    /// # Errors
    /// Same as [`Converter::from_record`].
    fn header_for(&self, schema: Option<&Schema>, value: &Value) -> Result<Vec<u8>, ConvertError>;
}

/// CSV formatting options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvConverterConfig {
    pub delimiter: char,
    /// Text written for `Null` fields.
    pub null_value: String,
}

impl Default for CsvConverterConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            null_value: String::new(),
        }
    }
}

/// Converts struct values into CSV lines.
///
/// Column order follows the schema when one with fields is supplied,
/// otherwise the struct's own field order.
#[derive(Debug)]
pub struct CsvConverter {
    config: CsvConverterConfig,
    delimiter: u8,
}

impl Default for CsvConverter {
    fn default() -> Self {
        Self {
            config: CsvConverterConfig::default(),
            delimiter: b',',
        }
    }
}

impl CsvConverter {
    /// # Errors
    /// Returns [`ConvertError::InvalidDelimiter`] unless the delimiter is a
    /// single ASCII character.
    pub fn new(config: CsvConverterConfig) -> Result<Self, ConvertError> {
        let delimiter = u8::try_from(config.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or(ConvertError::InvalidDelimiter {
                delimiter: config.delimiter,
            })?;
        Ok(Self { config, delimiter })
    }

    #[must_use]
    pub const fn config(&self) -> &CsvConverterConfig {
        &self.config
    }

    fn encode_line<I, F>(&self, fields: I) -> Result<Vec<u8>, ConvertError>
    where
        I: IntoIterator<Item = F>,
        F: AsRef<[u8]>,
    {
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        wtr.write_record(fields)?;
        let mut line = wtr.into_inner().map_err(|e| ConvertError::Flush {
            message: e.to_string(),
        })?;
        if line.last() == Some(&b'\n') {
            line.pop();
        }
        Ok(line)
    }

    fn render(&self, value: &Value) -> Result<String, ConvertError> {
        Ok(match value {
            Value::Null => self.config.null_value.clone(),
            Value::Boolean(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::Bytes(bytes) => {
                let mut hex = String::with_capacity(bytes.len() * 2);
                for b in bytes {
                    let _ = write!(hex, "{b:02x}");
                }
                hex
            }
            Value::Array(_) | Value::Map(_) | Value::Struct(_) => serde_json::to_string(value)?,
        })
    }

    /// Column names and cells for `value`, in output order.
    fn columns<'a>(
        &self,
        schema: Option<&'a Schema>,
        value: &'a Struct,
    ) -> Result<(Vec<&'a str>, Vec<String>), ConvertError> {
        match schema.filter(|s| !s.fields.is_empty()) {
            Some(schema) => {
                let mut names = Vec::with_capacity(schema.fields.len());
                let mut cells = Vec::with_capacity(schema.fields.len());
                for field in &schema.fields {
                    let cell = match value.get(&field.name) {
                        Some(v) => self.render(v)?,
                        None if field.optional => self.config.null_value.clone(),
                        None => {
                            return Err(ConvertError::MissingField {
                                field: field.name.clone(),
                            });
                        }
                    };
                    names.push(field.name.as_str());
                    cells.push(cell);
                }
                Ok((names, cells))
            }
            None => {
                let names = value.field_names().collect();
                let cells = value
                    .iter()
                    .map(|(_, v)| self.render(v))
                    .collect::<Result<_, _>>()?;
                Ok((names, cells))
            }
        }
    }
}

impl Converter for CsvConverter {
    fn from_record(
        &self,
        _topic: &str,
        schema: Option<&Schema>,
        value: &Value,
    ) -> Result<Vec<u8>, ConvertError> {
        let (_, cells) = self.columns(schema, expect_struct(value)?)?;
        self.encode_line(&cells)
    }

    fn header_for(&self, schema: Option<&Schema>, value: &Value) -> Result<Vec<u8>, ConvertError> {
        let (names, _) = self.columns(schema, expect_struct(value)?)?;
        self.encode_line(&names)
    }
}

fn expect_struct(value: &Value) -> Result<&Struct, ConvertError> {
    match value {
        Value::Struct(s) => Ok(s),
        other => Err(ConvertError::NotAStruct {
            found: kind_name(other),
        }),
    }
}

const fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Boolean(_) => "boolean",
        Value::Int(_) => "int",
        Value::Float(_) => "float",
        Value::String(_) => "string",
        Value::Bytes(_) => "bytes",
        Value::Array(_) => "array",
        Value::Map(_) => "map",
        Value::Struct(_) => "struct",
    }
}
