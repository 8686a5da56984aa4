//! Record views: which part of a [`SinkRecord`] a writer serializes.
//!
//! A view is injected into the writer provider at construction. Three fixed
//! variants exist: the raw value, and the `before` / `after` images of a
//! change-data envelope (a struct value carrying `before` and `after` struct
//! fields).

use crate::record::{Schema, SinkRecord, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Selects the value (and schema) a writer should serialize for a record.
pub trait RecordView: Send + Sync + fmt::Debug {
    /// The selected value, or `None` when the record has nothing to offer
    /// under this view.
    fn view<'a>(&self, record: &'a SinkRecord) -> Option<&'a Value>;

    /// Schema describing the value returned by [`RecordView::view`].
    fn view_schema<'a>(&self, record: &'a SinkRecord) -> Option<&'a Schema>;

    /// Suffix inserted into the destination filename ahead of the extension.
    fn suffix(&self) -> &'static str;

    fn name(&self) -> &'static str;
}

/// The record's value as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueView;

impl RecordView for ValueView {
    fn view<'a>(&self, record: &'a SinkRecord) -> Option<&'a Value> {
        record.value.as_ref()
    }

    fn view_schema<'a>(&self, record: &'a SinkRecord) -> Option<&'a Schema> {
        record.value_schema.as_deref()
    }

    fn suffix(&self) -> &'static str {
        ""
    }

    fn name(&self) -> &'static str {
        "value"
    }
}

/// The `before` image of a change-data envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct BeforeView;

impl RecordView for BeforeView {
    fn view<'a>(&self, record: &'a SinkRecord) -> Option<&'a Value> {
        envelope_image(record, "before")
    }

    fn view_schema<'a>(&self, record: &'a SinkRecord) -> Option<&'a Schema> {
        record.value_schema.as_deref()?.field_schema("before")
    }

    fn suffix(&self) -> &'static str {
        ".before"
    }

    fn name(&self) -> &'static str {
        "before"
    }
}

/// The `after` image of a change-data envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct AfterView;

impl RecordView for AfterView {
    fn view<'a>(&self, record: &'a SinkRecord) -> Option<&'a Value> {
        envelope_image(record, "after")
    }

    fn view_schema<'a>(&self, record: &'a SinkRecord) -> Option<&'a Schema> {
        record.value_schema.as_deref()?.field_schema("after")
    }

    fn suffix(&self) -> &'static str {
        ".after"
    }

    fn name(&self) -> &'static str {
        "after"
    }
}

fn envelope_image<'a>(record: &'a SinkRecord, image: &str) -> Option<&'a Value> {
    match record.value.as_ref()?.as_struct()?.get(image)? {
        Value::Null => None,
        v => Some(v),
    }
}

/// Configuration-level selector for the built-in views.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordViewKind {
    #[default]
    Value,
    Before,
    After,
}

impl RecordViewKind {
    #[must_use]
    pub fn into_view(self) -> Arc<dyn RecordView> {
        match self {
            Self::Value => Arc::new(ValueView),
            Self::Before => Arc::new(BeforeView),
            Self::After => Arc::new(AfterView),
        }
    }
}

impl FromStr for RecordViewKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "value" => Ok(Self::Value),
            "before" => Ok(Self::Before),
            "after" => Ok(Self::After),
            other => Err(format!("unknown record view '{other}'")),
        }
    }
}

/// Destination name for `filename` under `view`.
///
/// The extension is stripped when already present, the view's suffix is
/// inserted, and the extension is appended again:
/// `topic-0001.csv` under [`BeforeView`] becomes `topic-0001.before.csv`.
#[must_use]
pub fn adjusted_filename(view: &dyn RecordView, filename: &str, extension: &str) -> String {
    let stem = if extension.is_empty() {
        filename
    } else {
        filename.strip_suffix(extension).unwrap_or(filename)
    };
    format!("{stem}{}{extension}", view.suffix())
}
