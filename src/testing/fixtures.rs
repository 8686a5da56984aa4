//! Pre-built records for common testing scenarios.

use crate::record::{Field, Schema, SinkRecord, Struct, Value};
use std::sync::Arc;

/// A two-column `{a, b}` struct record.
#[must_use]
pub fn ab_record(topic: &str, offset: i64, a: i64, b: &str) -> SinkRecord {
    SinkRecord::new(topic, 0, offset, Struct::new().put("a", a).put("b", b))
}

/// Two struct records and one scalar, in that order: `{a:1,b:"x"}`,
/// `{a:2,b:"y"}`, `42`. Committed, they produce `a,b` / `1,x` / `2,y`.
#[must_use]
pub fn scenario_records() -> Vec<SinkRecord> {
    vec![
        ab_record("topic", 0, 1, "x"),
        ab_record("topic", 1, 2, "y"),
        SinkRecord::new("topic", 0, 2, 42),
    ]
}

/// Schema of the rows carried by [`cdc_envelope`].
#[must_use]
pub fn customer_schema() -> Arc<Schema> {
    Arc::new(
        Schema::new(vec![
            Field::required("id"),
            Field::required("name"),
            Field::optional("email"),
        ])
        .named("customer"),
    )
}

/// A change-data envelope with `before`, `after` and `op` fields.
///
/// `None` images are stored as `Null`, as for inserts (no `before`) and
/// deletes (no `after`).
#[must_use]
pub fn cdc_envelope(
    offset: i64,
    op: &str,
    before: Option<Struct>,
    after: Option<Struct>,
) -> SinkRecord {
    let row = customer_schema();
    let schema = Arc::new(
        Schema::new(vec![
            Field::optional("before").with_schema(Arc::clone(&row)),
            Field::optional("after").with_schema(row),
            Field::required("op"),
        ])
        .named("envelope"),
    );
    let value = Struct::new()
        .put("before", Value::from(before))
        .put("after", Value::from(after))
        .put("op", op);
    SinkRecord::new("customers", 0, offset, value).with_value_schema(schema)
}

/// A customer row matching [`customer_schema`].
#[must_use]
pub fn customer(id: i64, name: &str, email: Option<&str>) -> Struct {
    Struct::new()
        .put("id", id)
        .put("name", name)
        .put("email", Value::from(email))
}

/// `n` struct records interleaved with non-struct values: every third record
/// is a string, every fifth a tombstone.
#[must_use]
pub fn mixed_records(n: usize) -> Vec<SinkRecord> {
    (0..n)
        .map(|i| {
            let offset = i64::try_from(i).unwrap_or(i64::MAX);
            if i % 5 == 4 {
                SinkRecord::tombstone("mixed", 0, offset)
            } else if i % 3 == 2 {
                SinkRecord::new("mixed", 0, offset, format!("scalar-{i}"))
            } else {
                ab_record("mixed", offset, offset, &format!("row-{i}"))
            }
        })
        .collect()
}

/// Whether `record` would become a row under the raw value view.
#[must_use]
pub fn is_struct_record(record: &SinkRecord) -> bool {
    record.value.as_ref().is_some_and(Value::is_struct)
}
