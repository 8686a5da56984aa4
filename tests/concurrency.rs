use anyhow::Result;
use rayon::prelude::*;
use rowsink::testing::{MockStorage, ab_record};
use rowsink::*;
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn provider(storage: &MockStorage) -> CsvRecordWriterProvider {
    CsvRecordWriterProvider::new(Arc::new(storage.clone()), Arc::new(CsvConverter::default()))
}

#[test]
fn parallel_writes_emit_exactly_one_header_first() -> Result<()> {
    let storage = MockStorage::new();
    let writer = provider(&storage).open("parallel")?;

    (0..2_000i64)
        .into_par_iter()
        .try_for_each(|i| writer.write(&ab_record("t", i, i, &format!("v{i}"))))?;
    writer.commit()?;

    let lines = storage.committed_lines("parallel.csv")?;
    assert_eq!(lines.len(), 2_001);
    assert_eq!(lines[0], "a,b");
    assert_eq!(lines.iter().filter(|l| *l == "a,b").count(), 1);

    // Every row is intact: no bytes from two writes interleave.
    let rows: HashSet<&str> = lines[1..].iter().map(String::as_str).collect();
    for i in 0..2_000 {
        assert!(rows.contains(format!("{i},v{i}").as_str()), "missing row {i}");
    }
    Ok(())
}

#[test]
fn parallel_writes_with_non_structs_still_have_one_header() -> Result<()> {
    let storage = MockStorage::new();
    let writer = provider(&storage).open("sparse")?;

    (0..500i64).into_par_iter().try_for_each(|i| {
        if i % 2 == 0 {
            writer.write(&SinkRecord::new("t", 0, i, i))
        } else {
            writer.write(&ab_record("t", i, i, "odd"))
        }
    })?;
    writer.commit()?;

    let lines = storage.committed_lines("sparse.csv")?;
    assert_eq!(lines.len(), 251);
    assert_eq!(lines.iter().filter(|l| *l == "a,b").count(), 1);
    assert_eq!(lines[0], "a,b");
    Ok(())
}

#[test]
fn independent_writers_run_in_parallel() -> Result<()> {
    let storage = MockStorage::new();
    let provider = provider(&storage);

    (0..8).into_par_iter().try_for_each(|n| -> Result<()> {
        let writer = provider.record_writer(&format!("part-{n}"))?;
        for i in 0..50 {
            writer.write(&ab_record("t", i, i, "x"))?;
        }
        writer.commit()?;
        Ok(())
    })?;

    assert_eq!(storage.committed_paths().len(), 8);
    for n in 0..8 {
        assert_eq!(storage.committed_lines(&format!("part-{n}.csv"))?.len(), 51);
    }
    Ok(())
}

/// Slows conversion down so that writes on different destinations overlap.
struct Delayed(CsvConverter);

impl Converter for Delayed {
    fn from_record(
        &self,
        topic: &str,
        schema: Option<&Schema>,
        value: &Value,
    ) -> Result<Vec<u8>, ConvertError> {
        thread::sleep(Duration::from_millis(1));
        self.0.from_record(topic, schema, value)
    }

    fn header_for(&self, schema: Option<&Schema>, value: &Value) -> Result<Vec<u8>, ConvertError> {
        thread::sleep(Duration::from_millis(1));
        self.0.header_for(schema, value)
    }
}

#[test]
fn writers_with_different_columns_keep_their_own_header() -> Result<()> {
    let storage = MockStorage::new();
    let provider =
        CsvRecordWriterProvider::new(Arc::new(storage.clone()), Arc::new(Delayed(CsvConverter::default())));
    let left = provider.record_writer("left")?;
    let right = provider.record_writer("right")?;
    let start = Barrier::new(2);

    thread::scope(|s| -> Result<()> {
        let l = s.spawn(|| -> Result<(), WriterError> {
            start.wait();
            for i in 0..100i64 {
                left.write(&ab_record("t", i, i, "x"))?;
            }
            Ok(())
        });
        let r = s.spawn(|| -> Result<(), WriterError> {
            start.wait();
            for i in 0..100i64 {
                right.write(&SinkRecord::new("t", 0, i, Struct::new().put("z", i)))?;
            }
            Ok(())
        });
        l.join().expect("left writer panicked")?;
        r.join().expect("right writer panicked")?;
        Ok(())
    })?;
    left.commit()?;
    right.commit()?;

    let left_lines = storage.committed_lines("left.csv")?;
    let right_lines = storage.committed_lines("right.csv")?;
    assert_eq!(left_lines[0], "a,b");
    assert_eq!(right_lines[0], "z");
    assert_eq!(left_lines.len(), 101);
    assert_eq!(right_lines.len(), 101);
    assert!(left_lines[1..].iter().all(|l| l.ends_with(",x")));
    assert!(right_lines[1..].iter().all(|l| !l.contains(',')));
    Ok(())
}
