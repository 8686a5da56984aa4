use anyhow::Result;
use rowsink::testing::{MockStorage, cdc_envelope, customer};
use rowsink::*;
use std::sync::Arc;

fn provider(storage: &MockStorage, kind: RecordViewKind) -> CsvRecordWriterProvider {
    CsvRecordWriterProvider::new(Arc::new(storage.clone()), Arc::new(CsvConverter::default()))
        .with_record_view(kind.into_view())
}

fn changes() -> Vec<SinkRecord> {
    vec![
        cdc_envelope(0, "c", None, Some(customer(1, "Ada", Some("ada@example.com")))),
        cdc_envelope(
            1,
            "u",
            Some(customer(1, "Ada", Some("ada@example.com"))),
            Some(customer(1, "Ada L.", None)),
        ),
        cdc_envelope(2, "d", Some(customer(1, "Ada L.", None)), None),
    ]
}

fn write_all(provider: &CsvRecordWriterProvider, filename: &str) -> Result<String> {
    let writer = provider.record_writer(filename)?;
    for record in changes() {
        writer.write(&record)?;
    }
    writer.commit()?;
    Ok(writer.destination().to_string())
}

#[test]
fn after_view_writes_new_images() -> Result<()> {
    let storage = MockStorage::new();
    let name = write_all(&provider(&storage, RecordViewKind::After), "customers-0001")?;

    assert_eq!(name, "customers-0001.after.csv");
    assert_eq!(
        storage.committed_lines(&name)?,
        vec!["id,name,email", "1,Ada,ada@example.com", "1,Ada L.,"]
    );
    Ok(())
}

#[test]
fn before_view_writes_old_images() -> Result<()> {
    let storage = MockStorage::new();
    let name = write_all(&provider(&storage, RecordViewKind::Before), "customers-0001.csv")?;

    assert_eq!(name, "customers-0001.before.csv");
    assert_eq!(
        storage.committed_lines(&name)?,
        vec!["id,name,email", "1,Ada,ada@example.com", "1,Ada L.,"]
    );
    Ok(())
}

#[test]
fn value_view_writes_envelopes_as_nested_json() -> Result<()> {
    let storage = MockStorage::new();
    let name = write_all(&provider(&storage, RecordViewKind::Value), "raw")?;

    assert_eq!(name, "raw.csv");
    let lines = storage.committed_lines(&name)?;
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "before,after,op");
    assert!(lines[1].starts_with(",\"{"));
    assert!(lines[3].ends_with(",,d"));
    Ok(())
}

#[test]
fn views_write_to_separate_destinations() -> Result<()> {
    let storage = MockStorage::new();
    for kind in [RecordViewKind::Before, RecordViewKind::After] {
        write_all(&provider(&storage, kind), "customers-0001")?;
    }
    assert_eq!(
        storage.committed_paths(),
        vec!["customers-0001.after.csv", "customers-0001.before.csv"]
    );
    Ok(())
}
