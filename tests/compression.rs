use anyhow::Result;
use rowsink::io::cloud::{FakeObjectIO, ObjectIO};
use rowsink::testing::{MockStorage, scenario_records};
use rowsink::*;
use std::sync::Arc;

fn converter() -> Arc<CsvConverter> {
    Arc::new(CsvConverter::default())
}

fn write_scenario(provider: &CsvRecordWriterProvider, filename: &str) -> Result<String> {
    let writer = provider.open(filename)?;
    for record in scenario_records() {
        writer.write(&record)?;
    }
    writer.commit()?;
    Ok(writer.destination().to_string())
}

#[test]
fn uncompressed_extension_is_plain_csv() {
    let provider = CsvRecordWriterProvider::new(Arc::new(MockStorage::new()), converter());
    assert_eq!(provider.extension(), ".csv");
    assert_eq!(provider.destination_for("a"), "a.csv");
    assert_eq!(provider.destination_for("a.csv"), "a.csv");
}

#[test]
fn unavailable_or_invalid_level_fails_open() {
    let storage = ObjectStorage::new(Arc::new(FakeObjectIO::new()), "sink")
        .with_compression(CompressionType::Gzip, Some(42));
    let provider = CsvRecordWriterProvider::new(Arc::new(storage), converter());
    let err = provider.record_writer("bad-level").err().unwrap();
    assert!(matches!(err, WriterError::Fatal { .. }));
}

#[cfg(any(
    feature = "compression-gzip",
    feature = "compression-zstd",
    feature = "compression-bzip2",
    feature = "compression-xz"
))]
mod codecs {
    use super::*;

    fn enabled() -> Vec<CompressionType> {
        let mut codecs = Vec::new();
        #[cfg(feature = "compression-gzip")]
        codecs.push(CompressionType::Gzip);
        #[cfg(feature = "compression-zstd")]
        codecs.push(CompressionType::Zstd);
        #[cfg(feature = "compression-bzip2")]
        codecs.push(CompressionType::Bzip2);
        #[cfg(feature = "compression-xz")]
        codecs.push(CompressionType::Xz);
        codecs
    }

    #[test]
    fn object_storage_round_trip() -> Result<()> {
        for codec in enabled() {
            let store = FakeObjectIO::new();
            let storage =
                ObjectStorage::new(Arc::new(store.clone()), "sink").with_compression(codec, None);
            let provider = CsvRecordWriterProvider::new(Arc::new(storage), converter());
            assert_eq!(provider.extension(), format!(".csv{}", codec.extension()));

            let key = write_scenario(&provider, "events")?;
            assert_eq!(key, format!("events.csv{}", codec.extension()));

            let raw = store.get_object("sink", &key)?;
            let text = String::from_utf8(codec.decode(&raw)?)?;
            assert_eq!(text.lines().collect::<Vec<_>>(), ["a,b", "1,x", "2,y"], "{codec}");
        }
        Ok(())
    }

    #[test]
    fn local_storage_round_trip() -> Result<()> {
        for codec in enabled() {
            let dir = tempfile::tempdir()?;
            let storage = LocalStorage::new(dir.path()).with_compression(codec, None);
            let provider = CsvRecordWriterProvider::new(Arc::new(storage), converter());

            let name = write_scenario(&provider, "day=1/events")?;
            let raw = std::fs::read(dir.path().join(&name))?;
            assert_eq!(CompressionType::from_extension(&name), codec);
            let text = String::from_utf8(codec.decode(&raw)?)?;
            assert_eq!(text.lines().collect::<Vec<_>>(), ["a,b", "1,x", "2,y"], "{codec}");
        }
        Ok(())
    }

    #[test]
    fn mock_storage_decodes_committed_text() -> Result<()> {
        for codec in enabled() {
            let storage = MockStorage::new().with_compression(codec);
            let provider = CsvRecordWriterProvider::new(Arc::new(storage.clone()), converter());
            let name = write_scenario(&provider, "mock")?;
            assert_ne!(storage.committed(&name).unwrap_or_default(), b"a,b\n1,x\n2,y\n");
            assert_eq!(storage.committed_lines(&name)?, vec!["a,b", "1,x", "2,y"]);
        }
        Ok(())
    }

    #[cfg(feature = "compression-gzip")]
    #[test]
    fn explicit_gzip_level_is_honoured() -> Result<()> {
        let store = FakeObjectIO::new();
        for level in [1, 9] {
            let storage = ObjectStorage::new(Arc::new(store.clone()), "sink")
                .with_compression(CompressionType::Gzip, Some(level));
            let provider = CsvRecordWriterProvider::new(Arc::new(storage), converter());
            write_scenario(&provider, &format!("level-{level}"))?;
        }
        let text = CompressionType::Gzip.decode(&store.get_object("sink", "level-9.csv.gz")?)?;
        assert!(text.starts_with(b"a,b"));
        Ok(())
    }
}
