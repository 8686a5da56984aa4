//! Filesystem-backed output streams.
//!
//! Each destination is staged in a temporary file next to its final path and
//! renamed into place on commit. An uncommitted stream removes its temporary
//! file when dropped, so readers only ever see complete files.

use super::{CompressedOutput, CompressionLayer, DurableOutputStream, OutputStorage, SharedSink};
use super::lock;
use crate::io::compression::CompressionType;
use std::fs::{File, create_dir_all};
use std::io::{self, BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempPath;
use tracing::debug;

/// [`OutputStorage`] rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    compression: CompressionType,
    level: Option<u32>,
}

impl LocalStorage {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
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
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl OutputStorage for LocalStorage {
    fn create(
        &self,
        path: &str,
        overwrite: bool,
        format: &str,
    ) -> io::Result<Box<dyn DurableOutputStream>> {
        let target = self.root.join(contained_path(path)?);
        if !overwrite && target.exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", target.display()),
            ));
        }
        let dir = target.parent().unwrap_or(&self.root);
        create_dir_all(dir)?;
        let (file, temp_path) = tempfile::Builder::new()
            .prefix(".rowsink-")
            .suffix(".tmp")
            .tempfile_in(dir)?
            .into_parts();
        debug!(target = %target.display(), format, "created local output stream");
        Ok(Box::new(LocalOutputStream {
            path: path.to_string(),
            target,
            overwrite,
            compression: self.compression,
            level: self.level,
            file: Arc::new(Mutex::new(BufWriter::new(file))),
            temp_path: Some(temp_path),
            layer: CompressionLayer::default(),
        }))
    }

    fn compression(&self) -> CompressionType {
        self.compression
    }
}

/// `path` as a relative path that stays below the storage root.
fn contained_path(path: &str) -> io::Result<&Path> {
    let relative = Path::new(path);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if path.is_empty() || escapes {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("destination '{path}' must be a relative path inside the storage root"),
        ));
    }
    Ok(relative)
}

/// Raw stream for one local file.
pub struct LocalOutputStream {
    path: String,
    target: PathBuf,
    overwrite: bool,
    compression: CompressionType,
    level: Option<u32>,
    file: Arc<Mutex<BufWriter<File>>>,
    temp_path: Option<TempPath>,
    layer: CompressionLayer,
}

impl DurableOutputStream for LocalOutputStream {
    fn wrap_for_compression(&mut self) -> io::Result<CompressedOutput> {
        let sink = SharedSink(Arc::clone(&self.file));
        self.layer.wrap(&self.path, sink, self.compression, self.level)
    }

    fn commit(&mut self) -> io::Result<()> {
        self.layer.complete(&self.path)?;
        {
            let mut file = lock(&self.file, &self.path)?;
            file.flush()?;
            file.get_ref().sync_all()?;
        }
        let temp_path = self.temp_path.take().ok_or_else(|| {
            io::Error::other(format!("{} was already committed", self.path))
        })?;
        if self.overwrite {
            temp_path.persist(&self.target)?;
        } else {
            temp_path.persist_noclobber(&self.target)?;
        }
        debug!(target = %self.target.display(), "committed local file");
        Ok(())
    }

    fn path(&self) -> &str {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn visible_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_commit_renames_into_place() -> io::Result<()> {
        let dir = TempDir::new()?;
        let storage = LocalStorage::new(dir.path());
        let mut raw = storage.create("out/a.csv", true, "csv")?;
        let mut out = raw.wrap_for_compression()?;
        out.write_all(b"a\n1\n")?;

        assert!(!dir.path().join("out/a.csv").exists());
        raw.commit()?;
        out.close()?;

        assert_eq!(fs::read(dir.path().join("out/a.csv"))?, b"a\n1\n");
        assert_eq!(visible_files(&dir.path().join("out")), vec!["a.csv"]);
        Ok(())
    }

    #[test]
    fn test_abandoned_stream_leaves_nothing() -> io::Result<()> {
        let dir = TempDir::new()?;
        let storage = LocalStorage::new(dir.path());
        {
            let mut raw = storage.create("a.csv", true, "csv")?;
            let mut out = raw.wrap_for_compression()?;
            out.write_all(b"partial\n")?;
            out.close()?;
        }
        assert!(visible_files(dir.path()).is_empty());
        Ok(())
    }

    #[test]
    fn test_no_clobber() -> io::Result<()> {
        let dir = TempDir::new()?;
        fs::write(dir.path().join("a.csv"), b"old")?;
        let storage = LocalStorage::new(dir.path());
        let err = storage.create("a.csv", false, "csv").err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        Ok(())
    }

    #[test]
    fn test_paths_outside_root_are_rejected() -> io::Result<()> {
        let root = TempDir::new()?;
        let outside = TempDir::new()?;
        let storage = LocalStorage::new(root.path().join("sink"));
        let absolute = outside.path().join("escaped.csv").to_string_lossy().into_owned();

        for path in [absolute.as_str(), "../escaped.csv", "a/../../b.csv", ""] {
            let err = storage.create(path, true, "csv").err().unwrap();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput, "{path}");
        }
        assert!(visible_files(outside.path()).is_empty());
        assert!(!root.path().join("escaped.csv").exists());
        assert!(storage.create("./nested/ok.csv", true, "csv").is_ok());
        Ok(())
    }

    #[test]
    fn test_double_commit_is_rejected() -> io::Result<()> {
        let dir = TempDir::new()?;
        let storage = LocalStorage::new(dir.path());
        let mut raw = storage.create("a.csv", true, "csv")?;
        let _out = raw.wrap_for_compression()?;
        raw.commit()?;
        assert!(raw.commit().is_err());
        Ok(())
    }
}
