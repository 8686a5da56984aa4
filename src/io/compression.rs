//! Pluggable compression for output streams.
//!
//! Writers never compress bytes themselves. A storage backend wraps its raw
//! sink with an [`Encoder`] chosen by [`CompressionType`], and the writer
//! appends through that wrapper.
//!
//! ## Built-in Codecs
//!
//! When enabled via feature flags, the following codecs are available:
//! - **Gzip** (`.gz`) - via `flate2` crate (feature: `compression-gzip`)
//! - **Zstd** (`.zst`) - via `zstd` crate (feature: `compression-zstd`)
//! - **Bzip2** (`.bz2`) - via `bzip2` crate (feature: `compression-bzip2`)
//! - **Xz** (`.xz`) - via `xz2` crate (feature: `compression-xz`)
//!
//! Requesting a codec whose feature is disabled fails with
//! [`io::ErrorKind::Unsupported`].
//!
//! ## Completing a stream
//!
//! Compressors hold buffered state and must write a trailer before their
//! output is a valid archive. [`Encoder::complete`] does exactly that and
//! pushes every byte into the inner sink. It may be called more than once.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Read, Write};
use std::path::Path;
use std::str::FromStr;

/// A compressing writer that can be finished in place.
pub trait Encoder: Write + Send {
    /// Write any trailer and flush all buffered bytes into the inner sink.
    ///
    /// # Errors
    /// Returns an error if the inner sink rejects the bytes.
    fn complete(&mut self) -> io::Result<()>;
}

/// No compression; bytes pass straight through.
struct Passthrough<W: Write + Send>(W);

impl<W: Write + Send> Write for Passthrough<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl<W: Write + Send> Encoder for Passthrough<W> {
    fn complete(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

#[cfg(feature = "compression-gzip")]
impl<W: Write + Send> Encoder for flate2::write::GzEncoder<W> {
    fn complete(&mut self) -> io::Result<()> {
        self.try_finish()?;
        self.get_mut().flush()
    }
}

#[cfg(feature = "compression-zstd")]
impl<W: Write + Send> Encoder for zstd::stream::write::Encoder<'static, W> {
    fn complete(&mut self) -> io::Result<()> {
        self.do_finish()?;
        self.get_mut().flush()
    }
}

#[cfg(feature = "compression-bzip2")]
impl<W: Write + Send> Encoder for bzip2::write::BzEncoder<W> {
    fn complete(&mut self) -> io::Result<()> {
        self.try_finish()?;
        self.get_mut().flush()
    }
}

#[cfg(feature = "compression-xz")]
impl<W: Write + Send> Encoder for xz2::write::XzEncoder<W> {
    fn complete(&mut self) -> io::Result<()> {
        self.try_finish()?;
        self.get_mut().flush()
    }
}

/// Compression applied to everything a writer appends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionType {
    #[default]
    None,
    Gzip,
    Zstd,
    Bzip2,
    Xz,
}

impl CompressionType {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Zstd => "zstd",
            Self::Bzip2 => "bzip2",
            Self::Xz => "xz",
        }
    }

    /// Filename extension appended after the format extension.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Gzip => ".gz",
            Self::Zstd => ".zst",
            Self::Bzip2 => ".bz2",
            Self::Xz => ".xz",
        }
    }

    /// Detect the codec from a path's trailing extension.
    pub fn from_extension(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_string_lossy().to_lowercase();
        [Self::Gzip, Self::Zstd, Self::Bzip2, Self::Xz]
            .into_iter()
            .find(|c| path.ends_with(c.extension()))
            .unwrap_or(Self::None)
    }

    /// Accepted level range, or `None` when the codec takes no level.
    #[must_use]
    pub const fn level_range(self) -> Option<(u32, u32)> {
        match self {
            Self::None => None,
            Self::Gzip | Self::Xz => Some((0, 9)),
            Self::Bzip2 => Some((1, 9)),
            Self::Zstd => Some((1, 22)),
        }
    }

    const fn default_level(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Gzip | Self::Xz => 6,
            Self::Bzip2 => 9,
            Self::Zstd => 3,
        }
    }

    /// Check that `level` is usable with this codec.
    ///
    /// # Errors
    /// Returns [`io::ErrorKind::InvalidInput`] for an out-of-range level.
    pub fn validate_level(self, level: Option<u32>) -> io::Result<()> {
        match (level, self.level_range()) {
            (Some(l), Some((lo, hi))) if l < lo || l > hi => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} level {l} outside {lo}..={hi}", self.name()),
            )),
            _ => Ok(()),
        }
    }

    /// Wrap `sink` with this codec's compressor.
    ///
    /// # Errors
    /// Returns an error if the level is invalid, the codec's feature is
    /// disabled, or the encoder cannot be created.
    pub fn wrap_writer<W>(self, sink: W, level: Option<u32>) -> io::Result<Box<dyn Encoder>>
    where
        W: Write + Send + 'static,
    {
        self.validate_level(level)?;
        let level = level.unwrap_or_else(|| self.default_level());
        match self {
            Self::None => Ok(Box::new(Passthrough(sink))),
            #[cfg(feature = "compression-gzip")]
            Self::Gzip => Ok(Box::new(flate2::write::GzEncoder::new(
                sink,
                flate2::Compression::new(level),
            ))),
            #[cfg(feature = "compression-zstd")]
            Self::Zstd => {
                let level = i32::try_from(level).map_err(io::Error::other)?;
                Ok(Box::new(zstd::stream::write::Encoder::new(sink, level)?))
            }
            #[cfg(feature = "compression-bzip2")]
            Self::Bzip2 => Ok(Box::new(bzip2::write::BzEncoder::new(
                sink,
                bzip2::Compression::new(level),
            ))),
            #[cfg(feature = "compression-xz")]
            Self::Xz => Ok(Box::new(xz2::write::XzEncoder::new(sink, level))),
            #[allow(unreachable_patterns)]
            other => Err(unsupported(other)),
        }
    }

    /// Wrap `reader` with this codec's decompressor.
    ///
    /// # Errors
    /// Returns an error if the codec's feature is disabled or the decoder
    /// cannot be created.
    pub fn wrap_reader<'a, R>(self, reader: R) -> io::Result<Box<dyn Read + 'a>>
    where
        R: Read + 'a,
    {
        match self {
            Self::None => Ok(Box::new(reader)),
            #[cfg(feature = "compression-gzip")]
            Self::Gzip => Ok(Box::new(flate2::read::MultiGzDecoder::new(reader))),
            #[cfg(feature = "compression-zstd")]
            Self::Zstd => Ok(Box::new(zstd::stream::read::Decoder::new(reader)?)),
            #[cfg(feature = "compression-bzip2")]
            Self::Bzip2 => Ok(Box::new(bzip2::read::BzDecoder::new(reader))),
            #[cfg(feature = "compression-xz")]
            Self::Xz => Ok(Box::new(xz2::read::XzDecoder::new(reader))),
            #[allow(unreachable_patterns)]
            other => Err(unsupported(other)),
        }
    }

    /// Decompress a complete in-memory payload.
    ///
    /// # Errors
    /// See [`CompressionType::wrap_reader`]; also fails on corrupt input.
    pub fn decode(self, bytes: &[u8]) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        self.wrap_reader(bytes)?.read_to_end(&mut out)?;
        Ok(out)
    }
}

fn unsupported(codec: CompressionType) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("{} compression is not enabled in this build", codec.name()),
    )
}

impl fmt::Display for CompressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CompressionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "gzip" | "gz" => Ok(Self::Gzip),
            "zstd" | "zst" => Ok(Self::Zstd),
            "bzip2" | "bz2" => Ok(Self::Bzip2),
            "xz" => Ok(Self::Xz),
            other => Err(format!("unknown compression type '{other}'")),
        }
    }
}
