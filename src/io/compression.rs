//! Pluggable compression codecs backing [`CodecExecutor`](crate::executor::CodecExecutor).
//!
//! ## Built-in Codecs
//!
//! When enabled via feature flags, the following codecs are registered:
//! - **Gzip** (`.gz`) - via `flate2` crate (feature: `compression-gzip`)
//! - **Zstd** (`.zst`) - via `zstd` crate (feature: `compression-zstd`)
//! - **Bzip2** (`.bz2`) - via `bzip2` crate (feature: `compression-bzip2`)
//! - **Xz** (`.xz`) - via `xz2` crate (feature: `compression-xz`)
//!
//! Additional codecs can be added at runtime with [`register_codec`]. Lookup
//! is by name ([`codec_by_name`]) when building an executor, and by extension
//! or magic bytes ([`auto_detect_reader`]) when reading artifacts back.

use anyhow::{Context, Result};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

/// Global codec registry.
static CODEC_REGISTRY: RwLock<Option<Vec<Arc<dyn CompressionCodec>>>> = RwLock::new(None);

fn init_registry() -> Vec<Arc<dyn CompressionCodec>> {
    vec![
        #[cfg(feature = "compression-gzip")]
        Arc::new(gzip::GzipCodec),
        #[cfg(feature = "compression-zstd")]
        Arc::new(zstd_codec::ZstdCodec),
        #[cfg(feature = "compression-bzip2")]
        Arc::new(bzip2_codec::Bzip2Codec),
        #[cfg(feature = "compression-xz")]
        Arc::new(xz_codec::XzCodec),
    ]
}

fn get_registry() -> Vec<Arc<dyn CompressionCodec>> {
    let mut lock = CODEC_REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    lock.get_or_insert_with(init_registry).clone()
}

/// Register a custom compression codec globally.
///
/// A codec registered under an existing name shadows the earlier one for
/// [`codec_by_name`].
pub fn register_codec(codec: Arc<dyn CompressionCodec>) {
    let mut lock = CODEC_REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    lock.get_or_insert_with(init_registry).insert(0, codec);
}

/// Pluggable compression codec trait.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` as they're stored in a global registry
/// and shared by executor worker threads.
pub trait CompressionCodec: Send + Sync {
    /// Human-readable codec name (e.g., "gzip", "zstd").
    fn name(&self) -> &str;

    /// File extensions associated with this codec (e.g., `&[".gz", ".gzip"]`).
    ///
    /// The first extension names the artifacts a `CodecExecutor` writes.
    fn extensions(&self) -> &[&str];

    /// Optional magic byte signature for content-based detection.
    fn magic_bytes(&self) -> Option<&[u8]>;

    /// Wrap a reader with decompression.
    fn wrap_reader_dyn(&self, reader: Box<dyn Read>) -> std::io::Result<Box<dyn Read>>;

    /// Wrap a writer with compression. The stream is only complete after
    /// [`EncodeWriter::finish_stream`] returned `Ok`.
    fn wrap_writer_dyn(&self, writer: Box<dyn Write>) -> std::io::Result<Box<dyn EncodeWriter>>;
}

/// A compressing writer whose stream end is written explicitly.
///
/// Dropping an encoder without finishing it may still write a trailer, but
/// any error doing so is lost; callers that need a complete artifact call
/// [`finish_stream`](Self::finish_stream).
pub trait EncodeWriter: Write {
    /// Write the stream trailer and flush the underlying writer.
    ///
    /// # Errors
    /// Any I/O error while writing the trailer or flushing.
    fn finish_stream(self: Box<Self>) -> io::Result<()>;
}

/// Find a registered codec by its [`CompressionCodec::name`] (case-insensitive).
#[must_use]
pub fn codec_by_name(name: &str) -> Option<Arc<dyn CompressionCodec>> {
    get_registry()
        .into_iter()
        .find(|codec| codec.name().eq_ignore_ascii_case(name))
}

fn detect_from_extension(path: impl AsRef<Path>) -> Option<Arc<dyn CompressionCodec>> {
    let path_str = path.as_ref().to_string_lossy().to_lowercase();
    get_registry()
        .into_iter()
        .find(|codec| codec.extensions().iter().any(|ext| path_str.ends_with(ext)))
}

/// Peeks at the start of the buffered reader; the reader is not advanced.
fn detect_from_magic<R: BufRead>(reader: &mut R) -> Option<Arc<dyn CompressionCodec>> {
    let buf = reader.fill_buf().ok()?;
    if buf.is_empty() {
        return None;
    }
    get_registry().into_iter().find(|codec| {
        codec
            .magic_bytes()
            .is_some_and(|magic| buf.len() >= magic.len() && buf.starts_with(magic))
    })
}

/// Wrap a reader with decompression if the path or content looks compressed.
///
/// Detection strategy:
/// 1. Check file path extension (fast path)
/// 2. Fall back to magic byte detection if extension not recognized
/// 3. Return unwrapped reader if no compression detected
///
/// # Errors
/// Returns an error if the detected codec fails to initialize.
pub fn auto_detect_reader<R: Read + 'static>(
    reader: R,
    path_hint: impl AsRef<Path>,
) -> Result<Box<dyn Read>> {
    if let Some(codec) = detect_from_extension(&path_hint) {
        return codec
            .wrap_reader_dyn(Box::new(reader))
            .with_context(|| format!("wrap reader with {} codec", codec.name()));
    }

    let mut buf_reader = BufReader::new(reader);
    if let Some(codec) = detect_from_magic(&mut buf_reader) {
        return codec
            .wrap_reader_dyn(Box::new(buf_reader))
            .with_context(|| format!("wrap reader with {} codec", codec.name()));
    }

    Ok(Box::new(buf_reader))
}

// ============================================================================
// Built-in codecs
// ============================================================================

#[cfg(feature = "compression-gzip")]
mod gzip {
    use super::{CompressionCodec, EncodeWriter};
    use flate2::Compression;
    use flate2::read::GzDecoder;
    use flate2::write::GzEncoder;
    use std::io::{self, Read, Write};

    pub(super) struct GzipCodec;

    impl CompressionCodec for GzipCodec {
        fn name(&self) -> &str {
            "gzip"
        }

        fn extensions(&self) -> &[&str] {
            &[".gz", ".gzip"]
        }

        fn magic_bytes(&self) -> Option<&[u8]> {
            Some(&[0x1f, 0x8b])
        }

        fn wrap_reader_dyn(&self, reader: Box<dyn Read>) -> io::Result<Box<dyn Read>> {
            Ok(Box::new(GzDecoder::new(reader)))
        }

        fn wrap_writer_dyn(&self, writer: Box<dyn Write>) -> io::Result<Box<dyn EncodeWriter>> {
            Ok(Box::new(GzEncoder::new(writer, Compression::default())))
        }
    }

    impl EncodeWriter for GzEncoder<Box<dyn Write>> {
        fn finish_stream(self: Box<Self>) -> io::Result<()> {
            (*self).finish()?.flush()
        }
    }
}

#[cfg(feature = "compression-zstd")]
mod zstd_codec {
    use super::{CompressionCodec, EncodeWriter};
    use std::io::{self, Read, Write};
    use zstd::stream::read::Decoder;
    use zstd::stream::write::Encoder;

    const LEVEL: i32 = 3;

    pub(super) struct ZstdCodec;

    impl CompressionCodec for ZstdCodec {
        fn name(&self) -> &str {
            "zstd"
        }

        fn extensions(&self) -> &[&str] {
            &[".zst", ".zstd"]
        }

        fn magic_bytes(&self) -> Option<&[u8]> {
            Some(&[0x28, 0xb5, 0x2f, 0xfd])
        }

        fn wrap_reader_dyn(&self, reader: Box<dyn Read>) -> io::Result<Box<dyn Read>> {
            Ok(Box::new(Decoder::new(reader)?))
        }

        fn wrap_writer_dyn(&self, writer: Box<dyn Write>) -> io::Result<Box<dyn EncodeWriter>> {
            Ok(Box::new(Encoder::new(writer, LEVEL)?))
        }
    }

    impl EncodeWriter for Encoder<'static, Box<dyn Write>> {
        fn finish_stream(self: Box<Self>) -> io::Result<()> {
            (*self).finish()?.flush()
        }
    }
}

#[cfg(feature = "compression-bzip2")]
mod bzip2_codec {
    use super::{CompressionCodec, EncodeWriter};
    use bzip2::Compression;
    use bzip2::read::BzDecoder;
    use bzip2::write::BzEncoder;
    use std::io::{self, Read, Write};

    pub(super) struct Bzip2Codec;

    impl CompressionCodec for Bzip2Codec {
        fn name(&self) -> &str {
            "bzip2"
        }

        fn extensions(&self) -> &[&str] {
            &[".bz2", ".bzip2"]
        }

        fn magic_bytes(&self) -> Option<&[u8]> {
            Some(b"BZh")
        }

        fn wrap_reader_dyn(&self, reader: Box<dyn Read>) -> io::Result<Box<dyn Read>> {
            Ok(Box::new(BzDecoder::new(reader)))
        }

        fn wrap_writer_dyn(&self, writer: Box<dyn Write>) -> io::Result<Box<dyn EncodeWriter>> {
            Ok(Box::new(BzEncoder::new(writer, Compression::default())))
        }
    }

    impl EncodeWriter for BzEncoder<Box<dyn Write>> {
        fn finish_stream(self: Box<Self>) -> io::Result<()> {
            (*self).finish()?.flush()
        }
    }
}

#[cfg(feature = "compression-xz")]
mod xz_codec {
    use super::{CompressionCodec, EncodeWriter};
    use std::io::{self, Read, Write};
    use xz2::read::XzDecoder;
    use xz2::write::XzEncoder;

    const PRESET: u32 = 6;

    pub(super) struct XzCodec;

    impl CompressionCodec for XzCodec {
        fn name(&self) -> &str {
            "xz"
        }

        fn extensions(&self) -> &[&str] {
            &[".xz"]
        }

        fn magic_bytes(&self) -> Option<&[u8]> {
            Some(&[0xfd, b'7', b'z', b'X', b'Z', 0x00])
        }

        fn wrap_reader_dyn(&self, reader: Box<dyn Read>) -> io::Result<Box<dyn Read>> {
            Ok(Box::new(XzDecoder::new(reader)))
        }

        fn wrap_writer_dyn(&self, writer: Box<dyn Write>) -> io::Result<Box<dyn EncodeWriter>> {
            Ok(Box::new(XzEncoder::new(writer, PRESET)))
        }
    }

    impl EncodeWriter for XzEncoder<Box<dyn Write>> {
        fn finish_stream(self: Box<Self>) -> io::Result<()> {
            (*self).finish()?.flush()
        }
    }
}
