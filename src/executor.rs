//! The transform boundary: whatever actually compresses or encrypts bytes.
//!
//! Splitseal never implements a compression or cipher algorithm itself. Every
//! transform goes through a [`TransformExecutor`], which receives a
//! [`TransformRequest`] (a file path or an in-memory byte payload, the
//! destination path, and an optional password) and reports success or failure.
//!
//! Two executors ship with the crate:
//! - [`SevenZipExecutor`] runs an external 7-Zip program, one process per request
//! - [`CodecExecutor`] compresses in-process through the codec registry in
//!   [`crate::io::compression`] (compression only, no passwords)
//!
//! Where artifacts land is decided by [`ArtifactLayout`]: next to the source,
//! inside a `Compressed/` or `Encrypted/` subfolder, named after the source's
//! file stem.

use crate::io::compression::{CompressionCodec, codec_by_name};
use anyhow::{Context, Result, anyhow, bail};
use std::ffi::OsString;
use std::fs::{File, create_dir_all};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use tracing::debug;

/// What a transform does to its input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransformKind {
    Compress,
    Encrypt,
}

impl TransformKind {
    /// Name of the subfolder (next to the source) that receives artifacts.
    #[must_use]
    pub fn subfolder(self) -> &'static str {
        match self {
            TransformKind::Compress => "Compressed",
            TransformKind::Encrypt => "Encrypted",
        }
    }
}

/// Input of a single transform.
#[derive(Clone, Copy, Debug)]
pub enum TransformSource<'a> {
    /// An existing file on disk.
    File(&'a Path),
    /// A byte payload, e.g. one chunk of a larger file.
    Bytes(&'a [u8]),
}

/// One call into a [`TransformExecutor`].
#[derive(Clone, Copy, Debug)]
pub struct TransformRequest<'a> {
    pub source: TransformSource<'a>,
    pub destination: &'a Path,
    pub password: Option<&'a str>,
}

/// Performs the actual compress/encrypt work.
///
/// Implementations must be `Send + Sync`: the parallel orchestrator shares one
/// executor across all of its worker threads.
pub trait TransformExecutor: Send + Sync {
    /// Whether this executor compresses or encrypts.
    fn kind(&self) -> TransformKind;

    /// Artifact file extension, without the leading dot (e.g. `7z`).
    fn extension(&self) -> &str;

    /// Run one transform. `Ok(())` means the artifact was written to
    /// `request.destination`.
    ///
    /// # Errors
    /// Any failure of the underlying tool, with its error text.
    fn execute(&self, request: &TransformRequest<'_>) -> Result<()>;
}

impl<E: TransformExecutor + ?Sized> TransformExecutor for Arc<E> {
    fn kind(&self) -> TransformKind {
        (**self).kind()
    }
    fn extension(&self) -> &str {
        (**self).extension()
    }
    fn execute(&self, request: &TransformRequest<'_>) -> Result<()> {
        (**self).execute(request)
    }
}

/// Maps source files to artifact paths.
///
/// ```
/// use splitseal::executor::{ArtifactLayout, TransformKind};
/// use std::path::Path;
///
/// let layout = ArtifactLayout::new(TransformKind::Encrypt, "7z");
/// assert_eq!(
///     layout.artifact_path(Path::new("/data/output_3.csv")),
///     Path::new("/data/Encrypted/output_3.7z"),
/// );
/// assert_eq!(
///     layout.chunk_artifact_path(Path::new("/data/big.csv"), 2),
///     Path::new("/data/Encrypted/big_2.7z"),
/// );
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactLayout {
    subfolder: String,
    extension: String,
}

impl ArtifactLayout {
    #[must_use]
    pub fn new(kind: TransformKind, extension: impl Into<String>) -> Self {
        Self {
            subfolder: kind.subfolder().to_string(),
            extension: extension.into(),
        }
    }

    #[must_use]
    pub fn for_executor(executor: &dyn TransformExecutor) -> Self {
        Self::new(executor.kind(), executor.extension())
    }

    /// `{source dir}/{Compressed|Encrypted}`
    #[must_use]
    pub fn output_dir(&self, source: &Path) -> PathBuf {
        source
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(&self.subfolder)
    }

    /// `{output dir}/{stem}.{ext}`
    #[must_use]
    pub fn artifact_path(&self, source: &Path) -> PathBuf {
        self.output_dir(source)
            .join(format!("{}.{}", file_stem(source), self.extension))
    }

    /// `{output dir}/{stem}_{index}.{ext}`
    #[must_use]
    pub fn chunk_artifact_path(&self, source: &Path, index: usize) -> PathBuf {
        self.output_dir(source)
            .join(format!("{}_{index}.{}", file_stem(source), self.extension))
    }

    /// Create the output directory for `source` if it does not exist yet.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub fn ensure_output_dir(&self, source: &Path) -> Result<PathBuf> {
        let dir = self.output_dir(source);
        create_dir_all(&dir).with_context(|| format!("mkdir -p {}", dir.display()))?;
        Ok(dir)
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Runs an external 7-Zip binary for every request.
///
/// The command line is `a -y [-p<password> -mhe=on] <destination> <source>`;
/// byte payloads are piped to the process' stdin with `-si<name>`. A zero exit
/// status is success, anything else is a failure carrying the process' stderr.
#[derive(Clone, Debug)]
pub struct SevenZipExecutor {
    program: PathBuf,
    kind: TransformKind,
}

impl SevenZipExecutor {
    pub const DEFAULT_PROGRAM: &'static str = "7z";

    #[must_use]
    pub fn new(program: impl Into<PathBuf>, kind: TransformKind) -> Self {
        Self {
            program: program.into(),
            kind,
        }
    }

    #[must_use]
    pub fn compress() -> Self {
        Self::new(Self::DEFAULT_PROGRAM, TransformKind::Compress)
    }

    #[must_use]
    pub fn encrypt() -> Self {
        Self::new(Self::DEFAULT_PROGRAM, TransformKind::Encrypt)
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments passed to the 7-Zip program for `request`.
    #[must_use]
    pub fn command_args(&self, request: &TransformRequest<'_>) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["a".into(), "-y".into()];
        if let Some(password) = request.password {
            args.push(format!("-p{password}").into());
            args.push("-mhe=on".into());
        }
        args.push(request.destination.into());
        match request.source {
            TransformSource::File(path) => args.push(path.into()),
            TransformSource::Bytes(_) => {
                args.push(format!("-si{}", file_stem(request.destination)).into());
            }
        }
        args
    }
}

impl TransformExecutor for SevenZipExecutor {
    fn kind(&self) -> TransformKind {
        self.kind
    }

    fn extension(&self) -> &str {
        "7z"
    }

    fn execute(&self, request: &TransformRequest<'_>) -> Result<()> {
        if self.kind == TransformKind::Encrypt && request.password.is_none() {
            bail!("encryption of {} requires a password", request.destination.display());
        }

        let payload = match request.source {
            TransformSource::Bytes(bytes) => Some(bytes),
            TransformSource::File(_) => None,
        };
        let mut child = Command::new(&self.program)
            .args(self.command_args(request))
            .stdin(if payload.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawn {}", self.program.display()))?;

        if let (Some(bytes), Some(mut stdin)) = (payload, child.stdin.take()) {
            // A tool that exits early closes the pipe; its exit status decides.
            match stdin.write_all(bytes) {
                Err(e) if e.kind() != io::ErrorKind::BrokenPipe => {
                    return Err(e).with_context(|| {
                        format!("pipe payload to {}", self.program.display())
                    });
                }
                _ => {}
            }
        }

        let output = child
            .wait_with_output()
            .with_context(|| format!("wait for {}", self.program.display()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            );
        }
        debug!(destination = %request.destination.display(), "7-Zip transform finished");
        Ok(())
    }
}

/// Compresses in-process with a codec from [`crate::io::compression`].
///
/// Codecs cannot encrypt, so any request carrying a password fails.
#[derive(Clone)]
pub struct CodecExecutor {
    codec: Arc<dyn CompressionCodec>,
    extension: String,
}

impl CodecExecutor {
    /// Look up a registered codec by name (`gzip`, `zstd`, `bzip2`, `xz`, ...).
    ///
    /// # Errors
    /// Returns an error if no codec with that name is registered.
    pub fn new(codec_name: &str) -> Result<Self> {
        let codec =
            codec_by_name(codec_name).ok_or_else(|| anyhow!("unknown codec: {codec_name}"))?;
        Ok(Self::from_codec(codec))
    }

    #[must_use]
    pub fn from_codec(codec: Arc<dyn CompressionCodec>) -> Self {
        let extension = codec
            .extensions()
            .first()
            .map(|ext| ext.trim_start_matches('.').to_string())
            .unwrap_or_else(|| codec.name().to_string());
        Self { codec, extension }
    }

    #[must_use]
    pub fn codec_name(&self) -> &str {
        self.codec.name()
    }
}

impl TransformExecutor for CodecExecutor {
    fn kind(&self) -> TransformKind {
        TransformKind::Compress
    }

    fn extension(&self) -> &str {
        &self.extension
    }

    fn execute(&self, request: &TransformRequest<'_>) -> Result<()> {
        if request.password.is_some() {
            bail!("codec {} cannot apply a password", self.codec.name());
        }
        let dest = request.destination;
        let f = File::create(dest).with_context(|| format!("create {}", dest.display()))?;
        let mut w = self
            .codec
            .wrap_writer_dyn(Box::new(f))
            .with_context(|| format!("wrap writer with {} codec", self.codec.name()))?;
        match request.source {
            TransformSource::File(path) => {
                let mut src =
                    File::open(path).with_context(|| format!("open {}", path.display()))?;
                io::copy(&mut src, &mut w)
                    .with_context(|| format!("compress {} into {}", path.display(), dest.display()))?;
            }
            TransformSource::Bytes(bytes) => {
                w.write_all(bytes)
                    .with_context(|| format!("compress payload into {}", dest.display()))?;
            }
        }
        w.finish_stream()
            .with_context(|| format!("finish {} stream in {}", self.codec.name(), dest.display()))
    }
}
