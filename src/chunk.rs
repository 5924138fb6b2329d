//! Fixed-size binary chunking of a single file.
//!
//! [`ChunkReader`] slices any reader into `chunk_size` pieces (the last one
//! may be shorter). [`ChunkedTransform`] feeds each piece of a file to a
//! [`TransformExecutor`] as its own artifact, `{stem}_{index}.{ext}`.
//!
//! Chunks of a file are transformed strictly one after another: the next
//! chunk is only read once the previous one has been transformed. Files
//! passed to [`ChunkedTransform::run`] are likewise processed in sequence.
//!
//! When a chunk fails, the artifacts already produced for earlier chunks of
//! the same file are deleted, so a file is either fully chunked or leaves no
//! chunk artifacts behind. Other files are not touched.

use crate::executor::{ArtifactLayout, TransformExecutor, TransformRequest, TransformSource};
use anyhow::{Context, Result};
use std::fs::{File, remove_file};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default chunk size: 2 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 2 * 1024 * 1024;

/// Upper bound on the buffer reserved before a chunk is read. Larger chunks
/// grow as bytes arrive, so the chunk size alone never drives an allocation.
const INITIAL_CAPACITY: usize = 64 * 1024;

/// A contiguous slice of a source, numbered from 1.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub data: Vec<u8>,
}

/// Iterator over fixed-size chunks of a reader.
///
/// Every chunk but the last holds exactly `chunk_size` bytes. Reading stops at
/// end of input; an empty input yields no chunks.
///
/// ```
/// use splitseal::chunk::ChunkReader;
///
/// let data = vec![7u8; 10];
/// let sizes: Vec<usize> = ChunkReader::new(&data[..], 4)
///     .map(|c| c.map(|c| c.data.len()))
///     .collect::<std::io::Result<_>>()
///     .unwrap();
/// assert_eq!(sizes, vec![4, 4, 2]);
/// ```
pub struct ChunkReader<R> {
    reader: R,
    chunk_size: usize,
    next_index: usize,
    done: bool,
}

impl<R: Read> ChunkReader<R> {
    /// `chunk_size` is clamped to at least 1 byte.
    pub fn new(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            chunk_size: chunk_size.max(1),
            next_index: 1,
            done: false,
        }
    }
}

impl<R: Read> Iterator for ChunkReader<R> {
    type Item = io::Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut buf = Vec::with_capacity(self.chunk_size.min(INITIAL_CAPACITY));
        let limit = u64::try_from(self.chunk_size).unwrap_or(u64::MAX);
        if let Err(e) = (&mut self.reader).take(limit).read_to_end(&mut buf) {
            self.done = true;
            return Some(Err(e));
        }
        if buf.len() < self.chunk_size {
            self.done = true;
        }
        if buf.is_empty() {
            return None;
        }
        let index = self.next_index;
        self.next_index += 1;
        Some(Ok(Chunk { index, data: buf }))
    }
}

/// Result of chunking one file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChunkReport {
    pub source: PathBuf,
    /// Artifact paths in chunk order.
    pub artifacts: Vec<PathBuf>,
    /// Total bytes read from the source.
    pub bytes: u64,
}

/// Transforms files chunk by chunk through a [`TransformExecutor`].
pub struct ChunkedTransform {
    executor: Arc<dyn TransformExecutor>,
    layout: ArtifactLayout,
    chunk_size: usize,
}

impl ChunkedTransform {
    pub fn new(executor: Arc<dyn TransformExecutor>) -> Self {
        let layout = ArtifactLayout::for_executor(executor.as_ref());
        Self {
            executor,
            layout,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[must_use]
    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Chunk every file in order. Returns `true` iff all of them succeeded;
    /// stops at the first failing file.
    pub fn run(&self, paths: &[PathBuf], password: Option<&str>) -> bool {
        for path in paths {
            if let Err(e) = self.transform_file(path, password) {
                warn!(path = %path.display(), "chunked transform failed: {e:#}");
                return false;
            }
        }
        true
    }

    /// Chunk one file and transform each chunk into its own artifact.
    ///
    /// # Errors
    /// Returns an error if the source cannot be read or any chunk fails to
    /// transform. Artifacts of earlier chunks of this file are deleted first.
    pub fn transform_file(&self, path: &Path, password: Option<&str>) -> Result<ChunkReport> {
        let mut report = ChunkReport {
            source: path.to_path_buf(),
            ..ChunkReport::default()
        };
        match self.transform_chunks(path, password, &mut report) {
            Ok(()) => {
                info!(
                    path = %path.display(),
                    chunks = report.artifacts.len(),
                    bytes = report.bytes,
                    "chunked transform finished"
                );
                Ok(report)
            }
            Err(e) => {
                discard_artifacts(&report.artifacts);
                Err(e)
            }
        }
    }

    fn transform_chunks(
        &self,
        path: &Path,
        password: Option<&str>,
        report: &mut ChunkReport,
    ) -> Result<()> {
        let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
        self.layout.ensure_output_dir(path)?;
        for chunk in ChunkReader::new(f, self.chunk_size) {
            let chunk = chunk.with_context(|| format!("read chunk from {}", path.display()))?;
            let destination = self.layout.chunk_artifact_path(path, chunk.index);
            let request = TransformRequest {
                source: TransformSource::Bytes(&chunk.data),
                destination: &destination,
                password,
            };
            if let Err(e) = self.executor.execute(&request) {
                // A failing tool may still leave a partial artifact behind.
                if destination.exists() {
                    report.artifacts.push(destination);
                }
                return Err(e).with_context(|| {
                    format!("transform chunk {} of {}", chunk.index, path.display())
                });
            }
            debug!(artifact = %destination.display(), len = chunk.data.len(), "chunk transformed");
            report.bytes += chunk.data.len() as u64;
            report.artifacts.push(destination);
        }
        Ok(())
    }
}

fn discard_artifacts(artifacts: &[PathBuf]) {
    for artifact in artifacts {
        if let Err(e) = remove_file(artifact) {
            warn!(artifact = %artifact.display(), "failed to delete chunk artifact: {e}");
        }
    }
}
