//! Size-bounded CSV splitting.
//!
//! [`SizeBoundedSplitter`] writes records as CSV lines into successive files
//! `output_1.csv`, `output_2.csv`, ... and rolls over to the next file once
//! adding a line would reach the byte threshold.
//!
//! # Design notes
//! - Sizes are accounted per serialized line (UTF-8 bytes, line terminator
//!   excluded), so every file's accounted size stays below the threshold
//!   unless a single line alone exceeds it. Such a line still gets written,
//!   alone in its own file.
//! - Writers are opened lazily: an empty input produces zero files.
//! - Files written before an I/O error are left on disk. Rollback is a property
//!   of the transform orchestrator, not of the splitter.

use crate::record::{CsvLine, Serializable};
use anyhow::{Context, Result};
use std::fs::{File, create_dir_all};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};
use uuid::Uuid;

/// Default rollover threshold in bytes.
pub const DEFAULT_MAX_FILE_SIZE_BYTES: usize = 1024;

/// One file produced by a split run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputFile {
    pub path: PathBuf,
    /// 1-based ordinal, matching the `output_<index>.csv` file name.
    pub index: usize,
    /// Sum of the serialized line sizes written to this file, terminators excluded.
    pub size: usize,
}

/// All files produced by one split run, in index order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OutputBatch {
    pub folder: PathBuf,
    pub files: Vec<OutputFile>,
}

impl OutputBatch {
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }
}

/// Path of the `index`-th output file inside `folder`.
#[must_use]
pub fn output_file_path(folder: &Path, index: usize) -> PathBuf {
    folder.join(format!("output_{index}.csv"))
}

/// Splits a record stream into size-bounded CSV files.
///
/// ```no_run
/// use splitseal::split::SizeBoundedSplitter;
/// use splitseal::serializable;
///
/// struct Row { name: String, code: u32 }
/// serializable!(Row { name, code });
///
/// # fn main() -> anyhow::Result<()> {
/// let rows = (0..1000).map(|i| Row { name: format!("Name{i}"), code: i * 5 });
/// let batch = SizeBoundedSplitter::default().split(rows, "./output")?;
/// println!("{} files in {}", batch.len(), batch.folder.display());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Copy, Debug)]
pub struct SizeBoundedSplitter {
    max_file_size_bytes: usize,
    line: CsvLine,
}

impl Default for SizeBoundedSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILE_SIZE_BYTES)
    }
}

impl SizeBoundedSplitter {
    #[must_use]
    pub fn new(max_file_size_bytes: usize) -> Self {
        Self {
            max_file_size_bytes,
            line: CsvLine::default(),
        }
    }

    #[must_use]
    pub fn with_line_format(mut self, line: CsvLine) -> Self {
        self.line = line;
        self
    }

    #[must_use]
    pub fn max_file_size_bytes(&self) -> usize {
        self.max_file_size_bytes
    }

    /// Split `records` into a fresh, uniquely named subfolder of `base`.
    ///
    /// Repeated calls never collide: each gets its own UUID-named folder.
    ///
    /// # Errors
    /// Returns an error if any folder or file cannot be created or written.
    pub fn split<R, I>(&self, records: I, base: impl AsRef<Path>) -> Result<OutputBatch>
    where
        R: Serializable,
        I: IntoIterator<Item = R>,
    {
        let folder = base.as_ref().join(Uuid::new_v4().to_string());
        self.split_into(records, folder)
    }

    /// Split `records` into `folder` itself, creating it if needed.
    ///
    /// Same-named files from an earlier run are overwritten; files with a
    /// higher index from a longer earlier run are left alone.
    ///
    /// # Errors
    /// Returns an error if any folder or file cannot be created or written.
    pub fn split_into<R, I>(&self, records: I, folder: impl AsRef<Path>) -> Result<OutputBatch>
    where
        R: Serializable,
        I: IntoIterator<Item = R>,
    {
        let folder = folder.as_ref();
        let result = self.write_batch(records, folder);
        match &result {
            Ok(batch) => info!(
                folder = %folder.display(),
                files = batch.len(),
                "split records into size-bounded files"
            ),
            Err(e) => error!(folder = %folder.display(), "split failed: {e:#}"),
        }
        result
    }

    fn write_batch<R, I>(&self, records: I, folder: &Path) -> Result<OutputBatch>
    where
        R: Serializable,
        I: IntoIterator<Item = R>,
    {
        create_dir_all(folder).with_context(|| format!("mkdir -p {}", folder.display()))?;

        let mut state = SplitState::new(folder);
        let written = self.write_records(records, &mut state);
        // Close on every exit path; the first error wins.
        let closed = state.close();
        written?;
        closed?;
        Ok(state.into_batch())
    }

    fn write_records<R, I>(&self, records: I, state: &mut SplitState) -> Result<()>
    where
        R: Serializable,
        I: IntoIterator<Item = R>,
    {
        for record in records {
            let line = self.line.render(&record);
            let line_size = line.len();
            if state.is_open() && state.current_size() + line_size >= self.max_file_size_bytes {
                state.close()?;
            }
            if !state.is_open() {
                state.open_next()?;
            }
            state.append(&line)?;
        }
        Ok(())
    }

    /// Write every record into one fresh `{uuid}.csv` file inside `folder`,
    /// without any size bound. Returns the file's path.
    ///
    /// # Errors
    /// Returns an error if the folder or file cannot be created or written.
    pub fn export_single<R, I>(&self, records: I, folder: impl AsRef<Path>) -> Result<PathBuf>
    where
        R: Serializable,
        I: IntoIterator<Item = R>,
    {
        let folder = folder.as_ref();
        create_dir_all(folder).with_context(|| format!("mkdir -p {}", folder.display()))?;
        let path = folder.join(format!("{}.csv", Uuid::new_v4()));
        let f = File::create(&path).with_context(|| format!("create {}", path.display()))?;
        let mut w = BufWriter::new(f);
        let mut count = 0usize;
        for record in records {
            writeln!(w, "{}", self.line.render(&record))
                .with_context(|| format!("write record #{} to {}", count + 1, path.display()))?;
            count += 1;
        }
        w.flush()
            .with_context(|| format!("flush {}", path.display()))?;
        info!(path = %path.display(), records = count, "exported records");
        Ok(path)
    }
}

/// Mutable bookkeeping of one split run. Owns the single open writer.
struct SplitState {
    folder: PathBuf,
    writer: Option<BufWriter<File>>,
    files: Vec<OutputFile>,
}

impl SplitState {
    fn new(folder: &Path) -> Self {
        Self {
            folder: folder.to_path_buf(),
            writer: None,
            files: Vec::new(),
        }
    }

    fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    fn current_size(&self) -> usize {
        self.files.last().map_or(0, |f| f.size)
    }

    fn open_next(&mut self) -> Result<()> {
        let index = self.files.len() + 1;
        let path = output_file_path(&self.folder, index);
        let f = File::create(&path).with_context(|| format!("create {}", path.display()))?;
        debug!(path = %path.display(), "opened output file");
        self.writer = Some(BufWriter::new(f));
        self.files.push(OutputFile {
            path,
            index,
            size: 0,
        });
        Ok(())
    }

    fn append(&mut self, line: &str) -> Result<()> {
        let (Some(w), Some(file)) = (self.writer.as_mut(), self.files.last_mut()) else {
            anyhow::bail!("no open output file in {}", self.folder.display());
        };
        writeln!(w, "{line}").with_context(|| format!("write to {}", file.path.display()))?;
        file.size += line.len();
        Ok(())
    }

    /// Flush and release the open writer, if any. Idempotent.
    fn close(&mut self) -> Result<()> {
        if let Some(mut w) = self.writer.take() {
            let path = self
                .files
                .last()
                .map(|f| f.path.display().to_string())
                .unwrap_or_default();
            w.flush().with_context(|| format!("flush {path}"))?;
        }
        Ok(())
    }

    fn into_batch(self) -> OutputBatch {
        OutputBatch {
            folder: self.folder,
            files: self.files,
        }
    }
}
