//! End-to-end flows over records.
//!
//! A [`Workflow`] bundles configuration with an executor and exposes the three
//! ways records travel through splitseal:
//! - split into size-bounded files, then transform the batch in parallel
//! - export into one file, then transform it chunk by chunk
//! - export into one file, then estimate its compression ratio

use crate::chunk::{ChunkReport, ChunkedTransform};
use crate::config::Config;
use crate::estimate::{CompressionRatio, RatioEstimator};
use crate::executor::{TransformExecutor, TransformKind};
use crate::orchestrator::{BatchReport, ParallelTransform};
use crate::record::Serializable;
use crate::split::{OutputBatch, SizeBoundedSplitter};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Output of [`Workflow::split_and_transform`].
#[derive(Clone, Debug)]
pub struct SplitTransformReport {
    pub batch: OutputBatch,
    pub transform: BatchReport,
}

impl SplitTransformReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.transform.is_success()
    }
}

pub struct Workflow {
    output_folder: PathBuf,
    splitter: SizeBoundedSplitter,
    parallel: ParallelTransform,
    chunked: ChunkedTransform,
    estimator: RatioEstimator,
}

impl Workflow {
    /// Build a workflow writing below the configured output folder.
    ///
    /// # Errors
    /// Returns an error if the config is invalid, the output folder cannot be
    /// resolved, or the worker pool cannot be built.
    pub fn new(config: &Config, executor: Arc<dyn TransformExecutor>) -> Result<Self> {
        Self::with_output_folder(config, config.output_folder()?, executor)
    }

    /// Build a workflow that runs the configured 7-Zip program for `kind`.
    ///
    /// # Errors
    /// Same as [`Workflow::new`].
    pub fn from_config(config: &Config, kind: TransformKind) -> Result<Self> {
        Self::new(config, Arc::new(config.seven_zip_executor(kind)))
    }

    /// Build a workflow writing below `output_folder`, ignoring
    /// `config.output_folder_path`.
    ///
    /// # Errors
    /// Returns an error if the config is invalid or the worker pool cannot be built.
    pub fn with_output_folder(
        config: &Config,
        output_folder: impl Into<PathBuf>,
        executor: Arc<dyn TransformExecutor>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            output_folder: output_folder.into(),
            splitter: SizeBoundedSplitter::new(config.max_file_size_bytes),
            parallel: ParallelTransform::new(Arc::clone(&executor), config.transform_options())?,
            chunked: ChunkedTransform::new(Arc::clone(&executor))
                .with_chunk_size(config.chunk_size_bytes),
            estimator: RatioEstimator::new(executor),
        })
    }

    #[must_use]
    pub fn output_folder(&self) -> &Path {
        &self.output_folder
    }

    #[must_use]
    pub fn parallel(&self) -> &ParallelTransform {
        &self.parallel
    }

    /// Split records into a fresh batch folder and transform every file of it.
    ///
    /// # Errors
    /// Returns an error if splitting fails; transform failures are reported
    /// (and rolled back) inside the returned report.
    pub fn split_and_transform<R, I>(
        &self,
        records: I,
        password: Option<&str>,
    ) -> Result<SplitTransformReport>
    where
        R: Serializable,
        I: IntoIterator<Item = R>,
    {
        let batch = self.splitter.split(records, &self.output_folder)?;
        let transform = self.parallel.run_with_report(&batch.paths(), password);
        Ok(SplitTransformReport { batch, transform })
    }

    /// Export records into a single file and transform it in chunks.
    ///
    /// # Errors
    /// Returns an error if the export or any chunk transform fails.
    pub fn export_and_transform_in_chunks<R, I>(
        &self,
        records: I,
        password: Option<&str>,
    ) -> Result<ChunkReport>
    where
        R: Serializable,
        I: IntoIterator<Item = R>,
    {
        let path = self.splitter.export_single(records, &self.output_folder)?;
        self.chunked.transform_file(&path, password)
    }

    /// Export records into a single file and estimate its compression ratio.
    ///
    /// # Errors
    /// Returns an error only if the export fails; a failed estimation yields
    /// [`CompressionRatio::SENTINEL`].
    pub fn export_and_estimate<R, I>(&self, records: I) -> Result<CompressionRatio>
    where
        R: Serializable,
        I: IntoIterator<Item = R>,
    {
        let path = self.splitter.export_single(records, &self.output_folder)?;
        Ok(self.estimator.estimate(&path))
    }
}
