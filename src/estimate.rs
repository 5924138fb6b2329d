//! Compression ratio estimation for a single file.
//!
//! The estimator compresses the file once into a temporary location, compares
//! the artifact's size to the source's, and deletes the artifact again.

use crate::executor::{TransformExecutor, TransformRequest, TransformSource};
use anyhow::{Context, Result, bail};
use std::fs::{metadata, remove_file};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of an estimation.
///
/// `ratio` is `compressed / uncompressed`, `percentage` the space saved
/// (`(uncompressed - compressed) / uncompressed * 100`). The pair `(-1, -1)`
/// ([`CompressionRatio::SENTINEL`]) signals a failed estimation and is never
/// a measurement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompressionRatio {
    pub ratio: f64,
    pub percentage: f64,
}

impl CompressionRatio {
    pub const SENTINEL: Self = Self {
        ratio: -1.0,
        percentage: -1.0,
    };

    /// Ratio and saved percentage for the given sizes.
    ///
    /// # Errors
    /// Returns an error if `uncompressed` is zero.
    pub fn from_sizes(uncompressed: u64, compressed: u64) -> Result<Self> {
        if uncompressed == 0 {
            bail!("cannot estimate a ratio for an empty source");
        }
        #[allow(clippy::cast_precision_loss)]
        let (u, c) = (uncompressed as f64, compressed as f64);
        Ok(Self {
            ratio: c / u,
            percentage: (u - c) / u * 100.0,
        })
    }

    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        *self == Self::SENTINEL
    }
}

impl From<(f64, f64)> for CompressionRatio {
    fn from((ratio, percentage): (f64, f64)) -> Self {
        Self { ratio, percentage }
    }
}

impl From<CompressionRatio> for (f64, f64) {
    fn from(r: CompressionRatio) -> Self {
        (r.ratio, r.percentage)
    }
}

/// Runs one compression to measure how well a file compresses.
pub struct RatioEstimator {
    executor: Arc<dyn TransformExecutor>,
}

impl RatioEstimator {
    pub fn new(executor: Arc<dyn TransformExecutor>) -> Self {
        Self { executor }
    }

    /// Estimate the ratio for `path`, or [`CompressionRatio::SENTINEL`] on any
    /// failure (including an empty source).
    pub fn estimate(&self, path: impl AsRef<Path>) -> CompressionRatio {
        let path = path.as_ref();
        self.try_estimate(path).unwrap_or_else(|e| {
            warn!(path = %path.display(), "ratio estimation failed: {e:#}");
            CompressionRatio::SENTINEL
        })
    }

    /// Like [`estimate`](Self::estimate), with the failure cause.
    ///
    /// # Errors
    /// Returns an error if the source is missing or empty, the executor fails,
    /// or it produced no artifact.
    pub fn try_estimate(&self, path: impl AsRef<Path>) -> Result<CompressionRatio> {
        let path = path.as_ref();
        let uncompressed = metadata(path)
            .with_context(|| format!("stat {}", path.display()))?
            .len();
        if uncompressed == 0 {
            bail!("{} is empty", path.display());
        }

        // Artifacts go to a scratch dir next to the source, never to the
        // regular Compressed/ folder.
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
        let scratch = match dir {
            Some(dir) => tempfile::Builder::new().prefix(".estimate-").tempdir_in(dir),
            None => tempfile::Builder::new().prefix(".estimate-").tempdir_in("."),
        }
        .context("create scratch dir for estimation")?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let artifact = scratch
            .path()
            .join(format!("{stem}.{}", self.executor.extension()));

        self.executor
            .execute(&TransformRequest {
                source: TransformSource::File(path),
                destination: &artifact,
                password: None,
            })
            .with_context(|| format!("compress {}", path.display()))?;

        let compressed = metadata(&artifact)
            .with_context(|| format!("no artifact produced at {}", artifact.display()))?
            .len();
        if let Err(e) = remove_file(&artifact) {
            debug!(artifact = %artifact.display(), "temporary artifact not removed: {e}");
        }

        let ratio = CompressionRatio::from_sizes(uncompressed, compressed)?;
        debug!(
            path = %path.display(),
            uncompressed,
            compressed,
            ratio = ratio.ratio,
            "estimated compression ratio"
        );
        Ok(ratio)
    }
}
