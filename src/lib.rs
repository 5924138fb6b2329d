//! # Splitseal
//!
//! A **record splitting and sealing toolkit**: turn a stream of records into
//! size-bounded CSV files, then compress or encrypt those files in parallel
//! with all-or-nothing semantics.
//!
//! ## Key Features
//!
//! - **Size-bounded splitting** - records are written to `output_1.csv`,
//!   `output_2.csv`, ... and each file rolls over before reaching a byte limit
//! - **Parallel transforms with rollback** - one unit of work per file on a
//!   bounded thread pool; if any unit fails, every artifact of the batch is deleted
//! - **Chunked transforms** - one large file is cut into fixed-size chunks, each
//!   transformed into its own artifact
//! - **Ratio estimation** - measure how well a file compresses without keeping
//!   the artifact
//! - **Pluggable executors** - an external 7-Zip program, in-process codecs
//!   (gzip, zstd, bzip2, xz; optional via feature flags), or your own
//!   [`TransformExecutor`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use splitseal::*;
//! use std::sync::Arc;
//! # use anyhow::Result;
//!
//! struct Row { name: String, code: u32 }
//! serializable!(Row { name, code });
//!
//! # fn main() -> Result<()> {
//! let rows = (1..=2500).map(|i| Row { name: format!("Name{i}"), code: i * 5 });
//!
//! // Split into <= 1 KiB files inside a fresh folder below ./output
//! let batch = SizeBoundedSplitter::new(1024).split(rows, "./output")?;
//!
//! // Encrypt every file; on any failure nothing is left behind
//! let orchestrator = ParallelTransform::new(
//!     Arc::new(SevenZipExecutor::encrypt()),
//!     TransformOptions::default(),
//! )?;
//! let report = orchestrator.run_with_report(&batch.paths(), Some("secret"));
//! println!("sealed {} of {} files", report.succeeded.len(), report.total());
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Records
//!
//! A record is anything implementing [`Serializable`]: an ordered list of
//! optional field values. [`serializable!`] derives it from a field list.
//! Lines carry no header and no escaping.
//!
//! ### Artifacts
//!
//! Transforms never touch their input. Artifacts are written next to the
//! input, into a `Compressed/` or `Encrypted/` subfolder (see
//! [`ArtifactLayout`]). Rolling back a batch means deleting its artifacts.
//!
//! ### Logging
//!
//! Every module reports through [`tracing`] events; install any subscriber to
//! see them. The crate never installs one itself.
//!
//! ## Module Overview
//!
//! - [`record`] - record-to-line serialization
//! - [`split`] - size-bounded CSV splitting and single-file export
//! - [`chunk`] - fixed-size chunking and per-chunk transforms
//! - [`orchestrator`] - parallel batch transforms with rollback
//! - [`estimate`] - compression ratio estimation
//! - [`executor`] - the transform boundary and built-in executors
//! - [`io`] - compression codecs and file globbing
//! - [`config`] - JSON configuration
//! - [`workflow`] - end-to-end flows combining the above
//! - [`testing`] - scripted executor and demo fixtures

pub mod chunk;
pub mod config;
pub mod estimate;
pub mod executor;
pub mod io;
pub mod orchestrator;
pub mod record;
pub mod split;
pub mod testing;
pub mod workflow;

// General re-exports
pub use chunk::{ChunkReader, ChunkReport, ChunkedTransform};
pub use config::Config;
pub use estimate::{CompressionRatio, RatioEstimator};
pub use executor::{
    ArtifactLayout, CodecExecutor, SevenZipExecutor, TransformExecutor, TransformKind,
    TransformRequest, TransformSource,
};
pub use orchestrator::{
    BatchReport, CancellationToken, FailureReason, ParallelTransform, TransformOptions,
};
pub use record::{CsvLine, Serializable, ToField};
pub use split::{OutputBatch, SizeBoundedSplitter};
pub use workflow::Workflow;
