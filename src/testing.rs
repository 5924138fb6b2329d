//! Testing utilities for code built on splitseal.
//!
//! - **Scripted executor**: a [`TransformExecutor`](crate::executor::TransformExecutor)
//!   that fails, panics, or stalls on demand and records every call
//! - **Fixtures**: wide demo records and a seeding helper
//!
//! # Quick Start
//!
//! ```no_run
//! use splitseal::orchestrator::{ParallelTransform, TransformOptions};
//! use splitseal::split::SizeBoundedSplitter;
//! use splitseal::testing::*;
//! use std::sync::Arc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let dir = tempfile::tempdir()?;
//! let batch = SizeBoundedSplitter::default().split(seed_records(50), dir.path())?;
//!
//! let exec = Arc::new(ScriptedExecutor::new().fail_on("output_2.csv"));
//! let orchestrator = ParallelTransform::new(exec, TransformOptions::default())?;
//! let report = orchestrator.run_with_report(&batch.paths(), None);
//!
//! assert!(!report.is_success());
//! assert_eq!(report.rolled_back.len(), report.succeeded.len());
//! # Ok(())
//! # }
//! ```

pub mod executor;
pub mod fixtures;

pub use executor::*;
pub use fixtures::*;
