//! Configuration.
//!
//! Settings are read from JSON; every field is optional:
//!
//! ```json
//! {
//!   "output_folder_path": "output",
//!   "max_file_size_bytes": 1024,
//!   "chunk_size_bytes": 2097152,
//!   "max_parallelism": 8,
//!   "timeout_secs": 600,
//!   "seven_zip_program": "7z"
//! }
//! ```
//!
//! `output_folder_path` is resolved against the process base directory, the
//! directory holding the running executable (see [`Config::output_folder`]).

use crate::chunk::DEFAULT_CHUNK_SIZE;
use crate::executor::{SevenZipExecutor, TransformKind};
use crate::orchestrator::TransformOptions;
use crate::split::DEFAULT_MAX_FILE_SIZE_BYTES;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Base output folder, relative to the process base directory unless absolute.
    pub output_folder_path: PathBuf,
    pub max_file_size_bytes: usize,
    pub chunk_size_bytes: usize,
    /// `None` uses one worker per CPU.
    pub max_parallelism: Option<usize>,
    /// `None` waits for every unit without limit.
    pub timeout_secs: Option<u64>,
    /// 7-Zip binary used by [`seven_zip_executor`](Self::seven_zip_executor);
    /// a bare name is looked up on `PATH`.
    pub seven_zip_program: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_folder_path: PathBuf::from("output"),
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            chunk_size_bytes: DEFAULT_CHUNK_SIZE,
            max_parallelism: None,
            timeout_secs: None,
            seven_zip_program: PathBuf::from(SevenZipExecutor::DEFAULT_PROGRAM),
        }
    }
}

impl Config {
    /// # Errors
    /// Returns an error if the JSON is malformed, has unknown fields, or fails
    /// [`validate`](Self::validate).
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("parse config JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        Self::from_json_str(&json).with_context(|| format!("load config {}", path.display()))
    }

    /// # Errors
    /// Returns an error for a zero size limit, chunk size, or parallelism.
    pub fn validate(&self) -> Result<()> {
        if self.max_file_size_bytes == 0 {
            bail!("max_file_size_bytes must be greater than zero");
        }
        if self.chunk_size_bytes == 0 {
            bail!("chunk_size_bytes must be greater than zero");
        }
        if self.max_parallelism == Some(0) {
            bail!("max_parallelism must be greater than zero");
        }
        Ok(())
    }

    /// The output folder resolved against the process base directory.
    ///
    /// # Errors
    /// Returns an error if the running executable's path cannot be determined.
    pub fn output_folder(&self) -> Result<PathBuf> {
        Ok(self.output_folder_from(&base_directory()?))
    }

    /// The output folder resolved against `base`.
    #[must_use]
    pub fn output_folder_from(&self, base: &Path) -> PathBuf {
        base.join(&self.output_folder_path)
    }

    /// A 7-Zip executor running the configured program.
    #[must_use]
    pub fn seven_zip_executor(&self, kind: TransformKind) -> SevenZipExecutor {
        SevenZipExecutor::new(&self.seven_zip_program, kind)
    }

    #[must_use]
    pub fn transform_options(&self) -> TransformOptions {
        TransformOptions {
            max_parallelism: self.max_parallelism,
            timeout: self.timeout_secs.map(Duration::from_secs),
        }
    }
}

/// Directory containing the running executable.
///
/// # Errors
/// Returns an error if the executable path is unavailable.
pub fn base_directory() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("locate running executable")?;
    Ok(exe
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf))
}
