//! A scripted [`TransformExecutor`] for tests.
//!
//! [`ScriptedExecutor`] never runs a real tool. It writes the input bytes (or
//! a fixed payload) to the destination, and can be told to fail, panic, or
//! stall for particular inputs. Inputs are matched by file name: the source's
//! for file requests, the destination's for byte payloads.

use crate::executor::{TransformExecutor, TransformKind, TransformRequest, TransformSource};
use anyhow::{Context, Result, bail};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Duration;

/// One call seen by a [`ScriptedExecutor`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedCall {
    /// Source path for file requests, `None` for byte payloads.
    pub source: Option<PathBuf>,
    /// Length of the byte payload, 0 for file requests.
    pub payload_len: usize,
    pub destination: PathBuf,
    pub password: Option<String>,
}

/// Test double for the transform boundary.
///
/// ```
/// use splitseal::testing::ScriptedExecutor;
/// use std::time::Duration;
///
/// let exec = ScriptedExecutor::new()
///     .fail_on("output_2.csv")
///     .slow_on("output_3.csv", Duration::from_millis(50));
/// assert_eq!(exec.calls().len(), 0);
/// ```
pub struct ScriptedExecutor {
    kind: TransformKind,
    extension: String,
    failing: HashSet<String>,
    panicking: HashSet<String>,
    slow: HashMap<String, Duration>,
    delay: Duration,
    artifact_bytes: Option<Vec<u8>>,
    partial_on_failure: bool,
    directory_artifacts: HashSet<String>,
    write_artifacts: bool,
    calls: Mutex<Vec<RecordedCall>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl Default for ScriptedExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedExecutor {
    /// A compressing executor writing `.7z` artifacts that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self {
            kind: TransformKind::Compress,
            extension: "7z".to_string(),
            failing: HashSet::new(),
            panicking: HashSet::new(),
            slow: HashMap::new(),
            delay: Duration::ZERO,
            artifact_bytes: None,
            partial_on_failure: false,
            directory_artifacts: HashSet::new(),
            write_artifacts: true,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_kind(mut self, kind: TransformKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Report a failure for inputs named `name`.
    #[must_use]
    pub fn fail_on(mut self, name: impl Into<String>) -> Self {
        self.failing.insert(name.into());
        self
    }

    /// Panic for inputs named `name`.
    #[must_use]
    pub fn panic_on(mut self, name: impl Into<String>) -> Self {
        self.panicking.insert(name.into());
        self
    }

    /// Sleep `delay` before handling inputs named `name`.
    #[must_use]
    pub fn slow_on(mut self, name: impl Into<String>, delay: Duration) -> Self {
        self.slow.insert(name.into(), delay);
        self
    }

    /// Sleep `delay` before handling every input.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Write `bytes` as every artifact instead of copying the input.
    #[must_use]
    pub fn with_artifact_bytes(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.artifact_bytes = Some(bytes.into());
        self
    }

    /// Write the artifact before reporting a scripted failure, like a tool
    /// that dies halfway through.
    #[must_use]
    pub fn with_partial_artifacts(mut self) -> Self {
        self.partial_on_failure = true;
        self
    }

    /// Create a directory instead of a file as the artifact for inputs named
    /// `name`, so plain file deletion of that artifact fails.
    #[must_use]
    pub fn directory_artifact_on(mut self, name: impl Into<String>) -> Self {
        self.directory_artifacts.insert(name.into());
        self
    }

    /// Report success without writing any artifact.
    #[must_use]
    pub fn without_artifacts(mut self) -> Self {
        self.write_artifacts = false;
        self
    }

    /// Every call so far, in arrival order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Highest number of calls that were running at the same time.
    #[must_use]
    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, request: &TransformRequest<'_>) {
        let (source, payload_len) = match request.source {
            TransformSource::File(path) => (Some(path.to_path_buf()), 0),
            TransformSource::Bytes(bytes) => (None, bytes.len()),
        };
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall {
                source,
                payload_len,
                destination: request.destination.to_path_buf(),
                password: request.password.map(str::to_string),
            });
    }

    fn write_artifact(&self, request: &TransformRequest<'_>) -> Result<()> {
        let dest = request.destination;
        let bytes = match (&self.artifact_bytes, request.source) {
            (Some(fixed), _) => fixed.clone(),
            (None, TransformSource::File(path)) => {
                fs::read(path).with_context(|| format!("read {}", path.display()))?
            }
            (None, TransformSource::Bytes(bytes)) => bytes.to_vec(),
        };
        fs::write(dest, bytes).with_context(|| format!("write {}", dest.display()))
    }

    fn handle(&self, name: &str, request: &TransformRequest<'_>) -> Result<()> {
        let delay = self.slow.get(name).copied().unwrap_or(self.delay);
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        if self.panicking.contains(name) {
            panic!("scripted panic for {name}");
        }
        if self.failing.contains(name) {
            if self.partial_on_failure {
                self.write_artifact(request)?;
            }
            bail!("scripted failure for {name}");
        }
        if self.directory_artifacts.contains(name) {
            let dest = request.destination;
            return fs::create_dir_all(dest).with_context(|| format!("mkdir {}", dest.display()));
        }
        if !self.write_artifacts {
            return Ok(());
        }
        self.write_artifact(request)
    }
}

impl TransformExecutor for ScriptedExecutor {
    fn kind(&self) -> TransformKind {
        self.kind
    }

    fn extension(&self) -> &str {
        &self.extension
    }

    fn execute(&self, request: &TransformRequest<'_>) -> Result<()> {
        self.record(request);
        let name = match request.source {
            TransformSource::File(path) => file_name(path),
            TransformSource::Bytes(_) => file_name(request.destination),
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);
        self.handle(&name, request)
    }
}

/// Decrements the in-flight counter even when the call panics.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
