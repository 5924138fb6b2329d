//! All-or-nothing parallel transform of a batch of files.
//!
//! [`ParallelTransform`] runs one unit of work per input file on a bounded
//! rayon thread pool. Every unit calls the shared [`TransformExecutor`] on its
//! file; the caller blocks until all units have reported. A failing unit never
//! cancels its siblings.
//!
//! If any unit failed (executor error or panic), or the batch was interrupted
//! by its timeout or [`CancellationToken`], the batch is rejected: the
//! artifacts of all units that *did* succeed are deleted again. Originals are
//! never modified by a transform, so deleting the new artifacts is the whole
//! compensation.
//!
//! # Outcome bookkeeping
//! Units record their [`TransformOutcome`] into one mutex-guarded state; the
//! orchestrator reads it once all units are done (or at the cutoff). After the
//! cutoff the batch is closed: units that have not started skip their work,
//! and units that finish late delete their own artifact instead of recording it.
//! Every distinct input ends up in exactly one of `succeeded` / `failed`.

use crate::executor::{ArtifactLayout, TransformExecutor, TransformRequest, TransformSource};
use crate::io::glob::csv_files_in;
use anyhow::{Context, Result};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fs::remove_file;
use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How often a waiting orchestrator re-checks its cancellation token.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Shared flag to stop waiting for a running batch.
///
/// Cloning yields a handle to the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Tuning knobs for [`ParallelTransform`].
#[derive(Clone, Debug, Default)]
pub struct TransformOptions {
    /// Worker threads; `None` uses the number of CPUs.
    pub max_parallelism: Option<usize>,
    /// Stop waiting for stragglers after this long and reject the batch.
    pub timeout: Option<Duration>,
}

/// An input that was transformed, and the artifact it produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transformed {
    pub input: PathBuf,
    pub artifact: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FailureReason {
    /// The executor reported a failure.
    Executor(String),
    /// The unit panicked.
    Fault(String),
    /// The batch timed out or was cancelled before this unit finished.
    Interrupted,
    /// Another input of the batch maps to the same artifact path; neither is run.
    ArtifactCollision(PathBuf),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailedTransform {
    pub input: PathBuf,
    pub reason: FailureReason,
}

/// What happened to one input file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransformOutcome {
    Succeeded(Transformed),
    Failed(FailedTransform),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interruption {
    TimedOut,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RollbackError {
    pub artifact: PathBuf,
    pub message: String,
}

/// Result of one batch run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Units whose transform succeeded. On a rejected batch their artifacts
    /// have been rolled back (see `rolled_back`).
    pub succeeded: Vec<Transformed>,
    pub failed: Vec<FailedTransform>,
    pub interruption: Option<Interruption>,
    /// Artifacts deleted by rollback.
    pub rolled_back: Vec<PathBuf>,
    /// Artifacts rollback could not delete.
    pub rollback_errors: Vec<RollbackError>,
}

impl BatchReport {
    /// `true` iff every input transformed successfully.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.interruption.is_none()
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// Runs a [`TransformExecutor`] over a batch of files with rollback on failure.
///
/// ```no_run
/// use splitseal::executor::SevenZipExecutor;
/// use splitseal::orchestrator::{ParallelTransform, TransformOptions};
/// use std::sync::Arc;
///
/// # fn main() -> anyhow::Result<()> {
/// let batch = ParallelTransform::new(
///     Arc::new(SevenZipExecutor::encrypt()),
///     TransformOptions::default(),
/// )?;
/// let report = batch.run_folder("./output/some-batch", Some("secret"))?;
/// assert!(
///     report.is_success()
///         || report.succeeded.len() == report.rolled_back.len() + report.rollback_errors.len()
/// );
/// # Ok(())
/// # }
/// ```
pub struct ParallelTransform {
    executor: Arc<dyn TransformExecutor>,
    layout: ArtifactLayout,
    pool: ThreadPool,
    timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl ParallelTransform {
    /// # Errors
    /// Returns an error if the worker thread pool cannot be built.
    pub fn new(executor: Arc<dyn TransformExecutor>, options: TransformOptions) -> Result<Self> {
        let threads = options
            .max_parallelism
            .unwrap_or_else(num_cpus::get)
            .max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("splitseal-transform-{i}"))
            .build()
            .context("build transform thread pool")?;
        let layout = ArtifactLayout::for_executor(executor.as_ref());
        Ok(Self {
            executor,
            layout,
            pool,
            timeout: options.timeout,
            cancel: CancellationToken::new(),
        })
    }

    /// Use `token` to cancel batches run by this orchestrator.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    #[must_use]
    pub fn parallelism(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Transform every file; `true` iff all of them succeeded.
    pub fn run(&self, paths: &[PathBuf], password: Option<&str>) -> bool {
        self.run_with_report(paths, password).is_success()
    }

    /// Transform every `*.csv` file directly inside `folder`.
    ///
    /// # Errors
    /// Returns an error only if the folder listing fails; transform failures
    /// are reported in the [`BatchReport`].
    pub fn run_folder(&self, folder: impl AsRef<Path>, password: Option<&str>) -> Result<BatchReport> {
        let folder = folder.as_ref();
        let files = csv_files_in(folder)
            .with_context(|| format!("list csv files in {}", folder.display()))?;
        Ok(self.run_with_report(&files, password))
    }

    /// Transform every file and report per-file outcomes.
    pub fn run_with_report(&self, paths: &[PathBuf], password: Option<&str>) -> BatchReport {
        let inputs = distinct(paths);
        info!(files = inputs.len(), threads = self.parallelism(), "starting transform batch");

        let (units, collisions) = separate_collisions(&self.layout, inputs);
        let batch = Arc::new(Batch::new(units.len()));
        let password: Option<Arc<str>> = password.map(Arc::from);
        for input in &units {
            self.spawn_unit(Arc::clone(&batch), input.clone(), password.clone());
        }

        let (outcomes, interruption) = self.collect(&batch, &units);
        let mut report = BatchReport {
            interruption,
            ..BatchReport::default()
        };
        let collided = collisions.into_iter().map(TransformOutcome::Failed);
        for outcome in outcomes.into_iter().chain(collided) {
            match outcome {
                TransformOutcome::Succeeded(t) => report.succeeded.push(t),
                TransformOutcome::Failed(f) => {
                    warn!(input = %f.input.display(), reason = ?f.reason, "transform failed");
                    report.failed.push(f);
                }
            }
        }

        if report.is_success() {
            info!(files = report.succeeded.len(), "transform batch succeeded");
        } else {
            self.rollback(&mut report);
            warn!(
                failed = report.failed.len(),
                rolled_back = report.rolled_back.len(),
                rollback_errors = report.rollback_errors.len(),
                "transform batch rejected"
            );
        }
        report
    }

    fn spawn_unit(&self, batch: Arc<Batch>, input: PathBuf, password: Option<Arc<str>>) {
        let executor = Arc::clone(&self.executor);
        let layout = self.layout.clone();
        let cancel = self.cancel.clone();
        self.pool.spawn(move || {
            if batch.is_closed() {
                return;
            }
            if cancel.is_cancelled() {
                batch.complete(TransformOutcome::Failed(FailedTransform {
                    input,
                    reason: FailureReason::Interrupted,
                }));
                return;
            }
            let result = catch_unwind(AssertUnwindSafe(|| {
                transform_one(executor.as_ref(), &layout, &input, password.as_deref())
            }));
            let outcome = match result {
                Ok(Ok(artifact)) => TransformOutcome::Succeeded(Transformed { input, artifact }),
                Ok(Err(e)) => TransformOutcome::Failed(FailedTransform {
                    input,
                    reason: FailureReason::Executor(format!("{e:#}")),
                }),
                Err(panic) => TransformOutcome::Failed(FailedTransform {
                    input,
                    reason: FailureReason::Fault(panic_message(panic.as_ref())),
                }),
            };
            batch.complete(outcome);
        });
    }

    /// Wait for all units, the timeout, or cancellation, whichever comes first.
    fn collect(
        &self,
        batch: &Batch,
        inputs: &[PathBuf],
    ) -> (Vec<TransformOutcome>, Option<Interruption>) {
        let deadline = self.timeout.map(|t| Instant::now() + t);
        let mut state = batch.lock();
        let mut interruption = None;
        while state.pending > 0 {
            if self.cancel.is_cancelled() {
                interruption = Some(Interruption::Cancelled);
                break;
            }
            let mut wait = POLL_INTERVAL;
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    interruption = Some(Interruption::TimedOut);
                    break;
                }
                wait = wait.min(deadline - now);
            }
            state = batch
                .done
                .wait_timeout(state, wait)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }

        state.closed = true;
        let mut outcomes = std::mem::take(&mut state.outcomes);
        drop(state);

        if interruption.is_some() {
            let reported: HashSet<PathBuf> = outcomes
                .iter()
                .map(|o| match o {
                    TransformOutcome::Succeeded(t) => t.input.clone(),
                    TransformOutcome::Failed(f) => f.input.clone(),
                })
                .collect();
            for input in inputs.iter().filter(|i| !reported.contains(*i)) {
                outcomes.push(TransformOutcome::Failed(FailedTransform {
                    input: input.clone(),
                    reason: FailureReason::Interrupted,
                }));
            }
        }
        (outcomes, interruption)
    }

    /// Delete every succeeded artifact, concurrently and best effort.
    fn rollback(&self, report: &mut BatchReport) {
        let results: Vec<(PathBuf, io::Result<()>)> = report
            .succeeded
            .par_iter()
            .map(|t| (t.artifact.clone(), remove_file(&t.artifact)))
            .collect();
        for (artifact, result) in results {
            match result {
                Ok(()) => {
                    debug!(artifact = %artifact.display(), "rolled back");
                    report.rolled_back.push(artifact);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!(artifact = %artifact.display(), "artifact already gone");
                    report.rolled_back.push(artifact);
                }
                Err(e) => {
                    warn!(artifact = %artifact.display(), "rollback failed: {e}");
                    report.rollback_errors.push(RollbackError {
                        artifact,
                        message: e.to_string(),
                    });
                }
            }
        }
    }
}

fn transform_one(
    executor: &dyn TransformExecutor,
    layout: &ArtifactLayout,
    input: &Path,
    password: Option<&str>,
) -> Result<PathBuf> {
    layout.ensure_output_dir(input)?;
    let artifact = layout.artifact_path(input);
    let request = TransformRequest {
        source: TransformSource::File(input),
        destination: &artifact,
        password,
    };
    if let Err(e) = executor.execute(&request) {
        // Partial output of a failed tool is not an artifact.
        let _ = remove_file(&artifact);
        return Err(e).with_context(|| format!("transform {}", input.display()));
    }
    debug!(input = %input.display(), artifact = %artifact.display(), "transformed");
    Ok(artifact)
}

/// Inputs form a set: keep the first occurrence of each path.
fn distinct(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    paths
        .iter()
        .filter(|p| seen.insert(p.as_path()))
        .cloned()
        .collect()
}

/// Split off inputs whose artifact path another input also maps to, such as
/// `data.csv` and `data.txt` next to each other. Those are failed up front so
/// no two units ever write the same artifact.
fn separate_collisions(
    layout: &ArtifactLayout,
    inputs: Vec<PathBuf>,
) -> (Vec<PathBuf>, Vec<FailedTransform>) {
    let mut claims: HashMap<PathBuf, usize> = HashMap::new();
    for input in &inputs {
        *claims.entry(layout.artifact_path(input)).or_default() += 1;
    }
    let mut units = Vec::with_capacity(inputs.len());
    let mut collisions = Vec::new();
    for input in inputs {
        let artifact = layout.artifact_path(&input);
        if claims.get(&artifact).is_some_and(|n| *n > 1) {
            collisions.push(FailedTransform {
                input,
                reason: FailureReason::ArtifactCollision(artifact),
            });
        } else {
            units.push(input);
        }
    }
    (units, collisions)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unit panicked".to_string()
    }
}

struct Batch {
    state: Mutex<BatchState>,
    done: Condvar,
}

struct BatchState {
    pending: usize,
    closed: bool,
    outcomes: Vec<TransformOutcome>,
}

impl Batch {
    fn new(units: usize) -> Self {
        Self {
            state: Mutex::new(BatchState {
                pending: units,
                closed: false,
                outcomes: Vec::with_capacity(units),
            }),
            done: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn complete(&self, outcome: TransformOutcome) {
        let mut state = self.lock();
        if state.closed {
            drop(state);
            // The batch was already settled without us.
            if let TransformOutcome::Succeeded(t) = outcome {
                if let Err(e) = remove_file(&t.artifact) {
                    warn!(artifact = %t.artifact.display(), "failed to delete late artifact: {e}");
                } else {
                    debug!(artifact = %t.artifact.display(), "deleted late artifact");
                }
            }
            return;
        }
        state.outcomes.push(outcome);
        state.pending -= 1;
        if state.pending == 0 {
            self.done.notify_all();
        }
    }
}
