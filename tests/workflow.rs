//! End-to-end flows: split then transform, export then chunk, export then estimate.

use splitseal::config::Config;
use splitseal::executor::TransformKind;
use splitseal::testing::{ScriptedExecutor, seed_records};
use splitseal::workflow::Workflow;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn config() -> Config {
    Config {
        max_file_size_bytes: 1024,
        chunk_size_bytes: 4096,
        max_parallelism: Some(4),
        ..Config::default()
    }
}

#[test]
fn split_and_transform_success() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let exec = Arc::new(ScriptedExecutor::new());
    let workflow = Workflow::with_output_folder(&config(), dir.path(), exec.clone())?;

    let result = workflow.split_and_transform(seed_records(100), Some("pedro"))?;

    assert!(result.is_success());
    assert_eq!(result.batch.folder.parent(), Some(dir.path()));
    assert_eq!(result.transform.succeeded.len(), result.batch.len());
    assert_eq!(exec.calls().len(), result.batch.len());
    for t in &result.transform.succeeded {
        assert!(t.artifact.starts_with(result.batch.folder.join("Compressed")));
        assert!(t.artifact.exists());
    }
    Ok(())
}

#[test]
fn split_and_transform_failure_leaves_no_artifacts() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let exec = Arc::new(ScriptedExecutor::new().fail_on("output_2.csv"));
    let workflow = Workflow::with_output_folder(&config(), dir.path(), exec)?;

    let result = workflow.split_and_transform(seed_records(100), None)?;

    assert!(!result.is_success());
    let compressed = result.batch.folder.join("Compressed");
    assert_eq!(fs::read_dir(&compressed)?.count(), 0);
    // Split output stays; only artifacts are rolled back.
    assert!(result.batch.files.iter().all(|f| f.path.exists()));
    Ok(())
}

#[test]
fn export_and_transform_in_chunks() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let exec = Arc::new(ScriptedExecutor::new());
    let workflow = Workflow::with_output_folder(&config(), dir.path(), exec)?;

    let report = workflow.export_and_transform_in_chunks(seed_records(200), Some("pedro"))?;

    let size = fs::metadata(&report.source)?.len();
    assert_eq!(report.bytes, size);
    assert_eq!(report.artifacts.len() as u64, size.div_ceil(4096));
    Ok(())
}

#[test]
fn export_and_estimate() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let exec = Arc::new(ScriptedExecutor::new().with_artifact_bytes(vec![0u8; 10]));
    let workflow = Workflow::with_output_folder(&config(), dir.path(), exec)?;

    let ratio = workflow.export_and_estimate(seed_records(50))?;
    assert!(!ratio.is_sentinel());
    assert!(ratio.ratio > 0.0 && ratio.ratio < 1.0);

    // An empty export cannot be estimated.
    assert!(workflow.export_and_estimate(seed_records(0))?.is_sentinel());
    Ok(())
}

#[test]
fn invalid_config_is_rejected() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let bad = Config {
        chunk_size_bytes: 0,
        ..Config::default()
    };
    assert!(Workflow::with_output_folder(&bad, dir.path(), Arc::new(ScriptedExecutor::new())).is_err());
    Ok(())
}

#[test]
fn from_config_runs_configured_program() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let config = Config {
        output_folder_path: dir.path().join("out"),
        seven_zip_program: dir.path().join("no-such-7z"),
        ..config()
    };
    let workflow = Workflow::from_config(&config, TransformKind::Encrypt)?;
    assert_eq!(workflow.output_folder(), dir.path().join("out"));
    assert_eq!(
        workflow.parallel().layout().output_dir(Path::new("/b/x.csv")),
        Path::new("/b/Encrypted")
    );

    // The configured binary does not exist, so every unit fails and nothing is kept.
    let result = workflow.split_and_transform(seed_records(20), Some("pedro"))?;
    assert!(!result.is_success());
    assert_eq!(result.transform.failed.len(), result.batch.len());
    let encrypted = result.batch.folder.join("Encrypted");
    assert!(!encrypted.exists() || fs::read_dir(&encrypted)?.count() == 0);
    Ok(())
}
