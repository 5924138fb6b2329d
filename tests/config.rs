//! Tests for JSON configuration.

use splitseal::config::{Config, base_directory};
use splitseal::executor::{TransformExecutor, TransformKind};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn empty_object_gives_defaults() -> anyhow::Result<()> {
    let config = Config::from_json_str("{}")?;
    assert_eq!(config, Config::default());
    assert_eq!(config.output_folder_path, PathBuf::from("output"));
    assert_eq!(config.max_file_size_bytes, 1024);
    assert_eq!(config.chunk_size_bytes, 2 * 1024 * 1024);
    assert_eq!(config.seven_zip_program, PathBuf::from("7z"));
    Ok(())
}

#[test]
fn all_fields() -> anyhow::Result<()> {
    let config = Config::from_json_str(
        r#"{
            "output_folder_path": "exports",
            "max_file_size_bytes": 4096,
            "chunk_size_bytes": 65536,
            "max_parallelism": 3,
            "timeout_secs": 30,
            "seven_zip_program": "/usr/bin/7za"
        }"#,
    )?;
    assert_eq!(config.max_file_size_bytes, 4096);
    assert_eq!(config.chunk_size_bytes, 65536);
    assert_eq!(config.seven_zip_program, PathBuf::from("/usr/bin/7za"));

    let options = config.transform_options();
    assert_eq!(options.max_parallelism, Some(3));
    assert_eq!(options.timeout, Some(Duration::from_secs(30)));
    Ok(())
}

#[test]
fn seven_zip_executor_uses_configured_program() -> anyhow::Result<()> {
    let config = Config::from_json_str(r#"{ "seven_zip_program": "/opt/7zip/7zz" }"#)?;

    let exec = config.seven_zip_executor(TransformKind::Encrypt);
    assert_eq!(exec.program(), Path::new("/opt/7zip/7zz"));
    assert_eq!(exec.kind(), TransformKind::Encrypt);

    let default = Config::default().seven_zip_executor(TransformKind::Compress);
    assert_eq!(default.program(), Path::new("7z"));
    assert_eq!(default.kind(), TransformKind::Compress);
    Ok(())
}

#[test]
fn rejects_unknown_fields_and_zero_limits() {
    assert!(Config::from_json_str(r#"{ "outputFolderPath": "x" }"#).is_err());
    assert!(Config::from_json_str(r#"{ "max_file_size_bytes": 0 }"#).is_err());
    assert!(Config::from_json_str(r#"{ "chunk_size_bytes": 0 }"#).is_err());
    assert!(Config::from_json_str(r#"{ "max_parallelism": 0 }"#).is_err());
    assert!(Config::from_json_str("not json").is_err());
}

#[test]
fn output_folder_resolution() -> anyhow::Result<()> {
    let config = Config::default();
    assert_eq!(
        config.output_folder_from(Path::new("/srv/app")),
        PathBuf::from("/srv/app/output")
    );

    let absolute = Config {
        output_folder_path: PathBuf::from("/data/out"),
        ..Config::default()
    };
    assert_eq!(
        absolute.output_folder_from(Path::new("/srv/app")),
        PathBuf::from("/data/out")
    );

    assert_eq!(config.output_folder()?, base_directory()?.join("output"));
    Ok(())
}

#[test]
fn from_json_file() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("splitseal.json");
    std::fs::write(&path, r#"{ "timeout_secs": 5 }"#)?;

    let config = Config::from_json_file(&path)?;
    assert_eq!(config.timeout_secs, Some(5));
    assert!(Config::from_json_file(dir.path().join("missing.json")).is_err());
    Ok(())
}
