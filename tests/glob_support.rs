//! Integration tests for glob expansion of batch folders.

use splitseal::io::glob::{csv_files_in, expand_glob};
use std::fs::{create_dir_all, write};
use tempfile::TempDir;

#[test]
fn csv_files_are_sorted_and_files_only() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let base = dir.path();
    write(base.join("output_2.csv"), "b")?;
    write(base.join("output_1.csv"), "a")?;
    write(base.join("readme.md"), "skip")?;
    create_dir_all(base.join("folder.csv"))?;
    create_dir_all(base.join("Compressed"))?;
    write(base.join("Compressed").join("inner.csv"), "nested")?;

    let files = csv_files_in(base)?;
    assert_eq!(files, vec![base.join("output_1.csv"), base.join("output_2.csv")]);
    Ok(())
}

#[test]
fn metacharacters_in_folder_name_are_literal() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let odd = dir.path().join("batch[1]");
    let decoy = dir.path().join("batch1");
    create_dir_all(&odd)?;
    create_dir_all(&decoy)?;
    write(odd.join("a.csv"), "x")?;
    write(decoy.join("b.csv"), "y")?;

    assert_eq!(csv_files_in(&odd)?, vec![odd.join("a.csv")]);
    Ok(())
}

#[test]
fn no_matches_is_empty() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    assert!(csv_files_in(dir.path())?.is_empty());
    let pattern = format!("{}/*.parquet", dir.path().display());
    assert!(expand_glob(&pattern)?.is_empty());
    Ok(())
}

#[test]
fn invalid_pattern_errors() {
    assert!(expand_glob("[unclosed").is_err());
}
