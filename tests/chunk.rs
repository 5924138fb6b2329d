//! Tests for fixed-size chunking and per-chunk transforms.

use splitseal::chunk::{ChunkReader, ChunkedTransform};
use splitseal::testing::ScriptedExecutor;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn write_source(dir: &Path, name: &str, len: usize) -> anyhow::Result<PathBuf> {
    let path = dir.join(name);
    let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    fs::write(&path, data)?;
    Ok(path)
}

#[test]
fn reader_yields_ceil_chunks() -> anyhow::Result<()> {
    let data = vec![1u8; 10];
    let chunks = ChunkReader::new(&data[..], 3).collect::<std::io::Result<Vec<_>>>()?;
    let sizes: Vec<usize> = chunks.iter().map(|c| c.data.len()).collect();
    let indices: Vec<usize> = chunks.iter().map(|c| c.index).collect();
    assert_eq!(sizes, vec![3, 3, 3, 1]);
    assert_eq!(indices, vec![1, 2, 3, 4]);
    Ok(())
}

#[test]
fn reader_exact_multiple_has_full_last_chunk() -> anyhow::Result<()> {
    let data = vec![9u8; 12];
    let chunks = ChunkReader::new(&data[..], 4).collect::<std::io::Result<Vec<_>>>()?;
    assert_eq!(chunks.len(), 3);
    assert!(chunks.iter().all(|c| c.data.len() == 4));
    Ok(())
}

#[test]
fn reader_on_empty_input_yields_nothing() {
    let data: Vec<u8> = Vec::new();
    assert_eq!(ChunkReader::new(&data[..], 8).count(), 0);
}

#[test]
fn reader_with_huge_chunk_size_reads_whole_input() -> anyhow::Result<()> {
    let data = vec![5u8; 1000];
    let chunks = ChunkReader::new(&data[..], usize::MAX).collect::<std::io::Result<Vec<_>>>()?;
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].data, data);
    Ok(())
}

/// Hands out at most three bytes per read call.
struct Trickle<'a>(&'a [u8]);

impl std::io::Read for Trickle<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = buf.len().min(3).min(self.0.len());
        buf[..n].copy_from_slice(&self.0[..n]);
        self.0 = &self.0[n..];
        Ok(n)
    }
}

#[test]
fn reader_fills_chunks_across_short_reads() -> anyhow::Result<()> {
    let data: Vec<u8> = (0..25).collect();
    let chunks = ChunkReader::new(Trickle(&data), 10).collect::<std::io::Result<Vec<_>>>()?;
    let sizes: Vec<usize> = chunks.iter().map(|c| c.data.len()).collect();
    assert_eq!(sizes, vec![10, 10, 5]);
    let joined: Vec<u8> = chunks.iter().flat_map(|c| c.data.iter().copied()).collect();
    assert_eq!(joined, data);
    Ok(())
}

#[test]
fn huge_chunk_size_transforms_file_as_one_chunk() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let source = write_source(dir.path(), "whole.csv", 5000)?;
    let exec = Arc::new(ScriptedExecutor::new());
    let chunked = ChunkedTransform::new(exec.clone()).with_chunk_size(usize::MAX);

    let report = chunked.transform_file(&source, None)?;

    assert_eq!(report.bytes, 5000);
    assert_eq!(report.artifacts, vec![dir.path().join("Compressed").join("whole_1.7z")]);
    assert_eq!(exec.calls()[0].payload_len, 5000);
    Ok(())
}

#[test]
fn transform_file_names_and_sizes_artifacts() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let source = write_source(dir.path(), "big.csv", 10_000)?;
    let exec = Arc::new(ScriptedExecutor::new());
    let chunked = ChunkedTransform::new(exec.clone()).with_chunk_size(4096);

    let report = chunked.transform_file(&source, Some("pw"))?;

    assert_eq!(report.bytes, 10_000);
    let compressed = dir.path().join("Compressed");
    assert_eq!(
        report.artifacts,
        vec![
            compressed.join("big_1.7z"),
            compressed.join("big_2.7z"),
            compressed.join("big_3.7z"),
        ]
    );
    let sizes: Vec<u64> = report
        .artifacts
        .iter()
        .map(|a| fs::metadata(a).map(|m| m.len()))
        .collect::<std::io::Result<_>>()?;
    assert_eq!(sizes, vec![4096, 4096, 10_000 - 2 * 4096]);

    // Reassembled chunks equal the source.
    let mut joined = Vec::new();
    for artifact in &report.artifacts {
        joined.extend(fs::read(artifact)?);
    }
    assert_eq!(joined, fs::read(&source)?);

    let calls = exec.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|c| c.source.is_none()));
    assert!(calls.iter().all(|c| c.password.as_deref() == Some("pw")));
    assert_eq!(calls[2].payload_len, 10_000 - 2 * 4096);
    Ok(())
}

#[test]
fn exact_multiple_source() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let source = write_source(dir.path(), "even.csv", 3 * 1000)?;
    let chunked = ChunkedTransform::new(Arc::new(ScriptedExecutor::new())).with_chunk_size(1000);

    let report = chunked.transform_file(&source, None)?;
    assert_eq!(report.artifacts.len(), 3);
    for artifact in &report.artifacts {
        assert_eq!(fs::metadata(artifact)?.len(), 1000);
    }
    Ok(())
}

#[test]
fn empty_source_produces_no_artifacts() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let source = write_source(dir.path(), "empty.csv", 0)?;
    let exec = Arc::new(ScriptedExecutor::new());
    let chunked = ChunkedTransform::new(exec.clone());

    let report = chunked.transform_file(&source, None)?;
    assert!(report.artifacts.is_empty());
    assert!(exec.calls().is_empty());
    Ok(())
}

#[test]
fn failing_chunk_discards_earlier_chunks() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let source = write_source(dir.path(), "data.csv", 5000)?;
    let exec = Arc::new(
        ScriptedExecutor::new()
            .fail_on("data_3.7z")
            .with_partial_artifacts(),
    );
    let chunked = ChunkedTransform::new(exec.clone()).with_chunk_size(1000);

    let err = chunked.transform_file(&source, None);
    assert!(err.is_err());

    // Chunks 4 and 5 were never attempted; 1..=3 are gone again.
    assert_eq!(exec.calls().len(), 3);
    let compressed = dir.path().join("Compressed");
    assert_eq!(fs::read_dir(&compressed)?.count(), 0);
    assert!(source.exists());
    Ok(())
}

#[test]
fn run_stops_at_first_failing_file() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let a = write_source(dir.path(), "a.csv", 300)?;
    let b = write_source(dir.path(), "b.csv", 300)?;
    let c = write_source(dir.path(), "c.csv", 300)?;
    let exec = Arc::new(ScriptedExecutor::new().fail_on("b_1.7z"));
    let chunked = ChunkedTransform::new(exec.clone()).with_chunk_size(200);

    assert!(!chunked.run(&[a, b, c], None));

    let compressed = dir.path().join("Compressed");
    // a.csv finished before b.csv failed; c.csv never started.
    assert!(compressed.join("a_1.7z").exists());
    assert!(compressed.join("a_2.7z").exists());
    assert!(!compressed.join("b_1.7z").exists());
    assert!(!compressed.join("c_1.7z").exists());
    assert_eq!(exec.calls().len(), 3);
    Ok(())
}

#[test]
fn missing_source_fails() {
    let chunked = ChunkedTransform::new(Arc::new(ScriptedExecutor::new()));
    assert!(
        chunked
            .transform_file(Path::new("/definitely/not/here.csv"), None)
            .is_err()
    );
}
