//! CLI command integration tests.
//!
//! These tests verify the library paths the CLI commands are built on, using
//! files on disk. Tests use library functions directly rather than
//! subprocess execution.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;

use resfork::{CompressedHeader, DecompressReader, ForkMode, OpenOptions, ResourceFile};
use tempfile::TempDir;

mod common;

/// Writes `bytes` to a file in a fresh temp dir.
fn write_temp(name: &str, bytes: &[u8]) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join(name);
    std::fs::write(&path, bytes).expect("Failed to write file");
    (temp_dir, path)
}

// =============================================================================
// Info / List / Read Command Tests
// =============================================================================

#[test]
fn test_info_from_data_fork() {
    let (_dir, path) = write_temp("sample.rsrc", &common::sample_file());

    let file = ResourceFile::open_path_with(&path, OpenOptions::new().fork(ForkMode::Fallback))
        .expect("Failed to open resource file");

    assert_eq!(file.fork().map(|f| f.as_str()), Some("data"));
    assert_eq!(file.data_offset(), 256);
    assert_eq!(file.type_count(), 3);
    assert_eq!(file.resource_count(), 4);
}

#[test]
fn test_list_sorted_by_type_and_id() {
    let (_dir, path) = write_temp("sample.rsrc", &common::sample_file());
    let file = ResourceFile::open_path(&path).expect("Failed to open resource file");

    let mut keys: Vec<_> = file.iter().map(|r| (r.res_type(), r.id())).collect();
    keys.sort();
    assert_eq!(keys.first().map(|k| k.1), Some(-16455));
    assert_eq!(keys.last().map(|k| k.0.to_string()), Some("TEXT".to_string()));
}

#[test]
fn test_read_from_file_handle_in_order() {
    let (_dir, path) = write_temp("sample.rsrc", &common::sample_file());
    let handle = File::open(&path).expect("Failed to open file");

    let file = ResourceFile::open_sequential(handle).expect("Failed to open resource file");
    let texts: Vec<_> = file
        .resources(b"TEXT")
        .map(|r| r.data().expect("Failed to read data").to_vec())
        .collect();
    assert_eq!(texts, vec![b"first".to_vec(), b"second".to_vec()]);
}

#[test]
fn test_read_header_blocks() {
    let (_dir, path) = write_temp("sample.rsrc", &common::sample_file());
    let file = ResourceFile::open_path(&path).expect("Failed to open resource file");

    let all = [
        file.system_data().as_slice(),
        file.application_data().as_slice(),
    ]
    .concat();
    assert_eq!(all.len(), 240);
}

// =============================================================================
// Raw Compressed Data Tests
// =============================================================================

#[test]
fn test_raw_compress_info_from_file() {
    let compressed = common::compress_dcmp1(b"Hello, Hello, Hello!");
    let (_dir, path) = write_temp("data.dcmp", &compressed);

    let mut reader = BufReader::new(File::open(&path).expect("Failed to open file"));
    let header = CompressedHeader::read_from(&mut reader).expect("Failed to read header");

    assert_eq!(header.decompressed_length, 20);
    assert_eq!(header.codec_id, 1);
}

#[test]
fn test_raw_decompress_to_file() {
    let payload: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
    let (dir, input) = write_temp("data.dcmp", &common::compress_dcmp2(&payload));
    let output = dir.path().join("data.out");

    let reader = BufReader::new(File::open(&input).expect("Failed to open input"));
    let mut decoder = DecompressReader::new(reader).expect("Failed to parse header");
    let mut out = File::create(&output).expect("Failed to create output");
    io::copy(&mut decoder, &mut out).expect("Failed to decompress");

    assert_eq!(std::fs::read(&output).expect("Failed to read output"), payload);
}

#[test]
fn test_raw_decompress_rejects_plain_data() {
    let (_dir, input) = write_temp("plain.bin", b"not compressed at all");
    let reader = BufReader::new(File::open(&input).expect("Failed to open input"));

    assert!(DecompressReader::new(reader).is_err());
}
