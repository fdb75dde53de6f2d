//! Fuzz target for ResourceFile::open with arbitrary byte input.
//!
//! Opens the input both as a seekable and as a forward-only source and
//! touches every resource, looking for panics, hangs or runaway allocation.
//!
//! Run with: cargo +nightly fuzz run resource_file_open

#![no_main]

use libfuzzer_sys::fuzz_target;
use resfork::{OpenOptions, ResourceFile, ResourceLimits};
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    let options = OpenOptions::new().limits(
        ResourceLimits::new()
            .max_decompressed_bytes(1 << 20)
            .max_retained_bytes(1 << 20),
    );

    if let Ok(file) = ResourceFile::open_with(Cursor::new(data), options.clone()) {
        for resource in &file {
            let _ = resource.name();
            let _ = resource.length();
            let _ = resource.data();
        }
    }

    if let Ok(file) = ResourceFile::open_sequential_with(data, options) {
        for resource in &file {
            let _ = resource.raw_data();
            let _ = resource.data();
        }
    }
});
