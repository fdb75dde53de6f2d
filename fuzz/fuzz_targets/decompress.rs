//! Fuzz target for the dcmp decompressors.
//!
//! Run with: cargo +nightly fuzz run decompress

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Declared lengths come from the input, so cap what gets produced.
    let _ = resfork::codec::decompress_limited(data, 1 << 20);
});
