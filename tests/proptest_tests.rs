//! Property-based tests using proptest.
//!
//! These tests verify invariants of resfork using randomly generated
//! resource files and inputs.

mod common;

use std::collections::BTreeMap;

use common::{ResourceFileBuilder, compress_dcmp1, compress_dcmp2, open_bytes, pipe};
use proptest::prelude::*;
use resfork::ResourceFile;

/// Strategy for type codes drawn from a small pool, so types repeat.
fn res_type_strategy() -> impl Strategy<Value = [u8; 4]> {
    prop::sample::select(vec![*b"TEXT", *b"ICN#", *b"snd ", *b"CODE", *b"STR#"])
}

/// Strategy for a set of resources with unique (type, id) pairs.
fn resources_strategy() -> impl Strategy<Value = BTreeMap<([u8; 4], i16), Vec<u8>>> {
    prop::collection::btree_map(
        (res_type_strategy(), any::<i16>()),
        prop::collection::vec(any::<u8>(), 0..64),
        0..24,
    )
}

fn build(resources: &BTreeMap<([u8; 4], i16), Vec<u8>>) -> Vec<u8> {
    resources
        .iter()
        .fold(ResourceFileBuilder::new(), |builder, ((t, id), data)| {
            builder.resource(t, *id, data)
        })
        .build()
}

proptest! {
    /// Keyed lookup finds exactly the resources that enumeration yields.
    #[test]
    fn lookup_agrees_with_enumeration(resources in resources_strategy()) {
        let file = open_bytes(build(&resources)).unwrap();

        prop_assert_eq!(file.resource_count(), resources.len());
        for resource in &file {
            let found = file.get(resource.res_type(), resource.id());
            prop_assert!(found.is_some());
            prop_assert_eq!(found.unwrap().data_offset(), resource.data_offset());
        }
        for ((t, id), data) in &resources {
            let resource = file.resource(t, *id).unwrap();
            prop_assert_eq!(resource.data().unwrap(), &data[..]);
        }
        let enumerated: usize = file.types().map(|t| file.resources(t).count()).sum();
        prop_assert_eq!(enumerated, resources.len());
    }

    /// The reported length always equals the length of the data.
    #[test]
    fn length_matches_data(resources in resources_strategy()) {
        let file = open_bytes(build(&resources)).unwrap();
        for resource in &file {
            let data = resource.data().unwrap();
            prop_assert_eq!(resource.length().unwrap() as usize, data.len());
        }
    }

    /// A forward-only source yields the same data as a seekable one when
    /// the data section precedes the map.
    #[test]
    fn sequential_matches_seekable(resources in resources_strategy()) {
        let bytes = build(&resources);
        let seekable = open_bytes(bytes.clone()).unwrap();
        let sequential = ResourceFile::open_sequential(pipe(bytes)).unwrap();

        for resource in &sequential {
            let expected = seekable.resource(resource.res_type(), resource.id()).unwrap();
            prop_assert_eq!(resource.data().unwrap(), expected.data().unwrap());
        }
    }

    /// Compressed resources report their decompressed length up front and
    /// decompress to it.
    #[test]
    fn compressed_length_matches(payload in prop::collection::vec(any::<u8>(), 0..600)) {
        let bytes = ResourceFileBuilder::new()
            .compressed(b"DAT1", 1, &compress_dcmp1(&payload))
            .compressed(b"DAT2", 2, &compress_dcmp2(&payload))
            .build();
        let file = open_bytes(bytes).unwrap();
        for resource in &file {
            prop_assert_eq!(resource.length().unwrap() as usize, payload.len());
            prop_assert_eq!(resource.data().unwrap(), &payload[..]);
        }
    }

    /// Arbitrary input never panics the parser or the decompressors.
    #[test]
    fn arbitrary_bytes_do_not_panic(bytes in prop::collection::vec(any::<u8>(), 0..1024)) {
        if let Ok(file) = open_bytes(bytes.clone()) {
            for resource in &file {
                let _ = resource.name();
                let _ = resource.data();
            }
        }
        let _ = resfork::decompress(&bytes);
    }
}
