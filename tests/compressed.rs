//! Integration tests for compressed resources.

mod common;

use common::{
    ResourceFileBuilder, compress_dcmp0, compress_dcmp1, compress_dcmp2, header_type8,
    header_type9, open_bytes, open_bytes_with,
};
use resfork::codec::Codec;
use resfork::{Error, OpenOptions, ResourceLimits, ResourceRef};

const PAYLOAD: &[u8] = b"The quick brown fox jumps over the lazy dog.";

#[test]
fn test_each_codec_decompresses() {
    let even = &PAYLOAD[..44];
    let bytes = ResourceFileBuilder::new()
        .compressed(b"CODE", 0, &compress_dcmp0(even))
        .compressed(b"CODE", 1, &compress_dcmp1(PAYLOAD))
        .compressed(b"CODE", 2, &compress_dcmp2(PAYLOAD))
        .build();
    let file = open_bytes(bytes).unwrap();

    let cases = [
        (0, Codec::Dcmp0, even),
        (1, Codec::Dcmp1, PAYLOAD),
        (2, Codec::Dcmp2, PAYLOAD),
    ];
    for (id, codec, expected) in cases {
        let resource = file.resource(b"CODE", id).unwrap();
        assert!(resource.is_compressed());
        let header = resource.compressed_header().unwrap().expect("header");
        assert_eq!(header.codec(), Some(codec));
        assert_eq!(resource.length().unwrap(), expected.len() as u32);
        assert_eq!(resource.data().unwrap(), expected, "codec {codec}");
    }
}

#[test]
fn test_raw_data_is_untouched() {
    let compressed = compress_dcmp2(PAYLOAD);
    let bytes = ResourceFileBuilder::new()
        .compressed(b"snd ", 5, &compressed)
        .build();
    let file = open_bytes(bytes).unwrap();
    let resource = file.resource(b"snd ", 5).unwrap();

    assert_eq!(resource.raw_data().unwrap(), &compressed[..]);
    assert_eq!(resource.raw_length().unwrap(), compressed.len() as u32);
    assert_eq!(resource.length().unwrap(), PAYLOAD.len() as u32);
    assert_eq!(resource.data().unwrap().len(), PAYLOAD.len());

    let mut raw = Vec::new();
    std::io::Read::read_to_end(&mut resource.raw_reader().unwrap(), &mut raw).unwrap();
    assert_eq!(raw, compressed);
}

#[test]
fn test_back_references_shrink_stored_data() {
    // Codec 0: a stored 4-byte literal, then 15 references to it.
    let mut dcmp0 = header_type8(0, 64);
    dcmp0.extend_from_slice(&[0x12, b'A', b'B', b'C', b'D']);
    dcmp0.extend_from_slice(&[0x23; 15]);
    dcmp0.push(0xFF);

    // Codec 1: the same shape with its own opcodes.
    let mut dcmp1 = header_type8(1, 64);
    dcmp1.extend_from_slice(&[0x13, b'w', b'o', b'r', b'd']);
    dcmp1.extend_from_slice(&[0x20; 15]);
    dcmp1.push(0xFF);

    // Codec 2: untagged indexes into the default table.
    let mut dcmp2 = header_type9(2, 128, [0x00, 0x00, 0x00, 0x00]);
    for _ in 0..32 {
        dcmp2.extend_from_slice(&[0x02, 0x04]);
    }

    let bytes = ResourceFileBuilder::new()
        .compressed(b"CODE", 0, &dcmp0)
        .compressed(b"CODE", 1, &dcmp1)
        .compressed(b"CODE", 2, &dcmp2)
        .build();
    let file = open_bytes(bytes).unwrap();

    let expected = [
        (0, b"ABCD".repeat(16)),
        (1, b"word".repeat(16)),
        (2, b"N\xBANu".repeat(32)),
    ];
    for (id, data) in expected {
        let resource = file.resource(b"CODE", id).unwrap();
        assert_eq!(resource.data().unwrap(), &data[..], "codec {id}");
        assert!(resource.raw_data().unwrap().len() < data.len(), "codec {id}");
        assert_eq!(resource.length().unwrap(), data.len() as u32);
    }
}

#[test]
fn test_length_does_not_decompress() {
    // The body is garbage; only the header is needed for the length.
    let mut compressed = header_type8(1, 1000);
    compressed.extend_from_slice(&[0xD3, 0xD4]);
    let bytes = ResourceFileBuilder::new()
        .compressed(b"DATA", 1, &compressed)
        .build();
    let file = open_bytes(bytes).unwrap();
    let resource = file.resource(b"DATA", 1).unwrap();

    assert_eq!(resource.length().unwrap(), 1000);
    assert!(matches!(resource.data(), Err(Error::Decompress { .. })));
}

#[test]
fn test_unsupported_codec() {
    let mut compressed = header_type9(99, 16, [0; 4]);
    compressed.extend_from_slice(&[1, 2, 3, 4]);
    let bytes = ResourceFileBuilder::new()
        .compressed(b"DATA", 7, &compressed)
        .resource(b"DATA", 8, b"plain")
        .build();
    let file = open_bytes(bytes).unwrap();
    let resource = file.resource(b"DATA", 7).unwrap();

    match resource.data() {
        Err(Error::UnsupportedCodec { resource: r, codec_id }) => {
            assert_eq!(codec_id, 99);
            assert_eq!(r, Some(ResourceRef::new(*b"DATA", 7)));
        }
        other => panic!("expected UnsupportedCodec, got {other:?}"),
    }
    // The same failure is reported again without re-reading.
    assert!(resource.data().unwrap_err().is_unsupported());

    assert_eq!(resource.raw_data().unwrap(), &compressed[..]);
    assert_eq!(resource.length().unwrap(), 16);
    assert_eq!(file.resource(b"DATA", 8).unwrap().data().unwrap(), b"plain");
}

#[test]
fn test_flag_without_signature_is_raw() {
    let bytes = ResourceFileBuilder::new()
        .compressed(b"TEXT", 1, b"not compressed at all")
        .build();
    let file = open_bytes(bytes).unwrap();
    let resource = file.resource(b"TEXT", 1).unwrap();

    assert!(resource.is_compressed());
    assert_eq!(resource.compressed_header().unwrap(), None);
    assert_eq!(resource.data().unwrap(), b"not compressed at all");
    assert_eq!(resource.length().unwrap(), 21);
}

#[test]
fn test_signature_without_flag_is_raw() {
    let compressed = compress_dcmp1(PAYLOAD);
    let bytes = ResourceFileBuilder::new()
        .resource(b"DATA", 1, &compressed)
        .build();
    let file = open_bytes(bytes).unwrap();
    let resource = file.resource(b"DATA", 1).unwrap();

    assert_eq!(resource.compressed_header().unwrap(), None);
    assert_eq!(resource.data().unwrap(), &compressed[..]);
}

#[test]
fn test_truncated_compression_header() {
    let header = header_type8(1, 10);
    let bytes = ResourceFileBuilder::new()
        .compressed(b"DATA", 1, &header[..10])
        .build();
    let file = open_bytes(bytes).unwrap();
    let err = file.resource(b"DATA", 1).unwrap().data().unwrap_err();
    assert!(matches!(err, Error::MalformedCompressionHeader { .. }));
    assert_eq!(err.resource(), Some(&ResourceRef::new(*b"DATA", 1)));
}

#[test]
fn test_short_output_is_error() {
    let mut compressed = header_type8(1, 10);
    compressed.extend_from_slice(&[0xD0, 3, b'a', b'b', b'c', 0xFF]);
    let bytes = ResourceFileBuilder::new()
        .compressed(b"DATA", 1, &compressed)
        .build();
    let file = open_bytes(bytes).unwrap();
    let err = file.resource(b"DATA", 1).unwrap().data().unwrap_err();
    assert!(matches!(err, Error::Decompress { .. }), "{err:?}");
}

#[test]
fn test_decompressed_limit() {
    let bytes = ResourceFileBuilder::new()
        .compressed(b"DATA", 1, &compress_dcmp1(PAYLOAD))
        .build();
    let limits = ResourceLimits::new().max_decompressed_bytes(16);
    let options = OpenOptions::new().limits(limits);
    let file = open_bytes_with(bytes, options).unwrap();
    let resource = file.resource(b"DATA", 1).unwrap();

    assert!(matches!(
        resource.data(),
        Err(Error::ResourceLimitExceeded(_))
    ));
    assert_eq!(resource.length().unwrap(), PAYLOAD.len() as u32);
}

#[test]
fn test_standalone_decompress() {
    let compressed = compress_dcmp2(PAYLOAD);
    assert_eq!(resfork::decompress(&compressed).unwrap(), PAYLOAD);

    let header = resfork::CompressedHeader::parse(&compressed).unwrap();
    assert_eq!(header.decompressed_length, PAYLOAD.len() as u32);
    assert_eq!(header.parameters(), Some([0, 0, 0, 2]));
}

#[test]
fn test_streaming_reader_matches_buffered() {
    use std::io::Read;

    let payload: Vec<u8> = (0..5000u32).map(|i| (i * 7 % 251) as u8).collect();
    let compressed = compress_dcmp1(&payload);
    let mut reader = resfork::DecompressReader::new(&compressed[..]).unwrap();
    assert_eq!(reader.codec(), Codec::Dcmp1);

    let mut out = Vec::new();
    reader.read_to_end(&mut out).unwrap();
    assert_eq!(out, payload);
}
