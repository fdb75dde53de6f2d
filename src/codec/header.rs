//! Compressed resource header.
//!
//! Compressed resources start with an 18-byte header:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 4 | signature `A8 9F 65 72` |
//! | 4 | 2 | header length (`0x0012`) |
//! | 6 | 2 | compression type (`0x0801` or `0x0901`) |
//! | 8 | 4 | decompressed length |
//! | 12 | 6 | type-specific fields |
//!
//! Type 8 headers hold the working buffer fractional size, the expansion
//! buffer size, the codec ID, and a reserved zero word. Type 9 headers hold
//! the codec ID followed by four codec parameter bytes.

use std::io::Read;

use crate::format::reader::read_up_to;
use crate::{Error, Result};

use super::Codec;

/// Signature at the start of every compressed resource.
pub const SIGNATURE: [u8; 4] = [0xA8, 0x9F, 0x65, 0x72];

/// Size of the compressed resource header in bytes.
pub const HEADER_SIZE: usize = 18;

/// Header length value found in practice.
pub const HEADER_LENGTH: u16 = 0x0012;

/// Compression type of headers used with codecs 0 and 1.
pub const COMPRESSION_TYPE_8: u16 = 0x0801;

/// Compression type of headers used with codec 2.
pub const COMPRESSION_TYPE_9: u16 = 0x0901;

/// Type-specific part of a compressed resource header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKind {
    /// Type 8 header.
    Type8 {
        /// Size of the working buffer as a fraction of the decompressed length, in 1/256ths.
        working_buffer_fractional_size: u8,
        /// Extra space the decompressor needs beyond the decompressed length.
        expansion_buffer_size: u8,
    },
    /// Type 9 header.
    Type9 {
        /// Codec-specific parameters.
        parameters: [u8; 4],
    },
}

/// A parsed compressed resource header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressedHeader {
    /// Header length field as stored.
    pub header_length: u16,
    /// Compression type ([`COMPRESSION_TYPE_8`] or [`COMPRESSION_TYPE_9`]).
    pub compression_type: u16,
    /// Length of the data after decompression.
    pub decompressed_length: u32,
    /// ID of the codec that produced the data.
    pub codec_id: i16,
    /// Type-specific fields.
    pub kind: HeaderKind,
}

impl CompressedHeader {
    /// Returns `true` if `data` starts with the compressed resource signature.
    pub fn is_compressed(data: &[u8]) -> bool {
        data.starts_with(&SIGNATURE)
    }

    /// Parses the header at the start of `data`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotActuallyCompressed`] if the signature is missing
    /// - [`Error::MalformedCompressionHeader`] if the header is truncated or
    ///   has unsupported field values
    pub fn parse(data: &[u8]) -> Result<Self> {
        if !Self::is_compressed(data) {
            return Err(Error::NotActuallyCompressed);
        }
        let bytes: &[u8; HEADER_SIZE] = data
            .get(..HEADER_SIZE)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| {
                Error::malformed_compression_header(format!(
                    "header is truncated: {} of {HEADER_SIZE} bytes available",
                    data.len()
                ))
            })?;
        Self::from_bytes(bytes)
    }

    /// Reads and parses the header from a reader.
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let mut bytes = [0u8; HEADER_SIZE];
        let n = read_up_to(r, &mut bytes)?;
        Self::parse(&bytes[..n])
    }

    fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Result<Self> {
        let be16 = |at: usize| u16::from_be_bytes([bytes[at], bytes[at + 1]]);
        let header_length = be16(4);
        let compression_type = be16(6);
        let decompressed_length = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);

        if header_length != HEADER_LENGTH && header_length != 0 {
            return Err(Error::malformed_compression_header(format!(
                "unsupported header length {header_length:#06x}, expected {HEADER_LENGTH:#06x}"
            )));
        }

        let (codec_id, kind) = match compression_type {
            COMPRESSION_TYPE_8 => {
                let reserved = be16(16);
                if reserved != 0 {
                    return Err(Error::malformed_compression_header(format!(
                        "reserved field should be 0, not {reserved:#06x}"
                    )));
                }
                (
                    be16(14) as i16,
                    HeaderKind::Type8 {
                        working_buffer_fractional_size: bytes[12],
                        expansion_buffer_size: bytes[13],
                    },
                )
            }
            COMPRESSION_TYPE_9 => (
                be16(12) as i16,
                HeaderKind::Type9 {
                    parameters: [bytes[14], bytes[15], bytes[16], bytes[17]],
                },
            ),
            other => {
                return Err(Error::malformed_compression_header(format!(
                    "unsupported compression type {other:#06x}"
                )));
            }
        };

        Ok(Self {
            header_length,
            compression_type,
            decompressed_length,
            codec_id,
            kind,
        })
    }

    /// The codec named by this header, or `None` if it is not implemented.
    pub fn codec(&self) -> Option<Codec> {
        Codec::from_id(self.codec_id)
    }

    /// Codec parameters from a type 9 header.
    pub fn parameters(&self) -> Option<[u8; 4]> {
        match self.kind {
            HeaderKind::Type9 { parameters } => Some(parameters),
            HeaderKind::Type8 { .. } => None,
        }
    }

    /// Working buffer fractional size from a type 8 header.
    pub fn working_buffer_fractional_size(&self) -> Option<u8> {
        match self.kind {
            HeaderKind::Type8 {
                working_buffer_fractional_size,
                ..
            } => Some(working_buffer_fractional_size),
            HeaderKind::Type9 { .. } => None,
        }
    }

    /// Expansion buffer size from a type 8 header.
    pub fn expansion_buffer_size(&self) -> Option<u8> {
        match self.kind {
            HeaderKind::Type8 {
                expansion_buffer_size,
                ..
            } => Some(expansion_buffer_size),
            HeaderKind::Type9 { .. } => None,
        }
    }
}
