//! Compressed resource support.
//!
//! A compressed resource starts with a [`CompressedHeader`] naming the codec
//! that produced it. Three codecs are implemented, each as a streaming
//! [`Decoder`]:
//!
//! | ID | Codec | Header type |
//! |----|-------|-------------|
//! | 0 | [`Dcmp0Decoder`] | 8 |
//! | 1 | [`Dcmp1Decoder`] | 8 |
//! | 2 | [`Dcmp2Decoder`] | 9 |
//!
//! Any other codec ID fails with [`Error::UnsupportedCodec`].

pub mod dcmp0;
pub mod dcmp1;
pub mod dcmp2;
pub mod header;

mod common;

use std::fmt;
use std::io::{self, BufReader, Read};

use crate::{Error, Result};

pub use dcmp0::Dcmp0Decoder;
pub use dcmp1::Dcmp1Decoder;
pub use dcmp2::{Dcmp2Decoder, Dcmp2Params};
pub use header::{CompressedHeader, HeaderKind};

/// A decoder that reads compressed data and produces decompressed output.
pub trait Decoder: Read + Send {
    /// Returns the codec this decoder implements.
    fn codec(&self) -> Codec;
}

/// The implemented resource compression codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    /// Codec 0, a word-oriented scheme used mostly for 68k code.
    Dcmp0,
    /// Codec 1, a byte-oriented relative of codec 0.
    Dcmp1,
    /// Codec 2, table substitution of two-byte words.
    Dcmp2,
}

impl Codec {
    /// Looks up a codec by the ID stored in the compressed header.
    pub const fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(Codec::Dcmp0),
            1 => Some(Codec::Dcmp1),
            2 => Some(Codec::Dcmp2),
            _ => None,
        }
    }

    /// The ID stored in the compressed header.
    pub const fn id(self) -> i16 {
        match self {
            Codec::Dcmp0 => 0,
            Codec::Dcmp1 => 1,
            Codec::Dcmp2 => 2,
        }
    }

    /// Returns a human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            Codec::Dcmp0 => "dcmp0",
            Codec::Dcmp1 => "dcmp1",
            Codec::Dcmp2 => "dcmp2",
        }
    }

    /// The compression type the header must declare for this codec.
    pub const fn compression_type(self) -> u16 {
        match self {
            Codec::Dcmp0 | Codec::Dcmp1 => header::COMPRESSION_TYPE_8,
            Codec::Dcmp2 => header::COMPRESSION_TYPE_9,
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Builds a decoder for the data following `header`.
///
/// `input` must be positioned right after the 18-byte header.
///
/// # Errors
///
/// - [`Error::UnsupportedCodec`] if the codec ID is not 0, 1 or 2
/// - [`Error::Decompress`] if the header type does not match the codec, or
///   if the codec parameters are invalid
pub fn build_decoder<'a, R: Read + Send + 'a>(
    input: R,
    header: &CompressedHeader,
) -> Result<Box<dyn Decoder + 'a>> {
    let codec = header.codec().ok_or(Error::UnsupportedCodec {
        resource: None,
        codec_id: header.codec_id,
    })?;

    if header.compression_type != codec.compression_type() {
        return Err(Error::decompress(format!(
            "{codec} requires compression type {:#06x}, but the header has {:#06x}",
            codec.compression_type(),
            header.compression_type
        )));
    }

    log::debug!(
        "decoding {codec}, {} bytes declared",
        header.decompressed_length
    );

    let input = BufReader::new(input);
    let length = header.decompressed_length;
    match (codec, header.kind) {
        (Codec::Dcmp0, _) => Ok(Box::new(Dcmp0Decoder::new(input, length))),
        (Codec::Dcmp1, _) => Ok(Box::new(Dcmp1Decoder::new(input, length))),
        (Codec::Dcmp2, HeaderKind::Type9 { parameters }) => {
            Ok(Box::new(Dcmp2Decoder::new(input, length, parameters)?))
        }
        (Codec::Dcmp2, HeaderKind::Type8 { .. }) => {
            Err(Error::decompress("codec 2 requires a type 9 header"))
        }
    }
}

/// Largest output buffer allocated up front; a declared length is not trusted
/// beyond this.
const PREALLOCATE_LIMIT: u64 = 1 << 20;

/// Decompresses a complete compressed resource, header included.
///
/// # Errors
///
/// - [`Error::NotActuallyCompressed`] if `data` has no compressed header
/// - [`Error::MalformedCompressionHeader`] if the header is damaged
/// - [`Error::UnsupportedCodec`] for unknown codec IDs
/// - [`Error::Decompress`] if the compressed data is malformed
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    decompress_limited(data, u64::MAX)
}

/// Like [`decompress`], but refuses output larger than `max_len` bytes
/// before decoding anything.
pub fn decompress_limited(data: &[u8], max_len: u64) -> Result<Vec<u8>> {
    let header = CompressedHeader::parse(data)?;
    decompress_body(&header, &data[header::HEADER_SIZE..], max_len)
}

/// Decompresses the bytes that follow an already parsed header.
pub(crate) fn decompress_body(
    header: &CompressedHeader,
    body: &[u8],
    max_len: u64,
) -> Result<Vec<u8>> {
    let declared = u64::from(header.decompressed_length);
    if declared > max_len {
        return Err(Error::ResourceLimitExceeded(format!(
            "declared decompressed length {declared} exceeds the limit of {max_len} bytes"
        )));
    }

    let mut decoder = build_decoder(body, header)?;
    let mut out = Vec::with_capacity(declared.min(PREALLOCATE_LIMIT) as usize);
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// Streaming decompression of a compressed resource read from any reader.
///
/// The header is read when the reader is created; decompressed bytes are
/// then produced on demand.
///
/// ```rust,no_run
/// use std::io::Read;
/// use resfork::codec::DecompressReader;
///
/// let file = std::fs::File::open("resource.bin")?;
/// let mut reader = DecompressReader::new(file)?;
/// let mut data = Vec::new();
/// reader.read_to_end(&mut data)?;
/// assert_eq!(data.len() as u32, reader.header().decompressed_length);
/// # Ok::<(), resfork::Error>(())
/// ```
pub struct DecompressReader<'a> {
    header: CompressedHeader,
    decoder: Box<dyn Decoder + 'a>,
}

impl<'a> DecompressReader<'a> {
    /// Reads the compressed header from `reader` and prepares a decoder for
    /// the rest of it.
    pub fn new<R: Read + Send + 'a>(mut reader: R) -> Result<Self> {
        let header = CompressedHeader::read_from(&mut reader)?;
        let decoder = build_decoder(reader, &header)?;
        Ok(Self { header, decoder })
    }

    /// The parsed compressed header.
    pub fn header(&self) -> &CompressedHeader {
        &self.header
    }

    /// The codec decoding the data.
    pub fn codec(&self) -> Codec {
        self.decoder.codec()
    }
}

impl Read for DecompressReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.decoder.read(buf)
    }
}

impl fmt::Debug for DecompressReader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecompressReader")
            .field("header", &self.header)
            .field("codec", &self.decoder.codec())
            .finish()
    }
}
