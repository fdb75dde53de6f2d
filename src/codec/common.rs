//! Building blocks shared by the resource decompressors.

use std::io::{self, BufRead, Read};

use crate::Error;
use crate::format::reader::{read_array, read_u8};

/// Upper bound on bytes produced by a single run-expansion step.
pub(crate) const EXPANSION_CHUNK: usize = 4096;

/// Creates an `io::Error` carrying a decompression failure.
pub(crate) fn invalid(reason: impl Into<String>) -> io::Error {
    Error::decompress(reason).into()
}

/// Turns an unexpected end of the compressed input into a decompression failure.
pub(crate) fn premature_end(err: io::Error) -> io::Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        invalid("compressed data ended prematurely")
    } else {
        err
    }
}

/// Reads a variable-length integer as used by the extended codes of codecs 0 and 1.
///
/// | First byte | Encoding |
/// |------------|----------|
/// | `0xFF` | the next 4 bytes, signed big-endian |
/// | `0x80..=0xFE` | `first - 0xC0` (wrapping) and the next byte, signed big-endian 16-bit |
/// | `0x00..=0x7F` | the byte itself |
pub(crate) fn read_varint<R: Read>(r: &mut R) -> io::Result<i32> {
    let head = read_u8(r)?;
    if head == 0xFF {
        Ok(i32::from_be_bytes(read_array(r)?))
    } else if head >= 0x80 {
        let low = read_u8(r)?;
        let value = i16::from_be_bytes([head.wrapping_sub(0xC0), low]);
        Ok(i32::from(value))
    } else {
        Ok(i32::from(head))
    }
}

/// Returns `true` if the buffered reader has no more input.
pub(crate) fn at_eof<R: BufRead>(r: &mut R) -> io::Result<bool> {
    Ok(r.fill_buf()?.is_empty())
}

/// Reads one byte, or `None` at end of input.
pub(crate) fn next_byte<R: BufRead>(r: &mut R) -> io::Result<Option<u8>> {
    let byte = r.fill_buf()?.first().copied();
    if byte.is_some() {
        r.consume(1);
    }
    Ok(byte)
}

/// Fails if any input remains after the end marker.
pub(crate) fn expect_end<R: BufRead>(r: &mut R) -> io::Result<()> {
    match r.fill_buf()?.first() {
        Some(extra) => Err(invalid(format!(
            "extra data after end of data marker (first extra byte: {extra:#04x})"
        ))),
        None => Ok(()),
    }
}

/// Literals stored by earlier opcodes for later back-references.
#[derive(Debug, Default)]
pub(crate) struct LiteralTable {
    data: Vec<u8>,
    ends: Vec<usize>,
}

impl LiteralTable {
    pub(crate) fn push(&mut self, literal: &[u8]) {
        self.data.extend_from_slice(literal);
        self.ends.push(self.data.len());
    }

    pub(crate) fn len(&self) -> usize {
        self.ends.len()
    }

    pub(crate) fn get(&self, index: usize) -> io::Result<&[u8]> {
        let end = *self.ends.get(index).ok_or_else(|| {
            invalid(format!(
                "back-reference to literal {index:#x}, but only {} are stored",
                self.ends.len()
            ))
        })?;
        let start = if index == 0 { 0 } else { self.ends[index - 1] };
        Ok(&self.data[start..end])
    }
}

/// Decoded bytes waiting to be handed to the caller, plus length accounting
/// against the declared decompressed length.
#[derive(Debug)]
pub(crate) struct Sink {
    buf: Vec<u8>,
    pos: usize,
    produced: u64,
    declared: u64,
    surplus: u64,
    allow_odd_surplus: bool,
}

impl Sink {
    /// Creates a sink for `declared` bytes of output.
    ///
    /// With `allow_odd_surplus`, one extra byte beyond an odd declared length
    /// is silently dropped; codec 0 can only produce even-length runs.
    pub(crate) fn new(declared: u32, allow_odd_surplus: bool) -> Self {
        Self {
            buf: Vec::new(),
            pos: 0,
            produced: 0,
            declared: u64::from(declared),
            surplus: 0,
            allow_odd_surplus: allow_odd_surplus && declared % 2 == 1,
        }
    }

    pub(crate) fn declared(&self) -> u64 {
        self.declared
    }

    /// Number of decoded bytes not yet handed out.
    pub(crate) fn buffered(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub(crate) fn emit(&mut self, bytes: &[u8]) -> io::Result<()> {
        let room = (self.declared - self.produced).min(bytes.len() as u64) as usize;
        self.buf.extend_from_slice(&bytes[..room]);
        self.produced += room as u64;
        self.surplus += (bytes.len() - room) as u64;

        let tolerated = if self.allow_odd_surplus { 1 } else { 0 };
        if self.surplus > tolerated {
            return Err(invalid(format!(
                "decompressed data exceeds the declared length of {} bytes",
                self.declared
            )));
        }
        Ok(())
    }

    /// Checks that exactly the declared number of bytes was produced.
    pub(crate) fn finish(&self) -> io::Result<()> {
        if self.produced != self.declared {
            return Err(invalid(format!(
                "actual length of decompressed data ({}) does not match the declared length ({})",
                self.produced, self.declared
            )));
        }
        Ok(())
    }

    /// Copies buffered bytes into `out`, returning how many were copied.
    pub(crate) fn take_into(&mut self, out: &mut [u8]) -> usize {
        let n = self.buffered().min(out.len());
        out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        if self.pos == self.buf.len() {
            self.buf.clear();
            self.pos = 0;
        }
        n
    }
}

/// A run of repeated 1- or 2-byte values still to be produced.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Repeat {
    pub(crate) pattern: [u8; 2],
    pub(crate) width: usize,
    pub(crate) remaining: u64,
}

impl Repeat {
    /// Parses the value and count operands of a repeat code.
    pub(crate) fn read<R: Read>(r: &mut R, width: usize) -> io::Result<Self> {
        let value = read_varint(r)?;
        let limit = 1i64 << (8 * width);
        if value < 0 || i64::from(value) >= limit {
            return Err(invalid(format!(
                "value to repeat out of range for {width}-byte repeat: {value:#x}"
            )));
        }
        let count = i64::from(read_varint(r)?) + 1;
        if count <= 0 {
            return Err(invalid(format!("repeat count must be positive: {count}")));
        }
        let pattern = if width == 1 {
            [value as u8, 0]
        } else {
            (value as u16).to_be_bytes()
        };
        log::trace!("repeat {:02x?} x {count}", &pattern[..width]);
        Ok(Self {
            pattern,
            width,
            remaining: count as u64,
        })
    }

    /// Emits up to one chunk of the run. Returns `true` while more remains.
    pub(crate) fn expand(&mut self, sink: &mut Sink) -> io::Result<bool> {
        let per_chunk = (EXPANSION_CHUNK / self.width) as u64;
        let n = self.remaining.min(per_chunk) as usize;
        let unit = &self.pattern[..self.width];
        let chunk: Vec<u8> = unit.iter().copied().cycle().take(n * self.width).collect();
        sink.emit(&chunk)?;
        self.remaining -= n as u64;
        Ok(self.remaining > 0)
    }
}
