//! Codec 0 decompressor.
//!
//! Opcode summary:
//!
//! | Tag | Meaning |
//! |-----|---------|
//! | `0x00..=0x1F` | literal of `2*n` bytes, stored when `>= 0x10` |
//! | `0x20`, `0x21` | stored literal `0x28 + ((tag - 0x20) << 8 | next)` |
//! | `0x22` | stored literal `0x28 + u16` |
//! | `0x23..=0x4A` | stored literal `tag - 0x23` |
//! | `0x4B..=0xFD` | entry `tag - 0x4B` of the fixed table |
//! | `0xFE` | extended code, see [`Dcmp0Decoder`] |
//! | `0xFF` | end of data |
//!
//! For literal tags, `n` is the low nibble, or the next byte when the nibble is zero.

use std::io::{self, BufRead, Read};

use crate::format::reader::{read_bytes, read_u8, read_u16_be};

use super::common::{
    EXPANSION_CHUNK, LiteralTable, Repeat, Sink, expect_end, invalid, premature_end, read_varint,
};
use super::{Codec, Decoder};

/// Fixed table of common two-byte sequences (mostly 68k instruction words).
const TABLE: [[u8; 2]; 179] = [
    [0x00, 0x00], [0x4E, 0xBA], [0x00, 0x08], [0x4E, 0x75], [0x00, 0x0C], [0x4E, 0xAD],
    [0x20, 0x53], [0x2F, 0x0B], [0x61, 0x00], [0x00, 0x10], [0x70, 0x00], [0x2F, 0x00],
    [0x48, 0x6E], [0x20, 0x50], [0x20, 0x6E], [0x2F, 0x2E], [0xFF, 0xFC], [0x48, 0xE7],
    [0x3F, 0x3C], [0x00, 0x04], [0xFF, 0xF8], [0x2F, 0x0C], [0x20, 0x06], [0x4E, 0xED],
    [0x4E, 0x56], [0x20, 0x68], [0x4E, 0x5E], [0x00, 0x01], [0x58, 0x8F], [0x4F, 0xEF],
    [0x00, 0x02], [0x00, 0x18], [0x60, 0x00], [0xFF, 0xFF], [0x50, 0x8F], [0x4E, 0x90],
    [0x00, 0x06], [0x26, 0x6E], [0x00, 0x14], [0xFF, 0xF4], [0x4C, 0xEE], [0x00, 0x0A],
    [0x00, 0x0E], [0x41, 0xEE], [0x4C, 0xDF], [0x48, 0xC0], [0xFF, 0xF0], [0x2D, 0x40],
    [0x00, 0x12], [0x30, 0x2E], [0x70, 0x01], [0x2F, 0x28], [0x20, 0x54], [0x67, 0x00],
    [0x00, 0x20], [0x00, 0x1C], [0x20, 0x5F], [0x18, 0x00], [0x26, 0x6F], [0x48, 0x78],
    [0x00, 0x16], [0x41, 0xFA], [0x30, 0x3C], [0x28, 0x40], [0x72, 0x00], [0x28, 0x6E],
    [0x20, 0x0C], [0x66, 0x00], [0x20, 0x6B], [0x2F, 0x07], [0x55, 0x8F], [0x00, 0x28],
    [0xFF, 0xFE], [0xFF, 0xEC], [0x22, 0xD8], [0x20, 0x0B], [0x00, 0x0F], [0x59, 0x8F],
    [0x2F, 0x3C], [0xFF, 0x00], [0x01, 0x18], [0x81, 0xE1], [0x4A, 0x00], [0x4E, 0xB0],
    [0xFF, 0xE8], [0x48, 0xC7], [0x00, 0x03], [0x00, 0x22], [0x00, 0x07], [0x00, 0x1A],
    [0x67, 0x06], [0x67, 0x08], [0x4E, 0xF9], [0x00, 0x24], [0x20, 0x78], [0x08, 0x00],
    [0x66, 0x04], [0x00, 0x2A], [0x4E, 0xD0], [0x30, 0x28], [0x26, 0x5F], [0x67, 0x04],
    [0x00, 0x30], [0x43, 0xEE], [0x3F, 0x00], [0x20, 0x1F], [0x00, 0x1E], [0xFF, 0xF6],
    [0x20, 0x2E], [0x42, 0xA7], [0x20, 0x07], [0xFF, 0xFA], [0x60, 0x02], [0x3D, 0x40],
    [0x0C, 0x40], [0x66, 0x06], [0x00, 0x26], [0x2D, 0x48], [0x2F, 0x01], [0x70, 0xFF],
    [0x60, 0x04], [0x18, 0x80], [0x4A, 0x40], [0x00, 0x40], [0x00, 0x2C], [0x2F, 0x08],
    [0x00, 0x11], [0xFF, 0xE4], [0x21, 0x40], [0x26, 0x40], [0xFF, 0xF2], [0x42, 0x6E],
    [0x4E, 0xB9], [0x3D, 0x7C], [0x00, 0x38], [0x00, 0x0D], [0x60, 0x06], [0x42, 0x2E],
    [0x20, 0x3C], [0x67, 0x0C], [0x2D, 0x68], [0x66, 0x08], [0x4A, 0x2E], [0x4A, 0xAE],
    [0x00, 0x2E], [0x48, 0x40], [0x22, 0x5F], [0x22, 0x00], [0x67, 0x0A], [0x30, 0x07],
    [0x42, 0x67], [0x00, 0x32], [0x20, 0x28], [0x00, 0x09], [0x48, 0x7A], [0x02, 0x00],
    [0x2F, 0x2B], [0x00, 0x05], [0x22, 0x6E], [0x66, 0x02], [0xE5, 0x80], [0x67, 0x0E],
    [0x66, 0x0A], [0x00, 0x50], [0x3E, 0x00], [0x66, 0x0C], [0x2E, 0x00], [0xFF, 0xEE],
    [0x20, 0x6D], [0x20, 0x40], [0xFF, 0xE0], [0x53, 0x40], [0x60, 0x08], [0x04, 0x80],
    [0x00, 0x68], [0x0B, 0x7C], [0x44, 0x00], [0x41, 0xE8], [0x48, 0x41],
];

/// Bytes following the address in every segment loader jump table entry:
/// `MOVE.W #segment, -(SP)` followed by `_LoadSeg`.
fn jump_table_tail(segment: u16) -> [u8; 6] {
    let [hi, lo] = segment.to_be_bytes();
    [0x3F, 0x3C, hi, lo, 0xA9, 0xF0]
}

/// Output still owed by an extended code.
#[derive(Debug, Clone, Copy)]
enum Pending {
    None,
    Repeat(Repeat),
    JumpTable { tail: [u8; 6], current: u16, remaining: u32 },
    Delta16 { current: u16, remaining: u32 },
    Delta32 { current: u32, remaining: u32 },
}

/// Streaming decoder for codec 0.
///
/// Extended codes (`0xFE kind`):
///
/// | Kind | Meaning |
/// |------|---------|
/// | `0x00` | jump table: segment, count, first address, then deltas (each 6 too high) |
/// | `0x02` | repeat a 1-byte value |
/// | `0x03` | repeat a 2-byte value |
/// | `0x04` | 16-bit values as 8-bit signed deltas |
/// | `0x06` | 32-bit values as variable-length deltas |
///
/// Runs are expanded incrementally, so output stays bounded regardless of
/// repeat counts.
pub struct Dcmp0Decoder<R> {
    input: R,
    literals: LiteralTable,
    pending: Pending,
    sink: Sink,
    finished: bool,
}

impl<R: BufRead + Send> Dcmp0Decoder<R> {
    /// Creates a decoder producing `decompressed_length` bytes from `input`,
    /// which starts right after the compressed header.
    pub fn new(input: R, decompressed_length: u32) -> Self {
        Self {
            input,
            literals: LiteralTable::default(),
            pending: Pending::None,
            sink: Sink::new(decompressed_length, true),
            finished: false,
        }
    }

    fn step(&mut self) -> io::Result<()> {
        if !matches!(self.pending, Pending::None) {
            return self.expand();
        }

        let tag = read_u8(&mut self.input)?;
        match tag {
            0x00..=0x1F => {
                let count_div2 = if tag == 0x00 || tag == 0x10 {
                    read_u8(&mut self.input)?
                } else {
                    tag & 0x0F
                };
                let literal = read_bytes(&mut self.input, 2 * usize::from(count_div2))?;
                if tag >= 0x10 {
                    log::trace!("literal {:#x}: {} bytes", self.literals.len(), literal.len());
                    self.literals.push(&literal);
                }
                self.sink.emit(&literal)?;
            }
            0x20 | 0x21 => {
                let next = read_u8(&mut self.input)?;
                let index = 0x28 + (usize::from(tag - 0x20) << 8 | usize::from(next));
                self.sink.emit(self.literals.get(index)?)?;
            }
            0x22 => {
                let index = 0x28 + usize::from(read_u16_be(&mut self.input)?);
                self.sink.emit(self.literals.get(index)?)?;
            }
            0x23..=0x4A => {
                self.sink.emit(self.literals.get(usize::from(tag - 0x23))?)?;
            }
            0x4B..=0xFD => {
                self.sink.emit(&TABLE[usize::from(tag - 0x4B)])?;
            }
            0xFE => self.extended()?,
            0xFF => {
                expect_end(&mut self.input)?;
                self.sink.finish()?;
                self.finished = true;
            }
        }
        Ok(())
    }

    fn extended(&mut self) -> io::Result<()> {
        let kind = read_u8(&mut self.input)?;
        match kind {
            0x00 => {
                let segment = read_varint(&mut self.input)?;
                let segment = u16::try_from(segment)
                    .map_err(|_| invalid(format!("segment number out of range: {segment:#x}")))?;
                let tail = jump_table_tail(segment);
                self.sink.emit(&tail)?;

                let count = read_varint(&mut self.input)?;
                if count <= 0 {
                    return Err(invalid(format!(
                        "jump table entry count must be greater than 0, not {count}"
                    )));
                }
                let first = read_varint(&mut self.input)?;
                let current = u16::try_from(first)
                    .map_err(|_| invalid(format!("jump table address out of range: {first:#x}")))?;
                log::trace!("jump table: segment {segment:#x}, {count} entries");
                self.emit_jump_entry(current, &tail)?;
                self.pending = Pending::JumpTable {
                    tail,
                    current,
                    remaining: (count - 1) as u32,
                };
            }
            0x02 | 0x03 => {
                let width = usize::from(kind - 1);
                self.pending = Pending::Repeat(Repeat::read(&mut self.input, width)?);
            }
            0x04 => {
                let initial = read_varint(&mut self.input)?;
                let initial = i16::try_from(initial).map_err(|_| {
                    invalid(format!("initial value out of range for 16-bit deltas: {initial:#x}"))
                })?;
                self.sink.emit(&initial.to_be_bytes())?;
                let count = read_varint(&mut self.input)?;
                if count < 0 {
                    return Err(invalid(format!("delta count cannot be negative: {count}")));
                }
                self.pending = Pending::Delta16 {
                    current: initial as u16,
                    remaining: count as u32,
                };
            }
            0x06 => {
                let initial = read_varint(&mut self.input)?;
                self.sink.emit(&initial.to_be_bytes())?;
                let count = read_varint(&mut self.input)?;
                if count < 0 {
                    return Err(invalid(format!("delta count cannot be negative: {count}")));
                }
                self.pending = Pending::Delta32 {
                    current: initial as u32,
                    remaining: count as u32,
                };
            }
            other => return Err(invalid(format!("unknown extended code {other:#04x}"))),
        }
        Ok(())
    }

    fn emit_jump_entry(&mut self, address: u16, tail: &[u8; 6]) -> io::Result<()> {
        let mut entry = [0u8; 8];
        entry[..2].copy_from_slice(&address.to_be_bytes());
        entry[2..].copy_from_slice(tail);
        self.sink.emit(&entry)
    }

    /// Produces up to one chunk of the pending run.
    fn expand(&mut self) -> io::Result<()> {
        let batch = (EXPANSION_CHUNK / 8) as u32;
        self.pending = match self.pending {
            Pending::None => Pending::None,
            Pending::Repeat(mut repeat) => {
                if repeat.expand(&mut self.sink)? {
                    Pending::Repeat(repeat)
                } else {
                    Pending::None
                }
            }
            Pending::JumpTable {
                tail,
                mut current,
                remaining,
            } => {
                let n = remaining.min(batch);
                for _ in 0..n {
                    let diff = i64::from(read_varint(&mut self.input)?) - 6;
                    current = (i64::from(current) + diff).rem_euclid(0x10000) as u16;
                    self.emit_jump_entry(current, &tail)?;
                }
                match remaining - n {
                    0 => Pending::None,
                    remaining => Pending::JumpTable {
                        tail,
                        current,
                        remaining,
                    },
                }
            }
            Pending::Delta16 {
                mut current,
                remaining,
            } => {
                let n = remaining.min(batch);
                for _ in 0..n {
                    let diff = read_u8(&mut self.input)? as i8;
                    current = current.wrapping_add(diff as i16 as u16);
                    self.sink.emit(&current.to_be_bytes())?;
                }
                match remaining - n {
                    0 => Pending::None,
                    remaining => Pending::Delta16 { current, remaining },
                }
            }
            Pending::Delta32 {
                mut current,
                remaining,
            } => {
                let n = remaining.min(batch);
                for _ in 0..n {
                    let diff = read_varint(&mut self.input)?;
                    current = current.wrapping_add(diff as u32);
                    self.sink.emit(&current.to_be_bytes())?;
                }
                match remaining - n {
                    0 => Pending::None,
                    remaining => Pending::Delta32 { current, remaining },
                }
            }
        };
        Ok(())
    }
}

impl<R: BufRead + Send> Read for Dcmp0Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.sink.buffered() < buf.len() && !self.finished {
            self.step().map_err(premature_end)?;
        }
        Ok(self.sink.take_into(buf))
    }
}

impl<R: BufRead + Send> Decoder for Dcmp0Decoder<R> {
    fn codec(&self) -> Codec {
        Codec::Dcmp0
    }
}

impl<R> std::fmt::Debug for Dcmp0Decoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dcmp0Decoder")
            .field("pending", &self.pending)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::io::Cursor;

    fn decode(data: &[u8], len: u32) -> Result<Vec<u8>, Error> {
        let mut decoder = Dcmp0Decoder::new(Cursor::new(data), len);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out)?;
        Ok(out)
    }

    #[test]
    fn test_literals_and_references() {
        // Stored literal "ABCD", back-reference to it, fixed table entry 0,
        // 1-byte repeat of 'A' four times, end.
        let data = [
            0x12, b'A', b'B', b'C', b'D', 0x23, 0x4B, 0xFE, 0x02, 0x41, 0x03, 0xFF,
        ];
        assert_eq!(decode(&data, 14).unwrap(), b"ABCDABCD\x00\x00AAAA");
    }

    #[test]
    fn test_unstored_literal_with_count_byte() {
        let data = [0x00, 0x01, b'h', b'i', 0xFF];
        assert_eq!(decode(&data, 2).unwrap(), b"hi");
        // Not stored, so it cannot be referenced.
        let data = [0x00, 0x01, b'h', b'i', 0x23, 0xFF];
        assert!(matches!(decode(&data, 4), Err(Error::Decompress { .. })));
    }

    #[test]
    fn test_fixed_table() {
        assert_eq!(
            decode(&[0x4C, 0x4D, 0xFF], 4).unwrap(),
            [0x4E, 0xBA, 0x00, 0x08]
        );
        assert_eq!(decode(&[0xFD, 0xFF], 2).unwrap(), TABLE[178]);
    }

    #[test]
    fn test_two_byte_repeat() {
        let data = [0xFE, 0x03, 0xC1, 0x02, 0x02, 0xFF];
        assert_eq!(
            decode(&data, 6).unwrap(),
            [0x01, 0x02, 0x01, 0x02, 0x01, 0x02]
        );
    }

    #[test]
    fn test_jump_table() {
        // Segment 1, two entries, first address 0x10, next delta 8 (+6 bias).
        let data = [0xFE, 0x00, 0x01, 0x02, 0x10, 0x0E, 0xFF];
        let out = decode(&data, 6 + 8 + 8).unwrap();
        let tail = [0x3F, 0x3C, 0x00, 0x01, 0xA9, 0xF0];
        assert_eq!(&out[..6], &tail);
        assert_eq!(&out[6..8], &[0x00, 0x10]);
        assert_eq!(&out[8..14], &tail);
        assert_eq!(&out[14..16], &[0x00, 0x18]);
        assert_eq!(&out[16..22], &tail);
    }

    #[test]
    fn test_jump_table_rejects_zero_count() {
        let data = [0xFE, 0x00, 0x01, 0x00, 0x10, 0xFF];
        assert!(matches!(decode(&data, 6), Err(Error::Decompress { .. })));
    }

    #[test]
    fn test_delta16_wraps() {
        // Initial 0x7FFF (as 0xFF-prefixed 32-bit), two deltas +1 and -2.
        let data = [
            0xFE, 0x04, 0xFF, 0x00, 0x00, 0x7F, 0xFF, 0x02, 0x01, 0xFE, 0xFF,
        ];
        assert_eq!(
            decode(&data, 6).unwrap(),
            [0x7F, 0xFF, 0x80, 0x00, 0x7F, 0xFE]
        );
    }

    #[test]
    fn test_delta32() {
        let data = [0xFE, 0x06, 0x10, 0x02, 0x05, 0xBF, 0xFF, 0xFF];
        assert_eq!(
            decode(&data, 12).unwrap(),
            [0, 0, 0, 0x10, 0, 0, 0, 0x15, 0, 0, 0, 0x14]
        );
    }

    #[test]
    fn test_odd_length_drops_last_byte() {
        assert_eq!(decode(&[0x02, b'a', b'b', b'c', b'd', 0xFF], 3).unwrap(), b"abc");
        // Even declared length gets no such allowance.
        assert!(decode(&[0x02, b'a', b'b', b'c', b'd', 0xFF], 2).is_err());
    }

    #[test]
    fn test_length_mismatch() {
        assert!(matches!(
            decode(&[0x01, b'a', b'b', 0xFF], 4),
            Err(Error::Decompress { .. })
        ));
    }

    #[test]
    fn test_premature_end() {
        let err = decode(&[0x02, b'a', b'b'], 4).unwrap_err();
        assert!(matches!(err, Error::Decompress { .. }));
        assert!(err.to_string().contains("prematurely"));
    }

    #[test]
    fn test_extra_data_after_end() {
        assert!(matches!(
            decode(&[0x01, b'a', b'b', 0xFF, 0x00], 2),
            Err(Error::Decompress { .. })
        ));
    }

    #[test]
    fn test_unknown_extended_code() {
        assert!(matches!(
            decode(&[0xFE, 0x05, 0xFF], 0),
            Err(Error::Decompress { .. })
        ));
    }

    #[test]
    fn test_large_repeat_is_streamed() {
        // 0x20000 copies of 0x00.
        let data = [0xFE, 0x02, 0x00, 0xFF, 0x00, 0x01, 0xFF, 0xFF, 0xFF];
        let mut decoder = Dcmp0Decoder::new(Cursor::new(&data[..]), 0x20000);
        let mut buf = [0u8; 100];
        let n = decoder.read(&mut buf).unwrap();
        assert_eq!(n, 100);
        assert!(decoder.sink.buffered() <= EXPANSION_CHUNK);
        let mut rest = Vec::new();
        decoder.read_to_end(&mut rest).unwrap();
        assert_eq!(rest.len(), 0x20000 - 100);
    }
}
