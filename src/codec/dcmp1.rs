//! Codec 1 decompressor.
//!
//! A byte-oriented relative of codec 0 with a smaller fixed table:
//!
//! | Tag | Meaning |
//! |-----|---------|
//! | `0x00..=0x1F` | literal of `(tag & 0xF) + 1` bytes; stored when `>= 0x10` |
//! | `0x20..=0xCF` | stored literal `tag - 0x20` |
//! | `0xD0`, `0xD1` | literal with its length in the next byte; stored for `0xD1` |
//! | `0xD2` | stored literal `next + 0xB0` |
//! | `0xD5..=0xFD` | entry `tag - 0xD5` of the fixed table |
//! | `0xFE 0x02` | repeat a 1-byte value |
//! | `0xFF` | end of data |

use std::io::{self, BufRead, Read};

use crate::format::reader::{read_bytes, read_u8};

use super::common::{LiteralTable, Repeat, Sink, expect_end, invalid, premature_end};
use super::{Codec, Decoder};

/// Fixed table of common two-byte sequences.
const TABLE: [[u8; 2]; 41] = [
    [0x00, 0x00], [0x00, 0x01], [0x00, 0x02], [0x00, 0x03], [0x2E, 0x01], [0x3E, 0x01],
    [0x01, 0x01], [0x1E, 0x01], [0xFF, 0xFF], [0x0E, 0x01], [0x31, 0x00], [0x11, 0x12],
    [0x01, 0x07], [0x33, 0x32], [0x12, 0x39], [0xED, 0x10], [0x01, 0x27], [0x23, 0x22],
    [0x01, 0x37], [0x07, 0x06], [0x01, 0x17], [0x01, 0x23], [0x00, 0xFF], [0x00, 0x2F],
    [0x07, 0x0E], [0xFD, 0x3C], [0x01, 0x35], [0x01, 0x15], [0x01, 0x02], [0x00, 0x07],
    [0x00, 0x3E], [0x05, 0xD5], [0x02, 0x01], [0x06, 0x07], [0x07, 0x08], [0x30, 0x01],
    [0x01, 0x33], [0x00, 0x10], [0x17, 0x16], [0x37, 0x3E], [0x36, 0x37],
];

/// Streaming decoder for codec 1.
pub struct Dcmp1Decoder<R> {
    input: R,
    literals: LiteralTable,
    repeat: Option<Repeat>,
    sink: Sink,
    finished: bool,
}

impl<R: BufRead + Send> Dcmp1Decoder<R> {
    /// Creates a decoder producing `decompressed_length` bytes from `input`,
    /// which starts right after the compressed header.
    pub fn new(input: R, decompressed_length: u32) -> Self {
        Self {
            input,
            literals: LiteralTable::default(),
            repeat: None,
            sink: Sink::new(decompressed_length, false),
            finished: false,
        }
    }

    fn literal(&mut self, count: usize, store: bool) -> io::Result<()> {
        let literal = read_bytes(&mut self.input, count)?;
        if store {
            self.literals.push(&literal);
        }
        self.sink.emit(&literal)
    }

    fn step(&mut self) -> io::Result<()> {
        if let Some(mut repeat) = self.repeat.take() {
            if repeat.expand(&mut self.sink)? {
                self.repeat = Some(repeat);
            }
            return Ok(());
        }

        let tag = read_u8(&mut self.input)?;
        match tag {
            0x00..=0x1F => self.literal(usize::from(tag & 0x0F) + 1, tag >= 0x10)?,
            0x20..=0xCF => {
                self.sink.emit(self.literals.get(usize::from(tag - 0x20))?)?;
            }
            0xD0 | 0xD1 => {
                let count = read_u8(&mut self.input)?;
                self.literal(usize::from(count), tag == 0xD1)?;
            }
            0xD2 => {
                let index = usize::from(read_u8(&mut self.input)?) + 0xB0;
                self.sink.emit(self.literals.get(index)?)?;
            }
            0xD5..=0xFD => {
                self.sink.emit(&TABLE[usize::from(tag - 0xD5)])?;
            }
            0xFE => {
                let kind = read_u8(&mut self.input)?;
                if kind != 0x02 {
                    return Err(invalid(format!("unknown extended code {kind:#04x}")));
                }
                self.repeat = Some(Repeat::read(&mut self.input, 1)?);
            }
            0xFF => {
                expect_end(&mut self.input)?;
                self.sink.finish()?;
                self.finished = true;
            }
            other => return Err(invalid(format!("unknown tag byte {other:#04x}"))),
        }
        Ok(())
    }
}

impl<R: BufRead + Send> Read for Dcmp1Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.sink.buffered() < buf.len() && !self.finished {
            self.step().map_err(premature_end)?;
        }
        Ok(self.sink.take_into(buf))
    }
}

impl<R: BufRead + Send> Decoder for Dcmp1Decoder<R> {
    fn codec(&self) -> Codec {
        Codec::Dcmp1
    }
}

impl<R> std::fmt::Debug for Dcmp1Decoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dcmp1Decoder")
            .field("repeat", &self.repeat)
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
        let mut decoder = Dcmp1Decoder::new(Cursor::new(data), len);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out)?;
        Ok(out)
    }

    #[test]
    fn test_short_literals_and_references() {
        // Stored 3-byte literal, reference to it, unstored 1-byte literal.
        let data = [0x12, b'a', b'b', b'c', 0x20, 0x00, b'!', 0xFF];
        assert_eq!(decode(&data, 7).unwrap(), b"abcabc!");
    }

    #[test]
    fn test_long_literal() {
        let mut data = vec![0xD1, 20];
        data.extend_from_slice(b"0123456789abcdefghij");
        data.extend_from_slice(&[0x20, 0xFF]);
        let out = decode(&data, 40).unwrap();
        assert_eq!(&out[..20], &out[20..]);
    }

    #[test]
    fn test_extended_reference_range() {
        // 0xB1 stored literals so that index 0xB0 exists.
        let mut data = Vec::new();
        for i in 0..=0xB0u8 {
            data.extend_from_slice(&[0x10, i]);
        }
        data.extend_from_slice(&[0xD2, 0x00, 0xFF]);
        let out = decode(&data, 0xB1 + 1).unwrap();
        assert_eq!(out.last(), Some(&0xB0));
    }

    #[test]
    fn test_fixed_table_and_repeat() {
        let data = [0xD5, 0xFE, 0x02, 0x7A, 0x01, 0xFF];
        let out = decode(&data, 4).unwrap();
        assert_eq!(&out[..2], &TABLE[0]);
        assert_eq!(&out[2..], b"zz");
    }

    #[test]
    fn test_reserved_tags_rejected() {
        for tag in [0xD3, 0xD4] {
            assert!(matches!(
                decode(&[tag, 0xFF], 0),
                Err(Error::Decompress { .. })
            ));
        }
    }

    #[test]
    fn test_only_one_byte_repeat() {
        assert!(matches!(
            decode(&[0xFE, 0x03, 0x00, 0x00, 0xFF], 2),
            Err(Error::Decompress { .. })
        ));
    }

    #[test]
    fn test_odd_length_is_exact() {
        assert_eq!(decode(&[0x02, b'a', b'b', b'c', 0xFF], 3).unwrap(), b"abc");
        assert!(decode(&[0x03, b'a', b'b', b'c', b'd', 0xFF], 3).is_err());
    }

    #[test]
    fn test_missing_end_marker() {
        assert!(matches!(
            decode(&[0x00, b'a'], 1),
            Err(Error::Decompress { .. })
        ));
    }
}
