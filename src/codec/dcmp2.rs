//! Codec 2 decompressor.
//!
//! Codec 2 replaces two-byte words with one-byte indices into a table of up
//! to 256 entries, either a built-in default or a custom table stored in
//! front of the data. In tagged mode each tag byte announces, most
//! significant bit first, whether each of the next eight items is a table
//! index (bit set) or a two-byte literal (bit clear).
//!
//! When the decompressed length is odd, the final input byte is a plain
//! literal rather than an index or tag.

use std::borrow::Cow;
use std::io::{self, BufRead, Read};

use crate::format::reader::{read_array, read_up_to};
use crate::{Error, Result};

use super::common::{Sink, at_eof, invalid, next_byte, premature_end};
use super::{Codec, Decoder};

/// Default substitution table.
const DEFAULT_TABLE: [[u8; 2]; 256] = [
    [0x00, 0x00], [0x00, 0x08], [0x4E, 0xBA], [0x20, 0x6E], [0x4E, 0x75], [0x00, 0x0C],
    [0x00, 0x04], [0x70, 0x00], [0x00, 0x10], [0x00, 0x02], [0x48, 0x6E], [0xFF, 0xFC],
    [0x60, 0x00], [0x00, 0x01], [0x48, 0xE7], [0x2F, 0x2E], [0x4E, 0x56], [0x00, 0x06],
    [0x4E, 0x5E], [0x2F, 0x00], [0x61, 0x00], [0xFF, 0xF8], [0x2F, 0x0B], [0xFF, 0xFF],
    [0x00, 0x14], [0x00, 0x0A], [0x00, 0x18], [0x20, 0x5F], [0x00, 0x0E], [0x20, 0x50],
    [0x3F, 0x3C], [0xFF, 0xF4], [0x4C, 0xEE], [0x30, 0x2E], [0x67, 0x00], [0x4C, 0xDF],
    [0x26, 0x6E], [0x00, 0x12], [0x00, 0x1C], [0x42, 0x67], [0xFF, 0xF0], [0x30, 0x3C],
    [0x2F, 0x0C], [0x00, 0x03], [0x4E, 0xD0], [0x00, 0x20], [0x70, 0x01], [0x00, 0x16],
    [0x2D, 0x40], [0x48, 0xC0], [0x20, 0x78], [0x72, 0x00], [0x58, 0x8F], [0x66, 0x00],
    [0x4F, 0xEF], [0x42, 0xA7], [0x67, 0x06], [0xFF, 0xFA], [0x55, 0x8F], [0x28, 0x6E],
    [0x3F, 0x00], [0xFF, 0xFE], [0x2F, 0x3C], [0x67, 0x04], [0x59, 0x8F], [0x20, 0x6B],
    [0x00, 0x24], [0x20, 0x1F], [0x41, 0xFA], [0x81, 0xE1], [0x66, 0x04], [0x67, 0x08],
    [0x00, 0x1A], [0x4E, 0xB9], [0x50, 0x8F], [0x20, 0x2E], [0x00, 0x07], [0x4E, 0xB0],
    [0xFF, 0xF2], [0x3D, 0x40], [0x00, 0x1E], [0x20, 0x68], [0x66, 0x06], [0xFF, 0xF6],
    [0x4E, 0xF9], [0x08, 0x00], [0x0C, 0x40], [0x3D, 0x7C], [0xFF, 0xEC], [0x00, 0x05],
    [0x20, 0x3C], [0xFF, 0xE8], [0xDE, 0xFC], [0x4A, 0x2E], [0x00, 0x30], [0x00, 0x28],
    [0x2F, 0x08], [0x20, 0x0B], [0x60, 0x02], [0x42, 0x6E], [0x2D, 0x48], [0x20, 0x53],
    [0x20, 0x40], [0x18, 0x00], [0x60, 0x04], [0x41, 0xEE], [0x2F, 0x28], [0x2F, 0x01],
    [0x67, 0x0A], [0x48, 0x40], [0x20, 0x07], [0x66, 0x08], [0x01, 0x18], [0x2F, 0x07],
    [0x30, 0x28], [0x3F, 0x2E], [0x30, 0x2B], [0x22, 0x6E], [0x2F, 0x2B], [0x00, 0x2C],
    [0x67, 0x0C], [0x22, 0x5F], [0x60, 0x06], [0x00, 0xFF], [0x30, 0x07], [0xFF, 0xEE],
    [0x53, 0x40], [0x00, 0x40], [0xFF, 0xE4], [0x4A, 0x40], [0x66, 0x0A], [0x00, 0x0F],
    [0x4E, 0xAD], [0x70, 0xFF], [0x22, 0xD8], [0x48, 0x6B], [0x00, 0x22], [0x20, 0x4B],
    [0x67, 0x0E], [0x4A, 0xAE], [0x4E, 0x90], [0xFF, 0xE0], [0xFF, 0xC0], [0x00, 0x2A],
    [0x27, 0x40], [0x67, 0x02], [0x51, 0xC8], [0x02, 0xB6], [0x48, 0x7A], [0x22, 0x78],
    [0xB0, 0x6E], [0xFF, 0xE6], [0x00, 0x09], [0x32, 0x2E], [0x3E, 0x00], [0x48, 0x41],
    [0xFF, 0xEA], [0x43, 0xEE], [0x4E, 0x71], [0x74, 0x00], [0x2F, 0x2C], [0x20, 0x6C],
    [0x00, 0x3C], [0x00, 0x26], [0x00, 0x50], [0x18, 0x80], [0x30, 0x1F], [0x22, 0x00],
    [0x66, 0x0C], [0xFF, 0xDA], [0x00, 0x38], [0x66, 0x02], [0x30, 0x2C], [0x20, 0x0C],
    [0x2D, 0x6E], [0x42, 0x40], [0xFF, 0xE2], [0xA9, 0xF0], [0xFF, 0x00], [0x37, 0x7C],
    [0xE5, 0x80], [0xFF, 0xDC], [0x48, 0x68], [0x59, 0x4F], [0x00, 0x34], [0x3E, 0x1F],
    [0x60, 0x08], [0x2F, 0x06], [0xFF, 0xDE], [0x60, 0x0A], [0x70, 0x02], [0x00, 0x32],
    [0xFF, 0xCC], [0x00, 0x80], [0x22, 0x51], [0x10, 0x1F], [0x31, 0x7C], [0xA0, 0x29],
    [0xFF, 0xD8], [0x52, 0x40], [0x01, 0x00], [0x67, 0x10], [0xA0, 0x23], [0xFF, 0xCE],
    [0xFF, 0xD4], [0x20, 0x06], [0x48, 0x78], [0x00, 0x2E], [0x50, 0x4F], [0x43, 0xFA],
    [0x67, 0x12], [0x76, 0x00], [0x41, 0xE8], [0x4A, 0x6E], [0x20, 0xD9], [0x00, 0x5A],
    [0x7F, 0xFF], [0x51, 0xCA], [0x00, 0x5C], [0x2E, 0x00], [0x02, 0x40], [0x48, 0xC7],
    [0x67, 0x14], [0x0C, 0x80], [0x2E, 0x9F], [0xFF, 0xD6], [0x80, 0x00], [0x10, 0x00],
    [0x48, 0x42], [0x4A, 0x6B], [0xFF, 0xD2], [0x00, 0x48], [0x4A, 0x47], [0x4E, 0xD1],
    [0x20, 0x6F], [0x00, 0x41], [0x60, 0x0C], [0x2A, 0x78], [0x42, 0x2E], [0x32, 0x00],
    [0x65, 0x74], [0x67, 0x16], [0x00, 0x44], [0x48, 0x6D], [0x20, 0x08], [0x48, 0x6C],
    [0x0B, 0x7C], [0x26, 0x40], [0x04, 0x00], [0x00, 0x68], [0x20, 0x6D], [0x00, 0x0D],
    [0x2A, 0x40], [0x00, 0x0B], [0x00, 0x3E], [0x02, 0x20],
];

/// Parameter flag: a custom table precedes the data.
pub const FLAG_CUSTOM_TABLE: u8 = 1 << 0;

/// Parameter flag: the data is tagged.
pub const FLAG_TAGGED: u8 = 1 << 1;

/// Codec 2 parameters decoded from a type 9 compressed header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dcmp2Params {
    /// Leading parameter word; its meaning is unknown.
    pub unknown: u16,
    /// Number of entries in the custom table.
    pub table_count: usize,
    /// Whether the data is tagged.
    pub tagged: bool,
    /// Whether a custom table precedes the data.
    pub custom_table: bool,
}

impl Dcmp2Params {
    /// Parses the four parameter bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decompress`] if undefined flag bits are set, or if a
    /// table size is given while the default table is in use.
    pub fn parse(parameters: [u8; 4]) -> Result<Self> {
        let unknown = u16::from_be_bytes([parameters[0], parameters[1]]);
        let table_count_m1 = parameters[2];
        let flags = parameters[3];

        if flags & !(FLAG_TAGGED | FLAG_CUSTOM_TABLE) != 0 {
            return Err(Error::decompress(format!(
                "unsupported flags set: {flags:#010b}, only bits 0 and 1 are defined"
            )));
        }
        let custom_table = flags & FLAG_CUSTOM_TABLE != 0;
        if !custom_table && table_count_m1 != 0 {
            return Err(Error::decompress(format!(
                "table size field is {table_count_m1}, but must be 0 when the default table is used"
            )));
        }

        Ok(Self {
            unknown,
            table_count: usize::from(table_count_m1) + 1,
            tagged: flags & FLAG_TAGGED != 0,
            custom_table,
        })
    }
}

/// Streaming decoder for codec 2.
pub struct Dcmp2Decoder<R> {
    input: R,
    table: Cow<'static, [[u8; 2]]>,
    tagged: bool,
    odd: bool,
    sink: Sink,
    finished: bool,
}

impl<R: BufRead + Send> Dcmp2Decoder<R> {
    /// Creates a decoder producing `decompressed_length` bytes from `input`,
    /// which starts right after the compressed header.
    ///
    /// A custom table, if the parameters call for one, is read from `input`
    /// right away.
    pub fn new(mut input: R, decompressed_length: u32, parameters: [u8; 4]) -> Result<Self> {
        let params = Dcmp2Params::parse(parameters)?;

        let table = if params.custom_table {
            let mut entries = Vec::with_capacity(params.table_count);
            for _ in 0..params.table_count {
                let entry: [u8; 2] = read_array(&mut input).map_err(premature_end)?;
                entries.push(entry);
            }
            Cow::Owned(entries)
        } else {
            Cow::Borrowed(&DEFAULT_TABLE[..])
        };
        log::debug!(
            "codec 2: {} table of {} entries, tagged: {}",
            if params.custom_table { "custom" } else { "default" },
            table.len(),
            params.tagged
        );

        Ok(Self {
            input,
            table,
            tagged: params.tagged,
            odd: decompressed_length & 1 == 1,
            sink: Sink::new(decompressed_length, false),
            finished: false,
        })
    }

    fn lookup(&self, index: u8) -> io::Result<[u8; 2]> {
        self.table.get(usize::from(index)).copied().ok_or_else(|| {
            invalid(format!(
                "table index {index} out of range for a table of {} entries",
                self.table.len()
            ))
        })
    }

    fn end(&mut self) -> io::Result<()> {
        self.finished = true;
        self.sink.finish()
    }

    /// Reads the byte that starts the next item. At the very end of
    /// odd-length data it is a trailing literal instead; `None` means done.
    fn lead_byte(&mut self) -> io::Result<Option<u8>> {
        let Some(byte) = next_byte(&mut self.input)? else {
            self.end()?;
            return Ok(None);
        };
        if self.odd && at_eof(&mut self.input)? {
            self.sink.emit(&[byte])?;
            self.end()?;
            return Ok(None);
        }
        Ok(Some(byte))
    }

    fn step(&mut self) -> io::Result<()> {
        let Some(lead) = self.lead_byte()? else {
            return Ok(());
        };

        if !self.tagged {
            let entry = self.lookup(lead)?;
            return self.sink.emit(&entry);
        }

        for bit in (0..8).rev() {
            if lead & (1 << bit) != 0 {
                let Some(index) = next_byte(&mut self.input)? else {
                    break;
                };
                let entry = self.lookup(index)?;
                self.sink.emit(&entry)?;
            } else {
                let mut literal = [0u8; 2];
                let n = read_up_to(&mut self.input, &mut literal)?;
                if n == 0 {
                    break;
                }
                self.sink.emit(&literal[..n])?;
            }
        }
        Ok(())
    }
}

impl<R: BufRead + Send> Read for Dcmp2Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.sink.buffered() < buf.len() && !self.finished {
            self.step().map_err(premature_end)?;
        }
        Ok(self.sink.take_into(buf))
    }
}

impl<R: BufRead + Send> Decoder for Dcmp2Decoder<R> {
    fn codec(&self) -> Codec {
        Codec::Dcmp2
    }
}

impl<R> std::fmt::Debug for Dcmp2Decoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dcmp2Decoder")
            .field("table_len", &self.table.len())
            .field("tagged", &self.tagged)
            .field("declared", &self.sink.declared())
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const UNTAGGED: [u8; 4] = [0, 0, 0, 0];
    const TAGGED: [u8; 4] = [0, 0, 0, FLAG_TAGGED];

    fn decode(data: &[u8], len: u32, params: [u8; 4]) -> Result<Vec<u8>> {
        let mut decoder = Dcmp2Decoder::new(Cursor::new(data), len, params)?;
        let mut out = Vec::new();
        decoder.read_to_end(&mut out)?;
        Ok(out)
    }

    #[test]
    fn test_untagged_default_table() {
        assert_eq!(decode(&[0x02, 0x04], 4, UNTAGGED).unwrap(), b"N\xBANu");
    }

    #[test]
    fn test_untagged_odd_length_trailing_literal() {
        assert_eq!(
            decode(&[0x02, 0x04, b'!'], 5, UNTAGGED).unwrap(),
            b"N\xBANu!"
        );
    }

    #[test]
    fn test_tagged_partial_group() {
        // A table reference, then a literal; the data ends mid-group.
        assert_eq!(
            decode(&[0x80, 0x01, b'h', b'i'], 4, TAGGED).unwrap(),
            [0x00, 0x08, b'h', b'i']
        );
    }

    #[test]
    fn test_tagged_full_group() {
        let mut data = vec![0b1010_1010];
        for _ in 0..4 {
            data.extend_from_slice(&[0x00, b'x', b'y']);
        }
        let out = decode(&data, 16, TAGGED).unwrap();
        assert_eq!(out, b"\0\0xy\0\0xy\0\0xy\0\0xy");
    }

    #[test]
    fn test_tagged_odd_length() {
        assert_eq!(decode(&[0x00, b'a', b'b', b'c'], 3, TAGGED).unwrap(), b"abc");
    }

    #[test]
    fn test_custom_table() {
        let params = [0x00, 0x00, 0x01, FLAG_CUSTOM_TABLE];
        let data = [b'A', b'B', b'C', b'D', 0x01, 0x00, 0x01];
        assert_eq!(decode(&data, 6, params).unwrap(), b"CDABCD");
    }

    #[test]
    fn test_custom_table_index_out_of_range() {
        let params = [0x00, 0x00, 0x00, FLAG_CUSTOM_TABLE];
        assert!(matches!(
            decode(&[b'A', b'B', 0x01], 2, params),
            Err(Error::Decompress { .. })
        ));
    }

    #[test]
    fn test_custom_table_truncated() {
        let params = [0x00, 0x00, 0x03, FLAG_CUSTOM_TABLE];
        assert!(matches!(
            decode(&[b'A', b'B'], 2, params),
            Err(Error::Decompress { .. })
        ));
    }

    #[test]
    fn test_rejects_undefined_flags() {
        assert!(matches!(
            Dcmp2Params::parse([0, 0, 0, 0x04]),
            Err(Error::Decompress { .. })
        ));
    }

    #[test]
    fn test_rejects_table_size_with_default_table() {
        assert!(matches!(
            Dcmp2Params::parse([0, 0, 0x05, FLAG_TAGGED]),
            Err(Error::Decompress { .. })
        ));
    }

    #[test]
    fn test_short_output() {
        assert!(matches!(
            decode(&[0x02], 4, UNTAGGED),
            Err(Error::Decompress { .. })
        ));
    }
}
