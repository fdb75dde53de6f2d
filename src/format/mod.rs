//! Resource file format constants, definitions, and low-level parsing utilities.
//!
//! This module contains the sizes, offsets, masks, and flag bits defined by the
//! classic Macintosh resource file layout. All multi-byte integers in the format
//! are big-endian.

pub mod header;
pub mod map;
pub mod reader;

use std::fmt;
use std::str::FromStr;

use crate::text;

/// Size of the resource file header block in bytes.
///
/// The header contains:
/// - 4 bytes: data section offset
/// - 4 bytes: map section offset
/// - 4 bytes: data section length
/// - 4 bytes: map section length
/// - 112 bytes: reserved for system use
/// - 128 bytes: available for application use
pub const HEADER_SIZE: u64 = 256;

/// Size of the four offset/length fields at the start of the header.
pub const HEADER_FIELDS_SIZE: usize = 16;

/// Size of the system-reserved block following the header fields.
pub const SYSTEM_DATA_SIZE: usize = 112;

/// Size of the application-reserved block at the end of the header.
pub const APPLICATION_DATA_SIZE: usize = 128;

/// Size of the fixed part of the resource map.
///
/// - 16 bytes: reserved copy of the file header fields
/// - 4 bytes: handle to the next resource map (runtime only)
/// - 2 bytes: file reference number (runtime only)
/// - 2 bytes: resource file attributes
/// - 2 bytes: offset from map start to the type list
/// - 2 bytes: offset from map start to the name list
pub const MAP_HEADER_SIZE: usize = 28;

/// Offset of the file attributes field within the map.
pub const MAP_FILE_ATTRIBUTES_OFFSET: usize = 22;

/// Size of the type list's count field.
pub const TYPE_LIST_HEADER_SIZE: usize = 2;

/// Size of one type list entry: type code, count minus one, reference list offset.
pub const TYPE_ENTRY_SIZE: usize = 8;

/// Size of one reference list entry: ID, name offset, attributes and data offset,
/// reserved handle.
pub const REFERENCE_ENTRY_SIZE: usize = 12;

/// Size of the length prefix in front of every resource's data.
pub const DATA_LENGTH_PREFIX_SIZE: u64 = 4;

/// Name offset value meaning "this resource has no name".
pub const NO_NAME: u16 = 0xFFFF;

/// Number of bits the attribute byte is shifted up within the packed
/// reference field.
pub const ATTRIBUTES_SHIFT: u32 = 24;

/// Mask selecting the data offset from the packed reference field.
pub const DATA_OFFSET_MASK: u32 = (1 << ATTRIBUTES_SHIFT) - 1;

/// Splits a packed reference field into its attribute byte and 24-bit data offset.
#[inline]
pub fn unpack_attributes_and_offset(packed: u32) -> (u8, u32) {
    let attributes = (packed >> ATTRIBUTES_SHIFT) as u8;
    (attributes, packed & DATA_OFFSET_MASK)
}

/// Decodes a "count minus one" field. The stored value wraps, so `0xFFFF`
/// encodes an empty list.
#[inline]
pub fn count_from_m1(m1: u16) -> usize {
    (usize::from(m1) + 1) % 0x10000
}

bitflags::bitflags! {
    /// Per-resource attribute flags stored in the reference list.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ResourceAttrs: u8 {
        /// Reserved for use by the system.
        const SYS_REF = 0x80;
        /// Load the resource into the system heap instead of the application heap.
        const SYS_HEAP = 0x40;
        /// The resource's memory may be purged.
        const PURGEABLE = 0x20;
        /// The resource's memory is locked.
        const LOCKED = 0x10;
        /// The resource is protected from modification.
        const PROTECTED = 0x08;
        /// Load the resource when the file is opened.
        const PRELOAD = 0x04;
        /// The resource has been modified in memory.
        const CHANGED = 0x02;
        /// The resource data is compressed.
        const COMPRESSED = 0x01;
    }
}

bitflags::bitflags! {
    /// Resource-file-wide attribute flags stored in the map header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ResourceFileAttrs: u16 {
        /// The file's resources may not be modified.
        const RESOURCES_LOCKED = 1 << 15;
        /// Printer driver is MultiFinder-compatible.
        const PRINTER_DRIVER_MULTIFINDER_COMPATIBLE = 1 << 8;
        /// The file is read-only.
        const READ_ONLY = 1 << 7;
        /// The file should be compacted when it is next written.
        const COMPACT = 1 << 6;
        /// The map has been modified in memory.
        const CHANGED = 1 << 5;

        // Undefined bits are retained.
        const _ = !0;
    }
}

/// A four-byte resource type code such as `TEXT` or `ICN#`.
///
/// Type codes are opaque and compared byte-for-byte. For display they are
/// decoded as Mac OS Roman.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResType(pub [u8; 4]);

impl ResType {
    /// Creates a type code from its raw bytes.
    pub const fn new(bytes: [u8; 4]) -> Self {
        ResType(bytes)
    }

    /// Returns the raw bytes of the type code.
    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl From<[u8; 4]> for ResType {
    fn from(bytes: [u8; 4]) -> Self {
        ResType(bytes)
    }
}

impl From<&[u8; 4]> for ResType {
    fn from(bytes: &[u8; 4]) -> Self {
        ResType(*bytes)
    }
}

impl PartialEq<[u8; 4]> for ResType {
    fn eq(&self, other: &[u8; 4]) -> bool {
        &self.0 == other
    }
}

impl fmt::Display for ResType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&text::decode(&self.0))
    }
}

impl fmt::Debug for ResType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResType({:?})", text::decode(&self.0))
    }
}

/// Error returned when a string is not a valid four-character type code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid resource type {input:?}: {reason}")]
pub struct ParseResTypeError {
    input: String,
    reason: &'static str,
}

impl FromStr for ResType {
    type Err = ParseResTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason| ParseResTypeError {
            input: s.to_string(),
            reason,
        };
        let bytes = text::encode(s).ok_or_else(|| err("not representable in Mac OS Roman"))?;
        let bytes: [u8; 4] = bytes
            .try_into()
            .map_err(|_| err("type codes are exactly 4 characters"))?;
        Ok(ResType(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_reference_field() {
        let (attrs, offset) = unpack_attributes_and_offset(0x21_00_01_2C);
        assert_eq!(attrs, 0x21);
        assert_eq!(offset, 0x012C);
        assert_eq!(
            ResourceAttrs::from_bits_retain(attrs),
            ResourceAttrs::PURGEABLE | ResourceAttrs::COMPRESSED
        );
    }

    #[test]
    fn test_count_from_m1_wraps() {
        assert_eq!(count_from_m1(0), 1);
        assert_eq!(count_from_m1(0xFFFE), 0xFFFF);
        assert_eq!(count_from_m1(0xFFFF), 0);
    }

    #[test]
    fn test_header_layout_sums() {
        assert_eq!(
            HEADER_FIELDS_SIZE + SYSTEM_DATA_SIZE + APPLICATION_DATA_SIZE,
            HEADER_SIZE as usize
        );
    }

    #[test]
    fn test_file_attrs_keep_unknown_bits() {
        let attrs = ResourceFileAttrs::from_bits_retain(0x8001);
        assert!(attrs.contains(ResourceFileAttrs::RESOURCES_LOCKED));
        assert_eq!(attrs.bits(), 0x8001);
    }

    #[test]
    fn test_res_type_parse_and_display() {
        let ty: ResType = "ICN#".parse().unwrap();
        assert_eq!(ty, *b"ICN#");
        assert_eq!(ty.to_string(), "ICN#");

        let ty: ResType = "STR ".parse().unwrap();
        assert_eq!(ty.as_bytes(), b"STR ");

        assert!("TOOLONG".parse::<ResType>().is_err());
        assert!("\u{4E2D}ABC".parse::<ResType>().is_err());
    }

    #[test]
    fn test_res_type_mac_roman_display() {
        let ty = ResType::new([b'c', b'u', b'r', 0xA9]);
        assert_eq!(ty.to_string(), "cur\u{00A9}");
    }
}
