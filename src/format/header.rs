//! Resource file header structure and parsing.

use crate::{Error, Result};
use std::io::{self, Read};

use super::reader::{read_array, read_u32_be};
use super::{
    APPLICATION_DATA_SIZE, HEADER_FIELDS_SIZE, HEADER_SIZE, MAP_HEADER_SIZE, SYSTEM_DATA_SIZE,
};

/// Smallest map that can hold the map header and an empty type list.
pub const MIN_MAP_LENGTH: u32 = (MAP_HEADER_SIZE + super::TYPE_LIST_HEADER_SIZE) as u32;

/// The fixed-size header at the start of every resource file.
#[derive(Clone, PartialEq, Eq)]
pub struct ResourceHeader {
    /// Offset from the start of the file to the data section.
    pub data_offset: u32,
    /// Offset from the start of the file to the resource map.
    pub map_offset: u32,
    /// Length of the data section in bytes.
    pub data_length: u32,
    /// Length of the resource map in bytes.
    pub map_length: u32,
    /// Bytes reserved for system use.
    pub system_data: [u8; SYSTEM_DATA_SIZE],
    /// Bytes available for application use.
    pub application_data: [u8; APPLICATION_DATA_SIZE],
}

impl std::fmt::Debug for ResourceHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceHeader")
            .field("data_offset", &self.data_offset)
            .field("map_offset", &self.map_offset)
            .field("data_length", &self.data_length)
            .field("map_length", &self.map_length)
            .finish_non_exhaustive()
    }
}

impl ResourceHeader {
    /// Parses the header from a reader positioned at the start of the file.
    ///
    /// Only the layout is decoded here; use [`validate`](Self::validate) to
    /// check the declared sections for consistency.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedHeader`] if fewer than 256 bytes are available.
    pub fn parse<R: Read>(r: &mut R) -> Result<Self> {
        Self::parse_inner(r).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => Error::malformed_header(format!(
                "source is shorter than the {HEADER_SIZE}-byte header"
            )),
            _ => Error::from(e),
        })
    }

    fn parse_inner<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(Self {
            data_offset: read_u32_be(r)?,
            map_offset: read_u32_be(r)?,
            data_length: read_u32_be(r)?,
            map_length: read_u32_be(r)?,
            system_data: read_array(r)?,
            application_data: read_array(r)?,
        })
    }

    /// Returns the four offset/length fields as they appear on disk.
    ///
    /// The resource map starts with a copy of these bytes.
    pub fn field_bytes(&self) -> [u8; HEADER_FIELDS_SIZE] {
        let mut out = [0u8; HEADER_FIELDS_SIZE];
        out[0..4].copy_from_slice(&self.data_offset.to_be_bytes());
        out[4..8].copy_from_slice(&self.map_offset.to_be_bytes());
        out[8..12].copy_from_slice(&self.data_length.to_be_bytes());
        out[12..16].copy_from_slice(&self.map_length.to_be_bytes());
        out
    }

    /// End of the data section, as an absolute offset.
    pub fn data_end(&self) -> u64 {
        u64::from(self.data_offset) + u64::from(self.data_length)
    }

    /// End of the resource map, as an absolute offset.
    pub fn map_end(&self) -> u64 {
        u64::from(self.map_offset) + u64::from(self.map_length)
    }

    /// Checks the declared sections for internal consistency.
    ///
    /// `total_len` is the length of the source when known; sections must then
    /// lie entirely within it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedHeader`] if:
    /// - A section starts inside the header block
    /// - A section's end overflows 32-bit addressing
    /// - The map is too short to hold its own header
    /// - The two sections overlap
    /// - A section extends past `total_len`
    pub fn validate(&self, total_len: Option<u64>) -> Result<()> {
        if u64::from(self.data_offset) < HEADER_SIZE {
            return Err(Error::malformed_header(format!(
                "data section offset {:#x} lies inside the header",
                self.data_offset
            )));
        }
        if u64::from(self.map_offset) < HEADER_SIZE {
            return Err(Error::malformed_header(format!(
                "map offset {:#x} lies inside the header",
                self.map_offset
            )));
        }
        if self.data_offset.checked_add(self.data_length).is_none() {
            return Err(Error::malformed_header(format!(
                "data section {:#x}+{:#x} overflows",
                self.data_offset, self.data_length
            )));
        }
        if self.map_offset.checked_add(self.map_length).is_none() {
            return Err(Error::malformed_header(format!(
                "map {:#x}+{:#x} overflows",
                self.map_offset, self.map_length
            )));
        }
        if self.map_length < MIN_MAP_LENGTH {
            return Err(Error::malformed_header(format!(
                "map length {} is smaller than the minimum of {MIN_MAP_LENGTH}",
                self.map_length
            )));
        }
        if self.data_length > 0
            && u64::from(self.data_offset) < self.map_end()
            && u64::from(self.map_offset) < self.data_end()
        {
            return Err(Error::malformed_header(format!(
                "data section {:#x}..{:#x} overlaps map {:#x}..{:#x}",
                self.data_offset,
                self.data_end(),
                self.map_offset,
                self.map_end()
            )));
        }
        if let Some(total) = total_len {
            if self.data_end() > total {
                return Err(Error::malformed_header(format!(
                    "data section ends at {:#x}, past the end of the source ({total:#x})",
                    self.data_end()
                )));
            }
            if self.map_end() > total {
                return Err(Error::malformed_header(format!(
                    "map ends at {:#x}, past the end of the source ({total:#x})",
                    self.map_end()
                )));
            }
        }
        Ok(())
    }

    /// Checks the reserved header copy found at the start of the map.
    ///
    /// Files written by the system leave the copy zeroed; other tools fill it
    /// in. Anything else means the map does not belong to this header.
    pub fn check_map_copy(&self, copy: &[u8]) -> Result<()> {
        if copy.iter().all(|&b| b == 0) || copy == self.field_bytes() {
            Ok(())
        } else {
            Err(Error::malformed_header(
                "header copy at the start of the map disagrees with the file header",
            ))
        }
    }
}
