//! Resource map parsing.
//!
//! The map section holds a fixed header, the type list, one reference list
//! per type, and a shared name list. All offsets stored in the map are
//! relative to the start of the map (type and name lists) or to the start of
//! the type list (reference lists).

use std::collections::HashSet;

use crate::{Error, Result};

use super::header::ResourceHeader;
use super::reader::{u16_at, u32_at};
use super::{
    HEADER_FIELDS_SIZE, MAP_FILE_ATTRIBUTES_OFFSET, MAP_HEADER_SIZE, NO_NAME, REFERENCE_ENTRY_SIZE,
    ResType, ResourceAttrs, ResourceFileAttrs, TYPE_ENTRY_SIZE, TYPE_LIST_HEADER_SIZE,
    count_from_m1, unpack_attributes_and_offset,
};

/// One entry of a type's reference list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    /// Resource ID.
    pub id: i16,
    /// Offset of the name within the name list, or `None` if unnamed.
    pub name_offset: Option<u16>,
    /// Attribute flags.
    pub attributes: ResourceAttrs,
    /// Offset of the length-prefixed data block within the data section.
    pub data_offset: u32,
}

/// One entry of the type list with its parsed reference list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeEntry {
    /// The type code.
    pub res_type: ResType,
    /// Offset of the reference list, relative to the type list.
    pub reference_list_offset: u16,
    /// References in file order.
    pub references: Vec<Reference>,
}

/// A parsed resource map.
///
/// The raw map bytes are kept so that names can be resolved lazily.
#[derive(Debug, Clone)]
pub struct ResourceMap {
    bytes: Vec<u8>,
    file_attributes: ResourceFileAttrs,
    type_list_offset: u16,
    name_list_offset: u16,
    types: Vec<TypeEntry>,
}

impl ResourceMap {
    /// Parses a map from its raw bytes.
    ///
    /// `bytes` must hold exactly the map section declared by `header`.
    /// At most `max_resources` references are accepted.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedHeader`] if the reserved header copy disagrees with `header`
    /// - [`Error::MalformedMap`] if a list is truncated or an ID repeats within a type
    /// - [`Error::ResourceLimitExceeded`] if there are more than `max_resources` references
    pub fn parse(bytes: Vec<u8>, header: &ResourceHeader, max_resources: usize) -> Result<Self> {
        if bytes.len() < MAP_HEADER_SIZE {
            return Err(Error::malformed_map(
                0,
                format!(
                    "map is {} bytes, shorter than its {MAP_HEADER_SIZE}-byte header",
                    bytes.len()
                ),
            ));
        }
        header.check_map_copy(&bytes[..HEADER_FIELDS_SIZE])?;

        let field = |offset: usize| u16_at(&bytes, offset).unwrap_or(0);
        let file_attributes =
            ResourceFileAttrs::from_bits_retain(field(MAP_FILE_ATTRIBUTES_OFFSET));
        let type_list_offset = field(MAP_FILE_ATTRIBUTES_OFFSET + 2);
        let name_list_offset = field(MAP_FILE_ATTRIBUTES_OFFSET + 4);

        let tl = usize::from(type_list_offset);
        let type_count_m1 = u16_at(&bytes, tl).ok_or_else(|| {
            Error::malformed_map(tl as u64, "type list header extends past the end of the map")
        })?;
        let type_count = count_from_m1(type_count_m1);

        let mut types: Vec<TypeEntry> = Vec::with_capacity(type_count);
        let mut seen_types = HashSet::with_capacity(type_count);
        let mut total = 0usize;

        for index in 0..type_count {
            let at = tl + TYPE_LIST_HEADER_SIZE + index * TYPE_ENTRY_SIZE;
            let entry = bytes.get(at..at + TYPE_ENTRY_SIZE).ok_or_else(|| {
                Error::malformed_map(
                    at as u64,
                    format!(
                        "type list entry {index} of {type_count} extends past the end of the map"
                    ),
                )
            })?;
            let res_type = ResType([entry[0], entry[1], entry[2], entry[3]]);
            let count = count_from_m1(u16::from_be_bytes([entry[4], entry[5]]));
            let reference_list_offset = u16::from_be_bytes([entry[6], entry[7]]);

            if !seen_types.insert(res_type) {
                return Err(Error::malformed_map(
                    at as u64,
                    format!("type '{res_type}' is listed more than once"),
                ));
            }

            total += count;
            if total > max_resources {
                return Err(Error::ResourceLimitExceeded(format!(
                    "map declares more than {max_resources} resources"
                )));
            }

            let references = parse_references(
                &bytes,
                tl + usize::from(reference_list_offset),
                count,
                res_type,
            )?;
            types.push(TypeEntry {
                res_type,
                reference_list_offset,
                references,
            });
        }

        log::debug!(
            "parsed resource map: {} bytes, {} types, {} resources, attributes {:#06x}",
            bytes.len(),
            types.len(),
            total,
            file_attributes.bits()
        );

        Ok(Self {
            bytes,
            file_attributes,
            type_list_offset,
            name_list_offset,
            types,
        })
    }

    /// Resource-file-wide attribute flags.
    pub fn file_attributes(&self) -> ResourceFileAttrs {
        self.file_attributes
    }

    /// Offset of the type list from the start of the map.
    pub fn type_list_offset(&self) -> u16 {
        self.type_list_offset
    }

    /// Offset of the name list from the start of the map.
    pub fn name_list_offset(&self) -> u16 {
        self.name_list_offset
    }

    /// Types in file order.
    pub fn types(&self) -> &[TypeEntry] {
        &self.types
    }

    /// Consumes the map, returning its type entries.
    pub(crate) fn into_types(self) -> (Vec<TypeEntry>, MapNames) {
        let names = MapNames {
            bytes: self.bytes,
            name_list_offset: self.name_list_offset,
        };
        (self.types, names)
    }

    /// Returns the raw name bytes stored at `name_offset` within the name list.
    pub fn name_bytes(&self, name_offset: u16) -> Result<&[u8]> {
        pascal_string_at(&self.bytes, self.name_list_offset, name_offset)
    }

    /// Checks that the map's lists fit together the way a real map's do.
    ///
    /// Every name offset must resolve to a complete name, and the furthest
    /// byte used by the type list, the reference lists and the referenced
    /// names must be exactly the last byte of the map.
    pub fn check_layout(&self) -> Result<()> {
        let tl = usize::from(self.type_list_offset);
        let names_start = usize::from(self.name_list_offset);
        let mut computed = tl + TYPE_LIST_HEADER_SIZE + self.types.len() * TYPE_ENTRY_SIZE;
        for entry in &self.types {
            let start = tl + usize::from(entry.reference_list_offset);
            computed = computed.max(start + entry.references.len() * REFERENCE_ENTRY_SIZE);
            for reference in &entry.references {
                if let Some(offset) = reference.name_offset {
                    let name = self.name_bytes(offset)?;
                    let name_end = names_start + usize::from(offset) + 1 + name.len();
                    computed = computed.max(name_end);
                }
            }
        }

        if computed != self.bytes.len() {
            return Err(Error::malformed_map(
                computed as u64,
                format!(
                    "computed map length {computed} does not match the declared length {}",
                    self.bytes.len()
                ),
            ));
        }
        Ok(())
    }
}

/// Name list storage kept alive after the map has been split into an index.
#[derive(Debug, Clone)]
pub(crate) struct MapNames {
    bytes: Vec<u8>,
    name_list_offset: u16,
}

impl MapNames {
    pub(crate) fn name_bytes(&self, name_offset: u16) -> Result<&[u8]> {
        pascal_string_at(&self.bytes, self.name_list_offset, name_offset)
    }
}

fn parse_references(
    bytes: &[u8],
    start: usize,
    count: usize,
    res_type: ResType,
) -> Result<Vec<Reference>> {
    let mut references = Vec::with_capacity(count);
    let mut seen_ids = HashSet::with_capacity(count);
    for index in 0..count {
        let at = start + index * REFERENCE_ENTRY_SIZE;
        if at + REFERENCE_ENTRY_SIZE > bytes.len() {
            return Err(Error::malformed_map(
                at as u64,
                format!(
                    "reference {index} of {count} for type '{res_type}' extends past the end of the map"
                ),
            ));
        }
        let id = u16_at(bytes, at).map(|v| v as i16).unwrap_or_default();
        let name_offset = u16_at(bytes, at + 2).unwrap_or(NO_NAME);
        let packed = u32_at(bytes, at + 4).unwrap_or_default();
        let (attributes, data_offset) = unpack_attributes_and_offset(packed);

        if !seen_ids.insert(id) {
            return Err(Error::malformed_map(
                at as u64,
                format!("resource ID {id} appears more than once for type '{res_type}'"),
            ));
        }

        references.push(Reference {
            id,
            name_offset: (name_offset != NO_NAME).then_some(name_offset),
            attributes: ResourceAttrs::from_bits_retain(attributes),
            data_offset,
        });
    }
    Ok(references)
}

fn pascal_string_at(bytes: &[u8], name_list_offset: u16, name_offset: u16) -> Result<&[u8]> {
    let at = usize::from(name_list_offset) + usize::from(name_offset);
    let len = *bytes.get(at).ok_or_else(|| {
        Error::malformed_map(
            at as u64,
            format!("name offset {name_offset:#x} lies past the end of the map"),
        )
    })?;
    bytes.get(at + 1..at + 1 + usize::from(len)).ok_or_else(|| {
        Error::malformed_map(
            at as u64,
            format!(
                "name at offset {name_offset:#x} ({len} bytes) extends past the end of the map"
            ),
        )
    })
}
