//! Shared test utilities for integration tests.
//!
//! Resource files are assembled in memory by [`ResourceFileBuilder`], and
//! compressed resource payloads by the `compress_*` helpers.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test file
//! compiles as a separate crate and may only use a subset of these helpers.

#![allow(dead_code)]

use std::io::{self, Cursor, Read};

use resfork::{OpenOptions, ResourceFile, SeekableSource};

/// The compressed resource signature.
pub const SIGNATURE: [u8; 4] = [0xA8, 0x9F, 0x65, 0x72];

/// A resource to be written by [`ResourceFileBuilder`].
#[derive(Debug, Clone)]
struct Entry {
    res_type: [u8; 4],
    id: i16,
    name: Option<Vec<u8>>,
    attributes: u8,
    data: Vec<u8>,
}

/// Where the data section is placed relative to the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Header, data section, map. What the system writes.
    DataFirst,
    /// Header, map, data section.
    MapFirst,
}

/// Builds resource files in memory.
///
/// # Example
///
/// ```ignore
/// let bytes = ResourceFileBuilder::new()
///     .resource(b"TEXT", 256, b"Here is some text")
///     .name(b"Greeting")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ResourceFileBuilder {
    entries: Vec<Entry>,
    file_attributes: u16,
    layout: Layout,
    fill_header_copy: bool,
}

impl Default for ResourceFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceFileBuilder {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            file_attributes: 0,
            layout: Layout::DataFirst,
            fill_header_copy: false,
        }
    }

    /// Adds a resource. Types are listed in order of first appearance.
    pub fn resource(mut self, res_type: &[u8; 4], id: i16, data: &[u8]) -> Self {
        self.entries.push(Entry {
            res_type: *res_type,
            id,
            name: None,
            attributes: 0,
            data: data.to_vec(),
        });
        self
    }

    /// Names the most recently added resource.
    pub fn name(mut self, name: &[u8]) -> Self {
        if let Some(last) = self.entries.last_mut() {
            last.name = Some(name.to_vec());
        }
        self
    }

    /// Sets the attribute byte of the most recently added resource.
    pub fn attributes(mut self, attributes: u8) -> Self {
        if let Some(last) = self.entries.last_mut() {
            last.attributes = attributes;
        }
        self
    }

    /// Adds a resource with the compressed attribute set.
    pub fn compressed(self, res_type: &[u8; 4], id: i16, data: &[u8]) -> Self {
        self.resource(res_type, id, data).attributes(0x01)
    }

    pub fn file_attributes(mut self, attributes: u16) -> Self {
        self.file_attributes = attributes;
        self
    }

    pub fn layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    /// Fills the reserved header copy at the start of the map instead of
    /// leaving it zeroed.
    pub fn fill_header_copy(mut self) -> Self {
        self.fill_header_copy = true;
        self
    }

    /// Serializes the data section. Returns the section and the offset of
    /// each entry's data block within it.
    fn data_section(&self) -> (Vec<u8>, Vec<u32>) {
        let mut data = Vec::new();
        let mut offsets = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            offsets.push(data.len() as u32);
            data.extend_from_slice(&(entry.data.len() as u32).to_be_bytes());
            data.extend_from_slice(&entry.data);
        }
        (data, offsets)
    }

    /// Serializes the map, with the header copy left zeroed.
    fn map(&self, data_offsets: &[u32]) -> Vec<u8> {
        let mut types: Vec<[u8; 4]> = Vec::new();
        for entry in &self.entries {
            if !types.contains(&entry.res_type) {
                types.push(entry.res_type);
            }
        }

        let type_list_len = 2 + 8 * types.len();
        let mut type_list = Vec::with_capacity(type_list_len);
        type_list.extend_from_slice(&(types.len() as u16).wrapping_sub(1).to_be_bytes());
        let mut references = Vec::new();
        let mut names = Vec::new();

        for res_type in &types {
            let members: Vec<usize> = (0..self.entries.len())
                .filter(|&i| self.entries[i].res_type == *res_type)
                .collect();
            let ref_list_offset = (type_list_len + references.len()) as u16;
            type_list.extend_from_slice(res_type);
            type_list.extend_from_slice(&(members.len() as u16 - 1).to_be_bytes());
            type_list.extend_from_slice(&ref_list_offset.to_be_bytes());

            for i in members {
                let entry = &self.entries[i];
                references.extend_from_slice(&entry.id.to_be_bytes());
                match &entry.name {
                    Some(name) => {
                        references.extend_from_slice(&(names.len() as u16).to_be_bytes());
                        names.push(name.len() as u8);
                        names.extend_from_slice(name);
                    }
                    None => references.extend_from_slice(&0xFFFFu16.to_be_bytes()),
                }
                let packed = (u32::from(entry.attributes) << 24) | data_offsets[i];
                references.extend_from_slice(&packed.to_be_bytes());
                references.extend_from_slice(&[0; 4]);
            }
        }

        let type_list_offset = 28u16;
        let name_list_offset = type_list_offset as usize + type_list.len() + references.len();

        let mut map = vec![0u8; 22];
        map.extend_from_slice(&self.file_attributes.to_be_bytes());
        map.extend_from_slice(&type_list_offset.to_be_bytes());
        map.extend_from_slice(&(name_list_offset as u16).to_be_bytes());
        map.extend_from_slice(&type_list);
        map.extend_from_slice(&references);
        map.extend_from_slice(&names);
        map
    }

    /// Assembles the complete file.
    pub fn build(&self) -> Vec<u8> {
        let (data, data_offsets) = self.data_section();
        let mut map = self.map(&data_offsets);

        let (data_offset, map_offset) = match self.layout {
            Layout::DataFirst => (256u32, 256 + data.len() as u32),
            Layout::MapFirst => (256 + map.len() as u32, 256u32),
        };
        let mut fields = Vec::with_capacity(16);
        fields.extend_from_slice(&data_offset.to_be_bytes());
        fields.extend_from_slice(&map_offset.to_be_bytes());
        fields.extend_from_slice(&(data.len() as u32).to_be_bytes());
        fields.extend_from_slice(&(map.len() as u32).to_be_bytes());
        if self.fill_header_copy {
            map[..16].copy_from_slice(&fields);
        }

        let mut file = fields;
        file.resize(256, 0);
        match self.layout {
            Layout::DataFirst => {
                file.extend_from_slice(&data);
                file.extend_from_slice(&map);
            }
            Layout::MapFirst => {
                file.extend_from_slice(&map);
                file.extend_from_slice(&data);
            }
        }
        file
    }
}

/// The canonical single-resource file: `TEXT` 256, unnamed.
pub fn text_file() -> Vec<u8> {
    ResourceFileBuilder::new()
        .resource(b"TEXT", 256, b"Here is some text")
        .build()
}

/// A file with several types, names and attributes.
pub fn sample_file() -> Vec<u8> {
    ResourceFileBuilder::new()
        .resource(b"TEXT", 128, b"first")
        .name(b"Read Me")
        .resource(b"TEXT", 129, b"second")
        .attributes(0x20)
        .resource(b"ICN#", -16455, &[0xAA; 256])
        .name(b"Caf\x8e")
        .resource(b"STR ", 0, b"")
        .file_attributes(0x0080)
        .build()
}

/// Opens an in-memory resource file.
pub fn open_bytes(
    bytes: Vec<u8>,
) -> resfork::Result<ResourceFile<SeekableSource<Cursor<Vec<u8>>>>> {
    ResourceFile::open(Cursor::new(bytes))
}

/// Opens an in-memory resource file with custom options.
pub fn open_bytes_with(
    bytes: Vec<u8>,
    options: OpenOptions,
) -> resfork::Result<ResourceFile<SeekableSource<Cursor<Vec<u8>>>>> {
    ResourceFile::open_with(Cursor::new(bytes), options)
}

/// Type 8 compressed header.
pub fn header_type8(codec_id: i16, decompressed_length: u32) -> Vec<u8> {
    let mut header = SIGNATURE.to_vec();
    header.extend_from_slice(&0x0012u16.to_be_bytes());
    header.extend_from_slice(&0x0801u16.to_be_bytes());
    header.extend_from_slice(&decompressed_length.to_be_bytes());
    header.extend_from_slice(&[0x80, 0x00]);
    header.extend_from_slice(&codec_id.to_be_bytes());
    header.extend_from_slice(&[0x00, 0x00]);
    header
}

/// Type 9 compressed header.
pub fn header_type9(codec_id: i16, decompressed_length: u32, parameters: [u8; 4]) -> Vec<u8> {
    let mut header = SIGNATURE.to_vec();
    header.extend_from_slice(&0x0012u16.to_be_bytes());
    header.extend_from_slice(&0x0901u16.to_be_bytes());
    header.extend_from_slice(&decompressed_length.to_be_bytes());
    header.extend_from_slice(&codec_id.to_be_bytes());
    header.extend_from_slice(&parameters);
    header
}

/// Encodes `payload` with codec 1, using only unstored literals.
pub fn compress_dcmp1(payload: &[u8]) -> Vec<u8> {
    let mut out = header_type8(1, payload.len() as u32);
    for chunk in payload.chunks(255) {
        out.push(0xD0);
        out.push(chunk.len() as u8);
        out.extend_from_slice(chunk);
    }
    out.push(0xFF);
    out
}

/// Encodes `payload` with codec 2 in tagged mode, using only literals.
pub fn compress_dcmp2(payload: &[u8]) -> Vec<u8> {
    let mut out = header_type9(2, payload.len() as u32, [0x00, 0x00, 0x00, 0x02]);
    for group in payload.chunks(16) {
        out.push(0x00);
        out.extend_from_slice(group);
    }
    out
}

/// Encodes `payload` with codec 0, using only unstored literals. The
/// payload length must be even.
pub fn compress_dcmp0(payload: &[u8]) -> Vec<u8> {
    assert!(payload.len() % 2 == 0, "codec 0 literals are whole words");
    let mut out = header_type8(0, payload.len() as u32);
    for chunk in payload.chunks(2 * 255) {
        out.push(0x00);
        out.push((chunk.len() / 2) as u8);
        out.extend_from_slice(chunk);
    }
    out.push(0xFF);
    out
}

/// A reader that only implements `Read`, like a pipe.
pub struct Pipe<R>(pub R);

impl<R: Read> Read for Pipe<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

/// Wraps bytes in a forward-only reader.
pub fn pipe(bytes: Vec<u8>) -> Pipe<Cursor<Vec<u8>>> {
    Pipe(Cursor::new(bytes))
}
