//! Lazily loaded resources.

use std::fmt;
use std::io::Cursor;
use std::sync::OnceLock;

use crate::codec::{self, CompressedHeader, header::HEADER_SIZE};
use crate::format::map::Reference;
use crate::format::{DATA_LENGTH_PREFIX_SIZE, ResType, ResourceAttrs};
use crate::source::ByteSource;
use crate::text;
use crate::{Error, ResourceRef, Result};

use super::ResourceFile;

/// Largest piece of resource data read in one go.
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Index entry of one resource together with its lazily computed fields.
///
/// Each field is computed at most once; failures are cached as well, so
/// every caller observes the same outcome.
pub(crate) struct ResourceEntry {
    pub(crate) reference: Reference,
    name: OnceLock<Result<Option<String>>>,
    raw_length: OnceLock<Result<u32>>,
    raw: OnceLock<Result<Vec<u8>>>,
    header: OnceLock<Result<Option<CompressedHeader>>>,
    // `None` when the data is the raw data.
    data: OnceLock<Result<Option<Vec<u8>>>>,
}

impl ResourceEntry {
    pub(crate) fn new(reference: Reference) -> Self {
        Self {
            reference,
            name: OnceLock::new(),
            raw_length: OnceLock::new(),
            raw: OnceLock::new(),
            header: OnceLock::new(),
            data: OnceLock::new(),
        }
    }
}

fn cached<T>(cell: &OnceLock<Result<T>>, init: impl FnOnce() -> Result<T>) -> Result<&T> {
    cell.get_or_init(init).as_ref().map_err(Clone::clone)
}

/// A handle to one resource of a [`ResourceFile`].
///
/// Handles are cheap to copy. All handles to the same resource share one set
/// of cached fields, so data read through one handle is returned by
/// reference from every other.
pub struct Resource<'a, S> {
    file: &'a ResourceFile<S>,
    res_type: ResType,
    entry: &'a ResourceEntry,
}

impl<S> Clone for Resource<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for Resource<'_, S> {}

impl<'a, S> Resource<'a, S> {
    pub(crate) fn new(
        file: &'a ResourceFile<S>,
        res_type: ResType,
        entry: &'a ResourceEntry,
    ) -> Self {
        Self {
            file,
            res_type,
            entry,
        }
    }

    /// Type code of this resource.
    pub fn res_type(&self) -> ResType {
        self.res_type
    }

    /// Resource ID.
    pub fn id(&self) -> i16 {
        self.entry.reference.id
    }

    /// Type and ID of this resource.
    pub fn resource_ref(&self) -> ResourceRef {
        ResourceRef::new(self.res_type, self.id())
    }

    /// Attribute flags.
    pub fn attributes(&self) -> ResourceAttrs {
        self.entry.reference.attributes
    }

    /// Returns `true` if the attributes mark the resource as compressed.
    ///
    /// The data may still turn out to be uncompressed; see
    /// [`compressed_header`](Self::compressed_header).
    pub fn is_compressed(&self) -> bool {
        self.attributes().contains(ResourceAttrs::COMPRESSED)
    }

    /// Offset of the name within the name list, if the resource is named.
    pub fn name_offset(&self) -> Option<u16> {
        self.entry.reference.name_offset
    }

    /// Offset of the length-prefixed data block within the data section.
    pub fn data_offset(&self) -> u32 {
        self.entry.reference.data_offset
    }

    /// The file this resource belongs to.
    pub fn file(&self) -> &'a ResourceFile<S> {
        self.file
    }
}

impl<'a, S: ByteSource> Resource<'a, S> {
    /// Raw bytes of the resource name, or `None` if the resource is unnamed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedMap`] if the name lies outside the map.
    pub fn name_bytes(&self) -> Result<Option<&'a [u8]>> {
        let names = self.file.names();
        self.name_offset()
            .map(|offset| names.name_bytes(offset))
            .transpose()
    }

    /// The resource name decoded from Mac OS Roman, or `None` if unnamed.
    pub fn name(&self) -> Result<Option<&'a str>> {
        let name = cached(&self.entry.name, || {
            Ok(self.name_bytes()?.map(text::decode))
        })?;
        Ok(name.as_deref())
    }

    /// Length of the raw data, read from the data block's length prefix.
    ///
    /// # Errors
    ///
    /// - [`Error::OffsetOutOfRange`] if the length prefix lies outside the data section
    /// - [`Error::LengthMismatch`] if the declared length overruns the data section
    /// - [`Error::TruncatedData`] if the source ends early
    pub fn raw_length(&self) -> Result<u32> {
        cached(&self.entry.raw_length, || self.read_raw_length()).copied()
    }

    /// The raw data as stored in the file, without decompression.
    pub fn raw_data(&self) -> Result<&'a [u8]> {
        cached(&self.entry.raw, || self.read_raw_data()).map(Vec::as_slice)
    }

    /// The compressed header of the resource, if it is compressed.
    ///
    /// Returns `None` if the compressed attribute is clear, or if it is set
    /// but the data does not start with the compressed resource signature.
    ///
    /// When the source is seekable, only the header is read.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedCompressionHeader`] if the header is damaged,
    /// or any error from reading the raw data.
    pub fn compressed_header(&self) -> Result<Option<&'a CompressedHeader>> {
        let header = cached(&self.entry.header, || self.read_compressed_header())?;
        Ok(header.as_ref())
    }

    /// Length of the resource data after decompression.
    ///
    /// Taken from the compressed header when there is one, so the data does
    /// not have to be decompressed.
    pub fn length(&self) -> Result<u32> {
        match self.compressed_header()? {
            Some(header) => Ok(header.decompressed_length),
            None => self.raw_length(),
        }
    }

    /// The resource data, decompressed if necessary.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedCodec`] if the data uses an unknown codec; the
    ///   raw data remains available through [`raw_data`](Self::raw_data)
    /// - [`Error::Decompress`] if the compressed data is invalid
    /// - [`Error::ResourceLimitExceeded`] if the declared length exceeds
    ///   [`ResourceLimits::max_decompressed_bytes`](super::ResourceLimits::max_decompressed_bytes)
    pub fn data(&self) -> Result<&'a [u8]> {
        match cached(&self.entry.data, || self.decompress())? {
            Some(data) => Ok(data.as_slice()),
            None => self.raw_data(),
        }
    }

    /// A reader over the resource data.
    pub fn reader(&self) -> Result<Cursor<&'a [u8]>> {
        self.data().map(Cursor::new)
    }

    /// A reader over the raw resource data.
    pub fn raw_reader(&self) -> Result<Cursor<&'a [u8]>> {
        self.raw_data().map(Cursor::new)
    }

    /// Absolute offset of the length prefix within the source.
    fn block_offset(&self) -> u64 {
        u64::from(self.file.header().data_offset) + u64::from(self.data_offset())
    }

    fn read_raw_length(&self) -> Result<u32> {
        let resource = self.resource_ref();
        let offset = u64::from(self.data_offset());
        let limit = u64::from(self.file.header().data_length);
        if offset + DATA_LENGTH_PREFIX_SIZE > limit {
            return Err(Error::OffsetOutOfRange {
                resource,
                offset,
                limit,
            });
        }

        let mut prefix = [0u8; 4];
        self.file
            .read_at(self.block_offset(), &mut prefix)
            .map_err(|e| e.with_resource(resource))?;
        let length = u32::from_be_bytes(prefix);

        let available = limit - offset - DATA_LENGTH_PREFIX_SIZE;
        if u64::from(length) > available {
            return Err(Error::LengthMismatch {
                resource,
                offset,
                declared: u64::from(length),
                available,
            });
        }
        Ok(length)
    }

    fn read_raw_data(&self) -> Result<Vec<u8>> {
        let length = self.raw_length()?;
        log::debug!("reading {} bytes of resource {}", length, self.resource_ref());
        let start = self.block_offset() + DATA_LENGTH_PREFIX_SIZE;
        let length = length as usize;

        // The buffer grows chunk by chunk, so a bogus length prefix on a
        // source of unknown size fails at the real end of input.
        let mut data = Vec::with_capacity(length.min(READ_CHUNK_SIZE));
        while data.len() < length {
            let filled = data.len();
            data.resize(filled + (length - filled).min(READ_CHUNK_SIZE), 0);
            self.file
                .read_at(start + filled as u64, &mut data[filled..])
                .map_err(|e| match e {
                    Error::TruncatedData { .. } => Error::TruncatedData {
                        resource: Some(self.resource_ref()),
                        offset: start,
                        expected: length as u64,
                    },
                    e => e.with_resource(self.resource_ref()),
                })?;
        }
        Ok(data)
    }

    fn read_compressed_header(&self) -> Result<Option<CompressedHeader>> {
        if !self.is_compressed() {
            return Ok(None);
        }

        let parsed = match self.entry.raw.get() {
            Some(raw) => CompressedHeader::parse(raw.as_ref().map_err(Clone::clone)?),
            None if self.file.is_seekable() => {
                let length = self.raw_length()? as usize;
                let mut head = vec![0u8; length.min(HEADER_SIZE)];
                self.file
                    .read_at(self.block_offset() + DATA_LENGTH_PREFIX_SIZE, &mut head)
                    .map_err(|e| e.with_resource(self.resource_ref()))?;
                CompressedHeader::parse(&head)
            }
            None => CompressedHeader::parse(self.raw_data()?),
        };

        match parsed {
            Ok(header) => Ok(Some(header)),
            Err(Error::NotActuallyCompressed) => {
                log::warn!(
                    "resource {} is marked compressed but has no compressed header, treating it as uncompressed",
                    self.resource_ref()
                );
                Ok(None)
            }
            Err(e) => Err(e.with_resource(self.resource_ref())),
        }
    }

    fn decompress(&self) -> Result<Option<Vec<u8>>> {
        let Some(header) = self.compressed_header()? else {
            return Ok(None);
        };
        let raw = self.raw_data()?;
        let max = self.file.options().limits.max_decompressed_bytes;
        codec::decompress_body(header, &raw[HEADER_SIZE..], max)
            .map(Some)
            .map_err(|e| e.with_resource(self.resource_ref()))
    }
}

impl<S> fmt::Debug for Resource<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("res_type", &self.res_type)
            .field("id", &self.id())
            .field("name_offset", &self.name_offset())
            .field("attributes", &self.attributes())
            .field("data_offset", &self.data_offset())
            .finish()
    }
}
