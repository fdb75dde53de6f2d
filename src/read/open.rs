//! Opening resource files from readers, sources and paths.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::format::header::ResourceHeader;
use crate::format::map::ResourceMap;
use crate::format::{DATA_LENGTH_PREFIX_SIZE, HEADER_SIZE};
use crate::source::{ByteSource, ForwardSource, SeekableSource};
use crate::{Error, ResourceRef, Result};

use super::fork::{Fork, ForkSelector};
use super::resource::ResourceEntry;
use super::{OpenOptions, ResourceFile, TypeIndex};

impl<R: Read + Seek> ResourceFile<SeekableSource<R>> {
    /// Opens a resource file from a seekable reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the header or map is malformed, or if reading fails.
    pub fn open(reader: R) -> Result<Self> {
        Self::open_with(reader, OpenOptions::default())
    }

    /// Opens a resource file from a seekable reader with custom options.
    pub fn open_with(reader: R, options: OpenOptions) -> Result<Self> {
        Self::from_source(SeekableSource::new(reader)?, options)
    }
}

impl<R: Read> ResourceFile<ForwardSource<R>> {
    /// Opens a resource file from a reader that can only be read forward,
    /// such as a pipe.
    ///
    /// A data section that precedes the map is retained in memory while
    /// the map is read, within [`ResourceLimits::max_retained_bytes`]. Data
    /// behind the map has to be read in increasing offset order.
    ///
    /// [`ResourceLimits::max_retained_bytes`]: super::ResourceLimits::max_retained_bytes
    pub fn open_sequential(reader: R) -> Result<Self> {
        Self::open_sequential_with(reader, OpenOptions::default())
    }

    /// Opens a forward-only resource file with custom options.
    pub fn open_sequential_with(reader: R, options: OpenOptions) -> Result<Self> {
        Self::from_source(ForwardSource::new(reader), options)
    }
}

impl ResourceFile<SeekableSource<BufReader<File>>> {
    /// Opens the resource file stored at `path`.
    ///
    /// The resource fork (`<path>/..namedfork/rsrc`) is preferred when it
    /// exists and holds plausible resource data; otherwise the data fork is
    /// read. See [`open_path_with`](Self::open_path_with) to force a fork.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_path_with(path, OpenOptions::default())
    }

    /// Opens the resource file stored at `path` with custom options.
    ///
    /// # Errors
    ///
    /// - [`Error::ForkUnavailable`] if a forced fork does not exist
    /// - [`Error::ForkSelectionFailed`] if no fork holds a plausible resource file
    /// - [`Error::Io`] if a fork cannot be opened
    pub fn open_path_with(path: impl AsRef<Path>, options: OpenOptions) -> Result<Self> {
        let path = path.as_ref();
        let primary = open_fork(&resource_fork_path(path))?;
        let fallback = open_fork(path)?;
        log::debug!(
            "opening {}: resource fork {}, data fork {}",
            path.display(),
            if primary.is_some() { "present" } else { "absent" },
            if fallback.is_some() { "present" } else { "absent" }
        );

        let mut selector = ForkSelector::new().options(options);
        if let Some(primary) = primary {
            selector = selector.primary(primary);
        }
        if let Some(fallback) = fallback {
            selector = selector.fallback(fallback);
        }
        selector.open()
    }
}

/// Path under which macOS exposes the resource fork of `path`.
pub fn resource_fork_path(path: &Path) -> PathBuf {
    path.join("..namedfork").join("rsrc")
}

/// Opens one fork, treating a missing file or fork as absent.
fn open_fork(path: &Path) -> Result<Option<SeekableSource<BufReader<File>>>> {
    match File::open(path) {
        Ok(file) => Ok(Some(SeekableSource::new(BufReader::new(file))?)),
        Err(e) => match e.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => Ok(None),
            _ => Err(e.into()),
        },
    }
}

impl<S: ByteSource> ResourceFile<S> {
    /// Parses a resource file from any byte source.
    ///
    /// Only the header and the map are read here; resource data is read on
    /// demand.
    pub fn from_source(source: S, options: OpenOptions) -> Result<Self> {
        open_source(source, options, false)
    }
}

/// Parses the header and map of `source`.
///
/// With `plausible` set, the file must also pass [`check_plausible`].
pub(crate) fn open_source<S: ByteSource>(
    mut source: S,
    options: OpenOptions,
    plausible: bool,
) -> Result<ResourceFile<S>> {
    let total_len = source.len();

    let mut block = [0u8; HEADER_SIZE as usize];
    source.read_exact_at(0, &mut block).map_err(|e| match e {
        Error::TruncatedData { .. } => Error::malformed_header(format!(
            "source is shorter than the {HEADER_SIZE}-byte header"
        )),
        other => other,
    })?;
    let header = ResourceHeader::parse(&mut &block[..])?;
    header.validate(total_len)?;
    log::debug!("resource file header: {header:?}, source length {total_len:?}");

    if u64::from(header.map_length) > options.limits.max_map_bytes {
        return Err(Error::ResourceLimitExceeded(format!(
            "map length {} exceeds the limit of {} bytes",
            header.map_length, options.limits.max_map_bytes
        )));
    }

    if !source.is_seekable()
        && options.retain_data
        && header.data_length > 0
        && header.data_offset < header.map_offset
    {
        if u64::from(header.data_length) <= options.limits.max_retained_bytes {
            source.retain(u64::from(header.data_offset), header.data_end());
        } else {
            log::warn!(
                "data section of {} bytes exceeds the retention limit of {} bytes; resources before the map will be unreadable",
                header.data_length,
                options.limits.max_retained_bytes
            );
        }
    }

    let mut map_bytes = vec![0u8; header.map_length as usize];
    source
        .read_exact_at(u64::from(header.map_offset), &mut map_bytes)
        .map_err(|e| match e {
            Error::TruncatedData { .. } => Error::malformed_header(format!(
                "map ends at {:#x}, past the end of the source",
                header.map_end()
            )),
            other => other,
        })?;
    let map = ResourceMap::parse(map_bytes, &header, options.limits.max_resources)?;

    if plausible {
        check_plausible(&header, &map)?;
    }

    let file_attributes = map.file_attributes();
    let type_list_offset = map.type_list_offset();
    let name_list_offset = map.name_list_offset();
    let (type_entries, names) = map.into_types();

    let mut types = Vec::with_capacity(type_entries.len());
    let mut type_lookup = HashMap::with_capacity(type_entries.len());
    for entry in type_entries {
        let by_id = entry
            .references
            .iter()
            .enumerate()
            .map(|(position, reference)| (reference.id, position))
            .collect();
        type_lookup.insert(entry.res_type, types.len());
        types.push(TypeIndex {
            res_type: entry.res_type,
            entries: entry.references.into_iter().map(ResourceEntry::new).collect(),
            by_id,
        });
    }

    Ok(ResourceFile {
        seekable: source.is_seekable(),
        source: Mutex::new(source),
        header,
        file_attributes,
        type_list_offset,
        name_list_offset,
        types,
        type_lookup,
        names,
        options,
        fork: None,
    })
}

/// Cheap structural checks that a parsed header and map describe a real
/// resource file rather than garbage that happens to parse.
///
/// Only the header and map are inspected, never the data section.
pub(crate) fn check_plausible(header: &ResourceHeader, map: &ResourceMap) -> Result<()> {
    if u64::from(header.data_offset) != HEADER_SIZE {
        return Err(Error::malformed_header(format!(
            "data section starts at {:#x} instead of right after the header",
            header.data_offset
        )));
    }
    map.check_layout()?;

    let limit = u64::from(header.data_length);
    for entry in map.types() {
        for reference in &entry.references {
            let offset = u64::from(reference.data_offset);
            if offset + DATA_LENGTH_PREFIX_SIZE > limit {
                return Err(Error::OffsetOutOfRange {
                    resource: ResourceRef::new(entry.res_type, reference.id),
                    offset,
                    limit,
                });
            }
        }
    }
    Ok(())
}

impl<S> ResourceFile<S> {
    pub(crate) fn with_fork(mut self, fork: Fork) -> Self {
        self.fork = Some(fork);
        self
    }
}
