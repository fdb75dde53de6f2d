//! Resource file reading API.
//!
//! A [`ResourceFile`] is built once from a [`ByteSource`]: the header and the
//! resource map are parsed eagerly into an immutable index, while names,
//! data and decompressed data of individual resources are read on first
//! access and cached.
//!
//! # Example
//!
//! ```rust,no_run
//! use resfork::ResourceFile;
//!
//! let file = ResourceFile::open_path("Example.rsrc")?;
//! for res_type in file.types() {
//!     for resource in file.resources(res_type) {
//!         println!("{} {}: {} bytes", res_type, resource.id(), resource.length()?);
//!     }
//! }
//! # Ok::<(), resfork::Error>(())
//! ```

mod fork;
mod open;
mod options;
mod resource;

pub use fork::{Fork, ForkSelector};
pub use open::resource_fork_path;
pub use options::{ForkMode, OpenOptions, ResourceLimits};
pub use resource::Resource;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use crate::format::header::ResourceHeader;
use crate::format::map::MapNames;
use crate::format::{APPLICATION_DATA_SIZE, ResType, ResourceFileAttrs, SYSTEM_DATA_SIZE};
use crate::source::ByteSource;
use crate::{Error, ResourceRef, Result};

use resource::ResourceEntry;

/// All resources of one type, in file order.
struct TypeIndex {
    res_type: ResType,
    entries: Vec<ResourceEntry>,
    by_id: HashMap<i16, usize>,
}

/// A parsed resource file.
///
/// The index of types and resources is immutable once built. Resource
/// contents are read lazily from the underlying source, which is guarded by
/// a mutex so that reads from a forward-only source are serialized.
pub struct ResourceFile<S> {
    source: Mutex<S>,
    seekable: bool,
    header: ResourceHeader,
    file_attributes: ResourceFileAttrs,
    type_list_offset: u16,
    name_list_offset: u16,
    types: Vec<TypeIndex>,
    type_lookup: HashMap<ResType, usize>,
    names: MapNames,
    options: OpenOptions,
    fork: Option<Fork>,
}

impl<S> ResourceFile<S> {
    /// Type codes present in the file, in file order.
    pub fn types(&self) -> impl Iterator<Item = ResType> + '_ {
        self.types.iter().map(|t| t.res_type)
    }

    /// Returns `true` if at least one resource of `res_type` exists.
    pub fn contains_type(&self, res_type: impl Into<ResType>) -> bool {
        self.type_lookup.contains_key(&res_type.into())
    }

    /// Returns `true` if a resource with the given type and ID exists.
    pub fn contains(&self, res_type: impl Into<ResType>, id: i16) -> bool {
        self.type_index(res_type.into())
            .is_some_and(|t| t.by_id.contains_key(&id))
    }

    /// Number of distinct types.
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Number of resources of `res_type`.
    pub fn count(&self, res_type: impl Into<ResType>) -> usize {
        self.type_index(res_type.into())
            .map_or(0, |t| t.entries.len())
    }

    /// Total number of resources across all types.
    pub fn resource_count(&self) -> usize {
        self.types.iter().map(|t| t.entries.len()).sum()
    }

    /// Returns `true` if the file holds no resources.
    pub fn is_empty(&self) -> bool {
        self.types.iter().all(|t| t.entries.is_empty())
    }

    /// IDs of all resources of `res_type`, in file order.
    pub fn ids(&self, res_type: impl Into<ResType>) -> impl Iterator<Item = i16> + '_ {
        self.type_index(res_type.into())
            .into_iter()
            .flat_map(|t| t.entries.iter().map(|e| e.reference.id))
    }

    /// The parsed file header.
    pub fn header(&self) -> &ResourceHeader {
        &self.header
    }

    /// Offset of the data section from the start of the file.
    pub fn data_offset(&self) -> u32 {
        self.header.data_offset
    }

    /// Offset of the resource map from the start of the file.
    pub fn map_offset(&self) -> u32 {
        self.header.map_offset
    }

    /// Length of the data section.
    pub fn data_length(&self) -> u32 {
        self.header.data_length
    }

    /// Length of the resource map.
    pub fn map_length(&self) -> u32 {
        self.header.map_length
    }

    /// Header bytes reserved for system use.
    pub fn system_data(&self) -> &[u8; SYSTEM_DATA_SIZE] {
        &self.header.system_data
    }

    /// Header bytes available for application use.
    pub fn application_data(&self) -> &[u8; APPLICATION_DATA_SIZE] {
        &self.header.application_data
    }

    /// Resource-file-wide attribute flags from the map header.
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

    /// Returns `true` if the underlying source supports reads at any offset.
    pub fn is_seekable(&self) -> bool {
        self.seekable
    }

    /// The fork chosen when the file was opened through fork selection.
    pub fn fork(&self) -> Option<Fork> {
        self.fork
    }

    /// The options the file was opened with.
    pub fn options(&self) -> &OpenOptions {
        &self.options
    }

    /// Consumes the file, returning the underlying source.
    pub fn into_source(self) -> S {
        self.source.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn type_index(&self, res_type: ResType) -> Option<&TypeIndex> {
        self.type_lookup.get(&res_type).map(|&i| &self.types[i])
    }
}

impl<S: ByteSource> ResourceFile<S> {
    /// Resources of `res_type` in file order. Unknown types yield nothing.
    pub fn resources(&self, res_type: impl Into<ResType>) -> impl Iterator<Item = Resource<'_, S>> {
        self.type_index(res_type.into()).into_iter().flat_map(move |t| {
            t.entries
                .iter()
                .map(move |entry| Resource::new(self, t.res_type, entry))
        })
    }

    /// All resources, grouped by type in file order.
    pub fn iter(&self) -> impl Iterator<Item = Resource<'_, S>> {
        self.types.iter().flat_map(move |t| {
            t.entries
                .iter()
                .map(move |entry| Resource::new(self, t.res_type, entry))
        })
    }

    /// Looks up a resource by type and ID.
    pub fn get(&self, res_type: impl Into<ResType>, id: i16) -> Option<Resource<'_, S>> {
        let index = self.type_index(res_type.into())?;
        let &position = index.by_id.get(&id)?;
        let entry = &index.entries[position];
        Some(Resource::new(self, index.res_type, entry))
    }

    /// Looks up a resource by type and ID.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourceNotFound`] if no such resource exists.
    pub fn resource(&self, res_type: impl Into<ResType>, id: i16) -> Result<Resource<'_, S>> {
        let res_type = res_type.into();
        self.get(res_type, id)
            .ok_or(Error::ResourceNotFound(ResourceRef::new(res_type, id)))
    }

    /// Reads bytes at an absolute offset of the source.
    pub(crate) fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let mut source = self.source.lock().unwrap_or_else(PoisonError::into_inner);
        source.read_exact_at(offset, buf)
    }

    pub(crate) fn names(&self) -> &MapNames {
        &self.names
    }
}

impl<S> fmt::Debug for ResourceFile<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceFile")
            .field("header", &self.header)
            .field("file_attributes", &self.file_attributes)
            .field("types", &self.types.iter().map(|t| t.res_type).collect::<Vec<_>>())
            .field("resources", &self.types.iter().map(|t| t.entries.len()).sum::<usize>())
            .field("seekable", &self.seekable)
            .field("fork", &self.fork)
            .finish_non_exhaustive()
    }
}

impl<'a, S: ByteSource> IntoIterator for &'a ResourceFile<S> {
    type Item = Resource<'a, S>;
    type IntoIter = Box<dyn Iterator<Item = Resource<'a, S>> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}
