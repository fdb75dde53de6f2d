//! # resfork
//!
//! A pure-Rust library for reading classic Mac OS resource files and resource
//! forks.
//!
//! Resource files hold typed, numbered binary blobs ("resources") together
//! with optional names and attribute flags. This crate parses the header and
//! resource map into an immutable index and reads resource data lazily. Data
//! stored with the system's resource compression (codecs 0, 1 and 2) is
//! decompressed transparently.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use resfork::{ResourceFile, Result};
//!
//! fn main() -> Result<()> {
//!     // Prefers the resource fork, falls back to the data fork
//!     let file = ResourceFile::open_path("System")?;
//!
//!     for res_type in file.types() {
//!         println!("'{}': {} resources", res_type, file.count(res_type));
//!     }
//!
//!     let text = file.resource(b"TEXT", 256)?;
//!     println!("{:?}: {} bytes", text.name()?, text.data()?.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Forward-Only Sources
//!
//! Resource files can be read from pipes and other readers that cannot seek:
//!
//! ```rust,no_run
//! use resfork::ResourceFile;
//!
//! let file = ResourceFile::open_sequential(std::io::stdin())?;
//! for resource in &file {
//!     println!("{} ({}): {} bytes", resource.res_type(), resource.id(), resource.data()?.len());
//! }
//! # Ok::<(), resfork::Error>(())
//! ```
//!
//! Resource data lying before the map is kept in memory while the map is
//! read; data behind the map must be read in increasing offset order, and
//! any other read fails with [`Error::OutOfOrderRead`].
//!
//! ## Compressed Resources
//!
//! [`Resource::data`] decompresses, [`Resource::raw_data`] does not. The
//! codecs are also available on their own:
//!
//! ```rust,no_run
//! let compressed = std::fs::read("resource.bin")?;
//! let header = resfork::CompressedHeader::parse(&compressed)?;
//! let data = resfork::decompress(&compressed)?;
//! assert_eq!(data.len() as u32, header.decompressed_length);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli` | No | Command-line interface tool |
//!
//! ## Minimum Supported Rust Version (MSRV)
//!
//! This crate requires **Rust 1.85** or later.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod codec;
pub mod error;
pub mod format;
pub mod read;
pub mod source;
pub mod text;

pub use codec::{CompressedHeader, DecompressReader, decompress};
pub use error::{Error, ResourceRef, Result};
pub use format::{ResType, ResourceAttrs, ResourceFileAttrs};
pub use read::{
    Fork, ForkMode, ForkSelector, OpenOptions, Resource, ResourceFile, ResourceLimits,
};
pub use source::{ByteSource, ForwardSource, SeekableSource};
