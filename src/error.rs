//! Error types for resource file operations.
//!
//! This module provides the [`Error`] enum which represents all possible
//! failure modes when reading resource files and decompressing resources,
//! along with a convenient [`Result<T>`] type alias.
//!
//! # Error Handling
//!
//! All fallible operations in this crate return `Result<T, Error>`. Failures
//! while opening a file are fatal to that open attempt. Failures while
//! reading a single resource are scoped to that resource: other resources
//! of the same file remain readable.
//!
//! ```rust,no_run
//! use resfork::{Error, ResourceFile};
//!
//! fn dump_text(path: &str) -> resfork::Result<()> {
//!     let file = ResourceFile::open_path(path)?;
//!     for resource in file.resources(b"TEXT") {
//!         match resource.data() {
//!             Ok(data) => println!("{}: {} bytes", resource.id(), data.len()),
//!             Err(e @ Error::UnsupportedCodec { .. }) => eprintln!("skipped: {e}"),
//!             Err(e) => return Err(e),
//!         }
//!     }
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::io;
use std::sync::Arc;

use crate::format::ResType;

/// Identifies a single resource by type code and ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    /// Type code of the resource.
    pub res_type: ResType,
    /// Numeric ID of the resource.
    pub id: i16,
}

impl ResourceRef {
    /// Creates a new resource reference.
    pub fn new(res_type: impl Into<ResType>, id: i16) -> Self {
        Self {
            res_type: res_type.into(),
            id,
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' ({})", self.res_type, self.id)
    }
}

/// Formats an optional resource as a message prefix.
struct ResourceContext<'a>(&'a Option<ResourceRef>);

impl fmt::Display for ResourceContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(resource) => write!(f, "resource {resource}: "),
            None => Ok(()),
        }
    }
}

/// Formats the fallback half of a fork selection failure.
struct FallbackContext<'a>(&'a Option<Box<Error>>);

impl fmt::Display for FallbackContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(fallback) => write!(f, "; fallback: {fallback}"),
            None => write!(f, "; no fallback available"),
        }
    }
}

/// The main error type for resource file operations.
///
/// # Error Categories
///
/// | Category | Variants | Typical Cause |
/// |----------|----------|---------------|
/// | I/O | [`Io`][Self::Io], [`OutOfOrderRead`][Self::OutOfOrderRead] | Underlying source |
/// | Structure | [`MalformedHeader`][Self::MalformedHeader], [`MalformedMap`][Self::MalformedMap] | Invalid file layout |
/// | Resource data | [`OffsetOutOfRange`][Self::OffsetOutOfRange], [`TruncatedData`][Self::TruncatedData], [`LengthMismatch`][Self::LengthMismatch] | Damaged data section |
/// | Compression | [`MalformedCompressionHeader`][Self::MalformedCompressionHeader], [`UnsupportedCodec`][Self::UnsupportedCodec], [`Decompress`][Self::Decompress] | Compressed resources |
/// | Selection | [`ForkSelectionFailed`][Self::ForkSelectionFailed], [`ForkUnavailable`][Self::ForkUnavailable] | Choosing between forks |
/// | Lookup | [`ResourceNotFound`][Self::ResourceNotFound] | Keyed access |
/// | Resources | [`ResourceLimitExceeded`][Self::ResourceLimitExceeded] | Safety limits |
///
/// The type is `Clone` so that a failed lazy read can be cached and reported
/// identically to every caller.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred in the underlying byte source.
    #[error("I/O error: {0}")]
    Io(#[source] Arc<io::Error>),

    /// The fixed-size file header is missing, truncated, or inconsistent.
    ///
    /// Raised when the declared sections overflow, overlap, extend past the end
    /// of the source, or disagree with the header copy at the start of the map.
    #[error("malformed resource file header: {reason}")]
    MalformedHeader {
        /// Description of the problem.
        reason: String,
    },

    /// The resource map is truncated or internally inconsistent.
    #[error("malformed resource map at offset {offset:#x}: {reason}")]
    MalformedMap {
        /// Offset relative to the start of the map.
        offset: u64,
        /// Description of the problem.
        reason: String,
    },

    /// A resource's data offset points outside the data section.
    #[error(
        "resource {resource}: data offset {offset:#x} is outside the data section ({limit:#x} bytes)"
    )]
    OffsetOutOfRange {
        /// The resource involved.
        resource: ResourceRef,
        /// Offset of the data block relative to the data section.
        offset: u64,
        /// Length of the data section.
        limit: u64,
    },

    /// The source ended before the expected number of bytes could be read.
    #[error(
        "{}truncated data at offset {offset:#x}: expected {expected} bytes",
        ResourceContext(.resource)
    )]
    TruncatedData {
        /// The resource involved, if the read was for resource data.
        resource: Option<ResourceRef>,
        /// Absolute offset of the read within the source.
        offset: u64,
        /// Number of bytes requested.
        expected: u64,
    },

    /// A resource's length prefix disagrees with the space available for it.
    #[error(
        "resource {resource}: length prefix at offset {offset:#x} declares {declared} bytes, but only {available} are available"
    )]
    LengthMismatch {
        /// The resource involved.
        resource: ResourceRef,
        /// Offset of the data block relative to the data section.
        offset: u64,
        /// Length declared by the prefix.
        declared: u64,
        /// Bytes available between the payload start and the end of the data section.
        available: u64,
    },

    /// Data flagged as compressed does not start with the compression signature.
    ///
    /// This is a soft condition: resource accessors treat such data as raw and
    /// never return this error. It is only visible when parsing a compressed
    /// header directly.
    #[error("data does not start with the compressed resource signature")]
    NotActuallyCompressed,

    /// The compressed resource header is truncated or has invalid fields.
    #[error("{}malformed compression header: {reason}", ResourceContext(.resource))]
    MalformedCompressionHeader {
        /// The resource involved, if known.
        resource: Option<ResourceRef>,
        /// Description of the problem.
        reason: String,
    },

    /// The compressed data names a codec that is not implemented.
    ///
    /// Only codecs 0, 1, and 2 exist; no best-effort decoding is attempted for
    /// any other ID.
    #[error("{}unsupported compression codec {codec_id}", ResourceContext(.resource))]
    UnsupportedCodec {
        /// The resource involved, if known.
        resource: Option<ResourceRef>,
        /// Codec ID from the compression header.
        codec_id: i16,
    },

    /// Decompression failed because the compressed data is invalid.
    #[error("{}decompression failed: {reason}", ResourceContext(.resource))]
    Decompress {
        /// The resource involved, if known.
        resource: Option<ResourceRef>,
        /// Description of the problem.
        reason: String,
    },

    /// Neither candidate fork holds a plausible resource file.
    #[error("no usable resource fork: primary: {primary}{}", FallbackContext(.fallback))]
    ForkSelectionFailed {
        /// Why the primary candidate was rejected.
        #[source]
        primary: Box<Error>,
        /// Why the fallback candidate was rejected, if there was one.
        fallback: Option<Box<Error>>,
    },

    /// A fork was explicitly requested but does not exist.
    #[error("the {fork} fork is not available")]
    ForkUnavailable {
        /// Which fork was requested.
        fork: &'static str,
    },

    /// A forward-only source was asked for bytes it has already passed.
    #[error(
        "out-of-order read at offset {requested:#x}: forward-only source is already at {position:#x}"
    )]
    OutOfOrderRead {
        /// Absolute offset of the rejected read.
        requested: u64,
        /// Current position of the source.
        position: u64,
    },

    /// No resource with the given type and ID exists.
    #[error("resource {0} not found")]
    ResourceNotFound(ResourceRef),

    /// A configured resource limit was exceeded.
    #[error("resource limit exceeded: {0}")]
    ResourceLimitExceeded(String),
}

impl From<io::Error> for Error {
    /// Converts an I/O error, unwrapping crate errors that were tunneled
    /// through `io::Error` by `Read` implementations.
    fn from(err: io::Error) -> Self {
        match err.get_ref().and_then(|inner| inner.downcast_ref::<Error>()) {
            Some(inner) => inner.clone(),
            None => Error::Io(Arc::new(err)),
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(inner) => io::Error::new(inner.kind(), Error::Io(inner)),
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

impl Error {
    /// Returns `true` if this error indicates damaged or inconsistent data.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Error::MalformedHeader { .. }
                | Error::MalformedMap { .. }
                | Error::OffsetOutOfRange { .. }
                | Error::TruncatedData { .. }
                | Error::LengthMismatch { .. }
                | Error::MalformedCompressionHeader { .. }
                | Error::Decompress { .. }
        )
    }

    /// Returns `true` if this error is caused by an unimplemented codec.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::UnsupportedCodec { .. })
    }

    /// Returns `true` if the underlying byte source failed.
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io(_) | Error::OutOfOrderRead { .. })
    }

    /// Returns the resource associated with this error, if any.
    pub fn resource(&self) -> Option<&ResourceRef> {
        match self {
            Error::OffsetOutOfRange { resource, .. }
            | Error::LengthMismatch { resource, .. }
            | Error::ResourceNotFound(resource) => Some(resource),
            Error::TruncatedData { resource, .. }
            | Error::MalformedCompressionHeader { resource, .. }
            | Error::UnsupportedCodec { resource, .. }
            | Error::Decompress { resource, .. } => resource.as_ref(),
            _ => None,
        }
    }

    /// Attaches resource context to errors that carry an optional resource
    /// and do not have one yet.
    pub fn with_resource(mut self, r: ResourceRef) -> Self {
        match &mut self {
            Error::TruncatedData { resource, .. }
            | Error::MalformedCompressionHeader { resource, .. }
            | Error::UnsupportedCodec { resource, .. }
            | Error::Decompress { resource, .. } => {
                resource.get_or_insert(r);
            }
            _ => {}
        }
        self
    }

    /// Creates a MalformedHeader error.
    pub fn malformed_header(reason: impl Into<String>) -> Self {
        Error::MalformedHeader {
            reason: reason.into(),
        }
    }

    /// Creates a MalformedMap error.
    pub fn malformed_map(offset: u64, reason: impl Into<String>) -> Self {
        Error::MalformedMap {
            offset,
            reason: reason.into(),
        }
    }

    /// Creates a Decompress error without resource context.
    pub fn decompress(reason: impl Into<String>) -> Self {
        Error::Decompress {
            resource: None,
            reason: reason.into(),
        }
    }

    /// Creates a MalformedCompressionHeader error without resource context.
    pub fn malformed_compression_header(reason: impl Into<String>) -> Self {
        Error::MalformedCompressionHeader {
            resource: None,
            reason: reason.into(),
        }
    }
}

/// A specialized Result type for resource file operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    fn text_256() -> ResourceRef {
        ResourceRef::new(*b"TEXT", 256)
    }

    #[test]
    fn test_io_error_from() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("I/O error"));
        assert!(err.is_io());
    }

    #[test]
    fn test_tunneled_error_is_unwrapped() {
        let io_err: io::Error = Error::decompress("unknown tag byte 0xd3").into();
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidData);
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Decompress { .. }));
        assert!(err.to_string().contains("0xd3"));
    }

    #[test]
    fn test_resource_ref_display() {
        assert_eq!(text_256().to_string(), "'TEXT' (256)");
    }

    #[test]
    fn test_with_resource_sets_context_once() {
        let err = Error::decompress("bad").with_resource(text_256());
        assert_eq!(err.resource(), Some(&text_256()));
        assert!(err.to_string().starts_with("resource 'TEXT' (256): "));

        let other = ResourceRef::new(*b"snd ", 1);
        let err = err.with_resource(other);
        assert_eq!(err.resource(), Some(&text_256()));
    }

    #[test]
    fn test_with_resource_ignores_structural_errors() {
        let err = Error::malformed_map(0x1c, "type list truncated").with_resource(text_256());
        assert_eq!(err.resource(), None);
        assert!(err.to_string().contains("0x1c"));
    }

    #[test]
    fn test_classification() {
        assert!(Error::malformed_header("x").is_corruption());
        assert!(Error::decompress("x").is_corruption());
        assert!(!Error::NotActuallyCompressed.is_corruption());

        let unsupported = Error::UnsupportedCodec {
            resource: None,
            codec_id: 99,
        };
        assert!(unsupported.is_unsupported());
        assert!(!unsupported.is_corruption());
        assert!(unsupported.to_string().contains("99"));
    }

    #[test]
    fn test_fork_selection_failed_message() {
        let err = Error::ForkSelectionFailed {
            primary: Box::new(Error::malformed_header("empty")),
            fallback: Some(Box::new(Error::malformed_map(0, "truncated"))),
        };
        let msg = err.to_string();
        assert!(msg.contains("primary"));
        assert!(msg.contains("fallback"));

        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("malformed resource file header: empty"));
    }

    #[test]
    fn test_error_is_clone() {
        let err: Error = io::Error::other("boom").into();
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }
}
