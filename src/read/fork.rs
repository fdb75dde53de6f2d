//! Choosing between a resource fork and a data fork.
//!
//! Opening the resource fork of a file that has none can succeed on some
//! systems and yield an empty or garbage stream. In [`ForkMode::Auto`] the
//! primary candidate is therefore only used if it parses and passes the
//! structural plausibility checks; otherwise the fallback is tried.

use std::fmt;

use crate::source::ByteSource;
use crate::{Error, Result};

use super::open::open_source;
use super::{ForkMode, OpenOptions, ResourceFile};

/// The fork a resource file was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fork {
    /// The primary source, normally the resource fork.
    Primary,
    /// The fallback source, normally the data fork.
    Fallback,
}

impl Fork {
    /// Short name used in messages and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Fork::Primary => "rsrc",
            Fork::Fallback => "data",
        }
    }
}

impl fmt::Display for Fork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opens a resource file from one of two candidate sources.
///
/// ```rust,no_run
/// use std::fs::File;
/// use resfork::{ForkMode, ForkSelector, OpenOptions, SeekableSource};
///
/// let rsrc = SeekableSource::new(File::open("Example/..namedfork/rsrc")?)?;
/// let data = SeekableSource::new(File::open("Example")?)?;
/// let file = ForkSelector::new()
///     .primary(rsrc)
///     .fallback(data)
///     .options(OpenOptions::new().fork(ForkMode::Auto))
///     .open()?;
/// println!("read from the {} fork", file.fork().map_or("?", |f| f.as_str()));
/// # Ok::<(), resfork::Error>(())
/// ```
pub struct ForkSelector<S> {
    primary: Option<S>,
    fallback: Option<S>,
    options: OpenOptions,
}

impl<S> Default for ForkSelector<S> {
    fn default() -> Self {
        Self {
            primary: None,
            fallback: None,
            options: OpenOptions::default(),
        }
    }
}

impl<S: ByteSource> ForkSelector<S> {
    /// Creates a selector without candidates.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the primary candidate.
    pub fn primary(mut self, source: S) -> Self {
        self.primary = Some(source);
        self
    }

    /// Sets the fallback candidate.
    pub fn fallback(mut self, source: S) -> Self {
        self.fallback = Some(source);
        self
    }

    /// Sets the open options; [`OpenOptions::fork`] selects the mode.
    pub fn options(mut self, options: OpenOptions) -> Self {
        self.options = options;
        self
    }

    /// Opens the resource file from the selected candidate.
    ///
    /// # Errors
    ///
    /// - [`Error::ForkUnavailable`] if the mode forces a candidate that was
    ///   not given, or no candidate was given at all
    /// - [`Error::ForkSelectionFailed`] if in automatic mode no candidate is
    ///   plausible; the primary's failure is the error source
    /// - Any error from parsing a forced candidate
    pub fn open(self) -> Result<ResourceFile<S>> {
        let Self {
            primary,
            fallback,
            options,
        } = self;

        match options.fork {
            ForkMode::Primary => {
                let source = primary.ok_or(Error::ForkUnavailable { fork: "rsrc" })?;
                let file = open_source(source, options, false)?;
                Ok(file.with_fork(Fork::Primary))
            }
            ForkMode::Fallback => {
                let source = fallback.ok_or(Error::ForkUnavailable { fork: "data" })?;
                let file = open_source(source, options, false)?;
                Ok(file.with_fork(Fork::Fallback))
            }
            ForkMode::Auto => select(primary, fallback, options),
        }
    }
}

fn select<S: ByteSource>(
    primary: Option<S>,
    fallback: Option<S>,
    options: OpenOptions,
) -> Result<ResourceFile<S>> {
    let Some(primary) = primary else {
        log::debug!("no primary fork, using the fallback");
        let source = fallback.ok_or(Error::ForkUnavailable { fork: "rsrc" })?;
        let file = open_source(source, options, false)?;
        return Ok(file.with_fork(Fork::Fallback));
    };

    let primary_err = match open_source(primary, options.clone(), true) {
        Ok(file) => {
            log::debug!("primary fork holds plausible resource data");
            return Ok(file.with_fork(Fork::Primary));
        }
        Err(e) if e.is_io() => return Err(e),
        Err(e) => e,
    };

    let Some(fallback) = fallback else {
        return Err(Error::ForkSelectionFailed {
            primary: Box::new(primary_err),
            fallback: None,
        });
    };

    log::warn!("primary fork rejected ({primary_err}), trying the fallback");
    match open_source(fallback, options, true) {
        Ok(file) => Ok(file.with_fork(Fork::Fallback)),
        Err(fallback_err) => Err(Error::ForkSelectionFailed {
            primary: Box::new(primary_err),
            fallback: Some(Box::new(fallback_err)),
        }),
    }
}

impl<S> fmt::Debug for ForkSelector<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForkSelector")
            .field("primary", &self.primary.is_some())
            .field("fallback", &self.fallback.is_some())
            .field("options", &self.options)
            .finish()
    }
}
