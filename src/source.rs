//! Byte sources that resource files are read from.
//!
//! A [`ByteSource`] serves positioned reads. Two implementations are
//! provided:
//!
//! | Source | Backing | Reads |
//! |--------|---------|-------|
//! | [`SeekableSource`] | any `Read + Seek` | any order |
//! | [`ForwardSource`] | any `Read` | non-decreasing offsets, plus a retained window |
//!
//! A forward-only source tracks the furthest byte it has consumed. A read
//! that starts behind that point is only served if the bytes fall inside the
//! window registered with [`ByteSource::retain`]; anything else fails with
//! [`Error::OutOfOrderRead`] instead of being silently reordered.

use std::io::{self, Read, Seek, SeekFrom};

use crate::{Error, Result};

/// Chunk size used when skipping forward.
const SKIP_CHUNK_SIZE: usize = 8 * 1024;

/// A sequence of bytes that resource files are parsed from.
pub trait ByteSource {
    /// Total length of the source, if known.
    fn len(&self) -> Option<u64>;

    /// Returns `true` if bytes can be read again at arbitrary offsets.
    fn is_seekable(&self) -> bool;

    /// Fills `buf` with the bytes starting at absolute `offset`.
    ///
    /// # Errors
    ///
    /// - [`Error::TruncatedData`] if the source ends first
    /// - [`Error::OutOfOrderRead`] if a forward-only source has already passed `offset`
    /// - [`Error::Io`] for any other failure of the underlying reader
    fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Asks the source to keep the bytes in `start..end` once consumed, so
    /// they remain readable after the source has moved past them.
    ///
    /// Random-access sources ignore this.
    fn retain(&mut self, start: u64, end: u64) {
        let _ = (start, end);
    }
}

fn map_read_error(err: io::Error, offset: u64, expected: usize) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        Error::TruncatedData {
            resource: None,
            offset,
            expected: expected as u64,
        }
    } else {
        Error::from(err)
    }
}

/// A byte source backed by a seekable reader.
pub struct SeekableSource<R> {
    inner: R,
    len: u64,
}

impl<R: Read + Seek> SeekableSource<R> {
    /// Wraps a seekable reader, measuring its length.
    pub fn new(mut inner: R) -> Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        Ok(Self { inner, len })
    }

    /// Returns the wrapped reader.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Returns a reference to the wrapped reader.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }
}

impl<R: Read + Seek> ByteSource for SeekableSource<R> {
    fn len(&self) -> Option<u64> {
        Some(self.len)
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.inner.seek(SeekFrom::Start(offset))?;
        self.inner
            .read_exact(buf)
            .map_err(|e| map_read_error(e, offset, buf.len()))
    }
}

impl<R> std::fmt::Debug for SeekableSource<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeekableSource").field("len", &self.len).finish()
    }
}

/// Bytes kept from a registered range while the cursor passes over it.
#[derive(Debug)]
struct Window {
    start: u64,
    end: u64,
    data: Vec<u8>,
}

impl Window {
    fn filled_end(&self) -> u64 {
        self.start + self.data.len() as u64
    }

    /// Appends the part of `chunk` (which starts at `at`) that continues the window.
    fn absorb(&mut self, at: u64, chunk: &[u8]) {
        let filled = self.filled_end();
        let chunk_end = at + chunk.len() as u64;
        if at > filled || chunk_end <= filled || filled >= self.end {
            return;
        }
        let from = (filled - at) as usize;
        let to = (chunk_end.min(self.end) - at) as usize;
        self.data.extend_from_slice(&chunk[from..to]);
    }
}

/// A forward-only byte source backed by any reader.
///
/// The cursor only moves forward. Reads ahead of the cursor skip the
/// intervening bytes; reads behind it are served from the retained window or
/// rejected.
pub struct ForwardSource<R> {
    inner: R,
    position: u64,
    len: Option<u64>,
    window: Option<Window>,
}

impl<R: Read> ForwardSource<R> {
    /// Wraps a reader whose total length is unknown.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            position: 0,
            len: None,
            window: None,
        }
    }

    /// Wraps a reader whose total length is known up front.
    pub fn with_len(inner: R, len: u64) -> Self {
        Self {
            len: Some(len),
            ..Self::new(inner)
        }
    }

    /// Offset of the furthest byte consumed so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Number of bytes currently held in the retained window.
    pub fn retained_bytes(&self) -> usize {
        self.window.as_ref().map_or(0, |w| w.data.len())
    }

    /// Returns the wrapped reader.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Consumes bytes into `buf`, retaining them if they fall in the window.
    fn consume(&mut self, buf: &mut [u8]) -> Result<()> {
        let at = self.position;
        self.inner
            .read_exact(buf)
            .map_err(|e| map_read_error(e, at, buf.len()))?;
        if let Some(window) = &mut self.window {
            window.absorb(at, buf);
        }
        self.position += buf.len() as u64;
        Ok(())
    }

    fn skip_to(&mut self, offset: u64) -> Result<()> {
        let mut scratch = [0u8; SKIP_CHUNK_SIZE];
        while self.position < offset {
            let n = (offset - self.position).min(SKIP_CHUNK_SIZE as u64) as usize;
            let at = self.position;
            self.consume(&mut scratch[..n]).map_err(|e| match e {
                Error::TruncatedData { .. } => Error::TruncatedData {
                    resource: None,
                    offset: at,
                    expected: offset - at,
                },
                other => other,
            })?;
        }
        Ok(())
    }
}

impl<R: Read> ByteSource for ForwardSource<R> {
    fn len(&self) -> Option<u64> {
        self.len
    }

    fn is_seekable(&self) -> bool {
        false
    }

    fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let end = offset + buf.len() as u64;
        let mut filled = 0usize;

        if offset < self.position {
            let behind_end = end.min(self.position);
            let window = self
                .window
                .as_ref()
                .filter(|w| w.start <= offset && behind_end <= w.filled_end())
                .ok_or(Error::OutOfOrderRead {
                    requested: offset,
                    position: self.position,
                })?;
            let from = (offset - window.start) as usize;
            filled = (behind_end - offset) as usize;
            buf[..filled].copy_from_slice(&window.data[from..from + filled]);
            if filled == buf.len() {
                return Ok(());
            }
        } else {
            self.skip_to(offset)?;
        }

        self.consume(&mut buf[filled..])
    }

    fn retain(&mut self, start: u64, end: u64) {
        let start = start.max(self.position);
        if start >= end {
            return;
        }
        log::debug!("forward source retaining bytes {start:#x}..{end:#x}");
        self.window = Some(Window {
            start,
            end,
            data: Vec::new(),
        });
    }
}

impl<R> std::fmt::Debug for ForwardSource<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForwardSource")
            .field("position", &self.position)
            .field("len", &self.len)
            .field("window", &self.window.as_ref().map(|w| w.start..w.end))
            .finish()
    }
}
