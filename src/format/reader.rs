//! Low-level big-endian reading utilities for resource file parsing.

use std::io::{self, Read};

/// Reads a single byte.
pub fn read_u8<R: Read>(r: &mut R) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Reads a big-endian u16.
pub fn read_u16_be<R: Read>(r: &mut R) -> io::Result<u16> {
    Ok(u16::from_be_bytes(read_array(r)?))
}

/// Reads a big-endian u32.
pub fn read_u32_be<R: Read>(r: &mut R) -> io::Result<u32> {
    Ok(u32::from_be_bytes(read_array(r)?))
}

/// Reads a fixed-size array.
pub fn read_array<R: Read, const N: usize>(r: &mut R) -> io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

/// Reads exactly `len` bytes into a new vector.
pub fn read_bytes<R: Read>(r: &mut R, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

/// Reads as many bytes as are available, up to `buf.len()`.
///
/// Returns the number of bytes read, which is smaller than the buffer only
/// at end of input.
pub fn read_up_to<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Reads a big-endian u16 at `offset` within `data`, if in bounds.
#[inline]
pub fn u16_at(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Reads a big-endian u32 at `offset` within `data`, if in bounds.
#[inline]
pub fn u32_at(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}
