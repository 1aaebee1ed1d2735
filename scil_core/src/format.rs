//! Byte-level layout of a compressed SCIL stream.
//!
//! ```text
//! [stage_count:u8]
//! [datatype payload][trailer entries...][datatype magic:u8]   <- if a datatype stage ran
//! [byte payload][byte magic:u8]                               <- wraps everything above
//! ```
//!
//! Preconditioner and converter stages leave a trailer entry behind
//! `[header][header_len:u32 LE][magic:u8]`; entries are read back from the tail,
//! last stage first.

use crate::error::ScilError;
use crate::Result;

/// Upper bound on all headers, magic bytes and trailer entries in a stream.
pub const HEADER_MAX: usize = 1024;

/// Largest header a trailer entry can carry.
pub const TRAILER_HEADER_MAX: usize = u32::MAX as usize;

const LEN_SIZE: usize = 4;

// ── Magic bytes ─────────────────────────────────────────────────────────────

/// Append a 1-byte stage magic.
#[inline]
pub fn push_magic(out: &mut Vec<u8>, magic: u8) {
    out.push(magic);
}

/// Split the trailing magic byte off `buf`.
pub fn split_magic(buf: &[u8]) -> Result<(&[u8], u8)> {
    match buf.split_last() {
        Some((&magic, rest)) => Ok((rest, magic)),
        None => Err(ScilError::buffer("stream ended before the next stage magic")),
    }
}

// ── Trailer entries ─────────────────────────────────────────────────────────

/// Header of a preconditioner or converter stage, recovered from the tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrailerEntry<'a> {
    pub magic: u8,
    pub header: &'a [u8],
}

/// Append `[header][header_len:u32 LE][magic:u8]`.
pub fn push_trailer_entry(out: &mut Vec<u8>, header: &[u8], magic: u8) -> Result<()> {
    let len = u32::try_from(header.len()).map_err(|_| {
        ScilError::buffer(format!(
            "stage header of {} bytes exceeds {TRAILER_HEADER_MAX}",
            header.len()
        ))
    })?;
    out.extend_from_slice(header);
    out.extend_from_slice(&len.to_le_bytes());
    out.push(magic);
    Ok(())
}

/// Split the last trailer entry off `buf`.
pub fn split_trailer_entry(buf: &[u8]) -> Result<(&[u8], TrailerEntry<'_>)> {
    let (rest, magic) = split_magic(buf)?;
    if rest.len() < LEN_SIZE {
        return Err(ScilError::buffer("trailer entry is missing its header length"));
    }
    let (rest, len_bytes) = rest.split_at(rest.len() - LEN_SIZE);
    let mut raw = [0u8; LEN_SIZE];
    raw.copy_from_slice(len_bytes);
    let len = u32::from_le_bytes(raw) as usize;
    if rest.len() < len {
        return Err(ScilError::buffer(format!(
            "trailer entry claims a {len} byte header, only {} bytes remain",
            rest.len()
        )));
    }
    let (rest, header) = rest.split_at(rest.len() - len);
    Ok((rest, TrailerEntry { magic, header }))
}

// ── Header fields ───────────────────────────────────────────────────────────

/// Sequential little-endian reader over a stage header.
#[derive(Debug)]
pub struct HeaderReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> HeaderReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let end = self.pos + N;
        let bytes = self.buf.get(self.pos..end).ok_or_else(|| {
            ScilError::buffer(format!(
                "header truncated: need {N} bytes at offset {}, have {}",
                self.pos,
                self.buf.len()
            ))
        })?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        self.pos = end;
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take::<1>()?[0])
    }

    pub fn i16(&mut self) -> Result<i16> {
        Ok(i16::from_le_bytes(self.take()?))
    }

    pub fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take()?))
    }

    pub fn f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.take()?))
    }

    /// Bytes after the fields read so far.
    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos.min(self.buf.len())..]
    }

    pub fn position(&self) -> usize {
        self.pos
    }
}
