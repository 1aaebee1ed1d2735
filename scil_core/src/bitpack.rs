//! Tight MSB-first bit packing ("swage").
//!
//! Values are written back to back with no alignment: a value may start in
//! the middle of one byte and end in the middle of another. The final byte
//! is left-justified and zero padded.

use crate::error::ScilError;
use crate::Result;

/// Bytes produced by packing `count` values of `bits` bits each.
pub fn packed_size(count: usize, bits: u8) -> Result<usize> {
    check_width(bits)?;
    count
        .checked_mul(bits as usize)
        .and_then(|total| total.checked_add(7))
        .map(|total| total / 8)
        .ok_or_else(|| ScilError::buffer(format!("{count} values of {bits} bits overflow usize")))
}

fn check_width(bits: u8) -> Result<()> {
    if bits > 64 {
        return Err(ScilError::buffer(format!("bit width {bits} exceeds 64")));
    }
    Ok(())
}

#[inline]
fn low_mask(bits: u32) -> u128 {
    (1u128 << bits) - 1
}

/// Append the packed form of `values` to `out`.
///
/// Every value must fit into `bits` bits; a wider value is an error rather
/// than silently bleeding into its neighbour.
pub fn pack_into(values: &[u64], bits: u8, out: &mut Vec<u8>) -> Result<()> {
    let size = packed_size(values.len(), bits)?;
    if bits == 0 {
        if let Some(v) = values.iter().find(|&&v| v != 0) {
            return Err(ScilError::buffer(format!("value {v} does not fit into 0 bits")));
        }
        return Ok(());
    }
    out.reserve(size);

    let width = bits as u32;
    let mut acc: u128 = 0;
    let mut pending: u32 = 0;
    for &v in values {
        if width < 64 && v >> width != 0 {
            return Err(ScilError::buffer(format!("value {v} does not fit into {bits} bits")));
        }
        acc = (acc << width) | v as u128;
        pending += width;
        while pending >= 8 {
            pending -= 8;
            out.push((acc >> pending) as u8);
        }
        acc &= low_mask(pending);
    }
    if pending > 0 {
        out.push((acc << (8 - pending)) as u8);
    }
    Ok(())
}

/// Pack `values` into a fresh buffer of `packed_size(values.len(), bits)` bytes.
pub fn pack(values: &[u64], bits: u8) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    pack_into(values, bits, &mut out)?;
    Ok(out)
}

/// Exact inverse of [`pack`]: read `count` values of `bits` bits.
pub fn unpack(bytes: &[u8], count: usize, bits: u8) -> Result<Vec<u64>> {
    let size = packed_size(count, bits)?;
    if bytes.len() < size {
        return Err(ScilError::buffer(format!(
            "packed buffer holds {} bytes, {count} values of {bits} bits need {size}",
            bytes.len()
        )));
    }
    if bits == 0 {
        return Ok(vec![0; count]);
    }

    let width = bits as u32;
    let mut values = Vec::with_capacity(count);
    let mut input = bytes[..size].iter();
    let mut acc: u128 = 0;
    let mut available: u32 = 0;
    while values.len() < count {
        while available < width {
            let byte = input
                .next()
                .ok_or_else(|| ScilError::buffer("packed buffer ended early"))?;
            acc = (acc << 8) | *byte as u128;
            available += 8;
        }
        available -= width;
        values.push(((acc >> available) & low_mask(width)) as u64);
        acc &= low_mask(available);
    }
    Ok(values)
}
