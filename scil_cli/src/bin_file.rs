//! Raw array files read and written by the CLI.
//!
//! ```text
//! array file       : [dims count:u8][length:u64 LE ...][elements LE]
//! compressed file  : [MAGIC:4][datatype:u8][dims count:u8][length:u64 LE ...][scil stream]
//! ```

use std::path::Path;

use anyhow::{bail, Context};
use scil::{Datatype, Dims};

pub const MAGIC: [u8; 4] = *b"SCIL";

/// An n-dimensional array loaded from disk.
pub struct Array {
    pub dims: Dims,
    pub data: Vec<u8>,
}

pub fn decode_array(buf: &[u8], datatype: Datatype) -> anyhow::Result<Array> {
    let (dims, used) = Dims::from_bytes(buf)?;
    let data = &buf[used..];
    let expected = dims.size_in_bytes(datatype);
    if data.len() != expected {
        bail!(
            "{} {datatype} elements {dims} need {expected} bytes, file carries {}",
            dims.count(),
            data.len()
        );
    }
    Ok(Array { dims, data: data.to_vec() })
}

pub fn encode_array(dims: &Dims, data: &[u8]) -> Vec<u8> {
    let mut out = dims.to_bytes();
    out.extend_from_slice(data);
    out
}

pub fn read_array(path: &Path, datatype: Datatype) -> anyhow::Result<Array> {
    let buf = std::fs::read(path).with_context(|| format!("reading array file {:?}", path))?;
    decode_array(&buf, datatype).with_context(|| format!("parsing array file {:?}", path))
}

/// A compressed stream together with what is needed to decode it.
pub struct Compressed {
    pub datatype: Datatype,
    pub dims: Dims,
    pub stream: Vec<u8>,
}

pub fn encode_compressed(datatype: Datatype, dims: &Dims, stream: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(MAGIC.len() + 1 + dims.encoded_len() + stream.len());
    out.extend_from_slice(&MAGIC);
    out.push(datatype as u8);
    out.extend_from_slice(&dims.to_bytes());
    out.extend_from_slice(stream);
    out
}

pub fn decode_compressed(buf: &[u8]) -> anyhow::Result<Compressed> {
    if buf.len() < MAGIC.len() + 1 || buf[..MAGIC.len()] != MAGIC {
        bail!("not a SCIL compressed file");
    }
    let tag = buf[MAGIC.len()];
    let datatype = Datatype::from_u8(tag).with_context(|| format!("unknown datatype tag {tag}"))?;
    let (dims, used) = Dims::from_bytes(&buf[MAGIC.len() + 1..])?;
    let stream = buf[MAGIC.len() + 1 + used..].to_vec();
    Ok(Compressed { datatype, dims, stream })
}

pub fn read_compressed(path: &Path) -> anyhow::Result<Compressed> {
    let buf = std::fs::read(path).with_context(|| format!("reading compressed file {:?}", path))?;
    decode_compressed(&buf).with_context(|| format!("parsing compressed file {:?}", path))
}
