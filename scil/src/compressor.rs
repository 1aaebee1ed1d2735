//! Running chains forward (compress) and backward (decompress).
//!
//! # Stream layout
//! ```text
//! [stage_count:u8]
//! [typed data or datatype payload][trailer entries][datatype magic]
//! [byte payload][byte magic]          <- wraps everything after the count
//! ```
//! Decompression reads magic bytes from the tail: a byte stage is undone
//! first, then the datatype stage, then the trailer entries of the
//! preconditioners and the converter, last stage first.

use scil_core::format::{push_magic, push_trailer_entry, split_magic, split_trailer_entry, HEADER_MAX};
use scil_core::{Algorithm, AlgorithmKind, Datatype, Dims, Result, ScilError, StageKind, UserHints};

use crate::buffers::StageBuffers;
use crate::chain::Chain;
use crate::chooser;
use crate::context::CompressionContext;

/// Smallest destination guaranteed to hold the compressed form of `dims`
/// elements of `datatype`.
pub fn compress_buffer_size_bound(datatype: Datatype, dims: &Dims) -> usize {
    dims.size_in_bytes(datatype).saturating_mul(4).saturating_add(HEADER_MAX)
}

fn check_source(datatype: Datatype, src: &[u8], dims: &Dims) -> Result<usize> {
    let expected = dims.size_in_bytes(datatype);
    if src.len() != expected {
        return Err(ScilError::buffer(format!(
            "source holds {} bytes, {} {datatype} elements {dims} need {expected}",
            src.len(),
            dims.count()
        )));
    }
    Ok(expected)
}

// ── Compression ─────────────────────────────────────────────────────────────

/// Compress `src`, choosing a chain on the first call if the context has
/// none yet.
pub fn compress(ctx: &mut CompressionContext, src: &[u8], dims: &Dims) -> Result<Vec<u8>> {
    let datatype = ctx.datatype();
    if check_source(datatype, src, dims)? == 0 {
        tracing::debug!("empty input, writing a zero stage stream");
        return Ok(vec![0]);
    }

    chooser::choose(ctx, src, dims)?;
    let chain = ctx
        .chain()
        .ok_or_else(|| ScilError::InvalidChain("no chain resolved for this context".into()))?;
    chain.check_applicable(datatype)?;
    run_chain(chain, datatype, ctx.effective_hints(), src, dims)
}

/// Compress into a caller-provided buffer and return the bytes written.
///
/// Fails with [`ScilError::Memory`] when `dest` is smaller than
/// [`compress_buffer_size_bound`].
pub fn compress_into(
    ctx: &mut CompressionContext,
    src: &[u8],
    dims: &Dims,
    dest: &mut [u8],
) -> Result<usize> {
    let required = if dims.count() == 0 { 1 } else { compress_buffer_size_bound(ctx.datatype(), dims) };
    if dest.len() < required {
        return Err(ScilError::Memory { required, available: dest.len() });
    }
    let out = compress(ctx, src, dims)?;
    let available = dest.len();
    let slot = dest
        .get_mut(..out.len())
        .ok_or(ScilError::Memory { required: out.len(), available })?;
    slot.copy_from_slice(&out);
    Ok(out.len())
}

fn run_chain(
    chain: &Chain,
    datatype: Datatype,
    hints: &UserHints,
    src: &[u8],
    dims: &Dims,
) -> Result<Vec<u8>> {
    let total = u8::try_from(chain.total_size())
        .map_err(|_| ScilError::InvalidChain(format!("{} stages do not fit the stream", chain.total_size())))?;
    let mut buffers = StageBuffers::new(src, compress_buffer_size_bound(datatype, dims));
    let mut trailer = Vec::new();
    let mut current = datatype;

    for algo in chain.stages() {
        match algo.kind {
            AlgorithmKind::PreconditionerFirst(p) | AlgorithmKind::PreconditionerSecond(p) => {
                let header = buffers.run(|input, out| p.precondition(current, hints, input, dims, out))?;
                push_trailer_entry(&mut trailer, &header, algo.id)?;
            }
            AlgorithmKind::Converter(c) => {
                let header = buffers.run(|input, out| c.convert(current, hints, input, dims, out))?;
                push_trailer_entry(&mut trailer, &header, algo.id)?;
                current = c.output_datatype(current);
            }
            AlgorithmKind::Datatype(d) => {
                buffers.run(|input, out| {
                    d.compress(current, hints, input, dims, out)?;
                    out.extend_from_slice(&trailer);
                    push_magic(out, algo.id);
                    Ok(())
                })?;
                trailer.clear();
            }
            AlgorithmKind::Byte(b) => {
                if !trailer.is_empty() {
                    buffers.append(&trailer);
                    trailer.clear();
                }
                buffers.run(|input, out| {
                    b.compress(input, out)?;
                    push_magic(out, algo.id);
                    Ok(())
                })?;
            }
        }
        tracing::debug!(
            stage = algo.name,
            magic = algo.id,
            kind = %algo.stage(),
            position = buffers.current().len(),
            "stage applied"
        );
    }
    if !trailer.is_empty() {
        buffers.append(&trailer);
    }

    let body = buffers.into_output();
    let mut out = Vec::with_capacity(body.len() + 1);
    out.push(total);
    out.extend_from_slice(&body);
    Ok(out)
}

// ── Decompression ───────────────────────────────────────────────────────────

/// Stages found below the byte stage, in forward order.
struct Layout {
    entries: Vec<(&'static Algorithm, Vec<u8>)>,
    data_compressor: Option<&'static Algorithm>,
    /// Length of the typed data or datatype payload in front of the trailer.
    frame_len: usize,
}

fn read_layout(buf: &[u8], mut stages: usize) -> Result<Layout> {
    let (without_magic, magic) = split_magic(buf)?;
    let algo = scil_codecs::by_id(magic)?;
    let (mut rest, data_compressor) = match algo.stage() {
        StageKind::Datatype => {
            tracing::debug!(stage = algo.name, magic, position = buf.len() - 1, "read datatype magic");
            stages -= 1;
            (without_magic, Some(algo))
        }
        StageKind::Byte => {
            return Err(ScilError::buffer(format!("byte stage {} below another stage", algo.name)));
        }
        _ => (buf, None),
    };

    let mut entries = Vec::with_capacity(stages);
    for _ in 0..stages {
        let (remaining, entry) = split_trailer_entry(rest)?;
        let algo = scil_codecs::by_id(entry.magic)?;
        if algo.stage() >= StageKind::Datatype {
            return Err(ScilError::buffer(format!(
                "{} stage {} found in the trailer",
                algo.stage(),
                algo.name
            )));
        }
        tracing::debug!(stage = algo.name, magic = entry.magic, position = remaining.len(), "read trailer entry");
        entries.push((algo, entry.header.to_vec()));
        rest = remaining;
    }
    entries.reverse();
    Ok(Layout { entries, data_compressor, frame_len: rest.len() })
}

/// Undo a leading byte stage, if the stream ends with one.
fn undo_byte_stage(buffers: &mut StageBuffers<'_>) -> Result<Option<&'static Algorithm>> {
    let (_, magic) = split_magic(buffers.current())?;
    let algo = scil_codecs::by_id(magic)?;
    let AlgorithmKind::Byte(b) = algo.kind else {
        return Ok(None);
    };
    tracing::debug!(stage = algo.name, magic, position = buffers.current().len() - 1, "read byte magic");
    buffers.run(|input, out| {
        let (payload, _) = split_magic(input)?;
        b.decompress(payload, out)
    })?;
    Ok(Some(algo))
}

fn stage_count(compressed: &[u8]) -> Result<(usize, &[u8])> {
    let (&count, body) = compressed
        .split_first()
        .ok_or_else(|| ScilError::buffer("compressed stream is empty"))?;
    Ok((count as usize, body))
}

/// Reconstruct `dims` elements of `datatype` from `compressed`.
pub fn decompress(datatype: Datatype, dims: &Dims, compressed: &[u8]) -> Result<Vec<u8>> {
    let expected = dims.size_in_bytes(datatype);
    let (count, body) = stage_count(compressed)?;
    if count == 0 {
        if expected != 0 || !body.is_empty() {
            return Err(ScilError::buffer(format!(
                "stream without stages cannot hold {} elements",
                dims.count()
            )));
        }
        return Ok(Vec::new());
    }

    // dims may come from an untrusted file header; let the buffers grow
    let mut buffers = StageBuffers::new(body, body.len());
    let mut remaining = count;
    let byte_stage = undo_byte_stage(&mut buffers)?;
    if byte_stage.is_some() {
        remaining -= 1;
    }

    if remaining > 0 {
        let layout = read_layout(buffers.current(), remaining)?;
        let chain = Chain::from_algorithms(
            layout
                .entries
                .iter()
                .map(|(a, _)| *a)
                .chain(layout.data_compressor)
                .chain(byte_stage),
        )?;
        chain.check_applicable(datatype)?;

        let mut types = Vec::with_capacity(layout.entries.len());
        let mut current = datatype;
        for (algo, _) in &layout.entries {
            types.push(current);
            if let AlgorithmKind::Converter(c) = algo.kind {
                current = c.output_datatype(current);
            }
        }

        let mut cut = Some(layout.frame_len);
        if let Some(algo) = layout.data_compressor {
            if let AlgorithmKind::Datatype(d) = algo.kind {
                let frame_len = layout.frame_len;
                buffers.run(|input, out| d.decompress(current, &input[..frame_len], dims, out))?;
                cut = None;
            }
        }

        for ((algo, header), ty) in layout.entries.iter().zip(types).rev() {
            let cut = cut.take();
            buffers.run(|input, out| {
                let input = match cut {
                    Some(n) => &input[..n],
                    None => input,
                };
                match algo.kind {
                    AlgorithmKind::PreconditionerFirst(p) | AlgorithmKind::PreconditionerSecond(p) => {
                        p.restore(ty, header, input, dims, out)
                    }
                    AlgorithmKind::Converter(c) => c.revert(ty, header, input, dims, out),
                    _ => Err(ScilError::buffer(format!("{} cannot be restored from a trailer", algo.name))),
                }
            })?;
        }
    }

    let out = buffers.into_output();
    if out.len() != expected {
        return Err(ScilError::buffer(format!(
            "stream decoded to {} bytes, {} {datatype} elements need {expected}",
            out.len(),
            dims.count()
        )));
    }
    Ok(out)
}

// ── Inspection ──────────────────────────────────────────────────────────────

/// What a compressed stream is made of.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub stage_count: usize,
    /// `None` for the zero stage stream of an empty input.
    pub chain: Option<Chain>,
    pub compressed_len: usize,
}

/// Recover the chain of a stream from its magic bytes.
///
/// Only the byte stage is decompressed; typed stages are identified by
/// their tags and trailer entries.
pub fn describe_stream(compressed: &[u8]) -> Result<StreamInfo> {
    let (count, body) = stage_count(compressed)?;
    if count == 0 {
        return Ok(StreamInfo { stage_count: 0, chain: None, compressed_len: compressed.len() });
    }

    let mut buffers = StageBuffers::new(body, body.len());
    let byte_stage = undo_byte_stage(&mut buffers)?;
    let remaining = count - usize::from(byte_stage.is_some());
    let mut algorithms = Vec::with_capacity(count);
    if remaining > 0 {
        let layout = read_layout(buffers.current(), remaining)?;
        algorithms.extend(layout.entries.iter().map(|(a, _)| *a));
        algorithms.extend(layout.data_compressor);
    }
    algorithms.extend(byte_stage);

    Ok(StreamInfo {
        stage_count: count,
        chain: Some(Chain::from_algorithms(algorithms)?),
        compressed_len: compressed.len(),
    })
}
