//! Binary snapshot format ("TVGG"): a fixed, packed layout rather than a
//! self-describing one, so this uses `byteorder` directly instead of
//! `serde` — every field's width and order is part of the format contract
//! (spec §6, §4.7).

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::bucket::Bucket2;
use crate::core::error::{Error, Result};
use crate::flags::ContainerFlags;
use crate::graph::Graph;
use crate::system::metrics::EngineMetrics;
use crate::vector::Vector;

const TAG_GRAPH: u32 = 0x4747_5654;
const TAG_VECTOR: u32 = 0x5647_5654;
const FORMAT_VERSION: u32 = 1;
const MAX_BITS: u32 = 31;

/// Write `g` in the binary graph snapshot format.
///
/// Header (20 bytes, little-endian): `tag(u32) = 0x47475654 ("TVGG")
/// version(u32) = 1 flags(u32) bits_source(u32) bits_target(u32)`, with
/// [`ContainerFlags::TRANSIENT`] bits stripped from `flags` — a load always
/// yields a writable, timeline-free object. Followed by one section per
/// bucket, in bucket order: `u64 num_entries`, then that many 24-byte
/// records `(u64 source, u64 target, f32 weight, 4 bytes zero padding)`.
///
/// `eps` is not part of the format; [`load_graph`] takes it as a parameter.
pub fn save_graph<W: Write>(g: &Graph, w: &mut W) -> Result<()> {
    w.write_u32::<LittleEndian>(TAG_GRAPH)?;
    w.write_u32::<LittleEndian>(FORMAT_VERSION)?;
    let persisted_flags = g.flags().difference(ContainerFlags::TRANSIENT);
    w.write_u32::<LittleEndian>(persisted_flags.bits())?;
    w.write_u32::<LittleEndian>(g.bits_source() as u32)?;
    w.write_u32::<LittleEndian>(g.bits_target() as u32)?;

    for bucket in g.raw_buckets() {
        w.write_u64::<LittleEndian>(bucket.len() as u64)?;
        for e in bucket.iter() {
            w.write_u64::<LittleEndian>(e.source)?;
            w.write_u64::<LittleEndian>(e.target)?;
            w.write_f32::<LittleEndian>(e.weight)?;
            w.write_u32::<LittleEndian>(0)?;
        }
    }
    EngineMetrics::global().persistence_ops.with_label_values(&["save"]).inc();
    tracing::info!(edges = g.raw_entry_count(), "graph snapshot saved");
    Ok(())
}

/// Read a graph written by [`save_graph`], using `eps` as the loaded
/// graph's collapse threshold.
///
/// Rejects a mismatched tag or version, or bit exponents exceeding 31.
/// Reconstructs the bucket array directly from the header's exponents
/// without going through `set`/`graph_optimize` (spec §4.7).
pub fn load_graph<R: Read>(r: &mut R, eps: f32) -> Result<Graph> {
    let tag = r.read_u32::<LittleEndian>()?;
    if tag != TAG_GRAPH {
        return Err(Error::invalid_argument("not a TVGG graph snapshot"));
    }
    let version = r.read_u32::<LittleEndian>()?;
    if version != FORMAT_VERSION {
        return Err(Error::unsupported(format!("unsupported TVGG version {version}")));
    }
    let flags = ContainerFlags::from_bits_retain(r.read_u32::<LittleEndian>()?);
    let bits_source = r.read_u32::<LittleEndian>()?;
    let bits_target = r.read_u32::<LittleEndian>()?;
    if bits_source > MAX_BITS || bits_target > MAX_BITS {
        return Err(Error::invalid_argument("bit exponent exceeds 31"));
    }

    let num_buckets = 1usize << (bits_source + bits_target);
    let mut buckets = Vec::with_capacity(num_buckets);
    for _ in 0..num_buckets {
        let count = r.read_u64::<LittleEndian>()?;
        let mut bucket = Bucket2::new();
        for _ in 0..count {
            let source = r.read_u64::<LittleEndian>()?;
            let target = r.read_u64::<LittleEndian>()?;
            let weight = r.read_f32::<LittleEndian>()?;
            let _padding = r.read_u32::<LittleEndian>()?;
            bucket.set(source, target, weight);
        }
        buckets.push(bucket);
    }

    let g = Graph::from_raw_parts(flags, eps, bits_source as u8, bits_target as u8, buckets)?;
    EngineMetrics::global().persistence_ops.with_label_values(&["load"]).inc();
    tracing::info!(edges = g.raw_entry_count(), "graph snapshot loaded");
    Ok(g)
}

/// Write `v` in a companion vector snapshot format ("TVGV"), not part of
/// the single-graph format spec §6 describes but following the same packed
/// convention: the same header shape as [`save_graph`] minus the two
/// bit-width fields, followed by `(index: u64, weight: f32)` records.
pub fn save_vector<W: Write>(v: &Vector, w: &mut W) -> Result<()> {
    w.write_u32::<LittleEndian>(TAG_VECTOR)?;
    w.write_u32::<LittleEndian>(FORMAT_VERSION)?;
    let persisted_flags = v.flags().difference(ContainerFlags::TRANSIENT);
    w.write_u32::<LittleEndian>(persisted_flags.bits())?;
    let entries: Vec<_> = v.iter().collect();
    w.write_u64::<LittleEndian>(entries.len() as u64)?;
    for e in entries {
        w.write_u64::<LittleEndian>(e.index)?;
        w.write_f32::<LittleEndian>(e.weight)?;
    }
    EngineMetrics::global().persistence_ops.with_label_values(&["save"]).inc();
    tracing::info!("vector snapshot saved");
    Ok(())
}

/// Read a vector written by [`save_vector`].
pub fn load_vector<R: Read>(r: &mut R, eps: f32) -> Result<Vector> {
    let tag = r.read_u32::<LittleEndian>()?;
    if tag != TAG_VECTOR {
        return Err(Error::invalid_argument("not a TVGV vector snapshot"));
    }
    let version = r.read_u32::<LittleEndian>()?;
    if version != FORMAT_VERSION {
        return Err(Error::unsupported(format!("unsupported TVGV version {version}")));
    }
    let flags = ContainerFlags::from_bits_retain(r.read_u32::<LittleEndian>()?);
    let count = r.read_u64::<LittleEndian>()?;

    let mut v = Vector::new(flags, eps)?;
    for _ in 0..count {
        let index = r.read_u64::<LittleEndian>()?;
        let weight = r.read_f32::<LittleEndian>()?;
        v.set(index, weight)?;
    }
    EngineMetrics::global().persistence_ops.with_label_values(&["load"]).inc();
    tracing::info!("vector snapshot loaded");
    Ok(v)
}
