//! Serialises a built index to the single-file format.

use std::{fs::File, io::BufWriter, io::Write, path::Path};

use byteorder::{LittleEndian, WriteBytesExt};

use crate::{
    config::{DistanceKind, HnswConfig},
    error::{IndexError, Result},
    hnsw::{EntryPoint, Graph},
    io::format::{Header, align8},
    store::VectorStore,
};

/// Writes `store` and `graph` to `path`, replacing any existing file.
pub(crate) fn save_index(
    path: &Path,
    store: &VectorStore,
    graph: &Graph,
    config: &HnswConfig,
    entry: EntryPoint,
) -> Result<()> {
    let header = Header {
        dim: store.dim(),
        count: store.len(),
        m: degree_cap(config.m())?,
        m0: degree_cap(config.m0())?,
        kind: store.kind(),
        entry_node: entry.node,
        entry_level: entry.level,
        max_level: degree_cap(config.max_level())?,
    };
    let (offsets, adjacency) = encode_adjacency(graph, store.len())?;

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    header.write_to(&mut writer)?;

    for &value in store.raw_data() {
        writer.write_f32::<LittleEndian>(value)?;
    }
    if store.kind() == DistanceKind::Angular {
        for &norm in store.raw_norms() {
            writer.write_f32::<LittleEndian>(norm)?;
        }
    }

    let unpadded = header.norm_offset() + header.norm_block_len();
    writer.write_all(&vec![0_u8; align8(unpadded) - unpadded])?;

    for offset in offsets {
        writer.write_u64::<LittleEndian>(offset)?;
    }
    writer.write_all(&adjacency)?;
    writer.flush()?;
    Ok(())
}

/// Encodes every node's neighbour lists plus the offset table bounding each
/// record; the final offset equals the block length.
fn encode_adjacency(graph: &Graph, count: usize) -> Result<(Vec<u64>, Vec<u8>)> {
    let mut offsets = Vec::with_capacity(count + 1);
    let mut block: Vec<u8> = Vec::new();
    for node in 0..count {
        offsets.push(block.len() as u64);
        let levels: Vec<Vec<usize>> = graph.with_node(node, |inner| {
            (0..=inner.top_level())
                .map(|level| inner.neighbours(level).unwrap_or_default().to_vec())
                .collect()
        })?;
        block.write_u32::<LittleEndian>(narrow(levels.len(), "level count")?)?;
        for list in levels {
            block.write_u32::<LittleEndian>(narrow(list.len(), "neighbour count")?)?;
            for id in list {
                block.write_u32::<LittleEndian>(narrow(id, "neighbour id")?)?;
            }
        }
    }
    offsets.push(block.len() as u64);
    Ok((offsets, block))
}

fn narrow(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| IndexError::GraphInvariantViolation {
        message: format!("{what} {value} exceeds the u32 file format range"),
    })
}

fn degree_cap(value: usize) -> Result<u32> {
    narrow(value, "configuration value")
}
