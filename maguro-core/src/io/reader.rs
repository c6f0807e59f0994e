//! Memory-mapped read path.
//!
//! Opening an index maps the file and validates the header, offset table and
//! vector-block alignment once; adjacency records are bounds-checked lazily
//! as traversal touches them, so opening stays O(count) regardless of how
//! many edges the graph holds.

use std::{fs::File, path::Path};

use byteorder::{ByteOrder, LittleEndian};
use memmap2::Mmap;

use crate::{
    config::DistanceKind,
    error::Result,
    hnsw::{EntryPoint, NeighbourSource},
    io::format::{Header, corrupt},
};

pub(crate) struct MappedIndex {
    mmap: Mmap,
    header: Header,
}

impl std::fmt::Debug for MappedIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedIndex")
            .field("header", &self.header)
            .field("bytes", &self.mmap.len())
            .finish()
    }
}

impl MappedIndex {
    /// Maps `path` and validates the fixed structure.
    ///
    /// # Errors
    /// Returns [`crate::IndexError::Io`] when the file cannot be opened or
    /// mapped and [`crate::IndexError::Corrupt`] when its structure is
    /// inconsistent.
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        // Safety: the map is read-only; mutating the file while the index is
        // open is outside the supported contract.
        let mmap = unsafe { Mmap::map(&file)? };
        let header = Header::parse(&mmap)?;
        let index = Self { mmap, header };
        index.validate()?;
        Ok(index)
    }

    fn validate(&self) -> Result<()> {
        let adjacency_offset = self.header.adjacency_offset();
        if self.mmap.len() < adjacency_offset {
            return Err(corrupt("file truncated before the adjacency block"));
        }
        let adjacency_len = (self.mmap.len() - adjacency_offset) as u64;
        let mut previous = 0_u64;
        for entry in 0..=self.header.count {
            let offset = self.table_entry(entry);
            if offset < previous {
                return Err(corrupt("offset table is not monotonic"));
            }
            previous = offset;
        }
        if previous != adjacency_len {
            return Err(corrupt("offset table does not span the adjacency block"));
        }
        let block = &self.mmap[self.header.vector_offset()..self.header.norm_offset()];
        // Safety: reinterpreting raw little-endian bytes as f32 on a
        // little-endian target; the emptiness check rejects misalignment.
        let (prefix, _, suffix) = unsafe { block.align_to::<f32>() };
        if !prefix.is_empty() || !suffix.is_empty() {
            return Err(corrupt("vector block is not aligned for f32 access"));
        }
        Ok(())
    }

    pub(crate) fn dim(&self) -> usize {
        self.header.dim
    }

    pub(crate) fn count(&self) -> usize {
        self.header.count
    }

    pub(crate) fn kind(&self) -> DistanceKind {
        self.header.kind
    }

    pub(crate) fn entry(&self) -> EntryPoint {
        EntryPoint {
            node: self.header.entry_node,
            level: self.header.entry_level,
        }
    }

    /// Raw file bytes, used to copy a mapped index to a new path.
    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.mmap
    }

    /// Zero-copy view of one stored vector. Alignment was validated at open.
    pub(crate) fn vector(&self, id: usize) -> &[f32] {
        let block = &self.mmap[self.header.vector_offset()..self.header.norm_offset()];
        // Safety: alignment checked in `validate`.
        let (_, floats, _) = unsafe { block.align_to::<f32>() };
        let start = id * self.header.dim;
        &floats[start..start + self.header.dim]
    }

    /// Cached L2 norm for angular indexes; zero for metrics without a norm
    /// block, which never consult it.
    pub(crate) fn norm(&self, id: usize) -> f32 {
        if self.header.kind == DistanceKind::Angular {
            let offset = self.header.norm_offset() + id * size_of::<f32>();
            LittleEndian::read_f32(&self.mmap[offset..offset + size_of::<f32>()])
        } else {
            0.0
        }
    }

    pub(crate) fn node_level(&self, node: usize) -> Result<usize> {
        let mut record = self.record(node)?;
        let levels = take_u32(&mut record)? as usize;
        if levels == 0 {
            return Err(corrupt(format!("node {node} has no layers")));
        }
        Ok(levels - 1)
    }

    fn table_entry(&self, index: usize) -> u64 {
        let offset = self.header.table_offset() + index * size_of::<u64>();
        LittleEndian::read_u64(&self.mmap[offset..offset + size_of::<u64>()])
    }

    fn record(&self, node: usize) -> Result<&[u8]> {
        if node >= self.header.count {
            return Err(corrupt(format!(
                "node {node} out of range for {} vectors",
                self.header.count
            )));
        }
        let base = self.header.adjacency_offset();
        let start = base + self.table_entry(node) as usize;
        let end = base + self.table_entry(node + 1) as usize;
        Ok(&self.mmap[start..end])
    }
}

impl NeighbourSource for MappedIndex {
    fn copy_neighbours(&self, node: usize, level: usize, out: &mut Vec<usize>) -> Result<()> {
        out.clear();
        let mut record = self.record(node)?;
        let level_count = take_u32(&mut record)? as usize;
        if level >= level_count {
            return Err(corrupt(format!(
                "node {node} visited at absent layer {level}"
            )));
        }
        for current in 0..=level {
            let len = take_u32(&mut record)? as usize;
            if current < level {
                skip(&mut record, len * size_of::<u32>())?;
                continue;
            }
            out.reserve(len);
            for _ in 0..len {
                let id = take_u32(&mut record)? as usize;
                if id >= self.header.count {
                    return Err(corrupt(format!(
                        "node {node} links to out-of-range id {id}"
                    )));
                }
                out.push(id);
            }
        }
        Ok(())
    }
}

fn take_u32(bytes: &mut &[u8]) -> Result<u32> {
    let Some((head, tail)) = bytes.split_at_checked(size_of::<u32>()) else {
        return Err(corrupt("adjacency record truncated"));
    };
    *bytes = tail;
    Ok(LittleEndian::read_u32(head))
}

fn skip(bytes: &mut &[u8], len: usize) -> Result<()> {
    let Some(tail) = bytes.get(len..) else {
        return Err(corrupt("adjacency record truncated"));
    };
    *bytes = tail;
    Ok(())
}
