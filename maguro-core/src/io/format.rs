//! On-disk layout shared by the writer and the memory-mapped reader.
//!
//! A saved index is a single little-endian file:
//!
//! ```text
//! header        48 bytes (magic, version, geometry, entry point)
//! vectors       count * dim * 4 bytes of f32
//! norms         count * 4 bytes of f32, angular metric only
//! padding       zero bytes up to the next 8-byte boundary
//! offset table  (count + 1) u64 byte offsets into the adjacency block
//! adjacency     per node: u32 level count, then per level a u32 neighbour
//!               count followed by that many u32 ids
//! ```
//!
//! Offsets in the table are relative to the adjacency block; the final entry
//! equals the block length so every record is bounded by two table entries.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::{
    config::DistanceKind,
    error::{IndexError, Result},
};

pub(crate) const MAGIC: [u8; 4] = *b"MGRO";
pub(crate) const VERSION: u32 = 1;
pub(crate) const HEADER_LEN: usize = 48;

/// Parsed file header.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Header {
    pub(crate) dim: usize,
    pub(crate) count: usize,
    pub(crate) m: u32,
    pub(crate) m0: u32,
    pub(crate) kind: DistanceKind,
    pub(crate) entry_node: usize,
    pub(crate) entry_level: usize,
    pub(crate) max_level: u32,
}

impl Header {
    pub(crate) fn write_to(&self, writer: &mut impl Write) -> io::Result<()> {
        writer.write_all(&MAGIC)?;
        writer.write_u32::<LittleEndian>(VERSION)?;
        writer.write_u32::<LittleEndian>(self.dim as u32)?;
        writer.write_u64::<LittleEndian>(self.count as u64)?;
        writer.write_u32::<LittleEndian>(self.m)?;
        writer.write_u32::<LittleEndian>(self.m0)?;
        writer.write_u8(self.kind.tag())?;
        writer.write_all(&[0_u8; 3])?;
        writer.write_u64::<LittleEndian>(self.entry_node as u64)?;
        writer.write_u32::<LittleEndian>(self.entry_level as u32)?;
        writer.write_u32::<LittleEndian>(self.max_level)?;
        Ok(())
    }

    /// Parses and validates the fixed-size header at the start of `bytes`.
    ///
    /// # Errors
    /// Returns [`IndexError::Corrupt`] for a short buffer, bad magic,
    /// unsupported version, unknown metric tag, or impossible geometry.
    pub(crate) fn parse(bytes: &[u8]) -> Result<Self> {
        let Some(mut cursor) = bytes.get(..HEADER_LEN) else {
            return Err(corrupt("file shorter than the fixed header"));
        };

        let mut magic = [0_u8; 4];
        cursor.read_exact(&mut magic).map_err(IndexError::from)?;
        if magic != MAGIC {
            return Err(corrupt("bad magic bytes"));
        }
        let version = cursor.read_u32::<LittleEndian>()?;
        if version != VERSION {
            return Err(corrupt(format!("unsupported format version {version}")));
        }
        let dim = cursor.read_u32::<LittleEndian>()? as usize;
        let count = usize::try_from(cursor.read_u64::<LittleEndian>()?)
            .map_err(|_| corrupt("vector count exceeds the address space"))?;
        let m = cursor.read_u32::<LittleEndian>()?;
        let m0 = cursor.read_u32::<LittleEndian>()?;
        let tag = cursor.read_u8()?;
        let mut pad = [0_u8; 3];
        cursor.read_exact(&mut pad).map_err(IndexError::from)?;
        let kind = DistanceKind::from_tag(tag)
            .ok_or_else(|| corrupt(format!("unknown metric tag {tag}")))?;
        let entry_node = usize::try_from(cursor.read_u64::<LittleEndian>()?)
            .map_err(|_| corrupt("entry node exceeds the address space"))?;
        let entry_level = cursor.read_u32::<LittleEndian>()? as usize;
        let max_level = cursor.read_u32::<LittleEndian>()?;

        if dim == 0 || count == 0 {
            return Err(corrupt("zero dimension or vector count"));
        }
        if m == 0 || m0 == 0 {
            return Err(corrupt("zero degree cap"));
        }
        if entry_node >= count {
            return Err(corrupt(format!(
                "entry node {entry_node} out of range for {count} vectors"
            )));
        }
        // Neighbour ids are stored as u32, so larger counts cannot round-trip.
        if count > u32::MAX as usize {
            return Err(corrupt("vector count exceeds the u32 id range"));
        }
        if count
            .checked_mul(dim)
            .and_then(|cells| cells.checked_mul(size_of::<f32>()))
            .is_none()
        {
            return Err(corrupt("vector block size overflows the address space"));
        }

        Ok(Self {
            dim,
            count,
            m,
            m0,
            kind,
            entry_node,
            entry_level,
            max_level,
        })
    }

    pub(crate) fn vector_block_len(&self) -> usize {
        self.count * self.dim * size_of::<f32>()
    }

    pub(crate) fn norm_block_len(&self) -> usize {
        if self.kind == DistanceKind::Angular {
            self.count * size_of::<f32>()
        } else {
            0
        }
    }

    pub(crate) fn vector_offset(&self) -> usize {
        HEADER_LEN
    }

    pub(crate) fn norm_offset(&self) -> usize {
        self.vector_offset() + self.vector_block_len()
    }

    pub(crate) fn table_offset(&self) -> usize {
        align8(self.norm_offset() + self.norm_block_len())
    }

    pub(crate) fn adjacency_offset(&self) -> usize {
        self.table_offset() + (self.count + 1) * size_of::<u64>()
    }
}

pub(crate) fn align8(offset: usize) -> usize {
    offset.next_multiple_of(8)
}

pub(crate) fn corrupt(reason: impl Into<String>) -> IndexError {
    IndexError::Corrupt {
        reason: reason.into(),
    }
}
