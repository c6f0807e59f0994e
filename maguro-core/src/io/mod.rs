//! Single-file persistence: the writer and the memory-mapped reader.

mod format;
mod reader;
mod writer;

pub(crate) use reader::MappedIndex;
pub(crate) use writer::save_index;
