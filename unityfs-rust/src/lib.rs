//! A library for reading UnityFS asset bundle archives

mod archive;
mod compression;
mod error;

pub use crate::archive::{
    block_table_offset, copy_overlap, ArchiveFlags, Bundle, BundleHeader, DirectoryNode, EngineVersion, StorageBlock, ALIGNED_HEADER_SIZE,
    HEADER_SIZE, PADDING_FLAG_CUTOFF, SIGNATURE, SUPPORTED_FORMAT_VERSIONS,
};
pub use crate::compression::{decompress, CompressionType, COMPRESSION_TYPE_MASK};
pub use crate::error::ArchiveError;
