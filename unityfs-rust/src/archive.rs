use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::io::{Cursor, Read};
use std::ops::Range;

use bitflags::bitflags;
use byteorder::{BigEndian, ReadBytesExt};
use log::{debug, trace};

use crate::compression::{decompress, CompressionType};
use crate::error::ArchiveError;

pub const SIGNATURE: &[u8; 8] = b"UnityFS\0";
pub const SUPPORTED_FORMAT_VERSIONS: [u32; 2] = [6, 7];

/// Size of the fixed header fields.
pub const HEADER_SIZE: u64 = 50;
/// Header size when the block table is aligned to 16 bytes.
pub const ALIGNED_HEADER_SIZE: u64 = 64;

const ENGINE_VERSION_OFFSET: usize = 18;
const ENGINE_VERSION_LENGTH: usize = 12;

/// Starting with this engine release, raw flag bit 0x200 means "block info needs padding"
/// instead of "encrypted".
pub const PADDING_FLAG_CUTOFF: EngineVersion = EngineVersion::new(2019, 4, 0);

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct ArchiveFlags: u32 {
        const COMPRESSION_TYPE_MASK = 0x3F;
        const BLOCKS_AND_DIRECTORY_INFO_COMBINED = 0x40;
        const BLOCKS_INFO_AT_THE_END = 0x80;
        const OLD_WEB_PLUGIN_COMPATIBILITY = 0x100;
        const BLOCK_INFO_NEED_PADDING_AT_START = 0x200;
        const USES_ASSET_BUNDLE_ENCRYPTION = 0x400;
    }
}

impl ArchiveFlags {
    /// Normalizes the raw header flags: before [`PADDING_FLAG_CUTOFF`] the padding bit was the
    /// encryption bit, so it is moved over to [`ArchiveFlags::USES_ASSET_BUNDLE_ENCRYPTION`].
    pub fn from_raw(raw: u32, engine_version: &EngineVersion) -> ArchiveFlags {
        let mut flags = ArchiveFlags::from_bits_retain(raw);
        if *engine_version < PADDING_FLAG_CUTOFF && flags.contains(ArchiveFlags::BLOCK_INFO_NEED_PADDING_AT_START) {
            flags.remove(ArchiveFlags::BLOCK_INFO_NEED_PADDING_AT_START);
            flags.insert(ArchiveFlags::USES_ASSET_BUNDLE_ENCRYPTION);
        }
        flags
    }

    pub fn compression(&self) -> Result<CompressionType, ArchiveError> {
        CompressionType::try_from(self.bits())
    }

    pub fn is_encrypted(&self) -> bool {
        self.contains(ArchiveFlags::USES_ASSET_BUNDLE_ENCRYPTION)
    }
}

/// The `major.minor.patch` triple of the engine that wrote the archive.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct EngineVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl EngineVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// Parses revisions like `2019.4.40f1`. Stripped builds write `0.0.0`.
    pub fn parse(revision: &str) -> Result<Self, ArchiveError> {
        let mut parts = revision.split('.');
        let mut next_number = |required: bool| -> Result<u32, ArchiveError> {
            match parts.next() {
                None if !required => Ok(0),
                None => Err(ArchiveError::FormatError {
                    reason: "engine version is missing components",
                }),
                Some(part) => {
                    let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
                    digits.parse::<u32>().map_err(|_| ArchiveError::FormatError {
                        reason: "engine version component is not numeric",
                    })
                }
            }
        };

        Ok(EngineVersion {
            major: next_number(true)?,
            minor: next_number(true)?,
            patch: next_number(false)?,
        })
    }
}

impl PartialOrd for EngineVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EngineVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
    }
}

impl Display for EngineVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Debug, Clone)]
pub struct BundleHeader {
    pub format_version: u32,
    pub player_version: String,
    pub engine_revision: String,
    pub engine_version: EngineVersion,
    pub total_size: u64,
    pub compressed_blocks_info_size: u32,
    pub uncompressed_blocks_info_size: u32,
    pub flags: ArchiveFlags,
    /// Absolute offset of the (possibly compressed) block table.
    pub blocks_info_offset: u64,
    /// Absolute offset of the first data block.
    pub data_offset: u64,
}

impl BundleHeader {
    /// Parses the fixed header. `buf` has to start at the beginning of the archive and span at
    /// least [`ALIGNED_HEADER_SIZE`] bytes for format version 7.
    pub fn parse(buf: &[u8]) -> Result<BundleHeader, ArchiveError> {
        ensure_len(buf, HEADER_SIZE)?;
        if &buf[0..8] != SIGNATURE {
            return Err(ArchiveError::InvalidSignature(buf[0..8].to_vec()));
        }

        let mut rdr = Cursor::new(buf);
        rdr.set_position(8);
        let format_version = rdr.read_u32::<BigEndian>()?;
        if !SUPPORTED_FORMAT_VERSIONS.contains(&format_version) {
            return Err(ArchiveError::UnsupportedVersion(format_version));
        }

        let player_version = fixed_string(&buf[12..ENGINE_VERSION_OFFSET]);
        let engine_revision = fixed_string(&buf[ENGINE_VERSION_OFFSET..ENGINE_VERSION_OFFSET + ENGINE_VERSION_LENGTH]);
        let engine_version = EngineVersion::parse(&engine_revision)?;

        rdr.set_position((ENGINE_VERSION_OFFSET + ENGINE_VERSION_LENGTH) as u64);
        let total_size = rdr.read_i64::<BigEndian>()? as u64;
        let compressed_blocks_info_size = rdr.read_u32::<BigEndian>()?;
        let uncompressed_blocks_info_size = rdr.read_u32::<BigEndian>()?;
        let flags = ArchiveFlags::from_raw(rdr.read_u32::<BigEndian>()?, &engine_version);

        if flags.is_encrypted() {
            return Err(ArchiveError::Encrypted);
        }

        let header_end = block_table_offset(buf, &engine_version)?;

        let (blocks_info_offset, mut data_offset) = if flags.contains(ArchiveFlags::BLOCKS_INFO_AT_THE_END) {
            (total_size - compressed_blocks_info_size as u64, header_end)
        } else {
            (header_end, header_end + compressed_blocks_info_size as u64)
        };

        if flags.contains(ArchiveFlags::BLOCK_INFO_NEED_PADDING_AT_START) {
            data_offset = align_16(data_offset);
        }

        trace!(
            "UnityFS v{} ({}), block table at {}, data at {}, flags {:?}",
            format_version, engine_revision, blocks_info_offset, data_offset, flags
        );

        Ok(BundleHeader {
            format_version,
            player_version,
            engine_revision,
            engine_version,
            total_size,
            compressed_blocks_info_size,
            uncompressed_blocks_info_size,
            flags,
            blocks_info_offset,
            data_offset,
        })
    }

    pub fn blocks_info_range(&self) -> Range<u64> {
        self.blocks_info_offset..self.blocks_info_offset + self.compressed_blocks_info_size as u64
    }
}

#[derive(Debug, Clone)]
pub struct StorageBlock {
    pub uncompressed_size: u32,
    pub compressed_size: u32,
    pub flags: u16,
    /// Absolute offset of the compressed bytes within the archive.
    pub compressed_offset: u64,
    /// Offset within the concatenated, decompressed data stream.
    pub uncompressed_offset: u64,
}

impl StorageBlock {
    pub fn compression(&self) -> Result<CompressionType, ArchiveError> {
        CompressionType::try_from(self.flags as u32)
    }

    pub fn compressed_range(&self) -> Range<u64> {
        self.compressed_offset..self.compressed_offset + self.compressed_size as u64
    }

    pub fn uncompressed_range(&self) -> Range<u64> {
        self.uncompressed_offset..self.uncompressed_offset + self.uncompressed_size as u64
    }

    pub fn decompress<'a>(&self, compressed: &'a [u8]) -> Result<std::borrow::Cow<'a, [u8]>, ArchiveError> {
        decompress(self.compression()?, compressed, self.uncompressed_size as usize)
    }
}

#[derive(Debug, Clone)]
pub struct DirectoryNode {
    pub offset: u64,
    pub size: u64,
    pub flags: u32,
    pub path: String,
}

impl DirectoryNode {
    /// Streamed payloads (`.resS`, `.resource`) are raw bytes referenced by offset, never
    /// serialized containers themselves.
    pub fn is_resource_blob(&self) -> bool {
        self.path.ends_with(".resS") || self.path.ends_with(".resource")
    }
}

#[derive(Debug, Clone)]
pub struct Bundle {
    pub header: BundleHeader,
    pub blocks: Vec<StorageBlock>,
    pub nodes: Vec<DirectoryNode>,
}

impl Bundle {
    /// Parses a complete archive held in memory.
    pub fn parse(buf: &[u8]) -> Result<Bundle, ArchiveError> {
        let header = BundleHeader::parse(buf)?;
        let range = header.blocks_info_range();
        ensure_len(buf, range.end)?;
        let blocks_info = &buf[range.start as usize..range.end as usize];
        Bundle::from_blocks_info(header, blocks_info)
    }

    /// Builds the bundle from the header and the raw (possibly compressed) block table bytes.
    pub fn from_blocks_info(header: BundleHeader, raw_blocks_info: &[u8]) -> Result<Bundle, ArchiveError> {
        let blocks_info = decompress(
            header.flags.compression()?,
            raw_blocks_info,
            header.uncompressed_blocks_info_size as usize,
        )?;

        let mut rdr = Cursor::new(blocks_info.as_ref());
        let mut _hash = [0u8; 16];
        rdr.read_exact(&mut _hash)?;

        let block_count = rdr.read_i32::<BigEndian>()?;
        let mut blocks = Vec::with_capacity(block_count.max(0) as usize);
        let mut compressed_offset = header.data_offset;
        let mut uncompressed_offset = 0u64;
        for _ in 0..block_count {
            let uncompressed_size = rdr.read_u32::<BigEndian>()?;
            let compressed_size = rdr.read_u32::<BigEndian>()?;
            let flags = rdr.read_u16::<BigEndian>()?;
            blocks.push(StorageBlock {
                uncompressed_size,
                compressed_size,
                flags,
                compressed_offset,
                uncompressed_offset,
            });
            compressed_offset += compressed_size as u64;
            uncompressed_offset += uncompressed_size as u64;
        }

        let node_count = rdr.read_i32::<BigEndian>()?;
        let mut nodes = Vec::with_capacity(node_count.max(0) as usize);
        for _ in 0..node_count {
            let offset = rdr.read_i64::<BigEndian>()? as u64;
            let size = rdr.read_i64::<BigEndian>()? as u64;
            let flags = rdr.read_u32::<BigEndian>()?;
            let path = read_cstring(&mut rdr)?;
            if offset + size > uncompressed_offset {
                return Err(ArchiveError::FormatError {
                    reason: "directory node exceeds the data stream",
                });
            }
            nodes.push(DirectoryNode {
                offset,
                size,
                flags,
                path,
            });
        }

        debug!(
            "UnityFS archive with {} blocks ({} bytes) and {} nodes",
            blocks.len(),
            uncompressed_offset,
            nodes.len()
        );

        Ok(Bundle { header, blocks, nodes })
    }

    pub fn node(&self, path: &str) -> Option<&DirectoryNode> {
        self.nodes.iter().find(|node| node.path == path)
    }

    /// Nodes that hold serialized containers, i.e. everything but the raw payload blobs.
    pub fn containers(&self) -> impl Iterator<Item = &DirectoryNode> {
        self.nodes.iter().filter(|node| !node.is_resource_blob())
    }

    /// Total size of the decompressed data stream.
    pub fn data_size(&self) -> u64 {
        self.blocks
            .last()
            .map(|block| block.uncompressed_range().end)
            .unwrap_or(0)
    }

    /// Indices of the blocks overlapping `offset..offset + size` of the decompressed stream.
    pub fn blocks_for_range(&self, offset: u64, size: u64) -> Range<usize> {
        let end = offset + size;
        let first = self
            .blocks
            .partition_point(|block| block.uncompressed_range().end <= offset);
        if size == 0 {
            return first..first;
        }
        let last = self
            .blocks
            .partition_point(|block| block.uncompressed_offset < end);
        first..last.max(first)
    }

    /// Absolute archive byte span covering the compressed bytes of the given blocks.
    pub fn compressed_span(&self, blocks: Range<usize>) -> Range<u64> {
        match (self.blocks.get(blocks.start), blocks.end.checked_sub(1).and_then(|i| self.blocks.get(i))) {
            (Some(first), Some(last)) if !blocks.is_empty() => first.compressed_offset..last.compressed_range().end,
            _ => 0..0,
        }
    }

    /// Copies `offset..offset + size` of the decompressed stream out of the given blocks.
    /// `compressed` holds the archive bytes of [`Bundle::compressed_span`] for `blocks`.
    pub fn assemble_range(
        &self,
        blocks: Range<usize>,
        compressed: &[u8],
        offset: u64,
        size: u64,
    ) -> Result<Vec<u8>, ArchiveError> {
        let span = self.compressed_span(blocks.clone());
        ensure_len(compressed, span.end - span.start)?;

        let mut output = Vec::with_capacity(size as usize);
        for block in &self.blocks[blocks] {
            let local = (block.compressed_offset - span.start) as usize;
            let data = block.decompress(&compressed[local..local + block.compressed_size as usize])?;
            copy_overlap(block, &data, offset, size, &mut output);
        }

        if output.len() as u64 != size {
            return Err(ArchiveError::Truncated {
                needed: size,
                available: output.len() as u64,
            });
        }
        Ok(output)
    }

    /// Reads a byte range of the decompressed stream out of a fully loaded archive.
    pub fn read_range(&self, buf: &[u8], offset: u64, size: u64) -> Result<Vec<u8>, ArchiveError> {
        let blocks = self.blocks_for_range(offset, size);
        let span = self.compressed_span(blocks.clone());
        ensure_len(buf, span.end)?;
        self.assemble_range(blocks, &buf[span.start as usize..span.end as usize], offset, size)
    }

    pub fn read_node(&self, buf: &[u8], node: &DirectoryNode) -> Result<Vec<u8>, ArchiveError> {
        self.read_range(buf, node.offset, node.size)
    }
}

/// Appends the part of `data` (the decompressed contents of `block`) that overlaps the
/// requested stream range.
pub fn copy_overlap(block: &StorageBlock, data: &[u8], offset: u64, size: u64, output: &mut Vec<u8>) {
    let block_range = block.uncompressed_range();
    let start = offset.max(block_range.start);
    let end = (offset + size).min(block_range.end);
    if start < end {
        output.extend_from_slice(&data[(start - block_range.start) as usize..(end - block_range.start) as usize]);
    }
}

/// Where the block table starts when it follows the header. Engines from
/// [`PADDING_FLAG_CUTOFF`] on may place it at [`ALIGNED_HEADER_SIZE`], which is preferred unless
/// every byte of the 50..64 gap is zero; a zeroed gap is read as the start of the table itself.
/// This is a heuristic: a zero padded table at 64 or a table at 50 that begins with non-zero bytes
/// is located wrongly.
pub fn block_table_offset(buf: &[u8], engine_version: &EngineVersion) -> Result<u64, ArchiveError> {
    if *engine_version < PADDING_FLAG_CUTOFF {
        return Ok(HEADER_SIZE);
    }

    ensure_len(buf, ALIGNED_HEADER_SIZE)?;
    let gap = &buf[HEADER_SIZE as usize..ALIGNED_HEADER_SIZE as usize];
    if gap.iter().all(|byte| *byte == 0) {
        Ok(HEADER_SIZE)
    } else {
        Ok(ALIGNED_HEADER_SIZE)
    }
}

fn ensure_len(buf: &[u8], needed: u64) -> Result<(), ArchiveError> {
    if (buf.len() as u64) < needed {
        return Err(ArchiveError::Truncated {
            needed,
            available: buf.len() as u64,
        });
    }
    Ok(())
}

fn fixed_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

fn read_cstring<R: Read>(rdr: &mut R) -> Result<String, ArchiveError> {
    let mut buf = Vec::new();
    loop {
        let c = rdr.read_u8()?;
        if c == 0 {
            return String::from_utf8(buf).map_err(|_| ArchiveError::FormatError {
                reason: "node path is not valid UTF-8",
            });
        }
        buf.push(c);
    }
}

fn align_16(offset: u64) -> u64 {
    (offset + 15) & !15
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_bit_is_encryption_before_cutoff() {
        let flags = ArchiveFlags::from_raw(0x200 | 0x43, &EngineVersion::new(2019, 3, 0));
        assert!(flags.is_encrypted());
        assert!(!flags.contains(ArchiveFlags::BLOCK_INFO_NEED_PADDING_AT_START));
    }

    #[test]
    fn padding_bit_is_alignment_from_cutoff() {
        let flags = ArchiveFlags::from_raw(0x200 | 0x43, &EngineVersion::new(2019, 4, 0));
        assert!(!flags.is_encrypted());
        assert!(flags.contains(ArchiveFlags::BLOCK_INFO_NEED_PADDING_AT_START));
    }

    #[test]
    fn engine_versions_parse_and_order() -> Result<(), ArchiveError> {
        assert_eq!(EngineVersion::parse("2019.4.40f1")?, EngineVersion::new(2019, 4, 40));
        assert_eq!(EngineVersion::parse("0.0.0")?, EngineVersion::new(0, 0, 0));
        assert_eq!(EngineVersion::parse("5.6")?, EngineVersion::new(5, 6, 0));
        assert!(EngineVersion::new(2019, 3, 15) < PADDING_FLAG_CUTOFF);
        assert!(EngineVersion::new(2020, 1, 0) > PADDING_FLAG_CUTOFF);
        assert!(EngineVersion::parse("abc").is_err());
        Ok(())
    }
}
