use std::borrow::Cow;
use std::io::Cursor;

use crate::error::ArchiveError;

/// The codec tag stored in the low 6 bits of the archive and block flags.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CompressionType {
    None,
    Lzma,
    Lz4,
    Lz4Hc,
    Lzham,
}

pub const COMPRESSION_TYPE_MASK: u32 = 0x3F;

impl TryFrom<u32> for CompressionType {
    type Error = ArchiveError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value & COMPRESSION_TYPE_MASK {
            0 => Ok(CompressionType::None),
            1 => Ok(CompressionType::Lzma),
            2 => Ok(CompressionType::Lz4),
            3 => Ok(CompressionType::Lz4Hc),
            4 => Ok(CompressionType::Lzham),
            other => Err(ArchiveError::UnknownCompression(other)),
        }
    }
}

impl From<CompressionType> for u32 {
    fn from(value: CompressionType) -> Self {
        match value {
            CompressionType::None => 0,
            CompressionType::Lzma => 1,
            CompressionType::Lz4 => 2,
            CompressionType::Lz4Hc => 3,
            CompressionType::Lzham => 4,
        }
    }
}

/// Decompresses `input` into exactly `expected_size` bytes.
///
/// Uncompressed input is handed back borrowed, so callers only pay for a copy when they
/// actually need owned data. The expected size is always known up front from the block table.
pub fn decompress(kind: CompressionType, input: &[u8], expected_size: usize) -> Result<Cow<'_, [u8]>, ArchiveError> {
    profiling::scope!("unityfs::decompress");

    let output = match kind {
        CompressionType::Lzham => return Err(ArchiveError::UnsupportedCompression(kind)),
        CompressionType::None => Cow::Borrowed(input),
        // an empty block has no compressed stream to decode
        _ if expected_size == 0 => Cow::Owned(Vec::new()),
        CompressionType::Lzma => Cow::Owned(decompress_lzma(input, expected_size)?),
        CompressionType::Lz4 | CompressionType::Lz4Hc => Cow::Owned(
            lz4_flex::block::decompress(input, expected_size)
                .map_err(|err| ArchiveError::Decompression(err.to_string()))?,
        ),
    };

    if output.len() != expected_size {
        return Err(ArchiveError::SizeMismatch {
            expected: expected_size,
            actual: output.len(),
        });
    }

    Ok(output)
}

// Unity stores raw LZMA1 streams: the 5 property bytes without the usual 8 byte size field.
fn decompress_lzma(input: &[u8], expected_size: usize) -> Result<Vec<u8>, ArchiveError> {
    let mut output = Vec::with_capacity(expected_size);
    let options = lzma_rs::decompress::Options {
        unpacked_size: lzma_rs::decompress::UnpackedSize::UseProvided(Some(expected_size as u64)),
        ..Default::default()
    };

    lzma_rs::lzma_decompress_with_options(&mut Cursor::new(input), &mut output, &options)
        .map_err(|err| ArchiveError::Decompression(err.to_string()))?;
    Ok(output)
}
