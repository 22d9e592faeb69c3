use thiserror::Error;

use crate::compression::CompressionType;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArchiveError {
    #[error("Not a UnityFS archive (signature {0:?})")]
    InvalidSignature(Vec<u8>),

    #[error("Unsupported UnityFS format version {0}")]
    UnsupportedVersion(u32),

    #[error("Encrypted archives are not supported")]
    Encrypted,

    #[error("Compression {0:?} is not supported")]
    UnsupportedCompression(CompressionType),

    #[error("Unknown compression tag {0}")]
    UnknownCompression(u32),

    #[error("Decompression failed: {0}")]
    Decompression(String),

    #[error("Decompressed to {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("The archive is violating the expected format, because: {reason}")]
    FormatError { reason: &'static str },

    #[error("Need at least {needed} bytes, got {available}")]
    Truncated { needed: u64, available: u64 },

    #[error("Unknown archive node {0}")]
    UnknownNode(String),
}

impl From<std::io::Error> for ArchiveError {
    fn from(value: std::io::Error) -> Self {
        // All reads happen on in-memory cursors, so the only possible failure is running out of bytes.
        ArchiveError::FormatError {
            reason: match value.kind() {
                std::io::ErrorKind::UnexpectedEof => "unexpected end of data",
                _ => "read error",
            },
        }
    }
}
