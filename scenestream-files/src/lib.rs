use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParserError {
    #[error("The file is violating the expected format, because: {reason}")]
    FormatError { reason: &'static str },

    #[error("Serialized file version {version} is not supported")]
    UnsupportedFileVersion { version: u32 },

    #[error("Object references type index {type_id}, which is not part of the type table")]
    MissingType { type_id: i32 },

    #[error("Object {path_id} lies outside of the declared file size")]
    ObjectOutOfBounds { path_id: i64 },

    #[error("Malformed engine version string {0:?}")]
    InvalidVersionString(String),

    /// Represents an empty source, e.g. a zero sized object.
    #[error("Source contains no data")]
    EmptySource,

    /// Represents all other cases of `std::io::Error`.
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    UTF8ConversationError(#[from] std::string::FromUtf8Error),
}

pub mod common;
#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
pub mod material;
pub mod mesh;
pub mod scene;
pub mod serialized;
pub mod shader;
pub mod texture;
