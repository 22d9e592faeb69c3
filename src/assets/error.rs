use std::sync::Arc;

use scenestream_files::ParserError;
use thiserror::Error;
use unityfs::ArchiveError;

/// Every failure of the resolution layer. It is `Clone` so one failed load can be handed to all
/// callers waiting on the same shared future.
#[derive(Error, Debug, Clone)]
pub enum AssetError {
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// A bug in the pipeline rather than in the input, e.g. a coalesced fetch not covering one of
    /// its requests.
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Parser(Arc<ParserError>),

    #[error("Fetching {path} failed: {reason}")]
    Fetch { path: String, reason: String },

    #[error("{container} has no external file with index {file_id}")]
    MissingExternal { container: String, file_id: i32 },

    #[error("Range request was dropped before it was resolved")]
    PendingRequestDropped,

    #[error("{0} has already been destroyed")]
    Destroyed(String),
}

impl From<ParserError> for AssetError {
    fn from(value: ParserError) -> Self {
        AssetError::Parser(Arc::new(value))
    }
}

impl AssetError {
    /// Unsupported features surface from all layers, this folds them into one check.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            AssetError::Unsupported(_)
                | AssetError::Archive(ArchiveError::Encrypted)
                | AssetError::Archive(ArchiveError::UnsupportedCompression(_))
        )
    }
}
