pub mod asset_file;
pub mod error;
pub mod object_cache;
pub mod resolver;
pub mod resource;

pub use asset_file::{AssetFile, AssetFileState, LoadMode};
pub use error::AssetError;
pub use resolver::AssetManager;
pub use resource::{Resource, ResourceKind, ResourceResult};
