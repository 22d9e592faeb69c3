/// Components attached to the entities of a loaded level.
pub mod components;
pub mod runtime;

pub use runtime::{LevelSummary, SceneRuntime};
