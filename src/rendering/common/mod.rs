/// The shared vertex attribute table, used by mesh layouts and generated shaders alike.
pub mod attributes;
/// basic types (e.g. mesh) to abstract away from both the asset format and the render backend.
pub mod types;
