/// Contrasting to the importers, that convert already parsed objects into our rendering IR,
/// Loaders are a lot more high level. They call the parsers, fetch streamed payloads, pipe the
/// result into importers and create the GPU objects.
pub mod material_loader;
pub mod mesh_loader;
pub mod shader_loader;
pub mod texture_loader;
