/// This module handles converting the types from scenestream-files into an intermediate
/// representation, that can then be uploaded through a [`crate::rendering::gpu::GpuDevice`].
/// Importers are pure: they neither fetch nor touch the device.
pub mod mesh_importer;
pub mod texture_importer;
