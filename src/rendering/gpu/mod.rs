//! The seam to the graphics backend. Everything above it only deals in opaque handles, so the
//! pipeline can run against a real renderer or the [`headless::HeadlessDevice`].

use crate::rendering::common::types::{GpuTextureFormat, VertexLayout};

pub mod headless;

macro_rules! gpu_handle {
    ($name:ident) => {
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);
    };
}

gpu_handle!(BufferHandle);
gpu_handle!(TextureHandle);
gpu_handle!(InputLayoutHandle);
gpu_handle!(SamplerHandle);
gpu_handle!(ProgramHandle);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BufferUsage {
    Vertex,
    Index,
    Uniform,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureDescriptor {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub mip_count: u32,
    pub format: GpuTextureFormat,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum AddressMode {
    #[default]
    Repeat,
    ClampToEdge,
    MirrorRepeat,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct SamplerDescriptor {
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub mip_filter: FilterMode,
    pub address_u: AddressMode,
    pub address_v: AddressMode,
    pub anisotropy: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramDescriptor {
    pub label: String,
    pub source: String,
}

/// Creation is infallible from the caller's point of view, a backend that cannot create an
/// object is expected to hand out a placeholder and report the problem itself.
pub trait GpuDevice: Send + Sync {
    fn create_buffer(&self, label: &str, usage: BufferUsage, contents: &[u8]) -> BufferHandle;
    fn destroy_buffer(&self, handle: BufferHandle);

    fn create_texture(&self, descriptor: &TextureDescriptor) -> TextureHandle;
    fn upload_texture_level(&self, handle: TextureHandle, level: u32, data: &[u8]);
    fn destroy_texture(&self, handle: TextureHandle);

    fn create_input_layout(&self, layout: &VertexLayout) -> InputLayoutHandle;
    fn destroy_input_layout(&self, handle: InputLayoutHandle);

    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> SamplerHandle;
    fn destroy_sampler(&self, handle: SamplerHandle);

    fn create_program(&self, descriptor: &ProgramDescriptor) -> ProgramHandle;
    fn destroy_program(&self, handle: ProgramHandle);
}
