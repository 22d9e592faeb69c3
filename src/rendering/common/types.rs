use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use glam::{Vec2, Vec3, Vec4};
use scenestream_files::mesh::types::VertexFormat;
use scenestream_files::shader::types::{SerializedPropertyType, SerializedShaderFloatValue};

use crate::rendering::common::attributes::VertexSemantic;
use crate::rendering::gpu::{BufferHandle, GpuDevice, InputLayoutHandle, SamplerHandle, TextureHandle};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VertexAttribute {
    pub semantic: VertexSemantic,
    /// Shader location, taken from the attribute table.
    pub location: u32,
    pub format: VertexFormat,
    pub components: u8,
    /// Offset within one vertex of the stream.
    pub offset: u32,
}

impl VertexAttribute {
    pub fn byte_size(&self) -> u32 {
        self.format.byte_size() as u32 * self.components as u32
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamLayout {
    pub stride: u32,
    pub attributes: Vec<VertexAttribute>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VertexLayout {
    pub streams: Vec<StreamLayout>,
}

impl VertexLayout {
    pub fn attribute(&self, semantic: VertexSemantic) -> Option<&VertexAttribute> {
        self.streams
            .iter()
            .flat_map(|stream| stream.attributes.iter())
            .find(|attribute| attribute.semantic == semantic)
    }

    pub fn semantics(&self) -> Vec<VertexSemantic> {
        let mut semantics = self
            .streams
            .iter()
            .flat_map(|stream| stream.attributes.iter().map(|attribute| attribute.semantic))
            .collect::<Vec<_>>();
        semantics.sort();
        semantics
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SubMeshRange {
    pub first_index: u32,
    pub index_count: u32,
    pub base_vertex: u32,
}

/// A mesh in the layout it will be uploaded in: one byte buffer per vertex stream, described by
/// `layout`, and 32 bit indices.
#[derive(Clone)]
pub struct Mesh {
    pub vertex_count: u32,
    pub layout: VertexLayout,
    pub streams: Vec<Vec<u8>>,
    pub index_buffer: Vec<u32>,
    pub sub_meshes: Vec<SubMeshRange>,
    pub bounds_center: Vec3,
    pub bounds_extent: Vec3,
}

impl Debug for Mesh {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{ vertex_count: {}, ", self.vertex_count)?;
        write!(f, "layout: {:?}, ", self.layout)?;
        write!(f, "streams: [{}], ", self.streams.len())?;
        write!(f, "index_buffer: [{}], ", self.index_buffer.len())?;
        write!(f, "sub_meshes: {:?} }}", self.sub_meshes)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum GpuTextureFormat {
    R8Unorm,
    R16Unorm,
    R16Float,
    Rg16Float,
    Rgba16Float,
    R32Float,
    Rg32Float,
    Rgba32Float,
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Bc1RgbaUnorm,
    Bc1RgbaUnormSrgb,
    Bc3RgbaUnorm,
    Bc3RgbaUnormSrgb,
    Bc4RUnorm,
    Bc5RgUnorm,
    Bc6hRgbUfloat,
    Bc7RgbaUnorm,
    Bc7RgbaUnormSrgb,
}

impl GpuTextureFormat {
    /// Bytes per 4x4 block for block compressed formats.
    pub fn block_size(&self) -> Option<usize> {
        match self {
            GpuTextureFormat::Bc1RgbaUnorm | GpuTextureFormat::Bc1RgbaUnormSrgb | GpuTextureFormat::Bc4RUnorm => {
                Some(8)
            }
            GpuTextureFormat::Bc3RgbaUnorm
            | GpuTextureFormat::Bc3RgbaUnormSrgb
            | GpuTextureFormat::Bc5RgUnorm
            | GpuTextureFormat::Bc6hRgbUfloat
            | GpuTextureFormat::Bc7RgbaUnorm
            | GpuTextureFormat::Bc7RgbaUnormSrgb => Some(16),
            _ => None,
        }
    }

    /// Bytes per pixel of uncompressed formats.
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            GpuTextureFormat::R8Unorm => 1,
            GpuTextureFormat::R16Unorm | GpuTextureFormat::R16Float => 2,
            GpuTextureFormat::Rg16Float
            | GpuTextureFormat::R32Float
            | GpuTextureFormat::Rgba8Unorm
            | GpuTextureFormat::Rgba8UnormSrgb
            | GpuTextureFormat::Bgra8Unorm
            | GpuTextureFormat::Bgra8UnormSrgb => 4,
            GpuTextureFormat::Rgba16Float | GpuTextureFormat::Rg32Float => 8,
            GpuTextureFormat::Rgba32Float => 16,
            _ => 0,
        }
    }

    /// Byte size of one mip level. Block compressed levels are padded to whole 4x4 blocks.
    pub fn level_size(&self, width: u32, height: u32) -> usize {
        let (width, height) = (width.max(1) as usize, height.max(1) as usize);
        match self.block_size() {
            Some(block_size) => width.div_ceil(4) * height.div_ceil(4) * block_size,
            None => width * height * self.bytes_per_pixel(),
        }
    }
}

/// Dimensions of mip `level` of a `width` x `height` texture.
pub fn mip_dimensions(width: u32, height: u32, level: u32) -> (u32, u32) {
    ((width >> level).max(1), (height >> level).max(1))
}

pub struct MeshResource {
    pub name: String,
    pub mesh: Mesh,
    pub layout: InputLayoutHandle,
    pub vertex_buffers: Vec<BufferHandle>,
    pub index_buffer: BufferHandle,
}

impl MeshResource {
    pub fn release(&self, device: &dyn GpuDevice) {
        for buffer in &self.vertex_buffers {
            device.destroy_buffer(*buffer);
        }
        device.destroy_buffer(self.index_buffer);
        device.destroy_input_layout(self.layout);
    }
}

impl Debug for MeshResource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "MeshResource {{ name: {:?}, mesh: {:?} }}", self.name, self.mesh)
    }
}

#[derive(Debug)]
pub struct TextureResource {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub mip_count: u32,
    pub format: GpuTextureFormat,
    /// False for textures created without uploading their payload (unsupported encodings).
    pub has_data: bool,
    pub texture: TextureHandle,
    pub sampler: SamplerHandle,
}

impl TextureResource {
    pub fn release(&self, device: &dyn GpuDevice) {
        device.destroy_texture(self.texture);
        device.destroy_sampler(self.sampler);
    }
}

#[derive(Debug, Clone)]
pub struct MaterialTexture {
    pub name: String,
    pub texture: Option<Arc<TextureResource>>,
    pub scale: Vec2,
    pub offset: Vec2,
}

impl MaterialTexture {
    /// The `_ST` vector the engine derives for every texture property.
    pub fn st(&self) -> Vec4 {
        Vec4::new(self.scale.x, self.scale.y, self.offset.x, self.offset.y)
    }
}

/// A decoded material: everything the material engine needs, with textures already resolved.
#[derive(Debug, Clone, Default)]
pub struct MaterialResource {
    pub name: String,
    pub shader_name: Option<String>,
    pub keywords: Vec<String>,
    pub tags: Vec<(String, String)>,
    pub custom_render_queue: i32,
    pub textures: Vec<MaterialTexture>,
    pub floats: Vec<(String, f32)>,
    pub ints: Vec<(String, i32)>,
    pub colors: Vec<(String, Vec4)>,
    /// State of the shader's main pass, if the shader was resolved and has one.
    pub pass_state: Option<PassState>,
}

impl MaterialResource {
    pub fn float(&self, name: &str) -> Option<f32> {
        self.floats
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| *value)
    }

    pub fn color(&self, name: &str) -> Option<Vec4> {
        self.colors
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| *value)
    }

    pub fn texture(&self, name: &str) -> Option<&MaterialTexture> {
        self.textures.iter().find(|texture| texture.name == name)
    }

    /// True if `name` is declared and actually points at a loaded texture.
    pub fn has_texture(&self, name: &str) -> bool {
        self.texture(name)
            .map(|texture| texture.texture.is_some())
            .unwrap_or(false)
    }

    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_keyword(&self, keyword: &str) -> bool {
        self.keywords.iter().any(|k| k == keyword)
    }
}

#[derive(Debug, Clone)]
pub struct ShaderProperty {
    pub name: String,
    pub description: String,
    pub kind: Option<SerializedPropertyType>,
    pub flags: u32,
    pub default_value: Vec4,
    pub default_texture: String,
}

/// A fixed function value of a shader pass. A material float named by `property` overrides the
/// literal `value`.
#[derive(Debug, Clone, PartialEq)]
pub struct StateValue {
    pub value: f32,
    pub property: Option<String>,
}

impl StateValue {
    pub fn literal(value: f32) -> Self {
        StateValue { value, property: None }
    }

    pub fn bound(property: &str, value: f32) -> Self {
        StateValue {
            value,
            property: Some(property.to_string()),
        }
    }

    pub fn resolve(&self, material: &MaterialResource) -> f32 {
        self.property
            .as_deref()
            .and_then(|name| material.float(name))
            .unwrap_or(self.value)
    }
}

impl From<&SerializedShaderFloatValue> for StateValue {
    fn from(value: &SerializedShaderFloatValue) -> Self {
        StateValue {
            value: value.value,
            property: value.property_name().map(str::to_string),
        }
    }
}

/// The part of a pass' render state the material engine applies.
#[derive(Debug, Clone, PartialEq)]
pub struct PassState {
    pub cull: StateValue,
    pub z_test: StateValue,
    pub z_write: StateValue,
    pub src_blend: StateValue,
    pub dst_blend: StateValue,
    /// Sub shader tags followed by the pass tags.
    pub tags: Vec<(String, String)>,
}

/// Bound to the conventional property names, for materials whose shader pass is unknown.
impl Default for PassState {
    fn default() -> Self {
        PassState {
            cull: StateValue::bound("_Cull", 2.0),
            z_test: StateValue::bound("_ZTest", 4.0),
            z_write: StateValue::bound("_ZWrite", 1.0),
            src_blend: StateValue::bound("_SrcBlend", 1.0),
            dst_blend: StateValue::bound("_DstBlend", 0.0),
            tags: Vec::new(),
        }
    }
}

impl PassState {
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ShaderResource {
    pub name: String,
    pub properties: Vec<ShaderProperty>,
    pub pass_state: Option<PassState>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_compressed_levels_pad_to_blocks() {
        assert_eq!(GpuTextureFormat::Bc1RgbaUnorm.level_size(8, 8), 32);
        assert_eq!(GpuTextureFormat::Bc1RgbaUnorm.level_size(2, 2), 8);
        assert_eq!(GpuTextureFormat::Bc3RgbaUnorm.level_size(5, 3), 32);
        assert_eq!(GpuTextureFormat::Rgba8Unorm.level_size(8, 8), 256);
        assert_eq!(GpuTextureFormat::R8Unorm.level_size(0, 0), 1);
    }

    #[test]
    fn mip_chain_dimensions() {
        assert_eq!(mip_dimensions(8, 4, 0), (8, 4));
        assert_eq!(mip_dimensions(8, 4, 2), (2, 1));
        assert_eq!(mip_dimensions(8, 4, 5), (1, 1));
    }
}
