use std::io::{Read, Seek};

use num_enum::TryFromPrimitive;
use scenestream_files_derive_parseable::Parse;

use crate::ParserError;
use crate::common::reader::{align, read_byte_array, ParseContext, Parseable};
use crate::common::types::{Matrix4x4f, MinMaxAABB, StreamingInfo, Vector3f, AABB};
use crate::common::version::UnityVersion;

#[derive(Debug, Clone, Default)]
pub struct UnityMesh {
    pub name: String,
    pub sub_meshes: Vec<SubMesh>,
    pub shapes: BlendShapeData,
    pub bind_pose: Vec<Matrix4x4f>,
    pub bone_name_hashes: Vec<u32>,
    pub root_bone_name_hash: u32,
    pub bones_aabb: Vec<MinMaxAABB>,
    pub variable_bone_count_weights: Vec<u32>,
    pub mesh_compression: u8,
    pub is_readable: bool,
    pub keep_vertices: bool,
    pub keep_indices: bool,
    pub index_format: IndexFormat,
    pub index_buffer: Vec<u8>,
    pub vertex_data: VertexData,
    pub compressed_mesh: CompressedMesh,
    pub local_aabb: AABB,
    pub mesh_usage_flags: i32,
    pub baked_convex_collision_mesh: Vec<u8>,
    pub baked_triangle_collision_mesh: Vec<u8>,
    pub mesh_metrics: [f32; 2],
    pub stream_data: StreamingInfo,
}

impl UnityMesh {
    pub fn is_compressed(&self) -> bool {
        self.mesh_compression != 0
    }
}

impl Parseable<UnityMesh> for UnityMesh {
    fn parse<R: Read + Seek>(rdr: &mut R, ctx: &ParseContext) -> Result<UnityMesh, ParserError> {
        let name = String::parse(rdr, ctx)?;
        let sub_meshes = Vec::<SubMesh>::parse(rdr, ctx)?;
        let shapes = BlendShapeData::parse(rdr, ctx)?;
        let bind_pose = Vec::<Matrix4x4f>::parse(rdr, ctx)?;
        let bone_name_hashes = Vec::<u32>::parse(rdr, ctx)?;
        let root_bone_name_hash = u32::parse(rdr, ctx)?;

        let (bones_aabb, variable_bone_count_weights) = if ctx.at_least(2019, 1) {
            (Vec::<MinMaxAABB>::parse(rdr, ctx)?, Vec::<u32>::parse(rdr, ctx)?)
        } else {
            (Vec::new(), Vec::new())
        };

        let mesh_compression = u8::parse(rdr, ctx)?;
        let is_readable = bool::parse(rdr, ctx)?;
        let keep_vertices = bool::parse(rdr, ctx)?;
        let keep_indices = bool::parse(rdr, ctx)?;
        align(rdr)?;

        let index_format = IndexFormat::try_from(i32::parse(rdr, ctx)?).map_err(|_| ParserError::FormatError {
            reason: "unknown index format",
        })?;
        let index_buffer = read_byte_array(rdr, ctx)?;
        let vertex_data = VertexData::parse(rdr, ctx)?;
        let compressed_mesh = CompressedMesh::parse(rdr, ctx)?;
        let local_aabb = AABB::parse(rdr, ctx)?;
        let mesh_usage_flags = i32::parse(rdr, ctx)?;
        if ctx.at_least(2022, 1) {
            let _cooking_options = i32::parse(rdr, ctx)?;
        }
        let baked_convex_collision_mesh = read_byte_array(rdr, ctx)?;
        let baked_triangle_collision_mesh = read_byte_array(rdr, ctx)?;
        let mesh_metrics = <[f32; 2]>::parse(rdr, ctx)?;
        let stream_data = StreamingInfo::parse(rdr, ctx)?;

        Ok(UnityMesh {
            name,
            sub_meshes,
            shapes,
            bind_pose,
            bone_name_hashes,
            root_bone_name_hash,
            bones_aabb,
            variable_bone_count_weights,
            mesh_compression,
            is_readable,
            keep_vertices,
            keep_indices,
            index_format,
            index_buffer,
            vertex_data,
            compressed_mesh,
            local_aabb,
            mesh_usage_flags,
            baked_convex_collision_mesh,
            baked_triangle_collision_mesh,
            mesh_metrics,
            stream_data,
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, TryFromPrimitive)]
#[repr(i32)]
pub enum IndexFormat {
    UInt16 = 0,
    UInt32 = 1,
}

impl Default for IndexFormat {
    fn default() -> Self {
        IndexFormat::UInt16
    }
}

impl IndexFormat {
    pub fn byte_size(&self) -> usize {
        match self {
            IndexFormat::UInt16 => 2,
            IndexFormat::UInt32 => 4,
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Parse)]
pub struct SubMesh {
    pub first_byte: u32,
    pub index_count: u32,
    pub topology: i32,
    pub base_vertex: u32,
    pub first_vertex: u32,
    pub vertex_count: u32,
    pub local_aabb: AABB,
}

#[derive(Debug, Clone, Default, Parse)]
pub struct BlendShapeData {
    pub vertices: Vec<BlendShapeVertex>,
    pub shapes: Vec<MeshBlendShape>,
    pub channels: Vec<MeshBlendShapeChannel>,
    pub full_weights: Vec<f32>,
}

#[derive(Debug, Copy, Clone, Default, Parse)]
pub struct BlendShapeVertex {
    pub vertex: Vector3f,
    pub normal: Vector3f,
    pub tangent: Vector3f,
    pub index: u32,
}

#[derive(Debug, Copy, Clone, Default)]
pub struct MeshBlendShape {
    pub first_vertex: u32,
    pub vertex_count: u32,
    pub has_normals: bool,
    pub has_tangents: bool,
}

impl Parseable<MeshBlendShape> for MeshBlendShape {
    fn parse<R: Read + Seek>(rdr: &mut R, ctx: &ParseContext) -> Result<MeshBlendShape, ParserError> {
        let shape = MeshBlendShape {
            first_vertex: u32::parse(rdr, ctx)?,
            vertex_count: u32::parse(rdr, ctx)?,
            has_normals: bool::parse(rdr, ctx)?,
            has_tangents: bool::parse(rdr, ctx)?,
        };
        align(rdr)?;
        Ok(shape)
    }
}

#[derive(Debug, Clone, Default, Parse)]
pub struct MeshBlendShapeChannel {
    pub name: String,
    pub name_hash: u32,
    pub frame_index: i32,
    pub frame_count: i32,
}

/// One attribute of the vertex layout. `dimension` holds the component count in its low
/// nibble, a dimension of 0 marks an unused channel.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Parse)]
pub struct ChannelInfo {
    pub stream: u8,
    pub offset: u8,
    pub format: u8,
    pub dimension: u8,
}

impl ChannelInfo {
    pub fn component_count(&self) -> u8 {
        self.dimension & 0xF
    }

    pub fn is_used(&self) -> bool {
        self.component_count() != 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct VertexData {
    pub vertex_count: u32,
    pub channels: Vec<ChannelInfo>,
    pub data: Vec<u8>,
}

impl Parseable<VertexData> for VertexData {
    fn parse<R: Read + Seek>(rdr: &mut R, ctx: &ParseContext) -> Result<VertexData, ParserError> {
        if !ctx.at_least(2018, 1) {
            let _current_channels = u32::parse(rdr, ctx)?;
        }
        Ok(VertexData {
            vertex_count: u32::parse(rdr, ctx)?,
            channels: Vec::<ChannelInfo>::parse(rdr, ctx)?,
            data: read_byte_array(rdr, ctx)?,
        })
    }
}

/// Per-component storage type of a vertex channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u8)]
pub enum VertexFormat {
    Float = 0,
    Float16 = 1,
    UNorm8 = 2,
    SNorm8 = 3,
    UNorm16 = 4,
    SNorm16 = 5,
    UInt8 = 6,
    SInt8 = 7,
    UInt16 = 8,
    SInt16 = 9,
    UInt32 = 10,
    SInt32 = 11,
}

impl VertexFormat {
    /// Maps the raw channel format. Before 2019 the table had an extra `Color` entry at index
    /// 2, shifting everything after it by one.
    pub fn from_raw(raw: u8, version: &UnityVersion) -> Option<VertexFormat> {
        if version.at_least(2019, 1) {
            return VertexFormat::try_from(raw).ok();
        }
        match raw {
            0 | 1 => VertexFormat::try_from(raw).ok(),
            2 => Some(VertexFormat::UNorm8),
            other => VertexFormat::try_from(other - 1).ok(),
        }
    }

    pub fn byte_size(&self) -> usize {
        match self {
            VertexFormat::Float | VertexFormat::UInt32 | VertexFormat::SInt32 => 4,
            VertexFormat::Float16
            | VertexFormat::UNorm16
            | VertexFormat::SNorm16
            | VertexFormat::UInt16
            | VertexFormat::SInt16 => 2,
            VertexFormat::UNorm8 | VertexFormat::SNorm8 | VertexFormat::UInt8 | VertexFormat::SInt8 => 1,
        }
    }
}

/// Values quantized to `bit_size` bits between `start` and `start + range`, tightly packed.
#[derive(Debug, Clone, Default)]
pub struct PackedFloatVector {
    pub num_items: u32,
    pub range: f32,
    pub start: f32,
    pub data: Vec<u8>,
    pub bit_size: u8,
}

impl Parseable<PackedFloatVector> for PackedFloatVector {
    fn parse<R: Read + Seek>(rdr: &mut R, ctx: &ParseContext) -> Result<PackedFloatVector, ParserError> {
        let vector = PackedFloatVector {
            num_items: u32::parse(rdr, ctx)?,
            range: f32::parse(rdr, ctx)?,
            start: f32::parse(rdr, ctx)?,
            data: read_byte_array(rdr, ctx)?,
            bit_size: u8::parse(rdr, ctx)?,
        };
        align(rdr)?;
        Ok(vector)
    }
}

impl PackedFloatVector {
    pub fn unpack(&self) -> Vec<f32> {
        if self.bit_size == 0 {
            return vec![self.start; self.num_items as usize];
        }
        let max = ((1u64 << self.bit_size) - 1) as f32;
        let scale = self.range / max;
        unpack_bits(&self.data, self.bit_size, self.num_items as usize)
            .into_iter()
            .map(|value| value as f32 * scale + self.start)
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PackedIntVector {
    pub num_items: u32,
    pub data: Vec<u8>,
    pub bit_size: u8,
}

impl Parseable<PackedIntVector> for PackedIntVector {
    fn parse<R: Read + Seek>(rdr: &mut R, ctx: &ParseContext) -> Result<PackedIntVector, ParserError> {
        let vector = PackedIntVector {
            num_items: u32::parse(rdr, ctx)?,
            data: read_byte_array(rdr, ctx)?,
            bit_size: u8::parse(rdr, ctx)?,
        };
        align(rdr)?;
        Ok(vector)
    }
}

impl PackedIntVector {
    pub fn unpack(&self) -> Vec<u32> {
        unpack_bits(&self.data, self.bit_size, self.num_items as usize)
    }
}

/// Reads `count` little-endian bit fields of `bit_size` bits each, LSB first.
pub fn unpack_bits(data: &[u8], bit_size: u8, count: usize) -> Vec<u32> {
    let bit_size = bit_size as usize;
    let mut values = Vec::with_capacity(count);
    if bit_size == 0 {
        values.resize(count, 0);
        return values;
    }

    let mask = if bit_size >= 32 { u32::MAX } else { (1u32 << bit_size) - 1 };
    let mut index = 0usize;
    let mut bit_pos = 0usize;
    for _ in 0..count {
        let mut value = 0u64;
        let mut bits = 0usize;
        while bits < bit_size {
            let byte = data.get(index).copied().unwrap_or(0) as u64;
            value |= (byte >> bit_pos) << bits;
            let taken = (bit_size - bits).min(8 - bit_pos);
            bit_pos += taken;
            bits += taken;
            if bit_pos == 8 {
                index += 1;
                bit_pos = 0;
            }
        }
        values.push(value as u32 & mask);
    }
    values
}

#[derive(Debug, Clone, Default)]
pub struct CompressedMesh {
    pub vertices: PackedFloatVector,
    pub uv: PackedFloatVector,
    pub normals: PackedFloatVector,
    pub tangents: PackedFloatVector,
    pub weights: PackedIntVector,
    pub normal_signs: PackedIntVector,
    pub tangent_signs: PackedIntVector,
    pub float_colors: PackedFloatVector,
    pub bone_indices: PackedIntVector,
    pub triangles: PackedIntVector,
    pub uv_info: u32,
}

impl Parseable<CompressedMesh> for CompressedMesh {
    fn parse<R: Read + Seek>(rdr: &mut R, ctx: &ParseContext) -> Result<CompressedMesh, ParserError> {
        Ok(CompressedMesh {
            vertices: PackedFloatVector::parse(rdr, ctx)?,
            uv: PackedFloatVector::parse(rdr, ctx)?,
            normals: PackedFloatVector::parse(rdr, ctx)?,
            tangents: PackedFloatVector::parse(rdr, ctx)?,
            weights: PackedIntVector::parse(rdr, ctx)?,
            normal_signs: PackedIntVector::parse(rdr, ctx)?,
            tangent_signs: PackedIntVector::parse(rdr, ctx)?,
            float_colors: PackedFloatVector::parse(rdr, ctx)?,
            bone_indices: PackedIntVector::parse(rdr, ctx)?,
            triangles: PackedIntVector::parse(rdr, ctx)?,
            uv_info: u32::parse(rdr, ctx)?,
        })
    }
}
