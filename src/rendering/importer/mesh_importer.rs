use glam::Vec3;
use log::warn;
use scenestream_files::ParserError;
use scenestream_files::common::version::UnityVersion;
use scenestream_files::mesh::types::{IndexFormat, UnityMesh, VertexFormat};

use crate::assets::error::AssetError;
use crate::rendering::common::attributes::{VertexSemantic, attribute_slot};
use crate::rendering::common::types::{Mesh, StreamLayout, SubMeshRange, VertexAttribute, VertexLayout};

/// Streams of a vertex buffer start on 16 byte boundaries.
const STREAM_ALIGNMENT: usize = 16;

pub struct MeshImporter {}

impl MeshImporter {
    /// Builds the upload layout. `mesh.vertex_data.data` has to contain the vertex bytes already,
    /// streamed meshes have them fetched by the loader before.
    pub fn create_mesh(mesh: &UnityMesh, version: &UnityVersion) -> Result<Mesh, AssetError> {
        profiling::scope!("MeshImporter::create_mesh");
        let index_buffer = Self::create_indices(mesh)?;
        let (vertex_count, layout, streams) = if mesh.is_compressed() {
            Self::create_compressed_streams(mesh)
        } else {
            Self::create_streams(mesh, version)?
        };

        let index_size = mesh.index_format.byte_size() as u32;
        let sub_meshes = mesh
            .sub_meshes
            .iter()
            .map(|sub_mesh| SubMeshRange {
                first_index: sub_mesh.first_byte / index_size,
                index_count: sub_mesh.index_count,
                base_vertex: sub_mesh.base_vertex,
            })
            .collect();

        let bounds = mesh.local_aabb;
        Ok(Mesh {
            vertex_count,
            layout,
            streams,
            index_buffer,
            sub_meshes,
            bounds_center: Vec3::new(bounds.center.x, bounds.center.y, bounds.center.z),
            bounds_extent: Vec3::new(bounds.extent.x, bounds.extent.y, bounds.extent.z),
        })
    }

    fn create_indices(mesh: &UnityMesh) -> Result<Vec<u32>, AssetError> {
        if mesh.is_compressed() {
            return Ok(mesh.compressed_mesh.triangles.unpack());
        }

        let data = &mesh.index_buffer;
        let indices = match mesh.index_format {
            IndexFormat::UInt16 => data
                .chunks_exact(2)
                .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]) as u32)
                .collect(),
            IndexFormat::UInt32 => data
                .chunks_exact(4)
                .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .collect(),
        };
        Ok(indices)
    }

    /// Mirrors the channel table: one stream per used stream index, attributes at their channel
    /// offsets, formats converted per channel. Channels without components are left out.
    fn create_streams(
        mesh: &UnityMesh,
        version: &UnityVersion,
    ) -> Result<(u32, VertexLayout, Vec<Vec<u8>>), AssetError> {
        let vertex_data = &mesh.vertex_data;
        let vertex_count = vertex_data.vertex_count;

        let mut streams: Vec<StreamLayout> = Vec::new();
        for (index, channel) in vertex_data.channels.iter().enumerate() {
            if !channel.is_used() {
                continue;
            }

            let Ok(semantic) = VertexSemantic::try_from(index as u8) else {
                warn!("{}: ignoring vertex channel {}", mesh.name, index);
                continue;
            };
            let format = VertexFormat::from_raw(channel.format, version).ok_or_else(|| {
                AssetError::Unsupported(format!("vertex format {} of mesh {}", channel.format, mesh.name))
            })?;

            let stream_index = channel.stream as usize;
            if streams.len() <= stream_index {
                streams.resize(stream_index + 1, StreamLayout::default());
            }

            let attribute = VertexAttribute {
                semantic,
                location: attribute_slot(semantic).location,
                format,
                components: channel.component_count(),
                offset: channel.offset as u32,
            };
            let stream = &mut streams[stream_index];
            stream.stride = stream.stride.max(attribute.offset + attribute.byte_size());
            stream.attributes.push(attribute);
        }

        let mut buffers = Vec::with_capacity(streams.len());
        let mut offset = 0usize;
        for stream in &streams {
            let size = stream.stride as usize * vertex_count as usize;
            let data = vertex_data.data.get(offset..offset + size).ok_or(ParserError::FormatError {
                reason: "vertex data is shorter than its channel layout",
            })?;
            buffers.push(data.to_vec());
            offset = (offset + size).next_multiple_of(STREAM_ALIGNMENT);
        }

        Ok((vertex_count, VertexLayout { streams }, buffers))
    }

    /// Compressed meshes only carry positions and normals worth uploading, they become two
    /// float3 streams.
    fn create_compressed_streams(mesh: &UnityMesh) -> (u32, VertexLayout, Vec<Vec<u8>>) {
        let compressed = &mesh.compressed_mesh;
        let positions = compressed.vertices.unpack();
        let vertex_count = (positions.len() / 3) as u32;

        let mut layout = VertexLayout {
            streams: vec![Self::float3_stream(VertexSemantic::Position)],
        };
        let mut buffers = vec![floats_to_bytes(&positions)];

        if compressed.normals.num_items > 0 {
            let normals = unpack_normals(&compressed.normals.unpack(), &compressed.normal_signs.unpack());
            layout.streams.push(Self::float3_stream(VertexSemantic::Normal));
            buffers.push(floats_to_bytes(&normals));
        }

        (vertex_count, layout, buffers)
    }

    fn float3_stream(semantic: VertexSemantic) -> StreamLayout {
        StreamLayout {
            stride: 12,
            attributes: vec![VertexAttribute {
                semantic,
                location: attribute_slot(semantic).location,
                format: VertexFormat::Float,
                components: 3,
                offset: 0,
            }],
        }
    }
}

/// Normals are stored as x/y pairs, z is reconstructed from the unit length and a sign stream
/// (0 means negative).
fn unpack_normals(pairs: &[f32], signs: &[u32]) -> Vec<f32> {
    let mut normals = Vec::with_capacity(pairs.len() / 2 * 3);
    for (index, pair) in pairs.chunks_exact(2).enumerate() {
        let (mut x, mut y) = (pair[0], pair[1]);
        let zz = 1.0 - x * x - y * y;
        let mut z = if zz > 0.0 { zz.sqrt() } else { 0.0 };
        if zz < 0.0 {
            let length = (x * x + y * y).sqrt();
            x /= length;
            y /= length;
        }
        if signs.get(index).copied() == Some(0) {
            z = -z;
        }
        normals.extend_from_slice(&[x, y, z]);
    }
    normals
}

fn floats_to_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|value| value.to_le_bytes()).collect()
}
