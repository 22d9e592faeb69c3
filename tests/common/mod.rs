#![allow(dead_code)]

use std::sync::Arc;

use byteorder::{BigEndian, WriteBytesExt};
use scenestream::assets::AssetManager;
use scenestream::io::common::loader::DataFetcher;
use scenestream::rendering::gpu::headless::HeadlessDevice;
use scenestream::settings::AssetManagerSettings;
use scenestream_files::common::types::{ClassId, ColorRGBA, PPtr, Quaternionf, StreamingInfo, Vector2f, Vector3f};
use scenestream_files::fixtures::{
    encode_game_object, encode_material, encode_mesh, encode_mesh_filter, encode_mesh_renderer, encode_shader,
    encode_texture, encode_transform, SerializedFileBuilder,
};
use scenestream_files::material::types::{UnityMaterial, UnityPropertySheet, UnityTexEnv};
use scenestream_files::mesh::types::{ChannelInfo, IndexFormat, SubMesh, UnityMesh, VertexData};
use scenestream_files::scene::types::{UnityGameObject, UnityMeshFilter, UnityMeshRenderer, UnityTransform};
use scenestream_files::shader::types::{
    SerializedPass, SerializedShaderFloatValue, SerializedShaderRTBlendState, SerializedShaderState,
    SerializedSubShader, UnityShader, RT_BLEND_TARGETS,
};
use scenestream_files::texture::types::{TextureFormat, UnityTexture2D};

pub const LEVEL: &str = "Data/level0";
pub const SHARED: &str = "Data/sharedassets0.assets";

pub const MESH: i64 = 10;
pub const STANDARD_MATERIAL: i64 = 20;
pub const WATER_MATERIAL: i64 = 21;
pub const GLASS_MATERIAL: i64 = 22;

pub const STREAMED: &str = "Data/sharedassets1.assets";
pub const STREAMED_RESOURCE: &str = "Data/sharedassets1.assets.resS";
pub const STREAMED_MESH: i64 = 40;
pub const STREAMED_TEXTURE: i64 = 41;
pub const MESH_STREAM_OFFSET: u64 = 64;
pub const TEXTURE_STREAM_OFFSET: u64 = 160;

pub fn class(class: ClassId) -> i32 {
    i32::from(class)
}

pub fn vec3(x: f32, y: f32, z: f32) -> Vector3f {
    Vector3f { x, y, z }
}

pub fn game_object(name: &str) -> Vec<u8> {
    encode_game_object(&UnityGameObject {
        name: name.to_string(),
        is_active: true,
        ..Default::default()
    })
}

pub fn transform(game_object: i64, father: i64, position: Vector3f) -> Vec<u8> {
    encode_transform(&UnityTransform {
        game_object: PPtr::new(0, game_object),
        local_rotation: Quaternionf {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        },
        local_position: position,
        local_scale: vec3(1.0, 1.0, 1.0),
        children: Vec::new(),
        father: PPtr::new(0, father),
    })
}

pub fn mesh_filter(game_object: i64, mesh: PPtr) -> Vec<u8> {
    encode_mesh_filter(&UnityMeshFilter {
        game_object: PPtr::new(0, game_object),
        mesh,
    })
}

pub fn mesh_renderer(game_object: i64, materials: Vec<PPtr>) -> Vec<u8> {
    encode_mesh_renderer(&UnityMeshRenderer {
        game_object: PPtr::new(0, game_object),
        enabled: true,
        materials,
        ..Default::default()
    })
}

pub fn triangle_positions() -> Vec<u8> {
    [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]
        .iter()
        .flat_map(|f| f.to_le_bytes())
        .collect()
}

pub fn triangle() -> UnityMesh {
    UnityMesh {
        name: "Triangle".to_string(),
        sub_meshes: vec![SubMesh {
            index_count: 3,
            vertex_count: 3,
            ..Default::default()
        }],
        index_format: IndexFormat::UInt16,
        index_buffer: [0u16, 1, 2].iter().flat_map(|i| i.to_le_bytes()).collect(),
        vertex_data: VertexData {
            vertex_count: 3,
            channels: vec![ChannelInfo {
                stream: 0,
                offset: 0,
                format: 0,
                dimension: 3,
            }],
            data: triangle_positions(),
        },
        ..Default::default()
    }
}

pub fn material(name: &str, shader: i64, keywords: &[&str]) -> Vec<u8> {
    encode_material(&UnityMaterial {
        name: name.to_string(),
        shader: PPtr::new(0, shader),
        shader_keywords: keywords.iter().map(|k| k.to_string()).collect(),
        custom_render_queue: -1,
        string_tag_map: vec![("RenderType".to_string(), "Opaque".to_string())],
        saved_properties: UnityPropertySheet {
            tex_envs: vec![(
                "_MainTex".to_string(),
                UnityTexEnv {
                    texture: PPtr::default(),
                    scale: Vector2f { x: 2.0, y: 2.0 },
                    offset: Vector2f::default(),
                },
            )],
            floats: vec![("_Glossiness".to_string(), 0.25)],
            colors: vec![(
                "_Color".to_string(),
                ColorRGBA {
                    r: 1.0,
                    g: 0.5,
                    b: 0.25,
                    a: 1.0,
                },
            )],
            ..Default::default()
        },
        ..Default::default()
    })
}

pub fn shader(name: &str) -> Vec<u8> {
    encode_shader(&UnityShader {
        name: name.to_string(),
        ..Default::default()
    })
}

/// A single pass shader whose cull mode and blend factors come from the given material floats.
pub fn bound_shader(name: &str, cull: &str, src_blend: &str, dst_blend: &str, render_type: &str) -> Vec<u8> {
    let mut rt_blend = vec![SerializedShaderRTBlendState::default(); RT_BLEND_TARGETS];
    rt_blend[0].src_blend = SerializedShaderFloatValue::property(src_blend, 1.0);
    rt_blend[0].dest_blend = SerializedShaderFloatValue::property(dst_blend, 0.0);
    encode_shader(&UnityShader {
        name: name.to_string(),
        sub_shaders: vec![SerializedSubShader {
            passes: vec![SerializedPass {
                state: SerializedShaderState {
                    rt_blend,
                    z_test: SerializedShaderFloatValue::literal(4.0),
                    z_write: SerializedShaderFloatValue::literal(1.0),
                    culling: SerializedShaderFloatValue::property(cull, 2.0),
                    ..Default::default()
                },
                has_procedural_instancing_variant: Some(false),
                ..Default::default()
            }],
            tags: vec![("RenderType".to_string(), render_type.to_string())],
            lod: 100,
        }],
        ..Default::default()
    })
}

/// A 2x2 RGBA32 texture.
pub fn texels() -> Vec<u8> {
    (0u8..16).map(|i| i * 16).collect()
}

/// A container whose mesh and texture keep their payloads in [`STREAMED_RESOURCE`], returned
/// second.
pub fn streamed_assets() -> (Vec<u8>, Vec<u8>) {
    let stream_path = "sharedassets1.assets.resS";
    let mut mesh = triangle();
    mesh.name = "StreamedTriangle".to_string();
    let positions = std::mem::take(&mut mesh.vertex_data.data);
    mesh.stream_data = StreamingInfo {
        offset: MESH_STREAM_OFFSET,
        size: positions.len() as u32,
        path: stream_path.to_string(),
    };

    let texture = UnityTexture2D {
        name: "Checker".to_string(),
        width: 2,
        height: 2,
        complete_image_size: 16,
        texture_format: TextureFormat::RGBA32.into(),
        mip_count: 1,
        image_count: 1,
        texture_dimension: 2,
        color_space: 1,
        stream_data: StreamingInfo {
            offset: TEXTURE_STREAM_OFFSET,
            size: texels().len() as u32,
            path: stream_path.to_string(),
        },
        ..Default::default()
    };

    let mut resource = vec![0xEEu8; 256];
    let mesh_start = MESH_STREAM_OFFSET as usize;
    resource[mesh_start..mesh_start + positions.len()].copy_from_slice(&positions);
    let texture_start = TEXTURE_STREAM_OFFSET as usize;
    resource[texture_start..texture_start + 16].copy_from_slice(&texels());

    let container = SerializedFileBuilder::new()
        .object(STREAMED_MESH, class(ClassId::Mesh), encode_mesh(&mesh))
        .object(STREAMED_TEXTURE, class(ClassId::Texture2D), encode_texture(&texture))
        .build();
    (container, resource)
}

/// Bound to the fade shader's `_CullMode`, without a RenderType tag of its own.
pub fn glass_material() -> Vec<u8> {
    encode_material(&UnityMaterial {
        name: "Glass".to_string(),
        shader: PPtr::new(0, 32),
        custom_render_queue: -1,
        saved_properties: UnityPropertySheet {
            floats: vec![
                ("_CullMode".to_string(), 0.0),
                ("_Cull".to_string(), 1.0),
                ("_SrcBlend".to_string(), 5.0),
                ("_DstBlend".to_string(), 10.0),
            ],
            ..Default::default()
        },
        ..Default::default()
    })
}

/// Meshes, materials and shaders shared by the level.
pub fn shared_assets() -> Vec<u8> {
    SerializedFileBuilder::new()
        .object(MESH, class(ClassId::Mesh), encode_mesh(&triangle()))
        .object(STANDARD_MATERIAL, class(ClassId::Material), material("Rock", 30, &["_NORMALMAP"]))
        .object(WATER_MATERIAL, class(ClassId::Material), material("Water", 31, &[]))
        .object(GLASS_MATERIAL, class(ClassId::Material), glass_material())
        .object(
            30,
            class(ClassId::Shader),
            bound_shader("Standard", "_Cull", "_SrcBlend", "_DstBlend", "Opaque"),
        )
        .object(31, class(ClassId::Shader), shader("Custom/Water"))
        .object(
            32,
            class(ClassId::Shader),
            bound_shader("Custom/Fade", "_CullMode", "_SrcBlend", "_DstBlend", "Transparent"),
        )
        .build()
}

/// Three GameObjects: `Root` at (1, 0, 0), its child `Child` at (0, 2, 0) and `Lake`. Child and
/// Lake render the shared triangle, Lake with a material of an unsupported shader.
pub fn level(shared_external: &str) -> Vec<u8> {
    let shared_mesh = PPtr::new(1, MESH);
    SerializedFileBuilder::new()
        .object(1, class(ClassId::GameObject), game_object("Root"))
        .object(2, class(ClassId::Transform), transform(1, 0, vec3(1.0, 0.0, 0.0)))
        .object(3, class(ClassId::GameObject), game_object("Child"))
        .object(4, class(ClassId::Transform), transform(3, 2, vec3(0.0, 2.0, 0.0)))
        .object(5, class(ClassId::MeshFilter), mesh_filter(3, shared_mesh))
        .object(
            6,
            class(ClassId::MeshRenderer),
            mesh_renderer(3, vec![PPtr::new(1, STANDARD_MATERIAL)]),
        )
        .object(7, class(ClassId::GameObject), game_object("Lake"))
        .object(8, class(ClassId::Transform), transform(7, 0, vec3(0.0, 0.0, 5.0)))
        .object(9, class(ClassId::MeshFilter), mesh_filter(7, shared_mesh))
        .object(
            11,
            class(ClassId::MeshRenderer),
            mesh_renderer(
                7,
                vec![PPtr::new(1, WATER_MATERIAL), PPtr::new(1, STANDARD_MATERIAL)],
            ),
        )
        .external(shared_external)
        .build()
}

pub fn manager(fetcher: Arc<dyn DataFetcher>) -> (Arc<AssetManager>, Arc<HeadlessDevice>) {
    let device = Arc::new(HeadlessDevice::new());
    let manager = AssetManager::new(fetcher, device.clone(), AssetManagerSettings::default());
    (manager, device)
}

/// Writes a format 7 UnityFS bundle, LZ4 compressed in blocks of `block_size` bytes.
pub fn bundle(nodes: &[(&str, Vec<u8>)], block_size: usize) -> Vec<u8> {
    const LZ4: u32 = 2;
    let stream = nodes.iter().flat_map(|(_, data)| data.clone()).collect::<Vec<u8>>();
    let blocks = stream
        .chunks(block_size)
        .map(|chunk| (chunk.len(), lz4_flex::block::compress(chunk)))
        .collect::<Vec<_>>();

    let mut info = vec![0u8; 16];
    info.write_i32::<BigEndian>(blocks.len() as i32).unwrap();
    for (size, data) in &blocks {
        info.write_u32::<BigEndian>(*size as u32).unwrap();
        info.write_u32::<BigEndian>(data.len() as u32).unwrap();
        info.write_u16::<BigEndian>(LZ4 as u16).unwrap();
    }
    info.write_i32::<BigEndian>(nodes.len() as i32).unwrap();
    let mut offset = 0i64;
    for (path, data) in nodes {
        info.write_i64::<BigEndian>(offset).unwrap();
        info.write_i64::<BigEndian>(data.len() as i64).unwrap();
        info.write_u32::<BigEndian>(4).unwrap();
        info.extend_from_slice(path.as_bytes());
        info.push(0);
        offset += data.len() as i64;
    }
    let compressed_info = lz4_flex::block::compress(&info);

    let mut out = Vec::new();
    out.extend_from_slice(b"UnityFS\0");
    out.write_u32::<BigEndian>(7).unwrap();
    out.extend_from_slice(b"5.x.x\0");
    // a pre 2019.4 writer, the block table follows the fixed fields at 50
    let mut revision = b"2018.4.36f1".to_vec();
    revision.resize(12, 0);
    out.extend_from_slice(&revision);
    out.write_i64::<BigEndian>(0).unwrap();
    out.write_u32::<BigEndian>(compressed_info.len() as u32).unwrap();
    out.write_u32::<BigEndian>(info.len() as u32).unwrap();
    out.write_u32::<BigEndian>(0x40 | LZ4).unwrap();
    out.extend_from_slice(&compressed_info);
    for (_, data) in &blocks {
        out.extend_from_slice(data);
    }

    let total = out.len() as i64;
    out[30..38].copy_from_slice(&total.to_be_bytes());
    out
}
