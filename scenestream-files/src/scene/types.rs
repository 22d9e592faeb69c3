use std::io::{Read, Seek};

use scenestream_files_derive_parseable::Parse;

use crate::ParserError;
use crate::common::reader::{align, ParseContext, Parseable};
use crate::common::types::{PPtr, Quaternionf, Vector3f, Vector4f};
use crate::common::version::UnityVersion;

#[derive(Debug, Clone, Default)]
pub struct UnityGameObject {
    pub components: Vec<PPtr>,
    pub layer: u32,
    pub name: String,
    pub tag: u16,
    pub is_active: bool,
}

impl Parseable<UnityGameObject> for UnityGameObject {
    fn parse<R: Read + Seek>(rdr: &mut R, ctx: &ParseContext) -> Result<UnityGameObject, ParserError> {
        // ComponentPair only consists of the component reference since 5.5
        Ok(UnityGameObject {
            components: Vec::<PPtr>::parse(rdr, ctx)?,
            layer: u32::parse(rdr, ctx)?,
            name: String::parse(rdr, ctx)?,
            tag: u16::parse(rdr, ctx)?,
            is_active: bool::parse(rdr, ctx)?,
        })
    }
}

#[derive(Debug, Clone, Default, Parse)]
pub struct UnityTransform {
    pub game_object: PPtr,
    pub local_rotation: Quaternionf,
    pub local_position: Vector3f,
    pub local_scale: Vector3f,
    pub children: Vec<PPtr>,
    pub father: PPtr,
}

#[derive(Debug, Copy, Clone, Default, Parse)]
pub struct UnityMeshFilter {
    pub game_object: PPtr,
    pub mesh: PPtr,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Parse)]
pub struct StaticBatchInfo {
    pub first_sub_mesh: u16,
    pub sub_mesh_count: u16,
}

/// The renderer fields up to the static batching information, the rest is not needed.
#[derive(Debug, Clone, Default)]
pub struct UnityMeshRenderer {
    pub game_object: PPtr,
    pub enabled: bool,
    pub cast_shadows: u8,
    pub receive_shadows: u8,
    pub lightmap_index: u16,
    pub lightmap_tiling_offset: Vector4f,
    pub materials: Vec<PPtr>,
    pub static_batch_info: StaticBatchInfo,
    pub static_batch_root: PPtr,
}

impl Parseable<UnityMeshRenderer> for UnityMeshRenderer {
    fn parse<R: Read + Seek>(rdr: &mut R, ctx: &ParseContext) -> Result<UnityMeshRenderer, ParserError> {
        let game_object = PPtr::parse(rdr, ctx)?;
        let enabled = bool::parse(rdr, ctx)?;
        let cast_shadows = u8::parse(rdr, ctx)?;
        let receive_shadows = u8::parse(rdr, ctx)?;
        let _dynamic_occludee = u8::parse(rdr, ctx)?;
        let _motion_vectors = u8::parse(rdr, ctx)?;
        let _light_probe_usage = u8::parse(rdr, ctx)?;
        let _reflection_probe_usage = u8::parse(rdr, ctx)?;
        if ctx.version >= UnityVersion::new(2019, 3, 0) {
            let _ray_tracing_mode = u8::parse(rdr, ctx)?;
        }
        if ctx.at_least(2020, 1) {
            let _ray_trace_procedural = u8::parse(rdr, ctx)?;
        }
        align(rdr)?;

        if ctx.at_least(2018, 1) {
            let _rendering_layer_mask = u32::parse(rdr, ctx)?;
        }
        if ctx.at_least(2018, 3) {
            let _renderer_priority = i32::parse(rdr, ctx)?;
        }
        let lightmap_index = u16::parse(rdr, ctx)?;
        let _lightmap_index_dynamic = u16::parse(rdr, ctx)?;
        let lightmap_tiling_offset = Vector4f::parse(rdr, ctx)?;
        let _lightmap_tiling_offset_dynamic = Vector4f::parse(rdr, ctx)?;

        Ok(UnityMeshRenderer {
            game_object,
            enabled,
            cast_shadows,
            receive_shadows,
            lightmap_index,
            lightmap_tiling_offset,
            materials: Vec::<PPtr>::parse(rdr, ctx)?,
            static_batch_info: StaticBatchInfo::parse(rdr, ctx)?,
            static_batch_root: PPtr::parse(rdr, ctx)?,
        })
    }
}
