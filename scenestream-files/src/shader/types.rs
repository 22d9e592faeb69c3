use std::io::{Read, Seek};

use num_enum::TryFromPrimitive;
use scenestream_files_derive_parseable::Parse;

use crate::ParserError;
use crate::common::reader::{align, read_bytes, read_byte_array, read_length, ParseContext, Parseable};

/// A shader object up to and including its sub shaders. The keyword tables, fallbacks and
/// dependencies that follow are not read.
#[derive(Debug, Clone, Default)]
pub struct UnityShader {
    pub name: String,
    pub properties: Vec<SerializedProperty>,
    pub sub_shaders: Vec<SerializedSubShader>,
}

impl Parseable<UnityShader> for UnityShader {
    fn parse<R: Read + Seek>(rdr: &mut R, ctx: &ParseContext) -> Result<UnityShader, ParserError> {
        Ok(UnityShader {
            name: String::parse(rdr, ctx)?,
            properties: Vec::<SerializedProperty>::parse(rdr, ctx)?,
            sub_shaders: Vec::<SerializedSubShader>::parse(rdr, ctx)?,
        })
    }
}

impl UnityShader {
    pub fn property(&self, name: &str) -> Option<&SerializedProperty> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// The first regular pass of the first sub shader, together with that sub shader. Its
    /// state is what a single pass renderer applies.
    pub fn main_pass(&self) -> Option<(&SerializedSubShader, &SerializedPass)> {
        self.sub_shaders.iter().find_map(|sub_shader| {
            sub_shader
                .passes
                .iter()
                .find(|pass| pass.kind() == Some(SerializedPassType::Normal))
                .map(|pass| (sub_shader, pass))
        })
    }
}

#[derive(Debug, Clone, Default, Parse)]
pub struct SerializedProperty {
    pub name: String,
    pub description: String,
    pub attributes: Vec<String>,
    pub property_type: i32,
    pub flags: u32,
    pub default_value: [f32; 4],
    pub default_texture: SerializedTextureProperty,
}

impl SerializedProperty {
    pub fn kind(&self) -> Option<SerializedPropertyType> {
        SerializedPropertyType::try_from(self.property_type).ok()
    }
}

#[derive(Debug, Clone, Default, Parse)]
pub struct SerializedTextureProperty {
    pub default_name: String,
    pub texture_dimension: i32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, TryFromPrimitive)]
#[repr(i32)]
pub enum SerializedPropertyType {
    Color = 0,
    Vector = 1,
    Float = 2,
    Range = 3,
    Texture = 4,
    Int = 5,
}

#[derive(Debug, Clone, Default, Parse)]
pub struct SerializedSubShader {
    pub passes: Vec<SerializedPass>,
    pub tags: Vec<(String, String)>,
    pub lod: i32,
}

impl SerializedSubShader {
    pub fn tag(&self, name: &str) -> Option<&str> {
        find_tag(&self.tags, name)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, TryFromPrimitive)]
#[repr(i32)]
pub enum SerializedPassType {
    Normal = 0,
    Use = 1,
    Grab = 2,
}

#[derive(Debug, Clone, Default)]
pub struct SerializedPass {
    pub name_indices: Vec<(String, i32)>,
    pub pass_type: i32,
    pub state: SerializedShaderState,
    pub program_mask: u32,
    pub prog_vertex: SerializedProgram,
    pub prog_fragment: SerializedProgram,
    pub prog_geometry: SerializedProgram,
    pub prog_hull: SerializedProgram,
    pub prog_domain: SerializedProgram,
    /// 2019.3 and later.
    pub prog_ray_tracing: Option<SerializedProgram>,
    pub has_instancing_variant: bool,
    /// 2018 and later.
    pub has_procedural_instancing_variant: Option<bool>,
    pub use_name: String,
    pub name: String,
    pub texture_name: String,
    pub tags: Vec<(String, String)>,
    /// 2021.2 and later.
    pub serialized_keyword_state_mask: Option<Vec<u16>>,
}

impl SerializedPass {
    pub fn kind(&self) -> Option<SerializedPassType> {
        SerializedPassType::try_from(self.pass_type).ok()
    }

    pub fn tag(&self, name: &str) -> Option<&str> {
        find_tag(&self.tags, name)
    }
}

impl Parseable<SerializedPass> for SerializedPass {
    fn parse<R: Read + Seek>(rdr: &mut R, ctx: &ParseContext) -> Result<SerializedPass, ParserError> {
        if ctx.at_least(2020, 2) {
            let _editor_data_hash = Vec::<Hash128>::parse(rdr, ctx)?;
            let _platforms = read_byte_array(rdr, ctx)?;
            if !ctx.at_least(2021, 2) {
                let _local_keyword_mask = Vec::<u16>::parse(rdr, ctx)?;
                let _global_keyword_mask = Vec::<u16>::parse(rdr, ctx)?;
            }
        }

        let name_indices = Vec::<(String, i32)>::parse(rdr, ctx)?;
        let pass_type = i32::parse(rdr, ctx)?;
        let state = SerializedShaderState::parse(rdr, ctx)?;
        let program_mask = u32::parse(rdr, ctx)?;
        let prog_vertex = SerializedProgram::parse(rdr, ctx)?;
        let prog_fragment = SerializedProgram::parse(rdr, ctx)?;
        let prog_geometry = SerializedProgram::parse(rdr, ctx)?;
        let prog_hull = SerializedProgram::parse(rdr, ctx)?;
        let prog_domain = SerializedProgram::parse(rdr, ctx)?;
        let prog_ray_tracing = if ctx.at_least(2019, 3) {
            Some(SerializedProgram::parse(rdr, ctx)?)
        } else {
            None
        };

        let has_instancing_variant = bool::parse(rdr, ctx)?;
        let has_procedural_instancing_variant = if ctx.at_least(2018, 0) {
            Some(bool::parse(rdr, ctx)?)
        } else {
            None
        };
        align(rdr)?;

        let use_name = String::parse(rdr, ctx)?;
        let name = String::parse(rdr, ctx)?;
        let texture_name = String::parse(rdr, ctx)?;
        let tags = Vec::<(String, String)>::parse(rdr, ctx)?;
        let serialized_keyword_state_mask = if ctx.at_least(2021, 2) {
            Some(Vec::<u16>::parse(rdr, ctx)?)
        } else {
            None
        };

        Ok(SerializedPass {
            name_indices,
            pass_type,
            state,
            program_mask,
            prog_vertex,
            prog_fragment,
            prog_geometry,
            prog_hull,
            prog_domain,
            prog_ray_tracing,
            has_instancing_variant,
            has_procedural_instancing_variant,
            use_name,
            name,
            texture_name,
            tags,
            serialized_keyword_state_mask,
        })
    }
}

/// A fixed function value. `name` is the material property overriding `value`, or empty if the
/// value is a literal.
#[derive(Debug, Clone, Default, PartialEq, Parse)]
pub struct SerializedShaderFloatValue {
    pub value: f32,
    pub name: String,
}

impl SerializedShaderFloatValue {
    pub fn literal(value: f32) -> Self {
        SerializedShaderFloatValue {
            value,
            name: String::new(),
        }
    }

    pub fn property(name: &str, value: f32) -> Self {
        SerializedShaderFloatValue {
            value,
            name: name.to_string(),
        }
    }

    pub fn property_name(&self) -> Option<&str> {
        if self.name.is_empty() {
            None
        } else {
            Some(self.name.as_str())
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Parse)]
pub struct SerializedShaderRTBlendState {
    pub src_blend: SerializedShaderFloatValue,
    pub dest_blend: SerializedShaderFloatValue,
    pub src_blend_alpha: SerializedShaderFloatValue,
    pub dest_blend_alpha: SerializedShaderFloatValue,
    pub blend_op: SerializedShaderFloatValue,
    pub blend_op_alpha: SerializedShaderFloatValue,
    pub col_mask: SerializedShaderFloatValue,
}

#[derive(Debug, Clone, Default, PartialEq, Parse)]
pub struct SerializedStencilOp {
    pub pass: SerializedShaderFloatValue,
    pub fail: SerializedShaderFloatValue,
    pub z_fail: SerializedShaderFloatValue,
    pub comp: SerializedShaderFloatValue,
}

#[derive(Debug, Clone, Default, PartialEq, Parse)]
pub struct SerializedShaderVectorValue {
    pub x: SerializedShaderFloatValue,
    pub y: SerializedShaderFloatValue,
    pub z: SerializedShaderFloatValue,
    pub w: SerializedShaderFloatValue,
    pub name: String,
}

/// Number of render targets a pass carries blend state for.
pub const RT_BLEND_TARGETS: usize = 8;

#[derive(Debug, Clone, Default)]
pub struct SerializedShaderState {
    pub name: String,
    /// Always [`RT_BLEND_TARGETS`] entries once parsed.
    pub rt_blend: Vec<SerializedShaderRTBlendState>,
    pub rt_separate_blend: bool,
    /// 2017.2 and later.
    pub z_clip: Option<SerializedShaderFloatValue>,
    pub z_test: SerializedShaderFloatValue,
    pub z_write: SerializedShaderFloatValue,
    pub culling: SerializedShaderFloatValue,
    /// 2020 and later.
    pub conservative: Option<SerializedShaderFloatValue>,
    pub offset_factor: SerializedShaderFloatValue,
    pub offset_units: SerializedShaderFloatValue,
    pub alpha_to_mask: SerializedShaderFloatValue,
    pub stencil_op: SerializedStencilOp,
    pub stencil_op_front: SerializedStencilOp,
    pub stencil_op_back: SerializedStencilOp,
    pub stencil_read_mask: SerializedShaderFloatValue,
    pub stencil_write_mask: SerializedShaderFloatValue,
    pub stencil_ref: SerializedShaderFloatValue,
    pub fog_start: SerializedShaderFloatValue,
    pub fog_end: SerializedShaderFloatValue,
    pub fog_density: SerializedShaderFloatValue,
    pub fog_color: SerializedShaderVectorValue,
    /// -1 unknown, 0 disabled, then linear, exp and exp2.
    pub fog_mode: i32,
    pub gpu_program_id: i32,
    pub tags: Vec<(String, String)>,
    pub lod: i32,
    pub lighting: bool,
}

impl Parseable<SerializedShaderState> for SerializedShaderState {
    fn parse<R: Read + Seek>(rdr: &mut R, ctx: &ParseContext) -> Result<SerializedShaderState, ParserError> {
        let name = String::parse(rdr, ctx)?;
        let rt_blend = SerializedShaderRTBlendState::parse_many(rdr, ctx, RT_BLEND_TARGETS)?;
        let rt_separate_blend = bool::parse(rdr, ctx)?;
        align(rdr)?;

        let z_clip = if ctx.at_least(2017, 2) {
            Some(SerializedShaderFloatValue::parse(rdr, ctx)?)
        } else {
            None
        };
        let z_test = SerializedShaderFloatValue::parse(rdr, ctx)?;
        let z_write = SerializedShaderFloatValue::parse(rdr, ctx)?;
        let culling = SerializedShaderFloatValue::parse(rdr, ctx)?;
        let conservative = if ctx.at_least(2020, 0) {
            Some(SerializedShaderFloatValue::parse(rdr, ctx)?)
        } else {
            None
        };

        let offset_factor = SerializedShaderFloatValue::parse(rdr, ctx)?;
        let offset_units = SerializedShaderFloatValue::parse(rdr, ctx)?;
        let alpha_to_mask = SerializedShaderFloatValue::parse(rdr, ctx)?;
        let stencil_op = SerializedStencilOp::parse(rdr, ctx)?;
        let stencil_op_front = SerializedStencilOp::parse(rdr, ctx)?;
        let stencil_op_back = SerializedStencilOp::parse(rdr, ctx)?;
        let stencil_read_mask = SerializedShaderFloatValue::parse(rdr, ctx)?;
        let stencil_write_mask = SerializedShaderFloatValue::parse(rdr, ctx)?;
        let stencil_ref = SerializedShaderFloatValue::parse(rdr, ctx)?;
        let fog_start = SerializedShaderFloatValue::parse(rdr, ctx)?;
        let fog_end = SerializedShaderFloatValue::parse(rdr, ctx)?;
        let fog_density = SerializedShaderFloatValue::parse(rdr, ctx)?;
        let fog_color = SerializedShaderVectorValue::parse(rdr, ctx)?;
        let fog_mode = i32::parse(rdr, ctx)?;
        let gpu_program_id = i32::parse(rdr, ctx)?;
        let tags = Vec::<(String, String)>::parse(rdr, ctx)?;
        let lod = i32::parse(rdr, ctx)?;
        let lighting = bool::parse(rdr, ctx)?;
        align(rdr)?;

        Ok(SerializedShaderState {
            name,
            rt_blend,
            rt_separate_blend,
            z_clip,
            z_test,
            z_write,
            culling,
            conservative,
            offset_factor,
            offset_units,
            alpha_to_mask,
            stencil_op,
            stencil_op_front,
            stencil_op_back,
            stencil_read_mask,
            stencil_write_mask,
            stencil_ref,
            fog_start,
            fog_end,
            fog_density,
            fog_color,
            fog_mode,
            gpu_program_id,
            tags,
            lod,
            lighting,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Hash128(pub [u8; 16]);

impl Parseable<Hash128> for Hash128 {
    fn parse<R: Read + Seek>(rdr: &mut R, _ctx: &ParseContext) -> Result<Hash128, ParserError> {
        Ok(Hash128(read_bytes::<_, 16>(rdr)?))
    }
}

/// The compiled variants of one shader stage.
#[derive(Debug, Clone, Default)]
pub struct SerializedProgram {
    pub sub_programs: Vec<SerializedSubProgram>,
    /// 2020.3.2 and 2021.1.4 onwards.
    pub common_parameters: Option<SerializedProgramParameters>,
}

impl Parseable<SerializedProgram> for SerializedProgram {
    fn parse<R: Read + Seek>(rdr: &mut R, ctx: &ParseContext) -> Result<SerializedProgram, ParserError> {
        let sub_programs = Vec::<SerializedSubProgram>::parse(rdr, ctx)?;
        let common_parameters = if has_shared_parameters(ctx) {
            Some(SerializedProgramParameters::parse(rdr, ctx)?)
        } else {
            None
        };
        Ok(SerializedProgram {
            sub_programs,
            common_parameters,
        })
    }
}

/// Parameter blocks shared across variants (and partial constant buffers) appeared in 2020.3.2
/// and 2021.1.4.
fn has_shared_parameters(ctx: &ParseContext) -> bool {
    ctx.at_least_build(2021, 1, 4) || (ctx.version.major == 2020 && ctx.at_least_build(2020, 3, 2))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Parse)]
pub struct ShaderBindChannel {
    pub source: u8,
    pub target: u8,
}

#[derive(Debug, Clone, Default, Parse)]
pub struct ParserBindChannels {
    pub channels: Vec<ShaderBindChannel>,
    pub source_map: u32,
}

#[derive(Debug, Clone, Default)]
pub struct SerializedSubProgram {
    pub blob_index: u32,
    pub channels: ParserBindChannels,
    /// 2019 up to 2021.2.
    pub global_keyword_indices: Option<Vec<u16>>,
    /// 2019 up to 2021.2.
    pub local_keyword_indices: Option<Vec<u16>>,
    /// Before 2019 and from 2021.2 on.
    pub keyword_indices: Option<Vec<u16>>,
    pub shader_hardware_tier: u8,
    pub gpu_program_type: u8,
    pub parameters: SerializedProgramParameters,
    /// 2017.2 and later, widened to 64 bits in 2021.
    pub shader_requirements: Option<i64>,
}

impl Parseable<SerializedSubProgram> for SerializedSubProgram {
    fn parse<R: Read + Seek>(rdr: &mut R, ctx: &ParseContext) -> Result<SerializedSubProgram, ParserError> {
        let blob_index = u32::parse(rdr, ctx)?;
        let channels = ParserBindChannels::parse(rdr, ctx)?;

        let (global_keyword_indices, local_keyword_indices, keyword_indices) =
            if ctx.at_least(2019, 0) && !ctx.at_least(2021, 2) {
                let global = Vec::<u16>::parse(rdr, ctx)?;
                let local = Vec::<u16>::parse(rdr, ctx)?;
                (Some(global), Some(local), None)
            } else {
                // unaligned before 2017
                let len = read_length(rdr, ctx)?;
                let indices = u16::parse_many(rdr, ctx, len)?;
                if ctx.at_least(2017, 0) {
                    align(rdr)?;
                }
                (None, None, Some(indices))
            };

        let shader_hardware_tier = u8::parse(rdr, ctx)?;
        let gpu_program_type = u8::parse(rdr, ctx)?;
        align(rdr)?;

        let parameters = SerializedProgramParameters::parse(rdr, ctx)?;
        let shader_requirements = if ctx.at_least(2021, 0) {
            Some(i64::parse(rdr, ctx)?)
        } else if ctx.at_least(2017, 2) {
            Some(i32::parse(rdr, ctx)? as i64)
        } else {
            None
        };

        Ok(SerializedSubProgram {
            blob_index,
            channels,
            global_keyword_indices,
            local_keyword_indices,
            keyword_indices,
            shader_hardware_tier,
            gpu_program_type,
            parameters,
            shader_requirements,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct SerializedProgramParameters {
    pub vector_params: Vec<VectorParameter>,
    pub matrix_params: Vec<MatrixParameter>,
    pub texture_params: Vec<TextureParameter>,
    pub buffer_params: Vec<BufferBinding>,
    pub constant_buffers: Vec<ConstantBuffer>,
    pub constant_buffer_bindings: Vec<BufferBinding>,
    pub uav_params: Vec<UAVParameter>,
    /// 2017 and later.
    pub samplers: Option<Vec<SamplerParameter>>,
}

impl Parseable<SerializedProgramParameters> for SerializedProgramParameters {
    fn parse<R: Read + Seek>(rdr: &mut R, ctx: &ParseContext) -> Result<SerializedProgramParameters, ParserError> {
        Ok(SerializedProgramParameters {
            vector_params: Vec::<VectorParameter>::parse(rdr, ctx)?,
            matrix_params: Vec::<MatrixParameter>::parse(rdr, ctx)?,
            texture_params: Vec::<TextureParameter>::parse(rdr, ctx)?,
            buffer_params: Vec::<BufferBinding>::parse(rdr, ctx)?,
            constant_buffers: Vec::<ConstantBuffer>::parse(rdr, ctx)?,
            constant_buffer_bindings: Vec::<BufferBinding>::parse(rdr, ctx)?,
            uav_params: Vec::<UAVParameter>::parse(rdr, ctx)?,
            samplers: if ctx.at_least(2017, 0) {
                Some(Vec::<SamplerParameter>::parse(rdr, ctx)?)
            } else {
                None
            },
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VectorParameter {
    pub name_index: i32,
    pub index: i32,
    pub array_size: i32,
    pub param_type: u8,
    pub dim: u8,
}

impl Parseable<VectorParameter> for VectorParameter {
    fn parse<R: Read + Seek>(rdr: &mut R, ctx: &ParseContext) -> Result<VectorParameter, ParserError> {
        let param = VectorParameter {
            name_index: i32::parse(rdr, ctx)?,
            index: i32::parse(rdr, ctx)?,
            array_size: i32::parse(rdr, ctx)?,
            param_type: u8::parse(rdr, ctx)?,
            dim: u8::parse(rdr, ctx)?,
        };
        align(rdr)?;
        Ok(param)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatrixParameter {
    pub name_index: i32,
    pub index: i32,
    pub array_size: i32,
    pub param_type: u8,
    pub row_count: u8,
}

impl Parseable<MatrixParameter> for MatrixParameter {
    fn parse<R: Read + Seek>(rdr: &mut R, ctx: &ParseContext) -> Result<MatrixParameter, ParserError> {
        let param = MatrixParameter {
            name_index: i32::parse(rdr, ctx)?,
            index: i32::parse(rdr, ctx)?,
            array_size: i32::parse(rdr, ctx)?,
            param_type: u8::parse(rdr, ctx)?,
            row_count: u8::parse(rdr, ctx)?,
        };
        align(rdr)?;
        Ok(param)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextureParameter {
    pub name_index: i32,
    pub index: i32,
    pub sampler_index: i32,
    /// 2017.3 and later.
    pub multi_sampled: Option<bool>,
    pub dim: u8,
}

impl Parseable<TextureParameter> for TextureParameter {
    fn parse<R: Read + Seek>(rdr: &mut R, ctx: &ParseContext) -> Result<TextureParameter, ParserError> {
        let name_index = i32::parse(rdr, ctx)?;
        let index = i32::parse(rdr, ctx)?;
        let sampler_index = i32::parse(rdr, ctx)?;
        let multi_sampled = if ctx.at_least(2017, 3) {
            Some(bool::parse(rdr, ctx)?)
        } else {
            None
        };
        let dim = u8::parse(rdr, ctx)?;
        align(rdr)?;
        Ok(TextureParameter {
            name_index,
            index,
            sampler_index,
            multi_sampled,
            dim,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferBinding {
    pub name_index: i32,
    pub index: i32,
    /// 2020 and later.
    pub array_size: Option<i32>,
}

impl Parseable<BufferBinding> for BufferBinding {
    fn parse<R: Read + Seek>(rdr: &mut R, ctx: &ParseContext) -> Result<BufferBinding, ParserError> {
        Ok(BufferBinding {
            name_index: i32::parse(rdr, ctx)?,
            index: i32::parse(rdr, ctx)?,
            array_size: if ctx.at_least(2020, 0) {
                Some(i32::parse(rdr, ctx)?)
            } else {
                None
            },
        })
    }
}

#[derive(Debug, Clone, Default, Parse)]
pub struct StructParameter {
    pub name_index: i32,
    pub index: i32,
    pub array_size: i32,
    pub struct_size: i32,
    pub vector_params: Vec<VectorParameter>,
    pub matrix_params: Vec<MatrixParameter>,
}

#[derive(Debug, Clone, Default)]
pub struct ConstantBuffer {
    pub name_index: i32,
    pub matrix_params: Vec<MatrixParameter>,
    pub vector_params: Vec<VectorParameter>,
    /// 2017.3 and later.
    pub struct_params: Option<Vec<StructParameter>>,
    pub size: i32,
    pub is_partial_cb: Option<bool>,
}

impl Parseable<ConstantBuffer> for ConstantBuffer {
    fn parse<R: Read + Seek>(rdr: &mut R, ctx: &ParseContext) -> Result<ConstantBuffer, ParserError> {
        let name_index = i32::parse(rdr, ctx)?;
        let matrix_params = Vec::<MatrixParameter>::parse(rdr, ctx)?;
        let vector_params = Vec::<VectorParameter>::parse(rdr, ctx)?;
        let struct_params = if ctx.at_least(2017, 3) {
            Some(Vec::<StructParameter>::parse(rdr, ctx)?)
        } else {
            None
        };
        let size = i32::parse(rdr, ctx)?;
        let is_partial_cb = if has_shared_parameters(ctx) {
            let partial = bool::parse(rdr, ctx)?;
            align(rdr)?;
            Some(partial)
        } else {
            None
        };

        Ok(ConstantBuffer {
            name_index,
            matrix_params,
            vector_params,
            struct_params,
            size,
            is_partial_cb,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Parse)]
pub struct UAVParameter {
    pub name_index: i32,
    pub index: i32,
    pub original_index: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Parse)]
pub struct SamplerParameter {
    pub sampler: u32,
    pub bind_point: i32,
}

fn find_tag<'a>(tags: &'a [(String, String)], name: &str) -> Option<&'a str> {
    tags.iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}
