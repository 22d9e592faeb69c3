//! Binary writers for synthesizing serialized files in tests. The class encoders produce the
//! 2019.4 layouts, matching [`DEFAULT_VERSION`].

use crate::common::reader::{Endianness, ParseContext};
use crate::common::types::{ColorRGBA, PPtr, StreamingInfo, Vector2f, Vector3f, Vector4f, AABB};
use crate::common::version::UnityVersion;
use crate::material::types::UnityMaterial;
use crate::mesh::types::{PackedFloatVector, PackedIntVector, UnityMesh};
use crate::scene::types::{UnityGameObject, UnityMeshFilter, UnityMeshRenderer, UnityTransform};
use crate::shader::types::{
    BufferBinding, MatrixParameter, SerializedPass, SerializedProgram, SerializedProgramParameters,
    SerializedShaderFloatValue, SerializedShaderState, SerializedStencilOp, UnityShader, VectorParameter,
    RT_BLEND_TARGETS,
};
use crate::texture::types::UnityTexture2D;

pub const DEFAULT_VERSION: &str = "2019.4.40f1";

pub fn context(version: &str) -> ParseContext {
    ParseContext::new(
        Endianness::Little,
        UnityVersion::parse(version).expect("valid fixture version"),
        22,
    )
}

macro_rules! endian_writer {
    ($name:ident, $ty:ty) => {
        pub fn $name(&mut self, v: $ty) -> &mut Self {
            match self.endianness {
                Endianness::Little => self.buf.extend_from_slice(&v.to_le_bytes()),
                Endianness::Big => self.buf.extend_from_slice(&v.to_be_bytes()),
            }
            self
        }
    };
}

pub struct ObjectWriter {
    pub buf: Vec<u8>,
    endianness: Endianness,
}

impl ObjectWriter {
    pub fn new(endianness: Endianness) -> Self {
        ObjectWriter {
            buf: Vec::new(),
            endianness,
        }
    }

    pub fn little() -> Self {
        Self::new(Endianness::Little)
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    pub fn bool(&mut self, v: bool) -> &mut Self {
        self.u8(v as u8)
    }

    endian_writer!(u16, u16);
    endian_writer!(i16, i16);
    endian_writer!(u32, u32);
    endian_writer!(i32, i32);
    endian_writer!(i64, i64);
    endian_writer!(u64, u64);
    endian_writer!(f32, f32);

    pub fn floats(&mut self, values: &[f32]) -> &mut Self {
        for v in values {
            self.f32(*v);
        }
        self
    }

    pub fn raw(&mut self, v: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(v);
        self
    }

    pub fn cstring(&mut self, v: &str) -> &mut Self {
        self.buf.extend_from_slice(v.as_bytes());
        self.u8(0)
    }

    pub fn align(&mut self) -> &mut Self {
        while self.buf.len() % 4 != 0 {
            self.buf.push(0);
        }
        self
    }

    pub fn string(&mut self, v: &str) -> &mut Self {
        self.i32(v.len() as i32);
        self.buf.extend_from_slice(v.as_bytes());
        self.align()
    }

    pub fn bytes(&mut self, v: &[u8]) -> &mut Self {
        self.i32(v.len() as i32);
        self.buf.extend_from_slice(v);
        self.align()
    }

    pub fn array<T>(&mut self, items: &[T], mut write: impl FnMut(&mut Self, &T)) -> &mut Self {
        self.i32(items.len() as i32);
        for item in items {
            write(self, item);
        }
        self.align()
    }

    pub fn pptr(&mut self, v: PPtr) -> &mut Self {
        self.i32(v.file_id).i64(v.path_id)
    }

    pub fn vec2(&mut self, v: Vector2f) -> &mut Self {
        self.f32(v.x).f32(v.y)
    }

    pub fn vec3(&mut self, v: Vector3f) -> &mut Self {
        self.f32(v.x).f32(v.y).f32(v.z)
    }

    pub fn vec4(&mut self, v: Vector4f) -> &mut Self {
        self.f32(v.x).f32(v.y).f32(v.z).f32(v.w)
    }

    pub fn color(&mut self, v: ColorRGBA) -> &mut Self {
        self.f32(v.r).f32(v.g).f32(v.b).f32(v.a)
    }

    pub fn aabb(&mut self, v: AABB) -> &mut Self {
        self.vec3(v.center).vec3(v.extent)
    }

    pub fn streaming_info(&mut self, v: &StreamingInfo) -> &mut Self {
        self.u32(v.offset as u32).u32(v.size).string(&v.path)
    }

    fn packed_floats(&mut self, v: &PackedFloatVector) -> &mut Self {
        self.u32(v.num_items)
            .f32(v.range)
            .f32(v.start)
            .bytes(&v.data)
            .u8(v.bit_size)
            .align()
    }

    fn packed_ints(&mut self, v: &PackedIntVector) -> &mut Self {
        self.u32(v.num_items).bytes(&v.data).u8(v.bit_size).align()
    }
}

pub struct FixtureObject {
    pub path_id: i64,
    pub class_id: i32,
    pub data: Vec<u8>,
}

/// Assembles a complete serialized file from encoded objects.
pub struct SerializedFileBuilder {
    pub format_version: u32,
    pub endianness: Endianness,
    pub unity_version: String,
    pub type_tree: bool,
    pub objects: Vec<FixtureObject>,
    pub externals: Vec<String>,
    /// Overrides the declared file size, for out of bounds tests.
    pub declared_file_size: Option<u64>,
}

impl SerializedFileBuilder {
    pub fn new() -> Self {
        SerializedFileBuilder {
            format_version: 21,
            endianness: Endianness::Little,
            unity_version: DEFAULT_VERSION.to_string(),
            type_tree: false,
            objects: Vec::new(),
            externals: Vec::new(),
            declared_file_size: None,
        }
    }

    pub fn object(mut self, path_id: i64, class_id: i32, data: Vec<u8>) -> Self {
        self.objects.push(FixtureObject {
            path_id,
            class_id,
            data,
        });
        self
    }

    pub fn external(mut self, path: &str) -> Self {
        self.externals.push(path.to_string());
        self
    }

    fn header_size(&self) -> usize {
        if self.format_version >= 22 { 48 } else { 20 }
    }

    pub fn build(&self) -> Vec<u8> {
        let mut class_ids: Vec<i32> = Vec::new();
        for object in &self.objects {
            if !class_ids.contains(&object.class_id) {
                class_ids.push(object.class_id);
            }
        }

        // object offsets relative to the data section, 8 byte aligned
        let mut offsets = Vec::with_capacity(self.objects.len());
        let mut data_size = 0usize;
        for object in &self.objects {
            offsets.push(data_size);
            data_size = (data_size + object.data.len() + 7) & !7;
        }

        let mut meta = ObjectWriter::new(self.endianness);
        // metadata starts at header_size, a multiple of 4, so local alignment equals file alignment
        meta.cstring(&self.unity_version).u32(19).bool(self.type_tree);
        meta.i32(class_ids.len() as i32);
        for class_id in &class_ids {
            meta.i32(*class_id).u8(0).i16(-1);
            if *class_id == 114 || *class_id < 0 {
                meta.raw(&[0u8; 16]);
            }
            meta.raw(&[0xAB; 16]);
            if self.type_tree {
                // two nodes and a small string buffer, skipped by the reader
                let node_size = if self.format_version >= 19 { 32 } else { 24 };
                meta.i32(2).i32(10).raw(&vec![0x11; 2 * node_size]).raw(&[0x22; 10]);
                if self.format_version >= 21 {
                    meta.i32(1).u32(7);
                }
            }
        }

        meta.i32(self.objects.len() as i32);
        for (object, offset) in self.objects.iter().zip(&offsets) {
            meta.align();
            meta.i64(object.path_id);
            if self.format_version >= 22 {
                meta.i64(*offset as i64);
            } else {
                meta.u32(*offset as u32);
            }
            let type_index = class_ids.iter().position(|c| *c == object.class_id).unwrap_or(0);
            meta.u32(object.data.len() as u32).i32(type_index as i32);
        }

        meta.i32(0); // script types
        meta.i32(self.externals.len() as i32);
        for path in &self.externals {
            meta.cstring("").raw(&[0u8; 16]).i32(0).cstring(path);
        }
        if self.format_version >= 20 {
            meta.i32(0); // ref types
        }
        meta.cstring("");

        let metadata_size = meta.buf.len();
        let data_offset = (self.header_size() + metadata_size + 15) & !15;
        let file_size = self
            .declared_file_size
            .unwrap_or((data_offset + data_size) as u64);

        let mut out = Vec::with_capacity(data_offset + data_size);
        if self.format_version >= 22 {
            out.extend_from_slice(&[0u8; 8]);
            out.extend_from_slice(&self.format_version.to_be_bytes());
            out.extend_from_slice(&[0u8; 4]);
        } else {
            out.extend_from_slice(&(metadata_size as u32).to_be_bytes());
            out.extend_from_slice(&(file_size as u32).to_be_bytes());
            out.extend_from_slice(&self.format_version.to_be_bytes());
            out.extend_from_slice(&(data_offset as u32).to_be_bytes());
        }
        out.push(match self.endianness {
            Endianness::Little => 0,
            Endianness::Big => 1,
        });
        out.extend_from_slice(&[0u8; 3]);
        if self.format_version >= 22 {
            out.extend_from_slice(&(metadata_size as u32).to_be_bytes());
            out.extend_from_slice(&(file_size as i64).to_be_bytes());
            out.extend_from_slice(&(data_offset as i64).to_be_bytes());
            out.extend_from_slice(&0i64.to_be_bytes());
        }
        out.extend_from_slice(&meta.buf);
        out.resize(data_offset, 0);

        for (object, offset) in self.objects.iter().zip(&offsets) {
            out.resize(data_offset + offset, 0);
            out.extend_from_slice(&object.data);
        }
        out.resize(data_offset + data_size, 0);
        out
    }
}

impl Default for SerializedFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn encode_game_object(v: &UnityGameObject) -> Vec<u8> {
    let mut w = ObjectWriter::little();
    w.array(&v.components, |w, c| {
        w.pptr(*c);
    })
    .u32(v.layer)
    .string(&v.name)
    .u16(v.tag)
    .bool(v.is_active)
    .align();
    w.buf
}

pub fn encode_transform(v: &UnityTransform) -> Vec<u8> {
    let mut w = ObjectWriter::little();
    w.pptr(v.game_object)
        .f32(v.local_rotation.x)
        .f32(v.local_rotation.y)
        .f32(v.local_rotation.z)
        .f32(v.local_rotation.w)
        .vec3(v.local_position)
        .vec3(v.local_scale)
        .array(&v.children, |w, c| {
            w.pptr(*c);
        })
        .pptr(v.father);
    w.buf
}

pub fn encode_mesh_filter(v: &UnityMeshFilter) -> Vec<u8> {
    let mut w = ObjectWriter::little();
    w.pptr(v.game_object).pptr(v.mesh);
    w.buf
}

pub fn encode_mesh_renderer(v: &UnityMeshRenderer) -> Vec<u8> {
    let mut w = ObjectWriter::little();
    w.pptr(v.game_object)
        .bool(v.enabled)
        .u8(v.cast_shadows)
        .u8(v.receive_shadows)
        .u8(1) // dynamic occludee
        .u8(0) // motion vectors
        .u8(1) // light probe usage
        .u8(1) // reflection probe usage
        .u8(0) // ray tracing mode
        .align()
        .u32(1) // rendering layer mask
        .i32(0) // renderer priority
        .u16(v.lightmap_index)
        .u16(0xFFFF)
        .vec4(v.lightmap_tiling_offset)
        .vec4(Vector4f::default())
        .array(&v.materials, |w, m| {
            w.pptr(*m);
        })
        .u16(v.static_batch_info.first_sub_mesh)
        .u16(v.static_batch_info.sub_mesh_count)
        .pptr(v.static_batch_root);
    w.buf
}

pub fn encode_material(v: &UnityMaterial) -> Vec<u8> {
    let props = &v.saved_properties;
    let mut w = ObjectWriter::little();
    w.string(&v.name)
        .pptr(v.shader)
        .string(&v.shader_keywords.join(" "))
        .u32(v.lightmap_flags)
        .bool(v.enable_instancing_variants)
        .bool(v.double_sided_gi)
        .align()
        .i32(v.custom_render_queue)
        .array(&v.string_tag_map, |w, (k, val)| {
            w.string(k).string(val);
        })
        .array(&v.disabled_shader_passes, |w, p| {
            w.string(p);
        })
        .array(&props.tex_envs, |w, (k, env)| {
            w.string(k).pptr(env.texture).vec2(env.scale).vec2(env.offset);
        })
        .array(&props.floats, |w, (k, f)| {
            w.string(k).f32(*f);
        })
        .array(&props.colors, |w, (k, c)| {
            w.string(k).color(*c);
        });
    w.buf
}

pub fn encode_shader(v: &UnityShader) -> Vec<u8> {
    let mut w = ObjectWriter::little();
    w.string(&v.name)
        .array(&v.properties, |w, p| {
            w.string(&p.name)
                .string(&p.description)
                .array(&p.attributes, |w, a| {
                    w.string(a);
                })
                .i32(p.property_type)
                .u32(p.flags)
                .floats(&p.default_value)
                .string(&p.default_texture.default_name)
                .i32(p.default_texture.texture_dimension);
        })
        .array(&v.sub_shaders, |w, sub_shader| {
            w.array(&sub_shader.passes, encode_pass)
                .tags(&sub_shader.tags)
                .i32(sub_shader.lod);
        });
    w.buf
}

impl ObjectWriter {
    pub fn tags(&mut self, tags: &[(String, String)]) -> &mut Self {
        self.array(tags, |w, (key, value)| {
            w.string(key).string(value);
        })
    }

    pub fn state_value(&mut self, v: &SerializedShaderFloatValue) -> &mut Self {
        self.f32(v.value).string(&v.name)
    }

    fn stencil_op(&mut self, v: &SerializedStencilOp) -> &mut Self {
        self.state_value(&v.pass)
            .state_value(&v.fail)
            .state_value(&v.z_fail)
            .state_value(&v.comp)
    }
}

fn encode_pass(w: &mut ObjectWriter, pass: &SerializedPass) {
    let empty = SerializedProgram::default();
    w.array(&pass.name_indices, |w, (name, index)| {
        w.string(name).i32(*index);
    })
    .i32(pass.pass_type);
    encode_state(w, &pass.state);
    w.u32(pass.program_mask);
    for program in [
        &pass.prog_vertex,
        &pass.prog_fragment,
        &pass.prog_geometry,
        &pass.prog_hull,
        &pass.prog_domain,
        pass.prog_ray_tracing.as_ref().unwrap_or(&empty),
    ] {
        encode_program(w, program);
    }
    w.bool(pass.has_instancing_variant)
        .bool(pass.has_procedural_instancing_variant.unwrap_or(false))
        .align()
        .string(&pass.use_name)
        .string(&pass.name)
        .string(&pass.texture_name)
        .tags(&pass.tags);
}

fn encode_state(w: &mut ObjectWriter, state: &SerializedShaderState) {
    w.string(&state.name);
    for target in 0..RT_BLEND_TARGETS {
        let blend = state.rt_blend.get(target).cloned().unwrap_or_default();
        w.state_value(&blend.src_blend)
            .state_value(&blend.dest_blend)
            .state_value(&blend.src_blend_alpha)
            .state_value(&blend.dest_blend_alpha)
            .state_value(&blend.blend_op)
            .state_value(&blend.blend_op_alpha)
            .state_value(&blend.col_mask);
    }
    w.bool(state.rt_separate_blend)
        .align()
        .state_value(&state.z_clip.clone().unwrap_or_default())
        .state_value(&state.z_test)
        .state_value(&state.z_write)
        .state_value(&state.culling)
        .state_value(&state.offset_factor)
        .state_value(&state.offset_units)
        .state_value(&state.alpha_to_mask)
        .stencil_op(&state.stencil_op)
        .stencil_op(&state.stencil_op_front)
        .stencil_op(&state.stencil_op_back)
        .state_value(&state.stencil_read_mask)
        .state_value(&state.stencil_write_mask)
        .state_value(&state.stencil_ref)
        .state_value(&state.fog_start)
        .state_value(&state.fog_end)
        .state_value(&state.fog_density)
        .state_value(&state.fog_color.x)
        .state_value(&state.fog_color.y)
        .state_value(&state.fog_color.z)
        .state_value(&state.fog_color.w)
        .string(&state.fog_color.name)
        .i32(state.fog_mode)
        .i32(state.gpu_program_id)
        .tags(&state.tags)
        .i32(state.lod)
        .bool(state.lighting)
        .align();
}

fn encode_program(w: &mut ObjectWriter, program: &SerializedProgram) {
    w.array(&program.sub_programs, |w, sub_program| {
        w.u32(sub_program.blob_index)
            .array(&sub_program.channels.channels, |w, channel| {
                w.u8(channel.source).u8(channel.target);
            })
            .u32(sub_program.channels.source_map)
            .array(sub_program.global_keyword_indices.as_deref().unwrap_or_default(), |w, i| {
                w.u16(*i);
            })
            .array(sub_program.local_keyword_indices.as_deref().unwrap_or_default(), |w, i| {
                w.u16(*i);
            })
            .u8(sub_program.shader_hardware_tier)
            .u8(sub_program.gpu_program_type)
            .align();
        encode_parameters(w, &sub_program.parameters);
        w.i32(sub_program.shader_requirements.unwrap_or(0) as i32);
    });
}

fn encode_parameters(w: &mut ObjectWriter, parameters: &SerializedProgramParameters) {
    fn vector(w: &mut ObjectWriter, p: &VectorParameter) {
        w.i32(p.name_index).i32(p.index).i32(p.array_size).u8(p.param_type).u8(p.dim).align();
    }
    fn matrix(w: &mut ObjectWriter, p: &MatrixParameter) {
        w.i32(p.name_index).i32(p.index).i32(p.array_size).u8(p.param_type).u8(p.row_count).align();
    }
    fn binding(w: &mut ObjectWriter, p: &BufferBinding) {
        w.i32(p.name_index).i32(p.index);
    }

    w.array(&parameters.vector_params, vector)
        .array(&parameters.matrix_params, matrix)
        .array(&parameters.texture_params, |w, p| {
            w.i32(p.name_index)
                .i32(p.index)
                .i32(p.sampler_index)
                .bool(p.multi_sampled.unwrap_or(false))
                .u8(p.dim)
                .align();
        })
        .array(&parameters.buffer_params, binding)
        .array(&parameters.constant_buffers, |w, cb| {
            w.i32(cb.name_index)
                .array(&cb.matrix_params, matrix)
                .array(&cb.vector_params, vector)
                .array(cb.struct_params.as_deref().unwrap_or_default(), |w, sp| {
                    w.i32(sp.name_index)
                        .i32(sp.index)
                        .i32(sp.array_size)
                        .i32(sp.struct_size)
                        .array(&sp.vector_params, vector)
                        .array(&sp.matrix_params, matrix);
                })
                .i32(cb.size);
        })
        .array(&parameters.constant_buffer_bindings, binding)
        .array(&parameters.uav_params, |w, p| {
            w.i32(p.name_index).i32(p.index).i32(p.original_index);
        })
        .array(parameters.samplers.as_deref().unwrap_or_default(), |w, p| {
            w.u32(p.sampler).i32(p.bind_point);
        });
}

pub fn encode_texture(v: &UnityTexture2D) -> Vec<u8> {
    let s = &v.texture_settings;
    let mut w = ObjectWriter::little();
    w.string(&v.name)
        .i32(v.forced_fallback_format)
        .bool(v.downscale_fallback)
        .align()
        .i32(v.width)
        .i32(v.height)
        .i32(v.complete_image_size)
        .i32(v.texture_format)
        .i32(v.mip_count)
        .bool(v.is_readable)
        .bool(v.ignore_master_texture_limit)
        .bool(v.streaming_mipmaps)
        .align()
        .i32(v.streaming_mipmaps_priority)
        .i32(v.image_count)
        .i32(v.texture_dimension)
        .i32(s.filter_mode)
        .i32(s.aniso)
        .f32(s.mip_bias)
        .i32(s.wrap_u)
        .i32(s.wrap_v)
        .i32(s.wrap_w)
        .i32(v.lightmap_format)
        .i32(v.color_space)
        .bytes(&v.image_data)
        .streaming_info(&v.stream_data);
    w.buf
}

pub fn encode_mesh(v: &UnityMesh) -> Vec<u8> {
    let mut w = ObjectWriter::little();
    w.string(&v.name).array(&v.sub_meshes, |w, s| {
        w.u32(s.first_byte)
            .u32(s.index_count)
            .i32(s.topology)
            .u32(s.base_vertex)
            .u32(s.first_vertex)
            .u32(s.vertex_count)
            .aabb(s.local_aabb);
    });

    w.array(&v.shapes.vertices, |w, s| {
        w.vec3(s.vertex).vec3(s.normal).vec3(s.tangent).u32(s.index);
    })
    .array(&v.shapes.shapes, |w, s| {
        w.u32(s.first_vertex)
            .u32(s.vertex_count)
            .bool(s.has_normals)
            .bool(s.has_tangents)
            .align();
    })
    .array(&v.shapes.channels, |w, c| {
        w.string(&c.name).u32(c.name_hash).i32(c.frame_index).i32(c.frame_count);
    })
    .array(&v.shapes.full_weights, |w, f| {
        w.f32(*f);
    });

    w.array(&v.bind_pose, |w, m| {
        w.floats(&m.e);
    })
    .array(&v.bone_name_hashes, |w, h| {
        w.u32(*h);
    })
    .u32(v.root_bone_name_hash)
    .array(&v.bones_aabb, |w, b| {
        w.vec3(b.min).vec3(b.max);
    })
    .array(&v.variable_bone_count_weights, |w, h| {
        w.u32(*h);
    })
    .u8(v.mesh_compression)
    .bool(v.is_readable)
    .bool(v.keep_vertices)
    .bool(v.keep_indices)
    .align()
    .i32(v.index_format as i32)
    .bytes(&v.index_buffer);

    w.u32(v.vertex_data.vertex_count)
        .array(&v.vertex_data.channels, |w, c| {
            w.u8(c.stream).u8(c.offset).u8(c.format).u8(c.dimension);
        })
        .bytes(&v.vertex_data.data);

    let c = &v.compressed_mesh;
    w.packed_floats(&c.vertices)
        .packed_floats(&c.uv)
        .packed_floats(&c.normals)
        .packed_floats(&c.tangents)
        .packed_ints(&c.weights)
        .packed_ints(&c.normal_signs)
        .packed_ints(&c.tangent_signs)
        .packed_floats(&c.float_colors)
        .packed_ints(&c.bone_indices)
        .packed_ints(&c.triangles)
        .u32(c.uv_info);

    w.aabb(v.local_aabb)
        .i32(v.mesh_usage_flags)
        .bytes(&v.baked_convex_collision_mesh)
        .bytes(&v.baked_triangle_collision_mesh)
        .floats(&v.mesh_metrics)
        .streaming_info(&v.stream_data);
    w.buf
}

/// Packs values into `bit_size` bit fields, LSB first, the inverse of `unpack_bits`.
pub fn pack_bits(values: &[u32], bit_size: u8) -> Vec<u8> {
    let total_bits = values.len() * bit_size as usize;
    let mut data = vec![0u8; total_bits.div_ceil(8)];
    let mut bit = 0usize;
    for value in values {
        for i in 0..bit_size as usize {
            if (value >> i) & 1 == 1 {
                data[bit / 8] |= 1 << (bit % 8);
            }
            bit += 1;
        }
    }
    data
}
