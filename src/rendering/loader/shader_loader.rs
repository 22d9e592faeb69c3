use bytes::Bytes;
use glam::Vec4;
use scenestream_files::common::reader::{parse_object, ParseContext};
use scenestream_files::shader::types::UnityShader;

use crate::assets::error::AssetError;
use crate::rendering::common::types::{PassState, ShaderProperty, ShaderResource, StateValue};

pub struct ShaderLoader {}

impl ShaderLoader {
    pub fn load(ctx: &ParseContext, data: Bytes) -> Result<ShaderResource, AssetError> {
        let shader = parse_object::<UnityShader>(&data, ctx)?;
        drop(data);

        let pass_state = shader.main_pass().map(|(sub_shader, pass)| {
            let state = &pass.state;
            let blend = state.rt_blend.first().cloned().unwrap_or_default();
            PassState {
                cull: StateValue::from(&state.culling),
                z_test: StateValue::from(&state.z_test),
                z_write: StateValue::from(&state.z_write),
                src_blend: StateValue::from(&blend.src_blend),
                dst_blend: StateValue::from(&blend.dest_blend),
                tags: sub_shader.tags.iter().chain(&pass.tags).cloned().collect(),
            }
        });

        let properties = shader
            .properties
            .into_iter()
            .map(|property| ShaderProperty {
                kind: property.kind(),
                name: property.name,
                description: property.description,
                flags: property.flags,
                default_value: Vec4::from_array(property.default_value),
                default_texture: property.default_texture.default_name,
            })
            .collect();

        Ok(ShaderResource {
            name: shader.name,
            properties,
            pass_state,
        })
    }
}
