use std::sync::Arc;

use bytes::Bytes;
use futures::future::join_all;
use glam::{Vec2, Vec4};
use scenestream_files::common::reader::{parse_object, ParseContext};
use scenestream_files::material::types::UnityMaterial;

use crate::assets::asset_file::AssetFile;
use crate::assets::error::AssetError;
use crate::assets::resolver::AssetManager;
use crate::assets::resource::ResourceKind;
use crate::rendering::common::types::{MaterialResource, MaterialTexture};

pub struct MaterialLoader {}

impl MaterialLoader {
    /// Decodes the property sheet and resolves the shader and every texture binding. The
    /// references are followed concurrently, possibly into other containers.
    pub async fn load(
        manager: &Arc<AssetManager>,
        file: &Arc<AssetFile>,
        ctx: &ParseContext,
        data: Bytes,
    ) -> Result<MaterialResource, AssetError> {
        let material = parse_object::<UnityMaterial>(&data, ctx)?;
        drop(data);

        let properties = material.saved_properties;
        let shader = manager.fetch_resource(ResourceKind::Shader, file, material.shader);
        let textures = join_all(
            properties
                .tex_envs
                .iter()
                .map(|(_, env)| manager.fetch_resource(ResourceKind::Texture2D, file, env.texture)),
        );
        let (shader, textures) = futures::join!(shader, textures);

        let shader = shader?;
        let shader = shader.as_ref().and_then(|resource| resource.as_shader());
        let shader_name = shader.map(|shader| shader.name.clone());
        let pass_state = shader.and_then(|shader| shader.pass_state.clone());

        let mut bindings = Vec::with_capacity(textures.len());
        for ((name, env), texture) in properties.tex_envs.into_iter().zip(textures) {
            bindings.push(MaterialTexture {
                name,
                texture: texture?.and_then(|resource| resource.as_texture().cloned()),
                scale: Vec2::new(env.scale.x, env.scale.y),
                offset: Vec2::new(env.offset.x, env.offset.y),
            });
        }

        Ok(MaterialResource {
            name: material.name,
            shader_name,
            keywords: material.shader_keywords,
            tags: material.string_tag_map,
            custom_render_queue: material.custom_render_queue,
            textures: bindings,
            floats: properties.floats,
            ints: properties.ints,
            colors: properties
                .colors
                .into_iter()
                .map(|(name, color)| (name, Vec4::new(color.r, color.g, color.b, color.a)))
                .collect(),
            pass_state,
        })
    }
}
