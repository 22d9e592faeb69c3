//! Unity's built-in "Standard" shader: its options, uniform block and texture slots.

use encase::{ShaderType, UniformBuffer};
use glam::Vec4;

use crate::assets::error::AssetError;
use crate::rendering::common::attributes::VertexSemantic;
use crate::rendering::common::types::MaterialResource;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum OptionKind {
    Bool,
    Int,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum OptionValue {
    Bool(bool),
    Int(i32),
}

#[derive(Debug, Copy, Clone)]
pub struct ShaderOptionDecl {
    pub name: &'static str,
    pub kind: OptionKind,
}

const fn bool_option(name: &'static str) -> ShaderOptionDecl {
    ShaderOptionDecl {
        name,
        kind: OptionKind::Bool,
    }
}

const fn int_option(name: &'static str) -> ShaderOptionDecl {
    ShaderOptionDecl {
        name,
        kind: OptionKind::Int,
    }
}

pub const STANDARD_OPTIONS: [ShaderOptionDecl; 11] = [
    bool_option("ALPHATEST"),
    bool_option("ALPHABLEND"),
    bool_option("ALPHAPREMULTIPLY"),
    bool_option("NORMALMAP"),
    bool_option("EMISSION"),
    bool_option("METALLIC_GLOSS_MAP"),
    bool_option("DETAIL"),
    bool_option("HAS_ALBEDO_MAP"),
    bool_option("OCCLUSION_MAP"),
    // 0: metallic map alpha, 1: albedo alpha
    int_option("SMOOTHNESS_SOURCE"),
    // uv set of the detail maps
    int_option("UV_SEC"),
];

/// Concrete option values, in declaration order. Equal options generate equal source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderOptions {
    pub values: Vec<(&'static str, OptionValue)>,
}

impl ShaderOptions {
    pub fn get(&self, name: &str) -> Option<OptionValue> {
        self.values
            .iter()
            .find(|(option, _)| *option == name)
            .map(|(_, value)| *value)
    }

    pub fn enabled(&self, name: &str) -> bool {
        matches!(self.get(name), Some(OptionValue::Bool(true)))
    }
}

/// Derives the option values from keywords, bound textures and floats of `material`.
pub fn shader_options(material: &MaterialResource) -> ShaderOptions {
    let values = STANDARD_OPTIONS
        .iter()
        .map(|decl| {
            let value = match decl.name {
                "ALPHATEST" => OptionValue::Bool(material.has_keyword("_ALPHATEST_ON")),
                "ALPHABLEND" => OptionValue::Bool(material.has_keyword("_ALPHABLEND_ON")),
                "ALPHAPREMULTIPLY" => OptionValue::Bool(material.has_keyword("_ALPHAPREMULTIPLY_ON")),
                "NORMALMAP" => OptionValue::Bool(material.has_keyword("_NORMALMAP") || material.has_texture("_BumpMap")),
                "EMISSION" => OptionValue::Bool(material.has_keyword("_EMISSION")),
                "METALLIC_GLOSS_MAP" => OptionValue::Bool(
                    material.has_keyword("_METALLICGLOSSMAP") || material.has_texture("_MetallicGlossMap"),
                ),
                "DETAIL" => OptionValue::Bool(material.has_keyword("_DETAIL_MULX2")),
                "HAS_ALBEDO_MAP" => OptionValue::Bool(material.has_texture("_MainTex")),
                "OCCLUSION_MAP" => OptionValue::Bool(material.has_texture("_OcclusionMap")),
                "SMOOTHNESS_SOURCE" => OptionValue::Int(
                    if material.has_keyword("_SMOOTHNESS_TEXTURE_ALBEDO_CHANNEL_A") {
                        1
                    } else {
                        material.float("_SmoothnessTextureChannel").unwrap_or(0.0) as i32
                    },
                ),
                "UV_SEC" => OptionValue::Int(material.float("_UVSec").unwrap_or(0.0) as i32),
                _ => match decl.kind {
                    OptionKind::Bool => OptionValue::Bool(false),
                    OptionKind::Int => OptionValue::Int(0),
                },
            };
            (decl.name, value)
        })
        .collect();
    ShaderOptions { values }
}

/// The material's uniform block, laid out like `StandardMaterialUniforms` in `standard.wgsl`.
#[derive(Debug, Copy, Clone, PartialEq, ShaderType)]
pub struct StandardMaterialUniforms {
    pub main_tex_st: Vec4,
    pub detail_albedo_map_st: Vec4,
    pub color: Vec4,
    pub emission_color: Vec4,
    pub cutoff: f32,
    pub glossiness: f32,
    pub glossiness_scale: f32,
    pub metallic: f32,
    pub bump_scale: f32,
    pub occlusion_strength: f32,
    pub detail_normal_map_scale: f32,
}

impl Default for StandardMaterialUniforms {
    fn default() -> Self {
        StandardMaterialUniforms {
            main_tex_st: Vec4::new(1.0, 1.0, 0.0, 0.0),
            detail_albedo_map_st: Vec4::new(1.0, 1.0, 0.0, 0.0),
            color: Vec4::ONE,
            emission_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            cutoff: 0.5,
            glossiness: 0.5,
            glossiness_scale: 1.0,
            metallic: 0.0,
            bump_scale: 1.0,
            occlusion_strength: 1.0,
            detail_normal_map_scale: 1.0,
        }
    }
}

impl StandardMaterialUniforms {
    /// Fills the block from the material's named parameters, missing ones keep the shader defaults.
    pub fn from_material(material: &MaterialResource) -> Self {
        let defaults = StandardMaterialUniforms::default();
        let st = |name: &str, default: Vec4| material.texture(name).map(|texture| texture.st()).unwrap_or(default);
        let float = |name: &str, default: f32| material.float(name).unwrap_or(default);

        StandardMaterialUniforms {
            main_tex_st: st("_MainTex", defaults.main_tex_st),
            detail_albedo_map_st: st("_DetailAlbedoMap", defaults.detail_albedo_map_st),
            color: material.color("_Color").unwrap_or(defaults.color),
            emission_color: material.color("_EmissionColor").unwrap_or(defaults.emission_color),
            cutoff: float("_Cutoff", defaults.cutoff),
            glossiness: float("_Glossiness", defaults.glossiness),
            glossiness_scale: float("_GlossMapScale", defaults.glossiness_scale),
            metallic: float("_Metallic", defaults.metallic),
            bump_scale: float("_BumpScale", defaults.bump_scale),
            occlusion_strength: float("_OcclusionStrength", defaults.occlusion_strength),
            detail_normal_map_scale: float("_DetailNormalMapScale", defaults.detail_normal_map_scale),
        }
    }

    /// The std140 bytes of the block.
    pub fn uniform_bytes(&self) -> Result<Vec<u8>, AssetError> {
        let mut buffer = UniformBuffer::new(Vec::<u8>::new());
        buffer
            .write(self)
            .map_err(|e| AssetError::InvariantViolation(format!("uniform layout: {}", e)))?;
        Ok(buffer.into_inner())
    }
}

/// A texture slot of the generated shader.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SamplerSlot {
    /// The material property bound to the slot.
    pub property: &'static str,
    pub texture_binding: u32,
    pub sampler_binding: u32,
}

const fn sampler_slot(property: &'static str, index: u32) -> SamplerSlot {
    SamplerSlot {
        property,
        texture_binding: 1 + 2 * index,
        sampler_binding: 2 + 2 * index,
    }
}

pub const STANDARD_SAMPLERS: [SamplerSlot; 6] = [
    sampler_slot("_MainTex", 0),
    sampler_slot("_BumpMap", 1),
    sampler_slot("_MetallicGlossMap", 2),
    sampler_slot("_OcclusionMap", 3),
    sampler_slot("_EmissionMap", 4),
    sampler_slot("_DetailAlbedoMap", 5),
];

pub const STANDARD_VERTEX_INPUTS: [VertexSemantic; 5] = [
    VertexSemantic::Position,
    VertexSemantic::Normal,
    VertexSemantic::Tangent,
    VertexSemantic::TexCoord0,
    VertexSemantic::TexCoord1,
];

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::rendering::common::types::MaterialTexture;

    fn material() -> MaterialResource {
        MaterialResource {
            name: "Rock".to_string(),
            shader_name: Some("Standard".to_string()),
            keywords: vec!["_ALPHATEST_ON".to_string(), "_NORMALMAP".to_string()],
            textures: vec![MaterialTexture {
                name: "_MainTex".to_string(),
                texture: None,
                scale: Vec2::new(2.0, 3.0),
                offset: Vec2::new(0.25, 0.5),
            }],
            floats: vec![("_Cutoff".to_string(), 0.3), ("_UVSec".to_string(), 1.0)],
            colors: vec![("_Color".to_string(), Vec4::new(0.5, 0.5, 0.5, 1.0))],
            ..Default::default()
        }
    }

    #[test]
    fn options_follow_keywords_and_textures() {
        let options = shader_options(&material());
        assert_eq!(options.values.len(), STANDARD_OPTIONS.len());
        assert!(options.enabled("ALPHATEST"));
        assert!(options.enabled("NORMALMAP"));
        assert!(!options.enabled("ALPHABLEND"));
        // declared, but without a loaded texture
        assert!(!options.enabled("HAS_ALBEDO_MAP"));
        assert_eq!(options.get("UV_SEC"), Some(OptionValue::Int(1)));
    }

    #[test]
    fn uniforms_from_named_parameters() -> Result<(), anyhow::Error> {
        let uniforms = StandardMaterialUniforms::from_material(&material());
        assert_eq!(uniforms.main_tex_st, Vec4::new(2.0, 3.0, 0.25, 0.5));
        assert_eq!(uniforms.detail_albedo_map_st, Vec4::new(1.0, 1.0, 0.0, 0.0));
        assert_eq!(uniforms.cutoff, 0.3);
        assert_eq!(uniforms.glossiness, 0.5);
        assert_eq!(uniforms.color, Vec4::new(0.5, 0.5, 0.5, 1.0));

        // four vec4s and seven floats, rounded up to 16 bytes
        let bytes = uniforms.uniform_bytes()?;
        assert_eq!(bytes.len(), 96);
        assert_eq!(&bytes[0..4], &2.0f32.to_le_bytes());
        assert_eq!(&bytes[64..68], &0.3f32.to_le_bytes());
        Ok(())
    }

    #[test]
    fn sampler_bindings_do_not_overlap() {
        let mut bindings = STANDARD_SAMPLERS
            .iter()
            .flat_map(|slot| [slot.texture_binding, slot.sampler_binding])
            .collect::<Vec<_>>();
        bindings.sort();
        bindings.dedup();
        assert_eq!(bindings, (1..=12).collect::<Vec<_>>());
    }
}
