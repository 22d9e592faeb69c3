use num_enum::TryFromPrimitive;

use crate::assets::error::AssetError;
use crate::rendering::common::types::{MaterialResource, PassState, StateValue};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u8)]
pub enum CullMode {
    Off = 0,
    Front = 1,
    Back = 2,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u8)]
pub enum CompareFunction {
    Disabled = 0,
    Never = 1,
    Less = 2,
    Equal = 3,
    LessEqual = 4,
    Greater = 5,
    NotEqual = 6,
    GreaterEqual = 7,
    Always = 8,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u8)]
pub enum BlendFactor {
    Zero = 0,
    One = 1,
    DstColor = 2,
    SrcColor = 3,
    OneMinusDstColor = 4,
    SrcAlpha = 5,
    OneMinusSrcColor = 6,
    DstAlpha = 7,
    OneMinusDstAlpha = 8,
    SrcAlphaSaturate = 9,
    OneMinusSrcAlpha = 10,
}

/// The order buckets are drawn in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SortBucket {
    Opaque,
    AlphaTest,
    Translucent,
}

const ALPHA_TEST_QUEUE: i32 = 2450;
const TRANSPARENT_QUEUE: i32 = 3000;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RenderState {
    pub cull: CullMode,
    pub depth_test: CompareFunction,
    pub depth_write: bool,
    pub src_blend: BlendFactor,
    pub dst_blend: BlendFactor,
    pub bucket: SortBucket,
}

impl Default for RenderState {
    fn default() -> Self {
        RenderState {
            cull: CullMode::Back,
            depth_test: CompareFunction::LessEqual,
            depth_write: true,
            src_blend: BlendFactor::One,
            dst_blend: BlendFactor::Zero,
            bucket: SortBucket::Opaque,
        }
    }
}

impl RenderState {
    /// Resolves the shader pass' fixed function state against the material: a value bound to a
    /// property reads the material's float, anything else is the pass literal. Values the engine
    /// cannot represent are rejected instead of guessed.
    pub fn from_material(material: &MaterialResource) -> Result<Self, AssetError> {
        let pass = material.pass_state.clone().unwrap_or_default();
        let z_write = pass.z_write.resolve(material);
        let depth_write = if z_write == 0.0 {
            false
        } else if z_write == 1.0 {
            true
        } else {
            return Err(AssetError::Unsupported(format!(
                "{}: {} must be 0 or 1, got {}",
                material.name,
                label(&pass.z_write, "ZWrite"),
                z_write
            )));
        };

        Ok(RenderState {
            cull: enum_state(material, &pass.cull, "Cull")?,
            depth_test: enum_state(material, &pass.z_test, "ZTest")?,
            depth_write,
            src_blend: enum_state(material, &pass.src_blend, "SrcBlend")?,
            dst_blend: enum_state(material, &pass.dst_blend, "DstBlend")?,
            bucket: Self::bucket(material, &pass)?,
        })
    }

    fn bucket(material: &MaterialResource, pass: &PassState) -> Result<SortBucket, AssetError> {
        if let Some(render_type) = material.tag("RenderType").or_else(|| pass.tag("RenderType")) {
            return match render_type {
                "Opaque" => Ok(SortBucket::Opaque),
                "TransparentCutout" => Ok(SortBucket::AlphaTest),
                "Transparent" => Ok(SortBucket::Translucent),
                other => Err(AssetError::Unsupported(format!(
                    "{}: unknown RenderType {:?}",
                    material.name, other
                ))),
            };
        }

        // -1 means "the shader's queue", approximated by the blend keywords
        let queue = material.custom_render_queue;
        let bucket = if queue < 0 {
            if material.has_keyword("_ALPHABLEND_ON") || material.has_keyword("_ALPHAPREMULTIPLY_ON") {
                SortBucket::Translucent
            } else if material.has_keyword("_ALPHATEST_ON") {
                SortBucket::AlphaTest
            } else {
                SortBucket::Opaque
            }
        } else if queue >= TRANSPARENT_QUEUE {
            SortBucket::Translucent
        } else if queue >= ALPHA_TEST_QUEUE {
            SortBucket::AlphaTest
        } else {
            SortBucket::Opaque
        };
        Ok(bucket)
    }
}

fn label<'a>(state: &'a StateValue, fixed: &'a str) -> &'a str {
    state.property.as_deref().unwrap_or(fixed)
}

fn enum_state<T: TryFromPrimitive<Primitive = u8>>(
    material: &MaterialResource,
    state: &StateValue,
    fixed: &str,
) -> Result<T, AssetError> {
    let value = state.resolve(material);
    let unsupported = || {
        AssetError::Unsupported(format!(
            "{}: {} has no mapping for {}",
            material.name,
            label(state, fixed),
            value
        ))
    };
    if value.fract() != 0.0 || !(0.0..=u8::MAX as f32).contains(&value) {
        return Err(unsupported());
    }
    T::try_from_primitive(value as u8).map_err(|_| unsupported())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn material(floats: &[(&str, f32)], tags: &[(&str, &str)], queue: i32) -> MaterialResource {
        MaterialResource {
            name: "test".to_string(),
            floats: floats.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            tags: tags.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            custom_render_queue: queue,
            ..Default::default()
        }
    }

    #[test]
    fn defaults_without_properties() -> Result<(), AssetError> {
        assert_eq!(RenderState::from_material(&material(&[], &[], -1))?, RenderState::default());
        Ok(())
    }

    #[test]
    fn transparent_materials() -> Result<(), AssetError> {
        let state = RenderState::from_material(&material(
            &[("_SrcBlend", 5.0), ("_DstBlend", 10.0), ("_ZWrite", 0.0), ("_Cull", 0.0)],
            &[("RenderType", "Transparent")],
            3000,
        ))?;
        assert_eq!(state.src_blend, BlendFactor::SrcAlpha);
        assert_eq!(state.dst_blend, BlendFactor::OneMinusSrcAlpha);
        assert!(!state.depth_write);
        assert_eq!(state.cull, CullMode::Off);
        assert_eq!(state.bucket, SortBucket::Translucent);
        Ok(())
    }

    #[test]
    fn queue_decides_without_a_render_type() -> Result<(), AssetError> {
        assert_eq!(RenderState::from_material(&material(&[], &[], 2450))?.bucket, SortBucket::AlphaTest);
        assert_eq!(RenderState::from_material(&material(&[], &[], 2000))?.bucket, SortBucket::Opaque);
        assert_eq!(RenderState::from_material(&material(&[], &[], 3100))?.bucket, SortBucket::Translucent);
        Ok(())
    }

    #[test]
    fn unknown_values_are_rejected() {
        let unknown_tag = material(&[], &[("RenderType", "TreeOpaque")], -1);
        assert!(matches!(RenderState::from_material(&unknown_tag), Err(AssetError::Unsupported(_))));

        let blend = material(&[("_SrcBlend", 11.0)], &[], -1);
        assert!(matches!(RenderState::from_material(&blend), Err(AssetError::Unsupported(_))));

        let fractional = material(&[("_ZTest", 2.5)], &[], -1);
        assert!(matches!(RenderState::from_material(&fractional), Err(AssetError::Unsupported(_))));

        let z_write = material(&[("_ZWrite", 2.0)], &[], -1);
        assert!(matches!(RenderState::from_material(&z_write), Err(AssetError::Unsupported(_))));

        let mut literal = material(&[], &[], -1);
        literal.pass_state = Some(PassState {
            cull: StateValue::literal(3.0),
            ..Default::default()
        });
        assert!(matches!(RenderState::from_material(&literal), Err(AssetError::Unsupported(_))));
    }

    fn fade_pass() -> PassState {
        PassState {
            cull: StateValue::bound("_CullMode", 2.0),
            z_test: StateValue::literal(8.0),
            z_write: StateValue::literal(0.0),
            src_blend: StateValue::bound("_SrcBlend", 1.0),
            dst_blend: StateValue::bound("_DstBlend", 0.0),
            tags: vec![("RenderType".to_string(), "Transparent".to_string())],
        }
    }

    #[test]
    fn pass_bindings_select_the_material_floats() -> Result<(), AssetError> {
        let mut fade = material(
            &[("_CullMode", 1.0), ("_Cull", 0.0), ("_ZTest", 2.0), ("_ZWrite", 1.0), ("_SrcBlend", 5.0)],
            &[],
            -1,
        );
        fade.pass_state = Some(fade_pass());

        let state = RenderState::from_material(&fade)?;
        assert_eq!(state.cull, CullMode::Front);
        // literals ignore same-named material floats
        assert_eq!(state.depth_test, CompareFunction::Always);
        assert!(!state.depth_write);
        assert_eq!(state.src_blend, BlendFactor::SrcAlpha);
        // bound but absent from the material
        assert_eq!(state.dst_blend, BlendFactor::Zero);
        assert_eq!(state.bucket, SortBucket::Translucent);
        Ok(())
    }

    #[test]
    fn material_tags_win_over_pass_tags() -> Result<(), AssetError> {
        let mut cutout = material(&[], &[("RenderType", "TransparentCutout")], -1);
        cutout.pass_state = Some(fade_pass());
        assert_eq!(RenderState::from_material(&cutout)?.bucket, SortBucket::AlphaTest);
        Ok(())
    }
}
