use rust_embed::RustEmbed;

use crate::assets::error::AssetError;
use crate::rendering::common::attributes::vertex_input_struct;
use crate::rendering::material::ShadingModel;
use crate::rendering::material::standard::{OptionValue, ShaderOptions};

#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/shaders/src"]
pub struct ScenestreamShaderSources;

const OPTIONS_MARKER: &str = "//#OPTIONS";
const VERTEX_INPUT_MARKER: &str = "//#VERTEX_INPUT";

pub fn template(model: ShadingModel) -> Result<String, AssetError> {
    let name = model.template_name();
    let file = ScenestreamShaderSources::get(name)
        .ok_or_else(|| AssetError::InvariantViolation(format!("shader template {} is not embedded", name)))?;
    String::from_utf8(file.data.into_owned())
        .map_err(|e| AssetError::InvariantViolation(format!("shader template {}: {}", name, e)))
}

/// The model's template with its options turned into constants and the vertex input struct
/// spliced in.
pub fn generate(model: ShadingModel, options: &ShaderOptions) -> Result<String, AssetError> {
    let template = template(model)?;
    let constants = options
        .values
        .iter()
        .map(|(name, value)| match value {
            OptionValue::Bool(value) => format!("const {}: bool = {};\n", name, value),
            OptionValue::Int(value) => format!("const {}: i32 = {};\n", name, value),
        })
        .collect::<String>();
    let vertex_input = vertex_input_struct("VertexInput", model.vertex_inputs());

    Ok(template
        .replace(OPTIONS_MARKER, &constants)
        .replace(VERTEX_INPUT_MARKER, &vertex_input))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(alpha_test: bool, uv_sec: i32) -> ShaderOptions {
        ShaderOptions {
            values: vec![
                ("ALPHATEST", OptionValue::Bool(alpha_test)),
                ("UV_SEC", OptionValue::Int(uv_sec)),
            ],
        }
    }

    #[test]
    fn template_has_markers() -> Result<(), AssetError> {
        let template = template(ShadingModel::Standard)?;
        assert!(template.contains(OPTIONS_MARKER));
        assert!(template.contains(VERTEX_INPUT_MARKER));
        Ok(())
    }

    #[test]
    fn options_become_constants() -> Result<(), AssetError> {
        let source = generate(ShadingModel::Standard, &options(true, 1))?;
        assert!(source.contains("const ALPHATEST: bool = true;"));
        assert!(source.contains("const UV_SEC: i32 = 1;"));
        assert!(source.contains("@location(0) position: vec3<f32>,"));
        assert!(!source.contains(OPTIONS_MARKER));
        assert!(!source.contains(VERTEX_INPUT_MARKER));

        assert_eq!(source, generate(ShadingModel::Standard, &options(true, 1))?);
        assert_ne!(source, generate(ShadingModel::Standard, &options(false, 1))?);
        Ok(())
    }
}
