use std::io::{Read, Seek};

use scenestream_files_derive_parseable::Parse;

use crate::ParserError;
use crate::common::reader::{align, ParseContext, Parseable};
use crate::common::types::{ColorRGBA, PPtr, Vector2f};

#[derive(Debug, Clone, Default)]
pub struct UnityMaterial {
    pub name: String,
    pub shader: PPtr,
    pub shader_keywords: Vec<String>,
    pub lightmap_flags: u32,
    pub enable_instancing_variants: bool,
    pub double_sided_gi: bool,
    pub custom_render_queue: i32,
    pub string_tag_map: Vec<(String, String)>,
    pub disabled_shader_passes: Vec<String>,
    pub saved_properties: UnityPropertySheet,
}

impl UnityMaterial {
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.string_tag_map
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_keyword(&self, keyword: &str) -> bool {
        self.shader_keywords.iter().any(|k| k == keyword)
    }
}

impl Parseable<UnityMaterial> for UnityMaterial {
    fn parse<R: Read + Seek>(rdr: &mut R, ctx: &ParseContext) -> Result<UnityMaterial, ParserError> {
        let name = String::parse(rdr, ctx)?;
        let shader = PPtr::parse(rdr, ctx)?;

        // Keywords used to be one space separated string, 2021.3 split them into valid and invalid ones.
        let shader_keywords = if ctx.at_least(2021, 3) {
            let valid = Vec::<String>::parse(rdr, ctx)?;
            let _invalid = Vec::<String>::parse(rdr, ctx)?;
            valid
        } else {
            String::parse(rdr, ctx)?
                .split_whitespace()
                .map(str::to_string)
                .collect()
        };

        let lightmap_flags = u32::parse(rdr, ctx)?;
        let enable_instancing_variants = bool::parse(rdr, ctx)?;
        let double_sided_gi = bool::parse(rdr, ctx)?;
        align(rdr)?;

        Ok(UnityMaterial {
            name,
            shader,
            shader_keywords,
            lightmap_flags,
            enable_instancing_variants,
            double_sided_gi,
            custom_render_queue: i32::parse(rdr, ctx)?,
            string_tag_map: Vec::<(String, String)>::parse(rdr, ctx)?,
            disabled_shader_passes: Vec::<String>::parse(rdr, ctx)?,
            saved_properties: UnityPropertySheet::parse(rdr, ctx)?,
        })
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Parse)]
pub struct UnityTexEnv {
    pub texture: PPtr,
    pub scale: Vector2f,
    pub offset: Vector2f,
}

#[derive(Debug, Clone, Default)]
pub struct UnityPropertySheet {
    pub tex_envs: Vec<(String, UnityTexEnv)>,
    pub ints: Vec<(String, i32)>,
    pub floats: Vec<(String, f32)>,
    pub colors: Vec<(String, ColorRGBA)>,
}

impl Parseable<UnityPropertySheet> for UnityPropertySheet {
    fn parse<R: Read + Seek>(rdr: &mut R, ctx: &ParseContext) -> Result<UnityPropertySheet, ParserError> {
        let tex_envs = Vec::<(String, UnityTexEnv)>::parse(rdr, ctx)?;
        let ints = if ctx.at_least(2021, 1) {
            Vec::<(String, i32)>::parse(rdr, ctx)?
        } else {
            Vec::new()
        };
        Ok(UnityPropertySheet {
            tex_envs,
            ints,
            floats: Vec::<(String, f32)>::parse(rdr, ctx)?,
            colors: Vec::<(String, ColorRGBA)>::parse(rdr, ctx)?,
        })
    }
}
