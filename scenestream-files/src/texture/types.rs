use std::io::{Read, Seek};

use num_enum::{IntoPrimitive, TryFromPrimitive};
use scenestream_files_derive_parseable::Parse;

use crate::ParserError;
use crate::common::reader::{align, read_byte_array, ParseContext, Parseable};
use crate::common::types::StreamingInfo;
use crate::common::version::UnityVersion;

#[derive(Debug, Clone, Default)]
pub struct UnityTexture2D {
    pub name: String,
    pub forced_fallback_format: i32,
    pub downscale_fallback: bool,
    pub is_alpha_channel_optional: bool,
    pub width: i32,
    pub height: i32,
    pub complete_image_size: i32,
    pub mips_stripped: i32,
    pub texture_format: i32,
    pub mip_count: i32,
    pub is_readable: bool,
    pub is_pre_processed: bool,
    pub ignore_master_texture_limit: bool,
    pub streaming_mipmaps: bool,
    pub streaming_mipmaps_priority: i32,
    pub image_count: i32,
    pub texture_dimension: i32,
    pub texture_settings: TextureSettings,
    pub lightmap_format: i32,
    pub color_space: i32,
    pub platform_blob: Vec<u8>,
    pub image_data: Vec<u8>,
    pub stream_data: StreamingInfo,
}

impl UnityTexture2D {
    pub fn format(&self) -> Option<TextureFormat> {
        TextureFormat::try_from(self.texture_format).ok()
    }

    pub fn color_space(&self) -> ColorSpace {
        ColorSpace::try_from(self.color_space).unwrap_or(ColorSpace::Gamma)
    }
}

impl Parseable<UnityTexture2D> for UnityTexture2D {
    fn parse<R: Read + Seek>(rdr: &mut R, ctx: &ParseContext) -> Result<UnityTexture2D, ParserError> {
        let mut texture = UnityTexture2D {
            name: String::parse(rdr, ctx)?,
            forced_fallback_format: i32::parse(rdr, ctx)?,
            downscale_fallback: bool::parse(rdr, ctx)?,
            ..Default::default()
        };
        if ctx.at_least(2020, 2) {
            texture.is_alpha_channel_optional = bool::parse(rdr, ctx)?;
        }
        align(rdr)?;

        texture.width = i32::parse(rdr, ctx)?;
        texture.height = i32::parse(rdr, ctx)?;
        texture.complete_image_size = i32::parse(rdr, ctx)?;
        if ctx.at_least(2020, 1) {
            texture.mips_stripped = i32::parse(rdr, ctx)?;
        }
        texture.texture_format = i32::parse(rdr, ctx)?;
        texture.mip_count = i32::parse(rdr, ctx)?;

        texture.is_readable = bool::parse(rdr, ctx)?;
        if ctx.at_least(2020, 1) {
            texture.is_pre_processed = bool::parse(rdr, ctx)?;
        }
        if ctx.version >= UnityVersion::new(2019, 3, 0) {
            texture.ignore_master_texture_limit = bool::parse(rdr, ctx)?;
        }
        if ctx.at_least(2018, 2) {
            texture.streaming_mipmaps = bool::parse(rdr, ctx)?;
        }
        align(rdr)?;
        if ctx.at_least(2018, 2) {
            texture.streaming_mipmaps_priority = i32::parse(rdr, ctx)?;
        }

        texture.image_count = i32::parse(rdr, ctx)?;
        texture.texture_dimension = i32::parse(rdr, ctx)?;
        texture.texture_settings = TextureSettings::parse(rdr, ctx)?;
        texture.lightmap_format = i32::parse(rdr, ctx)?;
        texture.color_space = i32::parse(rdr, ctx)?;
        if ctx.at_least(2020, 2) {
            texture.platform_blob = read_byte_array(rdr, ctx)?;
        }
        texture.image_data = read_byte_array(rdr, ctx)?;
        texture.stream_data = StreamingInfo::parse(rdr, ctx)?;
        Ok(texture)
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Parse)]
pub struct TextureSettings {
    pub filter_mode: i32,
    pub aniso: i32,
    pub mip_bias: f32,
    pub wrap_u: i32,
    pub wrap_v: i32,
    pub wrap_w: i32,
}

#[allow(non_camel_case_types)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(i32)]
pub enum TextureFormat {
    Alpha8 = 1,
    ARGB4444 = 2,
    RGB24 = 3,
    RGBA32 = 4,
    ARGB32 = 5,
    RGB565 = 7,
    R16 = 9,
    DXT1 = 10,
    DXT5 = 12,
    RGBA4444 = 13,
    BGRA32 = 14,
    RHalf = 15,
    RGHalf = 16,
    RGBAHalf = 17,
    RFloat = 18,
    RGFloat = 19,
    RGBAFloat = 20,
    BC6H = 24,
    BC7 = 25,
    BC4 = 26,
    BC5 = 27,
    DXT1Crunched = 28,
    DXT5Crunched = 29,
    ETC_RGB4Crunched = 64,
    ETC2_RGBA8Crunched = 65,
}

impl TextureFormat {
    pub fn is_crunched(&self) -> bool {
        matches!(
            self,
            TextureFormat::DXT1Crunched
                | TextureFormat::DXT5Crunched
                | TextureFormat::ETC_RGB4Crunched
                | TextureFormat::ETC2_RGBA8Crunched
        )
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, TryFromPrimitive)]
#[repr(i32)]
pub enum ColorSpace {
    Linear = 0,
    Gamma = 1,
}
