use log::warn;
use scenestream_files::texture::types::{ColorSpace, TextureFormat, TextureSettings, UnityTexture2D};

use crate::rendering::common::types::{mip_dimensions, GpuTextureFormat};
use crate::rendering::gpu::{AddressMode, FilterMode, SamplerDescriptor};

/// How the source bytes have to be rewritten before they match the GPU format.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Conversion {
    None,
    /// RGB24 has no GPU equivalent, an opaque alpha channel is added.
    ExpandRgb,
    /// The legacy ARGB32 byte order, swizzled to RGBA.
    SwizzleArgb,
}

impl Conversion {
    fn source_level_size(&self, format: GpuTextureFormat, width: u32, height: u32) -> usize {
        match self {
            Conversion::ExpandRgb => width.max(1) as usize * height.max(1) as usize * 3,
            _ => format.level_size(width, height),
        }
    }

    fn apply(&self, source: &[u8]) -> Vec<u8> {
        match self {
            Conversion::None => source.to_vec(),
            Conversion::ExpandRgb => source
                .chunks_exact(3)
                .flat_map(|rgb| [rgb[0], rgb[1], rgb[2], 0xFF])
                .collect(),
            Conversion::SwizzleArgb => source
                .chunks_exact(4)
                .flat_map(|argb| [argb[1], argb[2], argb[3], argb[0]])
                .collect(),
        }
    }
}

/// A texture ready for upload. `levels` is empty when the payload cannot be used.
#[derive(Debug, Clone)]
pub struct ImportedTexture {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub mip_count: u32,
    pub format: GpuTextureFormat,
    pub levels: Vec<Vec<u8>>,
    pub sampler: SamplerDescriptor,
}

pub struct TextureImporter {}

impl TextureImporter {
    /// `texture.image_data` has to hold the payload, streamed textures have it fetched by the
    /// loader before.
    pub fn import(texture: &UnityTexture2D) -> ImportedTexture {
        profiling::scope!("TextureImporter::import");
        let width = texture.width.max(1) as u32;
        let height = texture.height.max(1) as u32;
        let srgb = texture.color_space() == ColorSpace::Gamma;
        let sampler = Self::sampler(&texture.texture_settings);

        let mapped = texture.format().and_then(|format| {
            if format.is_crunched() {
                warn!("{}: crunched texture ({:?}), no data is uploaded", texture.name, format);
                return None;
            }
            let mapped = Self::map_format(format, srgb);
            if mapped.is_none() {
                warn!("{}: texture format {:?} is not supported", texture.name, format);
            }
            mapped
        });

        let Some((format, conversion)) = mapped else {
            if texture.format().is_none() {
                warn!("{}: unknown texture format {}", texture.name, texture.texture_format);
            }
            return ImportedTexture {
                name: texture.name.clone(),
                width,
                height,
                mip_count: 1,
                format: if srgb {
                    GpuTextureFormat::Rgba8UnormSrgb
                } else {
                    GpuTextureFormat::Rgba8Unorm
                },
                levels: Vec::new(),
                sampler,
            };
        };

        let mut levels = Vec::new();
        let mut offset = 0usize;
        for level in 0..texture.mip_count.max(1) as u32 {
            let (level_width, level_height) = mip_dimensions(width, height, level);
            let size = conversion.source_level_size(format, level_width, level_height);
            let Some(source) = texture.image_data.get(offset..offset + size) else {
                warn!(
                    "{}: image data ends within mip {} ({} bytes)",
                    texture.name,
                    level,
                    texture.image_data.len()
                );
                break;
            };
            levels.push(conversion.apply(source));
            offset += size;
        }

        ImportedTexture {
            name: texture.name.clone(),
            width,
            height,
            mip_count: levels.len().max(1) as u32,
            format,
            levels,
            sampler,
        }
    }

    fn map_format(format: TextureFormat, srgb: bool) -> Option<(GpuTextureFormat, Conversion)> {
        let pick = |linear, gamma| if srgb { gamma } else { linear };
        let mapped = match format {
            TextureFormat::Alpha8 => (GpuTextureFormat::R8Unorm, Conversion::None),
            TextureFormat::RGB24 => (
                pick(GpuTextureFormat::Rgba8Unorm, GpuTextureFormat::Rgba8UnormSrgb),
                Conversion::ExpandRgb,
            ),
            TextureFormat::RGBA32 => (
                pick(GpuTextureFormat::Rgba8Unorm, GpuTextureFormat::Rgba8UnormSrgb),
                Conversion::None,
            ),
            TextureFormat::ARGB32 => (
                pick(GpuTextureFormat::Rgba8Unorm, GpuTextureFormat::Rgba8UnormSrgb),
                Conversion::SwizzleArgb,
            ),
            TextureFormat::BGRA32 => (
                pick(GpuTextureFormat::Bgra8Unorm, GpuTextureFormat::Bgra8UnormSrgb),
                Conversion::None,
            ),
            TextureFormat::R16 => (GpuTextureFormat::R16Unorm, Conversion::None),
            TextureFormat::RHalf => (GpuTextureFormat::R16Float, Conversion::None),
            TextureFormat::RGHalf => (GpuTextureFormat::Rg16Float, Conversion::None),
            TextureFormat::RGBAHalf => (GpuTextureFormat::Rgba16Float, Conversion::None),
            TextureFormat::RFloat => (GpuTextureFormat::R32Float, Conversion::None),
            TextureFormat::RGFloat => (GpuTextureFormat::Rg32Float, Conversion::None),
            TextureFormat::RGBAFloat => (GpuTextureFormat::Rgba32Float, Conversion::None),
            TextureFormat::DXT1 => (
                pick(GpuTextureFormat::Bc1RgbaUnorm, GpuTextureFormat::Bc1RgbaUnormSrgb),
                Conversion::None,
            ),
            TextureFormat::DXT5 => (
                pick(GpuTextureFormat::Bc3RgbaUnorm, GpuTextureFormat::Bc3RgbaUnormSrgb),
                Conversion::None,
            ),
            TextureFormat::BC4 => (GpuTextureFormat::Bc4RUnorm, Conversion::None),
            TextureFormat::BC5 => (GpuTextureFormat::Bc5RgUnorm, Conversion::None),
            TextureFormat::BC6H => (GpuTextureFormat::Bc6hRgbUfloat, Conversion::None),
            TextureFormat::BC7 => (
                pick(GpuTextureFormat::Bc7RgbaUnorm, GpuTextureFormat::Bc7RgbaUnormSrgb),
                Conversion::None,
            ),
            _ => return None,
        };
        Some(mapped)
    }

    fn sampler(settings: &TextureSettings) -> SamplerDescriptor {
        let (min_filter, mag_filter, mip_filter) = match settings.filter_mode {
            0 => (FilterMode::Nearest, FilterMode::Nearest, FilterMode::Nearest),
            1 => (FilterMode::Linear, FilterMode::Linear, FilterMode::Nearest),
            _ => (FilterMode::Linear, FilterMode::Linear, FilterMode::Linear),
        };
        let address = |wrap: i32| match wrap {
            1 => AddressMode::ClampToEdge,
            2 | 3 => AddressMode::MirrorRepeat,
            _ => AddressMode::Repeat,
        };
        SamplerDescriptor {
            min_filter,
            mag_filter,
            mip_filter,
            address_u: address(settings.wrap_u),
            address_v: address(settings.wrap_v),
            anisotropy: settings.aniso.clamp(1, 16) as u16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texture(format: TextureFormat, width: i32, height: i32, mip_count: i32, image_data: Vec<u8>) -> UnityTexture2D {
        UnityTexture2D {
            name: "tex".to_string(),
            width,
            height,
            texture_format: format.into(),
            mip_count,
            color_space: 0,
            image_data,
            ..Default::default()
        }
    }

    #[test]
    fn bc1_levels_pad_to_blocks() {
        // 8x8 (32 bytes), 4x4 (8), 2x2 (8), 1x1 (8)
        let imported = TextureImporter::import(&texture(TextureFormat::DXT1, 8, 8, 4, vec![0; 56]));
        assert_eq!(imported.format, GpuTextureFormat::Bc1RgbaUnorm);
        assert_eq!(
            imported.levels.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![32, 8, 8, 8]
        );
        assert_eq!(imported.mip_count, 4);
    }

    #[test]
    fn argb_is_swizzled() {
        let imported = TextureImporter::import(&texture(TextureFormat::ARGB32, 1, 1, 1, vec![4, 1, 2, 3]));
        assert_eq!(imported.format, GpuTextureFormat::Rgba8Unorm);
        assert_eq!(imported.levels, vec![vec![1, 2, 3, 4]]);
    }

    #[test]
    fn rgb_is_expanded_to_rgba() {
        let mut source = texture(TextureFormat::RGB24, 2, 1, 1, vec![1, 2, 3, 4, 5, 6]);
        source.color_space = 1;
        let imported = TextureImporter::import(&source);
        assert_eq!(imported.format, GpuTextureFormat::Rgba8UnormSrgb);
        assert_eq!(imported.levels, vec![vec![1, 2, 3, 0xFF, 4, 5, 6, 0xFF]]);
    }

    #[test]
    fn crunched_textures_have_no_data() {
        let imported = TextureImporter::import(&texture(TextureFormat::DXT1Crunched, 64, 64, 7, vec![0; 128]));
        assert!(imported.levels.is_empty());
        assert_eq!((imported.width, imported.height), (64, 64));
    }

    #[test]
    fn truncated_chains_stop_early() {
        // room for 4x4 and 2x2 only
        let imported = TextureImporter::import(&texture(TextureFormat::RGBA32, 4, 4, 3, vec![0; 80]));
        assert_eq!(imported.levels.len(), 2);
        assert_eq!(imported.mip_count, 2);
    }

    #[test]
    fn sampler_from_settings() {
        let sampler = TextureImporter::sampler(&TextureSettings {
            filter_mode: 0,
            aniso: 4,
            mip_bias: 0.0,
            wrap_u: 1,
            wrap_v: 0,
            wrap_w: 0,
        });
        assert_eq!(sampler.min_filter, FilterMode::Nearest);
        assert_eq!(sampler.address_u, AddressMode::ClampToEdge);
        assert_eq!(sampler.address_v, AddressMode::Repeat);
        assert_eq!(sampler.anisotropy, 4);
    }
}
