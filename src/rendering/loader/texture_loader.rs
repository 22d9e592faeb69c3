use bytes::Bytes;
use log::trace;
use scenestream_files::common::reader::{parse_object, ParseContext};
use scenestream_files::texture::types::UnityTexture2D;

use crate::assets::asset_file::AssetFile;
use crate::assets::error::AssetError;
use crate::rendering::common::types::TextureResource;
use crate::rendering::gpu::{GpuDevice, TextureDescriptor};
use crate::rendering::importer::texture_importer::{ImportedTexture, TextureImporter};

pub struct TextureLoader {}

impl TextureLoader {
    pub async fn load(
        file: &AssetFile,
        device: &dyn GpuDevice,
        ctx: &ParseContext,
        data: Bytes,
    ) -> Result<TextureResource, AssetError> {
        let mut texture = {
            profiling::scope!("TextureLoader::parse");
            parse_object::<UnityTexture2D>(&data, ctx)?
        };
        drop(data);

        let streamed = !texture.stream_data.is_empty();
        let supported = texture.format().is_some_and(|format| !format.is_crunched());
        // Payloads that will not be uploaded are not worth fetching.
        if streamed && supported {
            trace!("{}: image data is streamed from {}", texture.name, texture.stream_data.path);
            texture.image_data = file.fetch_streamed(&texture.stream_data).await?.to_vec();
        }

        Ok(Self::upload(device, TextureImporter::import(&texture)))
    }

    pub fn upload(device: &dyn GpuDevice, imported: ImportedTexture) -> TextureResource {
        let handle = device.create_texture(&TextureDescriptor {
            label: imported.name.clone(),
            width: imported.width,
            height: imported.height,
            mip_count: imported.mip_count,
            format: imported.format,
        });
        for (level, data) in imported.levels.iter().enumerate() {
            device.upload_texture_level(handle, level as u32, data);
        }
        let sampler = device.create_sampler(&imported.sampler);

        TextureResource {
            has_data: !imported.levels.is_empty(),
            name: imported.name,
            width: imported.width,
            height: imported.height,
            mip_count: imported.mip_count,
            format: imported.format,
            texture: handle,
            sampler,
        }
    }
}
