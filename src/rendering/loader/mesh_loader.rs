use bytes::Bytes;
use log::trace;
use scenestream_files::common::reader::{parse_object, ParseContext};
use scenestream_files::mesh::types::UnityMesh;

use crate::assets::asset_file::AssetFile;
use crate::assets::error::AssetError;
use crate::rendering::common::types::{Mesh, MeshResource};
use crate::rendering::gpu::{BufferUsage, GpuDevice};
use crate::rendering::importer::mesh_importer::MeshImporter;

pub struct MeshLoader {}

impl MeshLoader {
    pub async fn load(
        file: &AssetFile,
        device: &dyn GpuDevice,
        ctx: &ParseContext,
        data: Bytes,
    ) -> Result<MeshResource, AssetError> {
        let mut mesh = {
            profiling::scope!("MeshLoader::parse");
            parse_object::<UnityMesh>(&data, ctx)?
        };
        drop(data);

        if !mesh.stream_data.is_empty() {
            trace!("{}: vertex data is streamed from {}", mesh.name, mesh.stream_data.path);
            mesh.vertex_data.data = file.fetch_streamed(&mesh.stream_data).await?.to_vec();
        }

        let imported = MeshImporter::create_mesh(&mesh, &ctx.version)?;
        Ok(Self::upload(device, &mesh.name, imported))
    }

    pub fn upload(device: &dyn GpuDevice, name: &str, mesh: Mesh) -> MeshResource {
        let layout = device.create_input_layout(&mesh.layout);
        let vertex_buffers = mesh
            .streams
            .iter()
            .enumerate()
            .map(|(index, stream)| device.create_buffer(&format!("{} stream {}", name, index), BufferUsage::Vertex, stream))
            .collect();

        let indices = mesh
            .index_buffer
            .iter()
            .flat_map(|index| index.to_le_bytes())
            .collect::<Vec<u8>>();
        let index_buffer = device.create_buffer(&format!("{} indices", name), BufferUsage::Index, &indices);

        MeshResource {
            name: name.to_string(),
            mesh,
            layout,
            vertex_buffers,
            index_buffer,
        }
    }
}
