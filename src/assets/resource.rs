use std::sync::Arc;

use log::{debug, warn};
use scenestream_files::common::types::ClassId;

use crate::assets::asset_file::AssetFile;
use crate::assets::error::AssetError;
use crate::assets::resolver::AssetManager;
use crate::rendering::common::types::{MaterialResource, MeshResource, ShaderResource, TextureResource};
use crate::rendering::gpu::GpuDevice;
use crate::rendering::loader::material_loader::MaterialLoader;
use crate::rendering::loader::mesh_loader::MeshLoader;
use crate::rendering::loader::shader_loader::ShaderLoader;
use crate::rendering::loader::texture_loader::TextureLoader;

/// The resource classes the pipeline knows how to build.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Mesh,
    Texture2D,
    Material,
    Shader,
}

impl ResourceKind {
    pub fn class_id(&self) -> ClassId {
        match self {
            ResourceKind::Mesh => ClassId::Mesh,
            ResourceKind::Texture2D => ClassId::Texture2D,
            ResourceKind::Material => ClassId::Material,
            ResourceKind::Shader => ClassId::Shader,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Resource {
    Mesh(Arc<MeshResource>),
    Texture2D(Arc<TextureResource>),
    Material(Arc<MaterialResource>),
    Shader(Arc<ShaderResource>),
}

/// `Ok(None)` is a reference that does not lead anywhere: null, missing or of another class.
pub type ResourceResult = Result<Option<Resource>, AssetError>;

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Mesh(_) => ResourceKind::Mesh,
            Resource::Texture2D(_) => ResourceKind::Texture2D,
            Resource::Material(_) => ResourceKind::Material,
            Resource::Shader(_) => ResourceKind::Shader,
        }
    }

    pub fn as_mesh(&self) -> Option<&Arc<MeshResource>> {
        match self {
            Resource::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn as_texture(&self) -> Option<&Arc<TextureResource>> {
        match self {
            Resource::Texture2D(texture) => Some(texture),
            _ => None,
        }
    }

    pub fn as_material(&self) -> Option<&Arc<MaterialResource>> {
        match self {
            Resource::Material(material) => Some(material),
            _ => None,
        }
    }

    pub fn as_shader(&self) -> Option<&Arc<ShaderResource>> {
        match self {
            Resource::Shader(shader) => Some(shader),
            _ => None,
        }
    }

    /// Materials and shaders own no GPU objects, their textures belong to the texture's container.
    pub fn release(&self, device: &dyn GpuDevice) {
        match self {
            Resource::Mesh(mesh) => mesh.release(device),
            Resource::Texture2D(texture) => texture.release(device),
            Resource::Material(_) | Resource::Shader(_) => {}
        }
    }
}

/// Builds the resource for one object of `file`. Only ever called through the file's cache.
pub(crate) async fn load_resource(
    manager: Arc<AssetManager>,
    file: Arc<AssetFile>,
    kind: ResourceKind,
    path_id: i64,
) -> ResourceResult {
    let Some((info, data)) = file.fetch_object(path_id).await? else {
        warn!("{}: there is no object {}", file.path(), path_id);
        return Ok(None);
    };

    if info.class_id != i32::from(kind.class_id()) {
        warn!(
            "{}: object {} is of class {}, expected a {:?}",
            file.path(),
            path_id,
            info.class_id,
            kind
        );
        return Ok(None);
    }

    let ctx = file.wait_for_header().await?.context.clone();
    debug!("{}: decoding {:?} {} ({} bytes)", file.path(), kind, path_id, data.len());

    let resource = match kind {
        ResourceKind::Mesh => Resource::Mesh(Arc::new(MeshLoader::load(&file, manager.device(), &ctx, data).await?)),
        ResourceKind::Texture2D => {
            Resource::Texture2D(Arc::new(TextureLoader::load(&file, manager.device(), &ctx, data).await?))
        }
        ResourceKind::Material => Resource::Material(Arc::new(MaterialLoader::load(&manager, &file, &ctx, data).await?)),
        ResourceKind::Shader => Resource::Shader(Arc::new(ShaderLoader::load(&ctx, data)?)),
    };
    Ok(Some(resource))
}
