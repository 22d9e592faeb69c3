use std::sync::Arc;

use anyhow::anyhow;
use futures::future::join_all;
use scenestream::assets::{AssetError, AssetManager, LoadMode, ResourceKind};
use scenestream::io::common::loader::{ByteRange, MemoryDataFetcher};
use scenestream::rendering::gpu::headless::HeadlessDevice;
use scenestream::rendering::material::render_state::{BlendFactor, CullMode, RenderState, SortBucket};
use scenestream::settings::AssetManagerSettings;
use scenestream_files::common::types::{PPtr, StreamingInfo};

mod common;
use common::*;

fn fixtures() -> Arc<MemoryDataFetcher> {
    let fetcher = Arc::new(MemoryDataFetcher::new());
    fetcher.insert(LEVEL, level("sharedassets0.assets"));
    fetcher.insert(SHARED, shared_assets());
    fetcher
}

#[tokio::test]
async fn concurrent_fetches_build_once() -> Result<(), anyhow::Error> {
    let fetcher = fixtures();
    let (manager, device) = manager(fetcher.clone());
    let level = manager.open(LEVEL, LoadMode::Partial);

    let results = join_all((0..8).map(|_| manager.fetch_resource(ResourceKind::Mesh, &level, PPtr::new(1, MESH)))).await;
    let meshes = results
        .into_iter()
        .map(|result| -> Result<_, anyhow::Error> {
            result?
                .and_then(|resource| resource.as_mesh().cloned())
                .ok_or_else(|| anyhow!("no mesh"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    assert!(meshes.iter().all(|mesh| Arc::ptr_eq(mesh, &meshes[0])));
    assert_eq!(meshes[0].mesh.vertex_count, 3);
    assert_eq!(meshes[0].mesh.index_buffer, vec![0, 1, 2]);
    assert_eq!(device.stats().layouts_created, 1);

    // one header probe, one object fetch
    let shared = fetcher.requests_for(SHARED);
    assert_eq!(shared.len(), 2);
    assert_eq!(shared[0], Some(ByteRange::new(0, 16 * 1024)));
    Ok(())
}

#[tokio::test]
async fn local_references_never_open_externals() -> Result<(), anyhow::Error> {
    let fetcher = fixtures();
    let (manager, _) = manager(fetcher.clone());
    let level = manager.open(LEVEL, LoadMode::Partial);

    // object 1 is a GameObject, not a mesh
    let mismatch = manager.fetch_resource(ResourceKind::Mesh, &level, PPtr::new(0, 1)).await?;
    assert!(mismatch.is_none());
    let null = manager.fetch_resource(ResourceKind::Mesh, &level, PPtr::new(0, 0)).await?;
    assert!(null.is_none());
    let missing = manager.fetch_resource(ResourceKind::Mesh, &level, PPtr::new(0, 999)).await?;
    assert!(missing.is_none());

    assert_eq!(manager.file_count(), 1);
    assert!(fetcher.requests_for(SHARED).is_empty());
    Ok(())
}

#[tokio::test]
async fn unknown_external_indices_are_fatal() {
    let (manager, _) = manager(fixtures());
    let level = manager.open(LEVEL, LoadMode::Partial);

    let result = manager.fetch_resource(ResourceKind::Mesh, &level, PPtr::new(4, MESH)).await;
    assert!(matches!(result, Err(AssetError::MissingExternal { file_id: 4, .. })));
}

#[tokio::test]
async fn unreachable_externals_fail() {
    let fetcher = Arc::new(MemoryDataFetcher::new());
    fetcher.insert(LEVEL, level("missing.assets"));
    let (manager, _) = manager(fetcher);
    let level = manager.open(LEVEL, LoadMode::Partial);

    let result = manager.fetch_resource(ResourceKind::Mesh, &level, PPtr::new(1, MESH)).await;
    assert!(matches!(result, Err(AssetError::Fetch { .. })));
}

#[tokio::test]
async fn materials_resolve_their_shader() -> Result<(), anyhow::Error> {
    let (manager, _) = manager(fixtures());
    let level = manager.open(LEVEL, LoadMode::Partial);

    let material = manager
        .fetch_resource(ResourceKind::Material, &level, PPtr::new(1, STANDARD_MATERIAL))
        .await?
        .and_then(|resource| resource.as_material().cloned())
        .ok_or_else(|| anyhow!("no material"))?;
    assert_eq!(material.name, "Rock");
    assert_eq!(material.shader_name.as_deref(), Some("Standard"));
    assert_eq!(material.keywords, vec!["_NORMALMAP".to_string()]);
    assert_eq!(material.float("_Glossiness"), Some(0.25));
    let pass = material.pass_state.as_ref().ok_or_else(|| anyhow!("no pass state"))?;
    assert_eq!(pass.cull.property.as_deref(), Some("_Cull"));
    assert_eq!(pass.tag("RenderType"), Some("Opaque"));

    // null texture reference, the binding keeps its tiling
    let main_tex = material.texture("_MainTex").ok_or_else(|| anyhow!("no _MainTex"))?;
    assert!(main_tex.texture.is_none());
    assert_eq!(main_tex.scale.x, 2.0);
    Ok(())
}

#[tokio::test]
async fn full_mode_fetches_whole_externals() -> Result<(), anyhow::Error> {
    let fetcher = fixtures();
    let settings = AssetManagerSettings {
        external_load_mode: LoadMode::Full,
        ..Default::default()
    };
    let manager = AssetManager::new(fetcher.clone(), Arc::new(HeadlessDevice::new()), settings);
    let level = manager.open(LEVEL, LoadMode::Partial);

    let (a, b) = tokio::join!(
        manager.fetch_resource(ResourceKind::Mesh, &level, PPtr::new(1, MESH)),
        manager.fetch_resource(ResourceKind::Material, &level, PPtr::new(1, STANDARD_MATERIAL)),
    );
    assert!(a?.is_some());
    assert!(b?.is_some());
    assert_eq!(fetcher.requests_for(SHARED), vec![None]);
    Ok(())
}

#[tokio::test]
async fn destroyed_managers_refuse_loads() -> Result<(), anyhow::Error> {
    let (manager, device) = manager(fixtures());
    let level = manager.open(LEVEL, LoadMode::Partial);
    manager
        .fetch_resource(ResourceKind::Mesh, &level, PPtr::new(1, MESH))
        .await?;
    assert!(!device.stats().live_objects.is_empty());

    manager.destroy();
    assert!(device.stats().live_objects.is_empty());
    assert_eq!(manager.file_count(), 0);

    let result = manager.fetch_resource(ResourceKind::Mesh, &level, PPtr::new(0, 1)).await;
    assert!(matches!(result, Err(AssetError::Destroyed(_))));
    Ok(())
}

#[tokio::test]
async fn render_state_follows_the_shader_pass() -> Result<(), anyhow::Error> {
    let (manager, _) = manager(fixtures());
    let level = manager.open(LEVEL, LoadMode::Partial);

    let glass = manager
        .fetch_resource(ResourceKind::Material, &level, PPtr::new(1, GLASS_MATERIAL))
        .await?
        .and_then(|resource| resource.as_material().cloned())
        .ok_or_else(|| anyhow!("no material"))?;
    assert_eq!(glass.shader_name.as_deref(), Some("Custom/Fade"));

    let state = RenderState::from_material(&glass)?;
    // _CullMode is bound, the unrelated _Cull float is not
    assert_eq!(state.cull, CullMode::Off);
    assert_eq!(state.src_blend, BlendFactor::SrcAlpha);
    assert_eq!(state.dst_blend, BlendFactor::OneMinusSrcAlpha);
    assert!(state.depth_write);
    assert_eq!(state.bucket, SortBucket::Translucent);
    Ok(())
}

fn streamed_fixtures() -> Arc<MemoryDataFetcher> {
    let fetcher = Arc::new(MemoryDataFetcher::new());
    let (container, resource) = streamed_assets();
    fetcher.insert(STREAMED, container);
    fetcher.insert(STREAMED_RESOURCE, resource);
    fetcher
}

#[tokio::test]
async fn streamed_meshes_upload_the_resource_range() -> Result<(), anyhow::Error> {
    let fetcher = streamed_fixtures();
    let (manager, device) = manager(fetcher.clone());
    let file = manager.open(STREAMED, LoadMode::Partial);

    let mesh = manager
        .fetch_resource(ResourceKind::Mesh, &file, PPtr::new(0, STREAMED_MESH))
        .await?
        .and_then(|resource| resource.as_mesh().cloned())
        .ok_or_else(|| anyhow!("no mesh"))?;
    assert_eq!(mesh.name, "StreamedTriangle");
    assert_eq!(mesh.mesh.vertex_count, 3);
    assert_eq!(device.buffer_contents(mesh.vertex_buffers[0]), Some(triangle_positions()));

    let size = triangle_positions().len() as u64;
    assert_eq!(
        fetcher.requests_for(STREAMED_RESOURCE),
        vec![Some(ByteRange::new(MESH_STREAM_OFFSET, size))]
    );
    Ok(())
}

#[tokio::test]
async fn streamed_textures_upload_the_resource_range() -> Result<(), anyhow::Error> {
    let fetcher = streamed_fixtures();
    let (manager, device) = manager(fetcher.clone());
    let file = manager.open(STREAMED, LoadMode::Partial);

    let texture = manager
        .fetch_resource(ResourceKind::Texture2D, &file, PPtr::new(0, STREAMED_TEXTURE))
        .await?
        .and_then(|resource| resource.as_texture().cloned())
        .ok_or_else(|| anyhow!("no texture"))?;
    assert!(texture.has_data);
    assert_eq!((texture.width, texture.height), (2, 2));
    assert_eq!(device.texture_level(texture.texture, 0), Some(texels()));
    assert_eq!(
        fetcher.requests_for(STREAMED_RESOURCE),
        vec![Some(ByteRange::new(TEXTURE_STREAM_OFFSET, texels().len() as u64))]
    );
    Ok(())
}

#[tokio::test]
async fn flush_spans_every_open_container() -> Result<(), anyhow::Error> {
    let fetcher = streamed_fixtures();
    fetcher.insert(LEVEL, level("sharedassets0.assets"));
    let (manager, _) = manager(fetcher.clone());
    let streamed = manager.open(STREAMED, LoadMode::Partial);
    let level = manager.open(LEVEL, LoadMode::Partial);
    streamed.wait_for_header().await?;
    level.wait_for_header().await?;
    let before = fetcher.fetch_count();

    let info = StreamingInfo {
        offset: TEXTURE_STREAM_OFFSET,
        size: texels().len() as u32,
        path: "sharedassets1.assets.resS".to_string(),
    };
    let mut object = Box::pin(level.fetch_object(1));
    let mut payload = Box::pin(streamed.fetch_streamed(&info));
    assert!(futures::poll!(object.as_mut()).is_pending());
    assert!(futures::poll!(payload.as_mut()).is_pending());
    assert_eq!(fetcher.fetch_count(), before);

    manager.flush().await;
    assert_eq!(fetcher.fetch_count(), before + 2);
    assert!(object.await?.is_some());
    assert_eq!(payload.await?.to_vec(), texels());
    assert_eq!(fetcher.fetch_count(), before + 2);
    Ok(())
}
