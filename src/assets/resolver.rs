use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use futures::FutureExt;
use futures::future::{join_all, BoxFuture};
use log::{debug, error, trace};
use scenestream_files::common::types::PPtr;

use crate::assets::asset_file::{AssetFile, LoadMode};
use crate::assets::error::AssetError;
use crate::assets::resource::{load_resource, ResourceKind, ResourceResult};
use crate::io::common::loader::{sibling_path, DataFetcher};
use crate::rendering::gpu::GpuDevice;
use crate::settings::AssetManagerSettings;

/// Entry point of the resolution layer. Knows every opened container by its normalized path and
/// follows object references across them.
pub struct AssetManager {
    fetcher: Arc<dyn DataFetcher>,
    device: Arc<dyn GpuDevice>,
    settings: AssetManagerSettings,
    files: DashMap<String, Arc<AssetFile>>,
}

impl AssetManager {
    pub fn new(fetcher: Arc<dyn DataFetcher>, device: Arc<dyn GpuDevice>, settings: AssetManagerSettings) -> Arc<Self> {
        Arc::new(AssetManager {
            fetcher,
            device,
            settings,
            files: DashMap::new(),
        })
    }

    pub fn device(&self) -> &dyn GpuDevice {
        self.device.as_ref()
    }

    pub fn shared_device(&self) -> Arc<dyn GpuDevice> {
        self.device.clone()
    }

    pub fn settings(&self) -> &AssetManagerSettings {
        &self.settings
    }

    /// The container at `path`, created on first use. Its header is not loaded yet.
    pub fn open(&self, path: &str, mode: LoadMode) -> Arc<AssetFile> {
        self.files
            .entry(path.to_string())
            .or_insert_with(|| {
                debug!("opening {} ({:?})", path, mode);
                Arc::new(AssetFile::new(
                    self.fetcher.clone(),
                    path,
                    mode,
                    self.settings.header_probe_size,
                ))
            })
            .value()
            .clone()
    }

    /// Registers a container handed in as a buffer. It replaces a container of the same name.
    pub fn register_buffer(&self, name: &str, data: Bytes) -> Arc<AssetFile> {
        let file = Arc::new(AssetFile::from_buffer(name, data));
        self.files.insert(name.to_string(), file.clone());
        file
    }

    pub fn file(&self, path: &str) -> Option<Arc<AssetFile>> {
        self.files.get(path).map(|entry| entry.value().clone())
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Resolves `pptr` as seen from `file` and builds the resource it points at, loading whatever
    /// containers lie on the way. Null references resolve to `None`.
    pub fn fetch_resource(
        self: &Arc<Self>,
        kind: ResourceKind,
        file: &Arc<AssetFile>,
        pptr: PPtr,
    ) -> BoxFuture<'static, ResourceResult> {
        let manager = self.clone();
        let file = file.clone();
        async move {
            if pptr.is_null() {
                return Ok(None);
            }

            let target = if pptr.is_local() {
                file
            } else {
                manager.resolve_external(&file, pptr.file_id).await?
            };
            manager.load_local(kind, &target, pptr.path_id).await
        }
        .boxed()
    }

    /// The container behind `file_id` of `file`'s external table, with its header loaded.
    pub async fn resolve_external(&self, file: &AssetFile, file_id: i32) -> Result<Arc<AssetFile>, AssetError> {
        let header = file.wait_for_header().await?;
        let Some(external) = header.external(file_id) else {
            error!(
                "{}: external index {} is out of range ({} externals)",
                file.path(),
                file_id,
                header.externals.len()
            );
            return Err(AssetError::MissingExternal {
                container: file.path().to_string(),
                file_id,
            });
        };

        let path = sibling_path(file.path(), &external.path);
        let target = self.open(&path, self.settings.external_load_mode);
        target.wait_for_header().await?;
        Ok(target)
    }

    async fn load_local(self: &Arc<Self>, kind: ResourceKind, file: &Arc<AssetFile>, path_id: i64) -> ResourceResult {
        file.wait_for_header().await?;
        let manager = self.clone();
        let owner = file.clone();
        file.cache()
            .get_or_load(kind, path_id, move || load_resource(manager, owner, kind, path_id).boxed())
            .await
    }

    /// Issues the queued range requests of every open container right away instead of on their
    /// next scheduler turn.
    pub async fn flush(&self) {
        let files = self
            .files
            .iter()
            .map(|entry| entry.value().clone())
            .collect::<Vec<_>>();
        trace!("flushing {} containers", files.len());
        join_all(files.iter().map(|file| file.flush())).await;
    }

    /// Tears down every container, freeing the GPU objects of everything built so far.
    pub fn destroy(&self) {
        for entry in self.files.iter() {
            entry.value().destroy(self.device.as_ref());
        }
        self.files.clear();
    }
}
