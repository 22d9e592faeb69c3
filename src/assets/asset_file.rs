use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::{Bytes, BytesMut};
use dashmap::DashMap;
use futures::future::join_all;
use log::{debug, trace};
use scenestream_files::ParserError;
use scenestream_files::common::types::StreamingInfo;
use scenestream_files::serialized::reader::SerializedFileReader;
use scenestream_files::serialized::types::{ObjectInfo, SerializedFile};
use tokio::sync::OnceCell;

use crate::assets::error::AssetError;
use crate::assets::object_cache::ObjectCache;
use crate::io::coalescer::RangeCoalescer;
use crate::io::common::loader::{sibling_path, ByteRange, DataFetcher, MemoryDataFetcher};
use crate::rendering::gpu::GpuDevice;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LoadMode {
    /// The whole file is fetched at once, objects are slices of it.
    Full,
    /// Only the metadata is fetched up front, objects are fetched by range.
    Partial,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AssetFileState {
    Uninitialized,
    HeaderLoading,
    HeaderReady,
}

struct LoadedHeader {
    file: SerializedFile,
    /// The complete file for [`LoadMode::Full`].
    full: Option<Bytes>,
}

/// One serialized file (a container). Owns the parsed object directory and the cache of resources
/// built from its objects.
pub struct AssetFile {
    path: String,
    mode: LoadMode,
    fetcher: Arc<dyn DataFetcher>,
    coalescer: RangeCoalescer,
    /// Coalescers for the companion resources streamed payloads live in.
    streams: DashMap<String, Arc<RangeCoalescer>>,
    header_probe_size: u64,
    header: OnceCell<LoadedHeader>,
    loading: AtomicBool,
    cache: ObjectCache,
}

impl AssetFile {
    pub fn new(fetcher: Arc<dyn DataFetcher>, path: impl Into<String>, mode: LoadMode, header_probe_size: u64) -> Self {
        let path = path.into();
        AssetFile {
            coalescer: RangeCoalescer::new(fetcher.clone(), path.clone()),
            streams: DashMap::new(),
            cache: ObjectCache::new(path.clone()),
            fetcher,
            path,
            mode,
            header_probe_size: header_probe_size.max(SerializedFileReader::HEADER_PROBE_SIZE as u64),
            header: OnceCell::new(),
            loading: AtomicBool::new(false),
        }
    }

    /// A container handed in as a buffer by the host. Streamed payloads it references cannot be
    /// resolved, there is nothing next to it.
    pub fn from_buffer(name: impl Into<String>, data: Bytes) -> Self {
        let name = name.into();
        let fetcher = MemoryDataFetcher::new();
        fetcher.insert(&name, data);
        AssetFile::new(Arc::new(fetcher), name, LoadMode::Full, 0)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn mode(&self) -> LoadMode {
        self.mode
    }

    pub fn cache(&self) -> &ObjectCache {
        &self.cache
    }

    pub fn state(&self) -> AssetFileState {
        if self.header.initialized() {
            AssetFileState::HeaderReady
        } else if self.loading.load(Ordering::SeqCst) {
            AssetFileState::HeaderLoading
        } else {
            AssetFileState::Uninitialized
        }
    }

    /// Loads and parses the metadata on first use. Every caller, concurrent or later, gets the
    /// same parsed file, the fetches happen once.
    pub async fn wait_for_header(&self) -> Result<&SerializedFile, AssetError> {
        Ok(&self.loaded_header().await?.file)
    }

    async fn loaded_header(&self) -> Result<&LoadedHeader, AssetError> {
        self.header
            .get_or_try_init(|| async {
                self.loading.store(true, Ordering::SeqCst);
                let result = self.load_header().await;
                self.loading.store(false, Ordering::SeqCst);
                result
            })
            .await
    }

    async fn load_header(&self) -> Result<LoadedHeader, AssetError> {
        match self.mode {
            LoadMode::Full => {
                let data = self.fetcher.fetch(&self.path, None).await?;
                let file = SerializedFileReader::parse(&data)?;
                debug!("{}: {} objects (full load)", self.path, file.objects.len());
                Ok(LoadedHeader { file, full: Some(data) })
            }
            LoadMode::Partial => {
                let probe = self
                    .fetcher
                    .fetch(&self.path, Some(ByteRange::new(0, self.header_probe_size)))
                    .await?;
                let header = SerializedFileReader::parse_header(&mut Cursor::new(&probe[..]))?;

                let metadata_end = header.metadata_end();
                let metadata = if probe.len() as u64 >= metadata_end {
                    probe
                } else {
                    trace!("{}: metadata exceeds the probe, fetching up to {}", self.path, metadata_end);
                    let start = probe.len() as u64;
                    let rest = self
                        .fetcher
                        .fetch(&self.path, Some(ByteRange::new(start, metadata_end - start)))
                        .await?;
                    let mut buf = BytesMut::with_capacity(metadata_end as usize);
                    buf.extend_from_slice(&probe);
                    buf.extend_from_slice(&rest);
                    buf.freeze()
                };

                let file = SerializedFileReader::parse(&metadata)?;
                debug!("{}: {} objects (partial load)", self.path, file.objects.len());
                Ok(LoadedHeader { file, full: None })
            }
        }
    }

    /// The object's directory entry and its bytes, or `None` if the file has no such object.
    pub async fn fetch_object(&self, path_id: i64) -> Result<Option<(ObjectInfo, Bytes)>, AssetError> {
        if self.cache.is_destroyed() {
            return Err(AssetError::Destroyed(self.path.clone()));
        }

        let loaded = self.loaded_header().await?;
        let Some(info) = loaded.file.object(path_id).copied() else {
            return Ok(None);
        };

        let data = match &loaded.full {
            Some(full) => {
                if info.byte_end() > full.len() as u64 {
                    return Err(ParserError::ObjectOutOfBounds { path_id }.into());
                }
                full.slice(info.byte_start as usize..info.byte_end() as usize)
            }
            None => {
                self.coalescer
                    .request(info.byte_start, info.byte_size as u64)
                    .await?
            }
        };
        Ok(Some((info, data)))
    }

    /// Fetches a payload stored outside of the object, from the resource next to this file.
    pub async fn fetch_streamed(&self, info: &StreamingInfo) -> Result<Bytes, AssetError> {
        let path = sibling_path(&self.path, &info.path);
        let coalescer = self
            .streams
            .entry(path.clone())
            .or_insert_with(|| Arc::new(RangeCoalescer::new(self.fetcher.clone(), path.clone())))
            .value()
            .clone();

        let data = coalescer.request(info.offset, info.size as u64).await?;
        if data.len() < info.size as usize {
            return Err(AssetError::Fetch {
                path,
                reason: format!("expected {} streamed bytes, got {}", info.size, data.len()),
            });
        }
        Ok(data)
    }

    /// Issues every queued range request now, for the file itself and each streamed resource.
    pub async fn flush(&self) {
        let streams = self
            .streams
            .iter()
            .map(|entry| entry.value().clone())
            .collect::<Vec<_>>();
        self.coalescer.flush().await;
        join_all(streams.iter().map(|coalescer| coalescer.flush())).await;
    }

    /// Releases everything built from this file. Further loads fail with [`AssetError::Destroyed`].
    pub fn destroy(&self, device: &dyn GpuDevice) {
        debug!("{}: destroying {} cached resources", self.path, self.cache.len());
        self.cache.destroy(device);
    }
}
