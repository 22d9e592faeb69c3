use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, trace};
use quick_cache::sync::Cache;
use tokio::sync::OnceCell;
use unityfs::{copy_overlap, ArchiveError, Bundle, BundleHeader, DirectoryNode, ALIGNED_HEADER_SIZE};

use crate::assets::error::AssetError;
use crate::io::common::loader::{file_name, ByteRange, DataFetcher};

/// Serves the nodes of one UnityFS bundle as if they were files. Only the header and block table
/// are fetched up front, every read then fetches and decompresses just the blocks overlapping the
/// requested range. Decompressed blocks are kept in a bounded cache.
pub struct BundleDataFetcher {
    inner: Arc<dyn DataFetcher>,
    bundle_path: String,
    bundle: OnceCell<Bundle>,
    block_cache: Cache<usize, Bytes>,
}

impl BundleDataFetcher {
    pub fn new(inner: Arc<dyn DataFetcher>, bundle_path: impl Into<String>, block_cache_capacity: usize) -> Self {
        BundleDataFetcher {
            inner,
            bundle_path: bundle_path.into(),
            bundle: OnceCell::new(),
            block_cache: Cache::new(block_cache_capacity.max(1)),
        }
    }

    pub fn bundle_path(&self) -> &str {
        &self.bundle_path
    }

    /// The parsed header and directory, loading them on first use.
    pub async fn bundle(&self) -> Result<&Bundle, AssetError> {
        self.bundle.get_or_try_init(|| self.load_bundle()).await
    }

    /// Paths of the serialized containers inside the bundle.
    pub async fn containers(&self) -> Result<Vec<String>, AssetError> {
        Ok(self
            .bundle()
            .await?
            .containers()
            .map(|node| node.path.clone())
            .collect())
    }

    async fn load_bundle(&self) -> Result<Bundle, AssetError> {
        let head = self
            .inner
            .fetch(&self.bundle_path, Some(ByteRange::new(0, ALIGNED_HEADER_SIZE)))
            .await?;
        let header = BundleHeader::parse(&head)?;

        let range = header.blocks_info_range();
        let blocks_info = self
            .inner
            .fetch(&self.bundle_path, Some(ByteRange::new(range.start, range.end - range.start)))
            .await?;
        let bundle = Bundle::from_blocks_info(header, &blocks_info)?;
        debug!(
            "{}: {} nodes in {} blocks",
            self.bundle_path,
            bundle.nodes.len(),
            bundle.blocks.len()
        );
        Ok(bundle)
    }

    fn find_node<'a>(bundle: &'a Bundle, path: &str) -> Option<&'a DirectoryNode> {
        let name = file_name(path);
        bundle
            .node(path)
            .or_else(|| bundle.nodes.iter().find(|node| file_name(&node.path) == name))
    }

    /// Reads `offset..offset + size` of the decompressed data stream.
    async fn read_stream(&self, bundle: &Bundle, offset: u64, size: u64) -> Result<Bytes, AssetError> {
        let blocks = bundle.blocks_for_range(offset, size);
        if blocks.is_empty() {
            return Ok(Bytes::new());
        }

        let mut decoded: HashMap<usize, Bytes> = blocks
            .clone()
            .filter_map(|index| self.block_cache.get(&index).map(|data| (index, data)))
            .collect();

        let missing = blocks.clone().filter(|index| !decoded.contains_key(index)).collect::<Vec<_>>();
        if let (Some(first), Some(last)) = (missing.first(), missing.last()) {
            // One fetch for the whole missing span, cached blocks in between are decoded again.
            let span = bundle.compressed_span(*first..*last + 1);
            trace!(
                "{}: fetching blocks {}..={} ({} bytes)",
                self.bundle_path,
                first,
                last,
                span.end - span.start
            );
            let raw = self
                .inner
                .fetch(&self.bundle_path, Some(ByteRange::new(span.start, span.end - span.start)))
                .await?;

            for index in *first..=*last {
                let block = &bundle.blocks[index];
                let local = (block.compressed_offset - span.start) as usize;
                let local_end = local + block.compressed_size as usize;
                let compressed = raw.get(local..local_end).ok_or(ArchiveError::Truncated {
                    needed: local_end as u64,
                    available: raw.len() as u64,
                })?;

                let data = {
                    profiling::scope!("BundleDataFetcher::decompress");
                    match block.decompress(compressed)? {
                        Cow::Borrowed(_) => raw.slice(local..local_end),
                        Cow::Owned(data) => Bytes::from(data),
                    }
                };
                self.block_cache.insert(index, data.clone());
                decoded.insert(index, data);
            }
        }

        // Ranges within a single block are handed out without copying.
        if blocks.len() == 1 {
            let block = &bundle.blocks[blocks.start];
            let data = &decoded[&blocks.start];
            let start = (offset - block.uncompressed_offset) as usize;
            return Ok(data.slice(start..start + size as usize));
        }

        let mut output = Vec::with_capacity(size as usize);
        for index in blocks {
            copy_overlap(&bundle.blocks[index], &decoded[&index], offset, size, &mut output);
        }
        if output.len() as u64 != size {
            return Err(ArchiveError::Truncated {
                needed: size,
                available: output.len() as u64,
            }
            .into());
        }
        Ok(Bytes::from(output))
    }
}

#[async_trait]
impl DataFetcher for BundleDataFetcher {
    async fn fetch(&self, path: &str, range: Option<ByteRange>) -> Result<Bytes, AssetError> {
        let bundle = self.bundle().await?;
        let node = Self::find_node(bundle, path).ok_or_else(|| ArchiveError::UnknownNode(path.to_string()))?;

        let (start, size) = match range {
            None => (0, node.size),
            Some(range) => {
                if range.start > node.size {
                    return Err(AssetError::Fetch {
                        path: path.to_string(),
                        reason: format!("range {:?} starts past the end ({} bytes)", range, node.size),
                    });
                }
                (range.start, range.size.min(node.size - range.start))
            }
        };

        trace!("{}: reading {} [{}, +{})", self.bundle_path, node.path, start, size);
        self.read_stream(bundle, node.offset + start, size).await
    }
}
