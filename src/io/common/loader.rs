use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use log::trace;

use crate::assets::error::AssetError;

/// A span of bytes within one fetchable resource.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ByteRange {
    pub start: u64,
    pub size: u64,
}

impl ByteRange {
    pub fn new(start: u64, size: u64) -> Self {
        ByteRange { start, size }
    }

    pub fn end(&self) -> u64 {
        self.start + self.size
    }

    pub fn contains(&self, other: &ByteRange) -> bool {
        self.start <= other.start && other.end() <= self.end()
    }
}

/// The only way bytes enter the pipeline. Implementations may be backed by the network, the local
/// disk or an archive. A ranged fetch returns at most `range.size` bytes, fewer if the resource
/// ends earlier.
#[async_trait]
pub trait DataFetcher: Send + Sync {
    async fn fetch(&self, path: &str, range: Option<ByteRange>) -> Result<Bytes, AssetError>;
}

/// Strips container prefixes like `archive:/CAB-…/` and directories, leaving the file name that
/// identifies the resource within its fetcher.
pub fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Resolves `reference` (an external path or a streaming resource path) next to `container`.
pub fn sibling_path(container: &str, reference: &str) -> String {
    let name = file_name(reference);
    match container.rfind(['/', '\\']) {
        Some(index) => format!("{}/{}", &container[..index], name),
        None => name.to_string(),
    }
}

/// Serves resources from memory. Used for buffers handed in by the host and in tests, where the
/// recorded requests are inspected.
#[derive(Default)]
pub struct MemoryDataFetcher {
    files: DashMap<String, Bytes>,
    requests: Mutex<Vec<(String, Option<ByteRange>)>>,
    fetch_count: AtomicUsize,
}

impl MemoryDataFetcher {
    pub fn new() -> Self {
        MemoryDataFetcher::default()
    }

    pub fn insert(&self, path: &str, data: impl Into<Bytes>) {
        self.files.insert(path.to_string(), data.into());
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<(String, Option<ByteRange>)> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Requests made against `path`, in the order they were issued.
    pub fn requests_for(&self, path: &str) -> Vec<Option<ByteRange>> {
        self.requests()
            .into_iter()
            .filter(|(requested, _)| requested == path)
            .map(|(_, range)| range)
            .collect()
    }
}

#[async_trait]
impl DataFetcher for MemoryDataFetcher {
    async fn fetch(&self, path: &str, range: Option<ByteRange>) -> Result<Bytes, AssetError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((path.to_string(), range));
        trace!("memory fetch {} {:?}", path, range);

        let data = self
            .files
            .get(path)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AssetError::Fetch {
                path: path.to_string(),
                reason: "no such resource".to_string(),
            })?;

        match range {
            None => Ok(data),
            Some(range) => {
                let len = data.len() as u64;
                if range.start > len {
                    return Err(AssetError::Fetch {
                        path: path.to_string(),
                        reason: format!("range {:?} starts past the end ({} bytes)", range, len),
                    });
                }
                let end = range.end().min(len);
                Ok(data.slice(range.start as usize..end as usize))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_helpers() {
        assert_eq!(file_name("archive:/CAB-0a1b/CAB-0a1b.resS"), "CAB-0a1b.resS");
        assert_eq!(file_name("level0"), "level0");
        assert_eq!(sibling_path("Data/level0", "sharedassets0.assets"), "Data/sharedassets0.assets");
        assert_eq!(sibling_path("level0", "library/unity default resources"), "unity default resources");
    }

    #[tokio::test]
    async fn ranged_fetches_are_clamped() -> Result<(), anyhow::Error> {
        let fetcher = MemoryDataFetcher::new();
        fetcher.insert("a", vec![1u8, 2, 3, 4, 5]);

        assert_eq!(fetcher.fetch("a", None).await?.len(), 5);
        assert_eq!(&fetcher.fetch("a", Some(ByteRange::new(1, 2))).await?[..], &[2, 3]);
        assert_eq!(&fetcher.fetch("a", Some(ByteRange::new(3, 100))).await?[..], &[4, 5]);
        assert!(fetcher.fetch("a", Some(ByteRange::new(6, 1))).await.is_err());
        assert!(fetcher.fetch("b", None).await.is_err());
        assert_eq!(fetcher.fetch_count(), 5);
        assert_eq!(fetcher.requests_for("a").len(), 4);
        Ok(())
    }
}
