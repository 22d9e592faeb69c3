use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use log::trace;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::assets::error::AssetError;
use crate::io::common::loader::{ByteRange, DataFetcher};

/// Reads resources from a directory on the local disk, relative paths are resolved against it.
pub struct FsDataFetcher {
    data_folder: PathBuf,
}

impl FsDataFetcher {
    pub fn new(data_folder: impl AsRef<Path>) -> Self {
        FsDataFetcher {
            data_folder: data_folder.as_ref().to_owned(),
        }
    }

    fn fetch_error(path: &str, error: std::io::Error) -> AssetError {
        AssetError::Fetch {
            path: path.to_string(),
            reason: error.to_string(),
        }
    }
}

#[async_trait]
impl DataFetcher for FsDataFetcher {
    async fn fetch(&self, path: &str, range: Option<ByteRange>) -> Result<Bytes, AssetError> {
        let full_path = self.data_folder.join(path);
        trace!("Loading {:?} {:?}", full_path, range);

        let Some(range) = range else {
            return tokio::fs::read(&full_path)
                .await
                .map(Bytes::from)
                .map_err(|e| Self::fetch_error(path, e));
        };

        let mut file = tokio::fs::File::open(&full_path)
            .await
            .map_err(|e| Self::fetch_error(path, e))?;
        file.seek(SeekFrom::Start(range.start))
            .await
            .map_err(|e| Self::fetch_error(path, e))?;

        let mut buf = Vec::with_capacity(range.size as usize);
        file.take(range.size)
            .read_to_end(&mut buf)
            .await
            .map_err(|e| Self::fetch_error(path, e))?;
        Ok(Bytes::from(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_whole_files_and_ranges() -> Result<(), anyhow::Error> {
        let dir = std::env::temp_dir().join(format!("scenestream-fs-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join("level0"), b"0123456789").await?;

        let fetcher = FsDataFetcher::new(&dir);
        assert_eq!(&fetcher.fetch("level0", None).await?[..], b"0123456789");
        assert_eq!(&fetcher.fetch("level0", Some(ByteRange::new(2, 3))).await?[..], b"234");
        assert_eq!(&fetcher.fetch("level0", Some(ByteRange::new(8, 10))).await?[..], b"89");
        assert!(matches!(
            fetcher.fetch("missing", None).await,
            Err(AssetError::Fetch { .. })
        ));

        tokio::fs::remove_dir_all(&dir).await?;
        Ok(())
    }
}
