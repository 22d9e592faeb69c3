use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::assets::asset_file::LoadMode;

pub const DEFAULT_HEADER_PROBE_SIZE: u64 = 16 * 1024;
pub const DEFAULT_BLOCK_CACHE_CAPACITY: usize = 64;

#[derive(Parser, Debug)]
#[command(name = "scenestream")]
#[command(version)]
#[command(about = "Streams Unity scenes out of serialized files and asset bundles")]
pub struct CliArgs {
    #[arg(long, env = "SCENESTREAM_DATA_DIR", default_value_t = default_data_dir())]
    pub data_dir: String,

    /// Bytes fetched to find the end of a file's metadata
    #[arg(long, default_value_t = DEFAULT_HEADER_PROBE_SIZE)]
    pub header_probe_size: u64,

    /// Fetch whole files instead of single objects
    #[arg(long)]
    pub full: bool,

    #[arg(long, default_value_t = DEFAULT_BLOCK_CACHE_CAPACITY)]
    pub block_cache_capacity: usize,

    #[command(subcommand)]
    pub operation_mode: OperationMode,
}

pub fn default_data_dir() -> String {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("_data")
        .to_string_lossy()
        .to_string()
}

#[derive(Subcommand, Debug)]
pub enum OperationMode {
    /// Loads a loose serialized file from the data directory.
    Level { path: String },
    /// Loads a level out of a UnityFS bundle. Without `--level` the bundle's containers are listed.
    Bundle {
        #[arg(env = "SCENESTREAM_BUNDLE")]
        bundle: String,
        #[arg(long)]
        level: Option<String>,
    },
}

impl CliArgs {
    pub fn asset_settings(&self) -> AssetManagerSettings {
        AssetManagerSettings {
            header_probe_size: self.header_probe_size,
            external_load_mode: if self.full { LoadMode::Full } else { LoadMode::Partial },
            block_cache_capacity: self.block_cache_capacity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetManagerSettings {
    /// The first request against a partially loaded file. Metadata beyond it costs a second fetch.
    pub header_probe_size: u64,
    /// How files reached through external references are opened.
    pub external_load_mode: LoadMode,
    /// Decompressed blocks kept per bundle.
    pub block_cache_capacity: usize,
}

impl Default for AssetManagerSettings {
    fn default() -> Self {
        AssetManagerSettings {
            header_probe_size: DEFAULT_HEADER_PROBE_SIZE,
            external_load_mode: LoadMode::Partial,
            block_cache_capacity: DEFAULT_BLOCK_CACHE_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_mode_with_overrides() -> Result<(), anyhow::Error> {
        let args = CliArgs::try_parse_from([
            "scenestream",
            "--data-dir",
            "/tmp/data",
            "--full",
            "--header-probe-size",
            "4096",
            "bundle",
            "scenes.unity3d",
            "--level",
            "BuildPlayer-Main",
        ])?;

        assert_eq!(args.data_dir, "/tmp/data");
        let settings = args.asset_settings();
        assert_eq!(settings.external_load_mode, LoadMode::Full);
        assert_eq!(settings.header_probe_size, 4096);
        match args.operation_mode {
            OperationMode::Bundle { bundle, level } => {
                assert_eq!(bundle, "scenes.unity3d");
                assert_eq!(level.as_deref(), Some("BuildPlayer-Main"));
            }
            other => panic!("unexpected mode {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn defaults_load_partially() -> Result<(), anyhow::Error> {
        let args = CliArgs::try_parse_from(["scenestream", "--data-dir", "d", "level", "level0"])?;
        assert_eq!(args.asset_settings(), AssetManagerSettings::default());
        Ok(())
    }
}
