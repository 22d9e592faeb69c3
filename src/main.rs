use std::sync::Arc;

use clap::Parser;
use log::{info, trace};
use scenestream::assets::AssetManager;
use scenestream::io::bundle::loader::BundleDataFetcher;
use scenestream::io::common::loader::DataFetcher;
use scenestream::io::fs::loader::FsDataFetcher;
use scenestream::rendering::gpu::headless::HeadlessDevice;
use scenestream::scene::SceneRuntime;
use scenestream::settings::{CliArgs, OperationMode};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    #[cfg(feature = "tracy")]
    tracy_client::Client::start();

    let args = CliArgs::parse();
    trace!("Starting with args: {:?}", args);

    let settings = args.asset_settings();
    let data_dir: Arc<dyn DataFetcher> = Arc::new(FsDataFetcher::new(&args.data_dir));
    let (fetcher, level): (Arc<dyn DataFetcher>, String) = match &args.operation_mode {
        OperationMode::Level { path } => (data_dir, path.clone()),
        OperationMode::Bundle { bundle, level } => {
            let fetcher = Arc::new(BundleDataFetcher::new(
                data_dir,
                bundle.clone(),
                settings.block_cache_capacity,
            ));
            let Some(level) = level else {
                for container in fetcher.containers().await? {
                    println!("{}", container);
                }
                return Ok(());
            };
            (fetcher, level.clone())
        }
    };

    let device = Arc::new(HeadlessDevice::new());
    let manager = AssetManager::new(fetcher, device.clone(), settings);
    let mut runtime = SceneRuntime::new(manager.clone());

    let summary = runtime.load_level(&level).await?;
    let stats = device.stats();
    info!(
        "{} containers opened, {} programs compiled, {} textures and {} buffers created",
        manager.file_count(),
        stats.programs_created,
        stats.textures_created,
        stats.buffers_created
    );
    println!("{:#?}", summary);

    runtime.destroy();
    Ok(())
}
