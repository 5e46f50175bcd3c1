mod cli;

use anyhow::Result;
use bookcraft::core::config::Config;
use bookcraft::core::io::NativeStorage;
use bookcraft::services::create_providers;
use bookcraft::services::workflow::WorkflowManager;
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            eprintln!("Please ensure 'config.yml' exists with valid provider settings.");
            return Err(e);
        }
    };

    config.ensure_directories()?;

    let providers = create_providers(&config)?;
    let storage = Arc::new(NativeStorage::new(&config.build_folder));
    let output_folder = config.output_folder.clone();

    let mut manager = WorkflowManager::new(config, providers, storage).await?;
    cli::run(&mut manager, Path::new(&output_folder)).await
}
