use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;

use crate::app_config::load_dataset_configs;
use crate::dataset_driver::ProcessDatasetDriver;
use crate::job_engine::JobEngine;
use crate::object_store_factory::build_object_store;

/// Restores a dataset from its most recent backup, or a specific
/// `backup_time`, optionally into a different destination filesystem.
#[derive(Debug, Args)]
pub struct RestoreCommand {
    #[arg(short, long)]
    pub config_path: PathBuf,
    #[arg(long)]
    pub destination: Option<String>,
    pub dataset: String,
    pub backup_time: Option<String>,
}

pub async fn restore_command(command: RestoreCommand) -> anyhow::Result<()> {
    let configs = load_dataset_configs(&command.config_path)?;
    let config = configs
        .into_iter()
        .find(|c| c.filesystem == command.dataset)
        .with_context(|| format!("no config section for dataset {:?}", command.dataset))?;

    let store = build_object_store(&config).await?;
    let engine = JobEngine::new(config, Arc::new(ProcessDatasetDriver), store);
    engine.restore(command.backup_time, command.destination).await?;
    Ok(())
}
