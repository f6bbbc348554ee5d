use std::path::PathBuf;

use clap::Args;
use humansize::{format_size, DECIMAL};
use tabled::{Table, Tabled};

use crate::app_config::load_dataset_configs;
use crate::backup_catalog::BackupCatalog;
use crate::object_store_factory::build_object_store;

/// Lists backups recorded for one dataset, or every configured dataset if
/// none is given.
#[derive(Debug, Args)]
pub struct ListCommand {
    #[arg(short, long)]
    pub config_path: PathBuf,
    pub dataset: Option<String>,
}

#[derive(Tabled)]
struct Row {
    filesystem: String,
    backup_time: String,
    backup_type: &'static str,
    dependency: String,
    backup_size: String,
}

pub async fn list_command(command: ListCommand) -> anyhow::Result<()> {
    let configs = load_dataset_configs(&command.config_path)?;
    let configs = configs.into_iter().filter(|c| match &command.dataset {
        Some(d) => d == &c.filesystem,
        None => true,
    });

    let mut rows = Vec::new();
    for config in configs {
        let store = build_object_store(&config).await?;
        let catalog = BackupCatalog::load(store, config.filesystem.clone(), config.prefix.clone()).await?;
        for backup in catalog.get_backups(None) {
            rows.push(Row {
                filesystem: backup.filesystem.clone(),
                backup_time: backup.backup_time.clone(),
                backup_type: backup.backup_type.as_str(),
                dependency: backup.dependency.clone().unwrap_or_default(),
                backup_size: format_size(backup.backup_size, DECIMAL),
            });
        }
    }
    println!("{}", Table::new(rows));
    Ok(())
}
