mod app_config;
mod backup;
mod backup_catalog;
mod backup_catalog_error;
mod backup_command;
mod backup_record;
mod config;
mod dataset_config;
mod dataset_driver;
mod dataset_error;
mod job_engine;
mod job_error;
mod list_command;
mod object_store_driver;
mod object_store_factory;
mod restore_command;
mod retention;
mod s3_object_store_driver;
mod scheduler;
mod snapshot;
mod snapshot_catalog;
#[cfg(test)]
mod test_support;
mod transfer_controller;
mod version_command;
mod zfs_create_filesystem;
mod zfs_create_snapshot;
mod zfs_destroy_filesystem;
mod zfs_destroy_snapshot;
mod zfs_list_snapshots;
mod zfs_receive;
mod zfs_rollback_filesystem;
mod zfs_send;
mod zfs_send_size;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::backup_command::{backup_command, BackupCommand};
use crate::list_command::{list_command, ListCommand};
use crate::restore_command::{restore_command, RestoreCommand};
use crate::version_command::version_command;

#[derive(Debug, Parser)]
#[command(name = "zfs-s3-backup")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the scheduler: fire each configured dataset's job on its cron.
    Backup(BackupCommand),
    /// List recorded backups for one dataset, or all of them.
    List(ListCommand),
    /// Restore a dataset from a backup.
    Restore(RestoreCommand),
    /// Print the program version.
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let Cli { command } = Cli::parse();
    let result = match command {
        Commands::Backup(command) => backup_command(command).await,
        Commands::List(command) => list_command(command).await,
        Commands::Restore(command) => restore_command(command).await,
        Commands::Version => {
            version_command();
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
