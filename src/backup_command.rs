use std::path::PathBuf;

use clap::Args;

use crate::scheduler::run_scheduler;

/// Runs the scheduler: loads every dataset section from `config_path` and
/// fires its job at the configured cron time until interrupted.
#[derive(Debug, Args)]
pub struct BackupCommand {
    /// Path to the INI config file.
    #[arg(short, long)]
    pub config_path: PathBuf,
}

pub async fn backup_command(command: BackupCommand) -> anyhow::Result<()> {
    run_scheduler(&command.config_path).await
}
