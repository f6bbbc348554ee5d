use std::path::Path;
use std::sync::Arc;

use tokio::signal;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::app_config::load_dataset_configs;
use crate::dataset_config::DatasetConfig;
use crate::dataset_driver::ProcessDatasetDriver;
use crate::job_engine::JobEngine;
use crate::object_store_factory::build_object_store;

async fn build_engine(config: DatasetConfig) -> anyhow::Result<JobEngine> {
    let store = build_object_store(&config).await?;
    store.ensure_bucket().await.ok();
    Ok(JobEngine::new(config, Arc::new(ProcessDatasetDriver), store))
}

/// Loads every managed dataset from `config_path` and registers a cron job
/// per dataset with a `cron` option set, then blocks until SIGINT.
/// Single-worker by construction — `JobScheduler` serializes job firings.
pub async fn run_scheduler(config_path: &Path) -> anyhow::Result<()> {
    let configs = load_dataset_configs(config_path)?;
    let scheduler = JobScheduler::new().await?;

    for config in configs {
        let Some(cron) = config.cron.clone() else {
            info!(filesystem = %config.filesystem, "no cron configured, skipping");
            continue;
        };
        let filesystem = config.filesystem.clone();
        // `tokio_cron_scheduler` requires a leading seconds field; config
        // carries a plain 5-field `M H D M W` unix cron spec.
        let cron_with_seconds = format!("0 {cron}");
        let job = Job::new_async(cron_with_seconds.as_str(), move |_uuid, _lock| {
            let config = config.clone();
            Box::pin(async move {
                match build_engine(config).await {
                    Ok(engine) => {
                        if let Err(err) = engine.run().await {
                            error!(filesystem = %engine.config.filesystem, error = %err, "backup run failed");
                        }
                    }
                    Err(err) => error!(error = %err, "failed to build job engine"),
                }
            })
        })?;
        scheduler.add(job).await?;
        info!(filesystem = %filesystem, cron = %cron, "scheduled backup job");
    }

    scheduler.start().await?;
    signal::ctrl_c().await?;
    info!("received interrupt, shutting down scheduler");
    scheduler.shutdown().await?;
    Ok(())
}
