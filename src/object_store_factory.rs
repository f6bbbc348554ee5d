use std::sync::Arc;

use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Credentials;

use crate::dataset_config::DatasetConfig;
use crate::s3_object_store_driver::S3ObjectStoreDriver;

/// Builds the S3-backed object store for one dataset's configuration.
pub async fn build_object_store(config: &DatasetConfig) -> anyhow::Result<Arc<S3ObjectStoreDriver>> {
    let mut builder = aws_config::defaults(BehaviorVersion::latest())
        .region(aws_sdk_s3::config::Region::new(config.region_or_default().to_string()))
        .credentials_provider(Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "zfs-s3-backup-config",
        ));
    if let Some(endpoint) = &config.endpoint {
        builder = builder.endpoint_url(endpoint.clone());
    }
    let sdk_config = builder.load().await;
    let client = aws_sdk_s3::Client::new(&sdk_config);
    let storage_class = config.storage_class_or_default().to_string();
    Ok(Arc::new(S3ObjectStoreDriver::new(
        client,
        config.bucket_name.clone(),
        Some(storage_class),
    )))
}
