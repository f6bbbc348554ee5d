use std::time::{Duration, Instant};

use async_trait::async_trait;
use aws_sdk_s3::operation::create_bucket::CreateBucketError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CompletedMultipartUpload, CompletedPart, CreateBucketConfiguration};
use aws_sdk_s3::Client;
use bytes::{Bytes, BytesMut};
use futures::stream::{BoxStream, FuturesUnordered};
use futures::{StreamExt, TryStreamExt};
use tracing::{debug, info};

use crate::config::{S3_MAX_CONCURRENCY, TRANSFER_LOG_INTERVAL_SECS};
use crate::object_store_driver::{ObjectStoreDriver, ObjectStoreError, ProgressCallback};

/// [`ObjectStoreDriver`] backed by `aws-sdk-s3`.
pub struct S3ObjectStoreDriver {
    client: Client,
    bucket: String,
    storage_class: Option<aws_sdk_s3::types::StorageClass>,
}

impl S3ObjectStoreDriver {
    pub fn new(client: Client, bucket: String, storage_class: Option<String>) -> Self {
        let storage_class = storage_class.map(|s| aws_sdk_s3::types::StorageClass::from(s.as_str()));
        Self {
            client,
            bucket,
            storage_class,
        }
    }
}

fn emit_progress(on_progress: &Option<ProgressCallback>, last_emit: &mut Instant, transferred: u64, total: u64) {
    if last_emit.elapsed() >= Duration::from_secs(TRANSFER_LOG_INTERVAL_SECS) {
        if let Some(cb) = on_progress {
            cb(transferred, total);
        }
        *last_emit = Instant::now();
    }
}

#[async_trait]
impl ObjectStoreDriver for S3ObjectStoreDriver {
    async fn put_small_object(&self, key: &str, body: Bytes) -> Result<(), ObjectStoreError> {
        let mut req = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body));
        if let Some(class) = self.storage_class.clone() {
            req = req.storage_class(class);
        }
        req.send()
            .await
            .map_err(|e| ObjectStoreError::Put(e.to_string()))?;
        Ok(())
    }

    async fn get_small_object(&self, key: &str) -> Result<Bytes, ObjectStoreError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().map(|se| se.is_no_such_key()).unwrap_or(false) {
                    ObjectStoreError::NotFound(key.to_string())
                } else {
                    ObjectStoreError::Get(e.to_string())
                }
            })?;
        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| ObjectStoreError::Get(e.to_string()))?
            .into_bytes();
        Ok(bytes)
    }

    async fn put_object_streamed(
        &self,
        key: &str,
        mut body: BoxStream<'static, std::io::Result<Bytes>>,
        total_size: u64,
        chunk_size: u64,
        on_progress: Option<ProgressCallback>,
    ) -> Result<(), ObjectStoreError> {
        let mut create = self.client.create_multipart_upload().bucket(&self.bucket).key(key);
        if let Some(class) = self.storage_class.clone() {
            create = create.storage_class(class);
        }
        let create_output = create
            .send()
            .await
            .map_err(|e| ObjectStoreError::Multipart(e.to_string()))?;
        let upload_id: std::sync::Arc<str> = create_output
            .upload_id()
            .ok_or_else(|| ObjectStoreError::Multipart("missing upload_id".to_string()))?
            .into();

        let result = async {
            let mut part_number = 1i32;
            let mut transferred = 0u64;
            let mut last_emit = Instant::now();
            let mut parts = Vec::new();
            let mut pending = BytesMut::new();
            let mut inflight = FuturesUnordered::new();

            macro_rules! drain_one {
                () => {{
                    let (number, len, uploaded): (i32, u64, Result<_, ObjectStoreError>) =
                        inflight.next().await.expect("inflight is non-empty");
                    let uploaded = uploaded?;
                    parts.push(
                        CompletedPart::builder()
                            .e_tag(uploaded.e_tag().unwrap_or_default())
                            .part_number(number)
                            .build(),
                    );
                    transferred += len;
                    emit_progress(&on_progress, &mut last_emit, transferred, total_size);
                }};
            }

            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(|e| ObjectStoreError::Multipart(e.to_string()))?;
                pending.extend_from_slice(&chunk);
                while pending.len() as u64 >= chunk_size {
                    let part = pending.split_to(chunk_size as usize).freeze();
                    let len = part.len() as u64;
                    let number = part_number;
                    part_number += 1;
                    let upload_id = upload_id.clone();
                    inflight.push(async move {
                        let uploaded = self
                            .client
                            .upload_part()
                            .bucket(&self.bucket)
                            .key(key)
                            .upload_id(upload_id.as_ref())
                            .part_number(number)
                            .body(ByteStream::from(part))
                            .send()
                            .await
                            .map_err(|e| ObjectStoreError::Multipart(e.to_string()));
                        (number, len, uploaded)
                    });
                    if inflight.len() >= S3_MAX_CONCURRENCY {
                        drain_one!();
                    }
                }
            }
            if !pending.is_empty() {
                let part = pending.freeze();
                let len = part.len() as u64;
                let number = part_number;
                let upload_id = upload_id.clone();
                inflight.push(async move {
                    let uploaded = self
                        .client
                        .upload_part()
                        .bucket(&self.bucket)
                        .key(key)
                        .upload_id(upload_id.as_ref())
                        .part_number(number)
                        .body(ByteStream::from(part))
                        .send()
                        .await
                        .map_err(|e| ObjectStoreError::Multipart(e.to_string()));
                    (number, len, uploaded)
                });
            }
            while !inflight.is_empty() {
                drain_one!();
            }
            debug!(transferred, total_size, "multipart upload read complete");

            parts.sort_by_key(|p| p.part_number());
            self.client
                .complete_multipart_upload()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id.as_ref())
                .multipart_upload(
                    CompletedMultipartUpload::builder()
                        .set_parts(Some(parts))
                        .build(),
                )
                .send()
                .await
                .map_err(|e| ObjectStoreError::Multipart(e.to_string()))?;
            if let Some(cb) = &on_progress {
                cb(transferred, total_size);
            }
            info!(key, transferred, "upload complete");
            Ok(())
        }
        .await;

        if result.is_err() {
            let _ = self
                .client
                .abort_multipart_upload()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id.as_ref())
                .send()
                .await;
        }
        result
    }

    async fn get_object_streamed(
        &self,
        key: &str,
        on_progress: Option<ProgressCallback>,
    ) -> Result<BoxStream<'static, std::io::Result<Bytes>>, ObjectStoreError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().map(|se| se.is_no_such_key()).unwrap_or(false) {
                    ObjectStoreError::NotFound(key.to_string())
                } else {
                    ObjectStoreError::Get(e.to_string())
                }
            })?;
        let total_size = output.content_length().unwrap_or(0).max(0) as u64;
        struct State {
            body: aws_sdk_s3::primitives::ByteStream,
            transferred: u64,
            last_emit: Instant,
            on_progress: Option<ProgressCallback>,
            done: bool,
        }
        let state = State {
            body: output.body,
            transferred: 0,
            last_emit: Instant::now(),
            on_progress,
            done: false,
        };

        let stream = futures::stream::unfold(state, move |mut state| async move {
            if state.done {
                return None;
            }
            match state.body.try_next().await {
                Ok(Some(chunk)) => {
                    state.transferred += chunk.len() as u64;
                    emit_progress(&state.on_progress, &mut state.last_emit, state.transferred, total_size);
                    Some((Ok(chunk), state))
                }
                Ok(None) => {
                    if let Some(cb) = &state.on_progress {
                        cb(state.transferred, total_size);
                    }
                    state.done = true;
                    None
                }
                Err(e) => {
                    state.done = true;
                    Some((Err(std::io::Error::other(e.to_string())), state))
                }
            }
        });
        Ok(Box::pin(stream))
    }

    async fn delete_object(&self, key: &str) -> Result<(), ObjectStoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Delete(e.to_string()))?;
        Ok(())
    }

    async fn head_object_size(&self, key: &str) -> Result<u64, ObjectStoreError> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().map(|se| se.is_not_found()).unwrap_or(false) {
                    ObjectStoreError::NotFound(key.to_string())
                } else {
                    ObjectStoreError::Head(e.to_string())
                }
            })?;
        Ok(output.content_length().unwrap_or(0).max(0) as u64)
    }

    async fn ensure_bucket(&self) -> Result<(), ObjectStoreError> {
        let region = self.client.config().region().map(|r| r.to_string());
        let mut req = self.client.create_bucket().bucket(&self.bucket);
        if let Some(region) = region.filter(|r| r != "us-east-1") {
            req = req.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region.as_str()))
                    .build(),
            );
        }
        match req.send().await {
            Ok(_) => Ok(()),
            Err(e) => match e.as_service_error() {
                Some(CreateBucketError::BucketAlreadyOwnedByYou(_)) => Ok(()),
                _ => Err(ObjectStoreError::CreateBucket(e.to_string())),
            },
        }
    }
}
