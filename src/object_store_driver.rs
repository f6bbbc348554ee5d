use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

/// Wraps the object store SDK so the Backup Catalog and Job Engine can run
/// against an in-memory fake in tests.
#[derive(Debug, thiserror::Error)]
pub enum ObjectStoreError {
    #[error("put_object failed: {0}")]
    Put(String),
    #[error("get_object failed: {0}")]
    Get(String),
    #[error("delete_object failed: {0}")]
    Delete(String),
    #[error("head_object failed: {0}")]
    Head(String),
    #[error("list_objects failed: {0}")]
    List(String),
    #[error("create_bucket failed: {0}")]
    CreateBucket(String),
    #[error("object {0} not found")]
    NotFound(String),
    #[error("multipart upload failed: {0}")]
    Multipart(String),
}

/// Per-chunk progress callback, invoked with bytes transferred so far for
/// the current object and the object's total size.
pub type ProgressCallback = Box<dyn Fn(u64, u64) + Send + Sync>;

#[async_trait]
pub trait ObjectStoreDriver: Send + Sync {
    async fn put_small_object(&self, key: &str, body: Bytes) -> Result<(), ObjectStoreError>;

    async fn get_small_object(&self, key: &str) -> Result<Bytes, ObjectStoreError>;

    /// Uploads `body` (of `total_size` bytes) to `key`, splitting into
    /// multipart chunks of `chunk_size` and reporting progress at most every
    /// few seconds via `on_progress`.
    async fn put_object_streamed(
        &self,
        key: &str,
        body: BoxStream<'static, std::io::Result<Bytes>>,
        total_size: u64,
        chunk_size: u64,
        on_progress: Option<ProgressCallback>,
    ) -> Result<(), ObjectStoreError>;

    /// Downloads `key` as a stream of chunks, reporting progress the same
    /// way as [`put_object_streamed`](Self::put_object_streamed). The caller
    /// drives the stream (typically piping it into an `AsyncWrite`), so
    /// `BrokenPipe` on the consuming side is the caller's concern, not this
    /// driver's.
    async fn get_object_streamed(
        &self,
        key: &str,
        on_progress: Option<ProgressCallback>,
    ) -> Result<BoxStream<'static, std::io::Result<Bytes>>, ObjectStoreError>;

    async fn delete_object(&self, key: &str) -> Result<(), ObjectStoreError>;

    async fn head_object_size(&self, key: &str) -> Result<u64, ObjectStoreError>;

    async fn ensure_bucket(&self) -> Result<(), ObjectStoreError>;
}
