//! In-memory test doubles shared by unit tests across modules. Not compiled
//! into the release binary.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use tokio::process::{Child, Command};

use crate::dataset_error::DatasetError;
use crate::object_store_driver::{ObjectStoreDriver, ObjectStoreError, ProgressCallback};
use crate::snapshot::Snapshot;
use crate::zfs_receive::ReceiveStream;
use crate::zfs_send::SendStream;

/// Plain `HashMap<String, Bytes>` behind a mutex, standing in for a bucket.
#[derive(Default)]
pub struct FakeObjectStore {
    objects: Mutex<HashMap<String, Bytes>>,
}

impl FakeObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStoreDriver for FakeObjectStore {
    async fn put_small_object(&self, key: &str, body: Bytes) -> Result<(), ObjectStoreError> {
        self.objects.lock().unwrap().insert(key.to_string(), body);
        Ok(())
    }

    async fn get_small_object(&self, key: &str) -> Result<Bytes, ObjectStoreError> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))
    }

    async fn put_object_streamed(
        &self,
        key: &str,
        mut body: BoxStream<'static, std::io::Result<Bytes>>,
        _total_size: u64,
        _chunk_size: u64,
        on_progress: Option<ProgressCallback>,
    ) -> Result<(), ObjectStoreError> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| ObjectStoreError::Put(e.to_string()))?;
            buf.extend_from_slice(&chunk);
            if let Some(cb) = &on_progress {
                cb(buf.len() as u64, buf.len() as u64);
            }
        }
        self.objects.lock().unwrap().insert(key.to_string(), buf.freeze());
        Ok(())
    }

    async fn get_object_streamed(
        &self,
        key: &str,
        on_progress: Option<ProgressCallback>,
    ) -> Result<BoxStream<'static, std::io::Result<Bytes>>, ObjectStoreError> {
        let bytes = self
            .objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))?;
        let total = bytes.len() as u64;
        if let Some(cb) = &on_progress {
            cb(total, total);
        }
        Ok(stream::once(async move { Ok(bytes) }).boxed())
    }

    async fn delete_object(&self, key: &str) -> Result<(), ObjectStoreError> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn head_object_size(&self, key: &str) -> Result<u64, ObjectStoreError> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|b| b.len() as u64)
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))
    }

    async fn ensure_bucket(&self) -> Result<(), ObjectStoreError> {
        Ok(())
    }
}

/// A snapshot's send content, for fakes only: the snapshot's own name. Real
/// `zfs send` output is opaque to the Job Engine, so any deterministic,
/// per-snapshot byte string exercises the upload/restore plumbing just as
/// well as real stream data would.
fn content_for(name: &str) -> Bytes {
    Bytes::from(name.as_bytes().to_vec())
}

/// Spawns a real child process that writes `content` to stdout and exits,
/// standing in for `zfs send`. `content` travels as an argv entry (`$1` in
/// the script), not interpolated into the script text, so it needs no
/// shell-quoting.
fn spawn_emit(content: &Bytes) -> std::io::Result<Child> {
    let text = String::from_utf8_lossy(content).into_owned();
    Command::new("sh")
        .arg("-c")
        .arg("printf '%s' \"$1\"")
        .arg("sh")
        .arg(text)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
}

static RECEIVE_DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Fake [`crate::dataset_driver::DatasetDriver`]. `list_snapshots`,
/// `create_snapshot`, `destroy_snapshot`, and `destroy_filesystem` are plain
/// in-memory bookkeeping. `send_size`/`open_send_stream` derive real,
/// stream-backed content from the snapshot name via [`spawn_emit`];
/// `open_receive_stream` spawns a real `cat` that drains stdin into a scratch
/// file under a per-driver temp directory, readable back via
/// [`FakeDatasetDriver::received_content`] once the caller has waited on the
/// stream.
pub struct FakeDatasetDriver {
    snapshots: Mutex<BTreeMap<String, Snapshot>>,
    receive_dir: PathBuf,
}

impl Default for FakeDatasetDriver {
    fn default() -> Self {
        let id = RECEIVE_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
        let receive_dir = std::env::temp_dir().join(format!("fake-zfs-receive-{}-{id}", std::process::id()));
        let _ = std::fs::create_dir_all(&receive_dir);
        Self {
            snapshots: Mutex::new(BTreeMap::new()),
            receive_dir,
        }
    }
}

impl Drop for FakeDatasetDriver {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.receive_dir);
    }
}

impl FakeDatasetDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, filesystem: &str, name: &str) {
        self.snapshots.lock().unwrap().insert(
            name.to_string(),
            Snapshot {
                filesystem: filesystem.to_string(),
                name: name.to_string(),
                referenced: 0,
                used: 0,
            },
        );
    }

    fn receive_path(&self, filesystem: &str, name: &str) -> PathBuf {
        self.receive_dir.join(format!("{}@{name}", filesystem.replace('/', "_")))
    }

    /// What a prior `open_receive_stream(filesystem, name)` actually received,
    /// once its `ReceiveStream::wait()` has returned.
    pub fn received_content(&self, filesystem: &str, name: &str) -> Option<Bytes> {
        std::fs::read(self.receive_path(filesystem, name)).ok().map(Bytes::from)
    }
}

#[async_trait]
impl crate::dataset_driver::DatasetDriver for FakeDatasetDriver {
    async fn list_snapshots(&self) -> Result<Vec<Snapshot>, DatasetError> {
        Ok(self.snapshots.lock().unwrap().values().cloned().collect())
    }

    async fn create_snapshot(&self, filesystem: &str, name: &str) -> Result<(), DatasetError> {
        self.seed(filesystem, name);
        Ok(())
    }

    async fn destroy_snapshot(&self, _filesystem: &str, name: &str) -> Result<(), DatasetError> {
        self.snapshots.lock().unwrap().remove(name);
        Ok(())
    }

    async fn destroy_filesystem(&self, _filesystem: &str) -> Result<(), DatasetError> {
        self.snapshots.lock().unwrap().clear();
        Ok(())
    }

    async fn rollback_filesystem(&self, _filesystem: &str, _snapshot_name: &str) -> Result<(), DatasetError> {
        Ok(())
    }

    async fn create_filesystem(&self, _filesystem: &str) -> Result<(), DatasetError> {
        Ok(())
    }

    async fn send_size(&self, _filesystem: &str, name: &str) -> Result<u64, DatasetError> {
        Ok(content_for(name).len() as u64)
    }

    async fn send_size_inc(&self, _filesystem: &str, _from_name: &str, to_name: &str) -> Result<u64, DatasetError> {
        Ok(content_for(to_name).len() as u64)
    }

    fn open_send_stream(&self, _filesystem: &str, name: &str) -> Result<SendStream, DatasetError> {
        let child = spawn_emit(&content_for(name)).map_err(DatasetError::Spawn)?;
        Ok(SendStream::from_child(child))
    }

    fn open_send_stream_inc(
        &self,
        filesystem: &str,
        _from_name: &str,
        to_name: &str,
    ) -> Result<SendStream, DatasetError> {
        self.open_send_stream(filesystem, to_name)
    }

    fn open_receive_stream(&self, filesystem: &str, name: &str) -> Result<ReceiveStream, DatasetError> {
        let path = self.receive_path(filesystem, name);
        let child = Command::new("sh")
            .arg("-c")
            .arg("cat > \"$1\"")
            .arg("sh")
            .arg(&path)
            .stdin(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(DatasetError::Spawn)?;
        Ok(ReceiveStream::from_child(child))
    }
}
