use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, StreamExt, TryStreamExt};
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::{path::Path as ObjPath, ObjectStore, WriteMultipart};
use tracing::debug;

use crate::utils::config::{AppConfig, StorageKind};

pub type DynStore = Arc<dyn ObjectStore>;

/// Parts allowed in flight while streaming one object.
const MAX_CONCURRENT_PARTS: usize = 4;

/// Storage manager with persistent state and proper lifecycle management.
#[derive(Clone)]
pub struct StorageManager {
    store: DynStore,
    backend_kind: StorageKind,
    local_base: Option<PathBuf>,
}

impl StorageManager {
    /// Create a new StorageManager with the specified configuration.
    ///
    /// This method validates the configuration and creates the appropriate
    /// storage backend with proper initialization.
    pub async fn new(cfg: &AppConfig) -> object_store::Result<Self> {
        let backend_kind = cfg.storage.clone();
        let (store, local_base) = create_storage_backend(cfg).await?;

        Ok(Self {
            store,
            backend_kind,
            local_base,
        })
    }

    /// Create a StorageManager with a custom storage backend.
    ///
    /// This method is useful for testing scenarios where you want to inject
    /// a specific storage backend.
    pub fn with_backend(store: DynStore, backend_kind: StorageKind) -> Self {
        Self {
            store,
            backend_kind,
            local_base: None,
        }
    }

    /// Get the storage backend kind.
    pub fn backend_kind(&self) -> &StorageKind {
        &self.backend_kind
    }

    /// Access the resolved local base directory when using the local backend.
    pub fn local_base_path(&self) -> Option<&Path> {
        self.local_base.as_deref()
    }

    /// Store bytes at the specified location.
    ///
    /// The object becomes visible atomically once the write completes.
    pub async fn put(&self, location: &str, data: Bytes) -> object_store::Result<()> {
        let path = ObjPath::from(location);
        let payload = object_store::PutPayload::from_bytes(data);
        self.store.put(&path, payload).await.map(|_| ())
    }

    /// Stream chunks into the specified location, overwriting any existing object.
    ///
    /// At most `chunk_size` bytes are buffered per part and at most
    /// `MAX_CONCURRENT_PARTS` parts are in flight. Returns the number of bytes written.
    /// A failing source aborts the upload; the previous object at `location` stays intact.
    pub async fn put_chunked<S>(
        &self,
        location: &str,
        chunk_size: usize,
        mut chunks: S,
    ) -> object_store::Result<u64>
    where
        S: Stream<Item = std::io::Result<Bytes>> + Unpin,
    {
        let path = ObjPath::from(location);
        let upload = self.store.put_multipart(&path).await?;
        let mut writer = WriteMultipart::new_with_chunk_size(upload, chunk_size.max(1));
        let mut written: u64 = 0;

        while let Some(chunk) = chunks.next().await {
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(err) => {
                    if let Err(abort_err) = writer.abort().await {
                        debug!(error = %abort_err, %location, "Failed to abort multipart upload");
                    }
                    return Err(object_store::Error::Generic {
                        store: "StorageManager",
                        source: err.into(),
                    });
                }
            };
            writer.wait_for_capacity(MAX_CONCURRENT_PARTS).await?;
            written = written.saturating_add(bytes.len() as u64);
            writer.write(&bytes);
        }

        writer.finish().await?;
        Ok(written)
    }

    /// Retrieve bytes from the specified location.
    ///
    /// Returns the full contents buffered in memory.
    pub async fn get(&self, location: &str) -> object_store::Result<Bytes> {
        self.get_path(&ObjPath::from(location)).await
    }

    /// Retrieve bytes from an already encoded object path, such as one returned by `list`.
    pub async fn get_path(&self, path: &ObjPath) -> object_store::Result<Bytes> {
        let result = self.store.get(path).await?;
        result.bytes().await
    }

    /// List all objects below the specified prefix.
    pub async fn list(
        &self,
        prefix: Option<&str>,
    ) -> object_store::Result<Vec<object_store::ObjectMeta>> {
        let prefix_path = prefix.map(ObjPath::from);
        self.store.list(prefix_path.as_ref()).try_collect().await
    }

    /// Check if an object exists at the specified location.
    pub async fn exists(&self, location: &str) -> object_store::Result<bool> {
        let path = ObjPath::from(location);
        self.store
            .head(&path)
            .await
            .map(|_| true)
            .or_else(|e| match e {
                object_store::Error::NotFound { .. } => Ok(false),
                _ => Err(e),
            })
    }
}

fn resolve_base_dir(cfg: &AppConfig) -> PathBuf {
    let configured = PathBuf::from(&cfg.data_dir);
    if configured.is_absolute() {
        configured
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(&configured))
            .unwrap_or(configured)
    }
}

/// Create a storage backend based on configuration.
async fn create_storage_backend(
    cfg: &AppConfig,
) -> object_store::Result<(DynStore, Option<PathBuf>)> {
    match cfg.storage {
        StorageKind::Local => {
            let base = resolve_base_dir(cfg);
            if !base.exists() {
                tokio::fs::create_dir_all(&base).await.map_err(|e| {
                    object_store::Error::Generic {
                        store: "LocalFileSystem",
                        source: e.into(),
                    }
                })?;
            }
            let store = LocalFileSystem::new_with_prefix(base.clone())?;
            Ok((Arc::new(store), Some(base)))
        }
        StorageKind::Memory => {
            let store = InMemory::new();
            Ok((Arc::new(store), None))
        }
    }
}

/// Testing utilities for storage operations.
#[cfg(any(test, feature = "test-utils"))]
pub mod testing {
    use super::*;

    /// Create a test configuration with memory storage.
    pub fn test_config_memory() -> AppConfig {
        AppConfig {
            openai_api_key: "test".into(),
            data_dir: "/tmp/unused".into(), // Ignored for memory storage
            http_port: 0,
            storage: StorageKind::Memory,
            ..Default::default()
        }
    }

    /// Create a test configuration with local storage under a unique temp directory.
    pub fn test_config_local(base: &Path) -> AppConfig {
        AppConfig {
            openai_api_key: "test".into(),
            data_dir: base.to_string_lossy().into_owned(),
            http_port: 0,
            storage: StorageKind::Local,
            ..Default::default()
        }
    }

    /// Storage manager backed by memory, isolated per call.
    pub fn memory_storage() -> StorageManager {
        StorageManager::with_backend(Arc::new(InMemory::new()), StorageKind::Memory)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use futures::stream;

    fn byte_chunks(parts: &[&'static [u8]]) -> impl Stream<Item = std::io::Result<Bytes>> + Unpin {
        stream::iter(
            parts
                .iter()
                .map(|p| Ok(Bytes::from_static(p)))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn put_get_and_exists_on_memory_backend() {
        let storage = StorageManager::new(&test_config_memory())
            .await
            .expect("memory storage");

        assert!(!storage.exists("documents/a.txt").await.expect("exists"));
        storage
            .put("documents/a.txt", Bytes::from_static(b"hello"))
            .await
            .expect("put");

        assert!(storage.exists("documents/a.txt").await.expect("exists"));
        assert_eq!(
            storage.get("documents/a.txt").await.expect("get"),
            Bytes::from_static(b"hello")
        );
    }

    #[tokio::test]
    async fn put_chunked_concatenates_parts_and_overwrites() {
        let storage = memory_storage();

        let written = storage
            .put_chunked("documents/b.txt", 4, byte_chunks(&[b"abcd", b"efgh", b"ij"]))
            .await
            .expect("chunked put");
        assert_eq!(written, 10);
        assert_eq!(
            storage.get("documents/b.txt").await.expect("get"),
            Bytes::from_static(b"abcdefghij")
        );

        storage
            .put_chunked("documents/b.txt", 4, byte_chunks(&[b"new"]))
            .await
            .expect("overwrite");
        assert_eq!(
            storage.get("documents/b.txt").await.expect("get"),
            Bytes::from_static(b"new")
        );
    }

    #[tokio::test]
    async fn failing_source_keeps_previous_object() {
        let storage = memory_storage();
        storage
            .put("documents/c.txt", Bytes::from_static(b"original"))
            .await
            .expect("put");

        let failing = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(std::io::Error::new(std::io::ErrorKind::Other, "source broke")),
        ]);
        let result = storage.put_chunked("documents/c.txt", 4, failing).await;

        assert!(result.is_err());
        assert_eq!(
            storage.get("documents/c.txt").await.expect("get"),
            Bytes::from_static(b"original")
        );
    }

    #[tokio::test]
    async fn local_backend_writes_under_data_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let base = dir.path().join(format!("store_{}", uuid::Uuid::new_v4()));
        let storage = StorageManager::new(&test_config_local(&base))
            .await
            .expect("local storage");

        storage
            .put_chunked("documents/d.txt", 2, byte_chunks(&[b"on", b" disk"]))
            .await
            .expect("chunked put");

        let on_disk = std::fs::read(base.join("documents").join("d.txt")).expect("file on disk");
        assert_eq!(on_disk, b"on disk");

        let listed = storage.list(Some("documents")).await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(storage.local_base_path(), Some(base.as_path()));
        assert_eq!(storage.backend_kind(), &StorageKind::Local);
    }
}
