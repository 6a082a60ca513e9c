use std::{
    io::Write,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use chrono::Utc;
use common::{
    error::AppError,
    storage::store::{
        testing::{memory_storage, test_config_local},
        StorageManager,
    },
    utils::embedding::EmbeddingProvider,
};
use retrieval_pipeline::{
    AnswerSynthesizer, Chunker, IndexManager, IndexOrigin, IndexSettings, IndexStats,
};
use tempfile::NamedTempFile;

use super::{IndexRefresh, IngestionPipeline};
use crate::{filter::FileFilter, filter::UploadedFile, writer::DocumentWriter};

#[derive(Default)]
struct MockIndex {
    rebuilds: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl IndexRefresh for MockIndex {
    async fn rebuild(&self) -> Result<IndexStats, AppError> {
        let generation = self.rebuilds.fetch_add(1, Ordering::SeqCst) as u64 + 2;
        if self.fail {
            return Err(AppError::Index("embedding backend unavailable".into()));
        }
        Ok(IndexStats {
            generation,
            origin: IndexOrigin::Rebuilt,
            document_count: 0,
            chunk_count: 0,
            built_at: Utc::now(),
        })
    }
}

fn upload(name: &str, body: &str) -> UploadedFile {
    let mut contents = NamedTempFile::new().expect("temp file");
    contents.write_all(body.as_bytes()).expect("write temp file");
    UploadedFile {
        file_name: name.to_string(),
        contents,
    }
}

fn pipeline(storage: StorageManager, index: Arc<dyn IndexRefresh>) -> IngestionPipeline {
    IngestionPipeline::with_parts(
        FileFilter::new(vec!["txt".into()], 10),
        DocumentWriter::new(storage, "documents", 8),
        index,
    )
}

#[tokio::test]
async fn stored_files_trigger_one_rebuild() {
    let storage = memory_storage();
    let index = Arc::new(MockIndex::default());
    let pipeline = pipeline(storage.clone(), index.clone());

    let outcome = pipeline
        .ingest(vec![
            upload("a.txt", "alpha"),
            upload("image.png", "not text"),
            upload("b.txt", "beta"),
        ])
        .await
        .expect("ingest");

    assert_eq!(outcome.stored, vec!["a.txt", "b.txt"]);
    assert_eq!(outcome.rejected, vec!["image.png"]);
    assert_eq!(outcome.index.as_ref().map(|s| s.generation), Some(2));
    assert_eq!(index.rebuilds.load(Ordering::SeqCst), 1);
    assert!(storage.exists("documents/a.txt").await.expect("exists"));
    assert!(!storage.exists("documents/image.png").await.expect("exists"));
    assert_eq!(
        outcome.message(),
        "Successfully uploaded a.txt, b.txt. Rejected unsupported files: image.png."
    );
}

#[tokio::test]
async fn all_rejected_batch_skips_rebuild() {
    let storage = memory_storage();
    let index = Arc::new(MockIndex::default());
    let pipeline = pipeline(storage.clone(), index.clone());

    let outcome = pipeline
        .ingest(vec![upload("a.pdf", "pdf"), upload("b.md", "markdown")])
        .await
        .expect("ingest");

    assert!(outcome.stored.is_empty());
    assert_eq!(outcome.rejected, vec!["a.pdf", "b.md"]);
    assert!(outcome.index.is_none());
    assert_eq!(index.rebuilds.load(Ordering::SeqCst), 0);
    assert!(storage.list(Some("documents")).await.expect("list").is_empty());
    assert!(outcome.message().starts_with("No files were stored."));
}

#[tokio::test]
async fn empty_selection_has_no_side_effects() {
    let storage = memory_storage();
    let index = Arc::new(MockIndex::default());
    let pipeline = pipeline(storage.clone(), index.clone());

    let err = pipeline
        .ingest(vec![upload("", "")])
        .await
        .expect_err("must be rejected");

    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(index.rebuilds.load(Ordering::SeqCst), 0);
    assert!(storage.list(None).await.expect("list").is_empty());
}

#[tokio::test]
async fn failed_file_still_rebuilds_over_stored_ones() {
    let storage = memory_storage();
    let index = Arc::new(MockIndex::default());
    let pipeline = pipeline(storage.clone(), index.clone());

    let broken = upload("broken.txt", "lost");
    std::fs::remove_file(broken.contents.path()).expect("remove temp file");

    let err = pipeline
        .ingest(vec![upload("good.txt", "kept"), broken])
        .await
        .expect_err("broken file must fail the request");

    assert!(matches!(
        err,
        AppError::FileProcessing { ref file_name, .. } if file_name == "broken.txt"
    ));
    assert_eq!(index.rebuilds.load(Ordering::SeqCst), 1);
    assert!(storage.exists("documents/good.txt").await.expect("exists"));
}

#[tokio::test]
async fn rebuild_failure_is_returned() {
    let index = Arc::new(MockIndex {
        fail: true,
        ..Default::default()
    });
    let pipeline = pipeline(memory_storage(), index);

    let err = pipeline
        .ingest(vec![upload("a.txt", "alpha")])
        .await
        .expect_err("rebuild failure must surface");
    assert!(matches!(err, AppError::Index(_)));
}

async fn real_index(storage: StorageManager) -> Arc<IndexManager> {
    Arc::new(
        IndexManager::initialize(
            storage,
            EmbeddingProvider::new_hashed(128).expect("hashed provider"),
            AnswerSynthesizer::Extractive,
            Chunker::new(20, 200, 0).expect("chunker"),
            IndexSettings {
                content_dir: "documents".into(),
                index_dir: "index".into(),
                accepted_extensions: vec!["txt".into()],
                embedding_batch_size: 8,
                top_k: 2,
            },
        )
        .await
        .expect("index manager"),
    )
}

#[tokio::test]
async fn ingested_document_becomes_queryable() {
    let storage = memory_storage();
    let manager = real_index(storage.clone()).await;
    let pipeline = pipeline(storage, manager.clone());

    let before = manager
        .current_view()
        .await
        .retrieve("lighthouse keeper")
        .await
        .expect("retrieve");
    assert!(before.is_empty());

    pipeline
        .ingest(vec![upload(
            "lighthouse.txt",
            "The lighthouse keeper trims the lamp every evening.",
        )])
        .await
        .expect("ingest");

    let view = manager.current_view().await;
    assert_eq!(view.generation(), 2);
    let after = view.retrieve("lighthouse keeper").await.expect("retrieve");
    assert_eq!(after[0].chunk.file_name, "lighthouse.txt");
}

const ESCAPED_NAMES: [&str; 3] = ["café.txt", "100%.txt", "q#1.txt"];

#[tokio::test]
async fn names_needing_escapes_are_indexed_under_their_own_names() {
    let storage = memory_storage();
    let manager = real_index(storage.clone()).await;
    let pipeline = pipeline(storage, manager.clone());

    for name in ESCAPED_NAMES {
        let outcome = pipeline
            .ingest(vec![upload(name, "The lighthouse keeper trims the lamp.")])
            .await
            .expect("ingest");
        assert_eq!(outcome.stored, vec![name]);
    }
    // Later batches rescan the earlier documents and must keep succeeding.
    pipeline
        .ingest(vec![upload("plain.txt", "Ferries leave at dawn.")])
        .await
        .expect("follow-up ingest");

    let view = manager.current_view().await;
    assert_eq!(view.index().document_count(), 4);
    for name in ESCAPED_NAMES {
        assert!(view.index().contains_document(name), "{name} missing");
    }
}

#[tokio::test]
async fn names_needing_escapes_survive_restart_on_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = test_config_local(dir.path());
    let storage = StorageManager::new(&config).await.expect("local storage");
    let manager = real_index(storage.clone()).await;
    let pipeline = pipeline(storage.clone(), manager);

    pipeline
        .ingest(ESCAPED_NAMES.iter().map(|name| upload(name, "keeper")).collect())
        .await
        .expect("ingest");

    // Without a snapshot the restart has to rescan the stored files.
    storage
        .put("index/snapshot.json", bytes::Bytes::from_static(b"not json"))
        .await
        .expect("corrupt snapshot");
    let restarted = real_index(StorageManager::new(&config).await.expect("local storage")).await;

    let view = restarted.current_view().await;
    assert_eq!(view.origin(), IndexOrigin::Rebuilt);
    for name in ESCAPED_NAMES {
        assert!(view.index().contains_document(name), "{name} missing");
    }
}
