//! End-to-end exercise of the service facade: index a real directory tree,
//! then search, inspect stats, and verify the indexing guarantees.
//!
//! Uses the deterministic noop embedder, whose image vectors are derived from
//! the file name, so a query equal to a file name is an exact match.

use std::path::Path;
use std::sync::Arc;

use pixie_embed::{EmbeddingProvider, NoopEmbedProvider};
use pixie_index::config::ServiceConfig;
use pixie_index::indexing::RunOutcome;
use pixie_index::service::{ImageSearchService, StartOutcome};
use pixie_index::storage::sqlite_store::SqliteVectorStore;
use pixie_index::storage::VectorStore;

const DIM: usize = 16;

async fn build_service(root: &Path, batch_size: usize) -> ImageSearchService {
    let config = ServiceConfig::new(root).with_batch_size(batch_size);
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(NoopEmbedProvider::with_dimension(DIM));
    let store: Arc<dyn VectorStore> = Arc::new(SqliteVectorStore::open_memory().await.unwrap());
    ImageSearchService::new(config, provider, store)
        .await
        .unwrap()
}

async fn write_file(path: &Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.unwrap();
    }
    tokio::fs::write(path, contents).await.unwrap();
}

#[tokio::test]
async fn index_search_and_reindex() {
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir.path().join("cat.jpg"), b"image").await;
    write_file(&dir.path().join("dog.jpg"), b"image").await;
    write_file(&dir.path().join("pets/hamster.png"), b"image").await;
    write_file(&dir.path().join("pets/hamster.txt"), b"A hamster in a wheel").await;
    write_file(&dir.path().join("README.md"), b"not an image").await;

    let service = build_service(dir.path(), 2).await;

    let outcome = service.run_indexing(None).await.unwrap();
    assert_eq!(
        outcome,
        RunOutcome::Completed {
            indexed: 3,
            errors: 0
        }
    );

    let stats = service.stats().await.unwrap();
    assert_eq!(stats.total_images, 3);
    assert!(!stats.is_indexing);

    // Noop embeddings make a file-name query an exact match
    let response = service.search("cat.jpg", None, 0.99).await.unwrap();
    assert_eq!(response.count, 1);
    assert_eq!(response.results[0].filename, "cat.jpg");
    assert!(response.results[0].score > 0.99);

    let response = service.search("hamster.png", Some(1), 0.99).await.unwrap();
    assert_eq!(response.results[0].relative_path, "pets/hamster.png");
    assert_eq!(response.results[0].description, "A hamster in a wheel");

    // Re-indexing the same tree overwrites in place
    let outcome = service.run_indexing(None).await.unwrap();
    assert_eq!(
        outcome,
        RunOutcome::Completed {
            indexed: 3,
            errors: 0
        }
    );
    assert_eq!(service.stats().await.unwrap().total_images, 3);

    // A new file is picked up on the next run
    write_file(&dir.path().join("bird.jpg"), b"image").await;
    service.run_indexing(None).await.unwrap();
    assert_eq!(service.stats().await.unwrap().total_images, 4);
}

#[tokio::test]
async fn concurrent_runs_are_mutually_exclusive() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..6 {
        write_file(&dir.path().join(format!("img_{i}.jpg")), b"image").await;
    }

    let service = build_service(dir.path(), 1).await;
    let (a, b) = tokio::join!(service.run_indexing(None), service.run_indexing(None));
    let (a, b) = (a.unwrap(), b.unwrap());

    let completed = [a, b]
        .iter()
        .filter(|o| matches!(o, RunOutcome::Completed { .. }))
        .count();
    assert_eq!(completed, 1, "exactly one of two concurrent runs proceeds");
    assert!([a, b].contains(&RunOutcome::AlreadyRunning));

    // The winner indexed everything
    assert_eq!(service.stats().await.unwrap().total_images, 6);
    assert!(!service.indexing_status().is_indexing);
}

#[tokio::test]
async fn background_run_reports_progress_until_done() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..4 {
        write_file(&dir.path().join(format!("img_{i}.jpg")), b"image").await;
    }

    let service = build_service(dir.path(), 2).await;
    match service.start_indexing(None).await.unwrap() {
        StartOutcome::Started(status) => assert!(status.is_indexing),
        StartOutcome::AlreadyRunning(_) => panic!("fresh service had a held slot"),
    }

    let mut last_progress = 0;
    for _ in 0..200 {
        let status = service.indexing_status();
        assert!(status.progress >= last_progress, "progress never regresses");
        last_progress = status.progress;
        if !status.is_indexing {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let status = service.indexing_status();
    assert!(!status.is_indexing);
    assert_eq!(status.progress, 4);
    assert_eq!(status.total, 4);
    assert_eq!(status.message, "Completed! Indexed 4 images.");
    assert_eq!(service.stats().await.unwrap().total_images, 4);
}

#[tokio::test]
async fn corrupt_batch_is_counted_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write_file(&dir.path().join("a.jpg"), b"image").await;
    write_file(&dir.path().join("b.jpg"), b"image").await;
    write_file(&dir.path().join("c.jpg"), b"image").await;
    write_file(&dir.path().join("d.jpg"), b"").await; // undecodable

    let service = build_service(dir.path(), 4).await;
    let outcome = service.run_indexing(None).await.unwrap();

    assert_eq!(
        outcome,
        RunOutcome::Completed {
            indexed: 0,
            errors: 4
        }
    );
    assert_eq!(service.stats().await.unwrap().total_images, 0);
    assert_eq!(
        service.indexing_status().message,
        "Completed! Indexed 0 images. (4 errors)"
    );
}
