//! End-to-end video job suite
//!
//! Runs whole video submissions through the service with mock
//! capabilities: verdicts, thumbnails, artifact cleanup, and the
//! exactly-once capability construction contract under concurrent
//! first use.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{write_test_video, CountingLoader};
use uuid::Uuid;

use veriframe_capabilities::CapabilityRegistry;
use veriframe_common::{JobStatus, Label, MediaKind};
use veriframe_service::{AnalysisService, JobStatusView, ServiceConfig};
use veriframe_storage::MemoryStore;

struct Harness {
    service: Arc<AnalysisService>,
    loader: Arc<CountingLoader>,
    upload_dir: tempfile::TempDir,
}

fn start(video_score: f32, workers: usize) -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let upload_dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let loader = Arc::new(CountingLoader::new(0.5, video_score));
    let registry = Arc::new(CapabilityRegistry::new(
        Arc::clone(&loader) as Arc<dyn veriframe_capabilities::CapabilityLoader>
    ));

    let config = ServiceConfig {
        upload_dir: upload_dir.path().to_path_buf(),
        worker_count: workers,
        ..ServiceConfig::default()
    };
    let service = AnalysisService::start(config, store.clone(), store, registry).unwrap();

    Harness {
        service,
        loader,
        upload_dir,
    }
}

fn video_bytes(frames: u32) -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("source.mp4");
    write_test_video(&path, frames, 64, 64).unwrap();
    std::fs::read(&path).unwrap()
}

async fn wait_terminal(service: &AnalysisService, job_id: Uuid, owner: Uuid) -> JobStatusView {
    tokio::time::timeout(Duration::from_secs(60), async {
        loop {
            let view = service.get_status(job_id, owner).await.unwrap();
            if view.status.is_terminal() {
                return view;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    })
    .await
    .expect("job did not reach a terminal state in time")
}

fn artifact_leftovers(dir: &std::path::Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.contains("_face_cropped") || name.contains("_aug"))
        .collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_video_job_completes_with_verdict_thumbnail_and_cleanup() {
    let harness = start(0.9, 2);
    let owner = Uuid::new_v4();

    let job_id = harness
        .service
        .submit(&video_bytes(60), "clip.mp4", MediaKind::Video, owner)
        .await
        .unwrap();

    let view = wait_terminal(&harness.service, job_id, owner).await;
    assert_eq!(view.status, JobStatus::Done);

    let result = harness
        .service
        .get_result(view.result_id.unwrap(), owner)
        .await
        .unwrap();
    assert_eq!(result.media_kind, MediaKind::Video);
    assert!(result.is_deepfake);
    assert_eq!(result.label, Label::AiGenerated);
    assert!((result.confidence - 0.9).abs() < 1e-6);
    assert_eq!(result.confidence_percent, 90.0);

    // Thumbnail was written from the original upload and survives
    let thumbnail_url = result.thumbnail_url.expect("video job carries a thumbnail");
    let thumbnail_name = thumbnail_url.rsplit('/').next().unwrap();
    assert!(harness.upload_dir.path().join(thumbnail_name).exists());

    // The upload itself survives; the two intermediates do not
    assert!(harness.upload_dir.path().join(&result.filename).exists());
    let leftovers = artifact_leftovers(harness.upload_dir.path());
    assert!(leftovers.is_empty(), "leftover artifacts: {leftovers:?}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_video_job_real_verdict() {
    let harness = start(0.2, 2);
    let owner = Uuid::new_v4();

    let job_id = harness
        .service
        .submit(&video_bytes(45), "clip.mp4", MediaKind::Video, owner)
        .await
        .unwrap();

    let view = wait_terminal(&harness.service, job_id, owner).await;
    let result = harness
        .service
        .get_result(view.result_id.unwrap(), owner)
        .await
        .unwrap();

    assert!(!result.is_deepfake);
    assert_eq!(result.label, Label::Real);
    assert!((result.confidence - 0.8).abs() < 1e-6);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_short_video_job_errors_and_cleans_up() {
    let harness = start(0.9, 2);
    let owner = Uuid::new_v4();

    // Ten frames never reach one sampling interval, so the job must
    // fail rather than produce a default verdict
    let job_id = harness
        .service
        .submit(&video_bytes(10), "short.mp4", MediaKind::Video, owner)
        .await
        .unwrap();

    let view = wait_terminal(&harness.service, job_id, owner).await;
    assert_eq!(view.status, JobStatus::Error);
    assert!(view.result_id.is_none());
    assert!(harness.service.list_history(owner).await.unwrap().is_empty());

    let leftovers = artifact_leftovers(harness.upload_dir.path());
    assert!(leftovers.is_empty(), "leftover artifacts: {leftovers:?}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_cold_submissions_construct_capabilities_once() {
    let harness = start(0.9, 2);
    let owner = Uuid::new_v4();

    let bytes = video_bytes(45);
    let first = harness
        .service
        .submit(&bytes, "one.mp4", MediaKind::Video, owner)
        .await
        .unwrap();
    let second = harness
        .service
        .submit(&bytes, "two.mp4", MediaKind::Video, owner)
        .await
        .unwrap();

    let first_view = wait_terminal(&harness.service, first, owner).await;
    let second_view = wait_terminal(&harness.service, second, owner).await;
    assert_eq!(first_view.status, JobStatus::Done);
    assert_eq!(second_view.status, JobStatus::Done);

    // Both jobs raced on a cold registry, but each capability was
    // constructed exactly once
    assert_eq!(harness.loader.video_loads.load(Ordering::SeqCst), 1);
    assert_eq!(harness.loader.localizer_loads.load(Ordering::SeqCst), 1);
}
