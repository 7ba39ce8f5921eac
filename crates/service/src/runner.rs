//! Job runner
//!
//! Workers drain the submission queue and run one job end-to-end:
//! transition to `processing`, dispatch to the image or video path,
//! persist the result, transition to `done` or `error`. Every failure —
//! including a panicking analysis task — is caught here and converted
//! into the single `processing -> error` transition; the process never
//! terminates because of a job. Temporary artifacts are cleaned up on
//! every exit path.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use veriframe_capabilities::CapabilityRegistry;
use veriframe_common::{MediaKind, ProcessingError, Result};
use veriframe_media_io::write_video_thumbnail;
use veriframe_pipeline::{
    analyze_image, augment_stage, crop_stage, sample_stage, thumbnail_path_for, AugmentConfig,
    VideoArtifacts,
};
use veriframe_storage::{AnalysisResult, JobStore, ResultStore};

use crate::QueuedJob;

/// Shared handles a worker needs to process jobs
pub(crate) struct WorkerContext {
    pub jobs: Arc<dyn JobStore>,
    pub results: Arc<dyn ResultStore>,
    pub registry: Arc<CapabilityRegistry>,
    pub augment: AugmentConfig,
}

impl Clone for WorkerContext {
    fn clone(&self) -> Self {
        Self {
            jobs: Arc::clone(&self.jobs),
            results: Arc::clone(&self.results),
            registry: Arc::clone(&self.registry),
            augment: self.augment.clone(),
        }
    }
}

/// Drain the queue until it closes
pub(crate) async fn worker_loop(
    worker: usize,
    queue: Arc<Mutex<mpsc::Receiver<QueuedJob>>>,
    context: WorkerContext,
) {
    loop {
        let next = { queue.lock().await.recv().await };
        let Some(queued) = next else {
            debug!(worker, "queue closed, worker exiting");
            break;
        };
        process_submission(&context, queued).await;
    }
}

/// Run one job to a terminal state
async fn process_submission(context: &WorkerContext, queued: QueuedJob) {
    info!(
        job_id = %queued.job_id,
        kind = queued.media_kind.as_str(),
        "starting analysis"
    );

    if let Err(e) = context.jobs.mark_processing(queued.job_id).await {
        error!(job_id = %queued.job_id, "could not mark job processing: {e}");
        return;
    }

    let artifacts = matches!(queued.media_kind, MediaKind::Video)
        .then(|| VideoArtifacts::for_upload(&queued.upload_path));

    let outcome = run_analysis(context, &queued).await;

    // Cleanup is attempted on every exit path, success or failure
    if let Some(artifacts) = &artifacts {
        artifacts.cleanup();
    }

    match outcome {
        Ok(result) => {
            let result_id = result.id;
            match context.results.insert_result(result).await {
                Ok(()) => match context.jobs.mark_done(queued.job_id, result_id).await {
                    Ok(_) => {
                        info!(job_id = %queued.job_id, result_id = %result_id, "job completed");
                    }
                    Err(e) => error!(job_id = %queued.job_id, "could not mark job done: {e}"),
                },
                Err(e) => {
                    let message = format!("could not persist result: {e}");
                    error!(job_id = %queued.job_id, "{message}");
                    mark_error(context, queued.job_id, &message).await;
                }
            }
        }
        Err(e) => {
            let message = e.to_string();
            warn!(job_id = %queued.job_id, "job failed: {message}");
            mark_error(context, queued.job_id, &message).await;
        }
    }
}

async fn mark_error(context: &WorkerContext, job_id: Uuid, message: &str) {
    if let Err(e) = context.jobs.mark_error(job_id, message).await {
        error!(job_id = %job_id, "could not mark job error: {e}");
    }
}

/// Dispatch to the blocking analysis path; a panic in the task surfaces
/// as an error outcome, not a crash
async fn run_analysis(context: &WorkerContext, queued: &QueuedJob) -> Result<AnalysisResult> {
    let registry = Arc::clone(&context.registry);
    let augment = context.augment.clone();
    let queued = queued.clone();

    tokio::task::spawn_blocking(move || match queued.media_kind {
        MediaKind::Image => analyze_image_submission(&registry, &queued),
        MediaKind::Video => analyze_video_submission(&registry, &queued, &augment),
    })
    .await
    .map_err(|e| ProcessingError::Pipeline(format!("analysis task aborted: {e}")))?
}

fn analyze_image_submission(
    registry: &CapabilityRegistry,
    queued: &QueuedJob,
) -> Result<AnalysisResult> {
    let classifier = registry.image_classifier().map_err(|e| {
        ProcessingError::CapabilityLoad(format!("image classifier unavailable: {e}"))
    })?;

    let verdict = analyze_image(&queued.upload_path, classifier.as_ref())?;

    let filename = stored_filename(&queued.upload_path);
    let media_url = format!("/uploads/{filename}");
    // An image is its own thumbnail
    let thumbnail_url = Some(media_url.clone());

    Ok(AnalysisResult::new(
        queued.job_id,
        queued.owner_id,
        MediaKind::Image,
        filename,
        media_url,
        thumbnail_url,
        verdict,
    ))
}

fn analyze_video_submission(
    registry: &CapabilityRegistry,
    queued: &QueuedJob,
    augment: &AugmentConfig,
) -> Result<AnalysisResult> {
    // Thumbnail comes from the original upload, before any transform
    // stage, and is best-effort
    let thumbnail_path = thumbnail_path_for(&queued.upload_path);
    let thumbnail_url = match write_video_thumbnail(&queued.upload_path, &thumbnail_path) {
        Ok(()) => Some(format!("/uploads/{}", stored_filename(&thumbnail_path))),
        Err(e) => {
            warn!(job_id = %queued.job_id, "could not create thumbnail: {e}");
            None
        }
    };

    let (classifier, localizer) = registry.video_capabilities().map_err(|e| {
        ProcessingError::CapabilityLoad(format!("video capabilities unavailable: {e}"))
    })?;

    let artifacts = VideoArtifacts::for_upload(&queued.upload_path);

    // Stage failures are logged, not fatal here: a missing intermediate
    // surfaces in stage 3 as zero sampleable frames
    info!(job_id = %queued.job_id, "[1/3] cropping faces from video");
    if let Err(e) = crop_stage(&queued.upload_path, &artifacts.cropped, localizer.as_ref()) {
        error!(job_id = %queued.job_id, "face crop stage failed: {e}");
    }

    info!(job_id = %queued.job_id, "[2/3] augmenting face-cropped video");
    if let Err(e) = augment_stage(
        &artifacts.cropped,
        &artifacts.augmented,
        job_seed(queued.job_id),
        augment,
    ) {
        error!(job_id = %queued.job_id, "augmentation stage failed: {e}");
    }

    info!(job_id = %queued.job_id, "[3/3] analyzing augmented video");
    let (verdict, sampled) = sample_stage(&artifacts.augmented, classifier.as_ref())?;
    debug!(job_id = %queued.job_id, sampled, "video analysis complete");

    let filename = stored_filename(&queued.upload_path);
    let media_url = format!("/uploads/{filename}");

    Ok(AnalysisResult::new(
        queued.job_id,
        queued.owner_id,
        MediaKind::Video,
        filename,
        media_url,
        thumbnail_url,
        verdict,
    ))
}

/// Augmentation seed derived from the job id, so a job's stage 2 draws
/// are reproducible
fn job_seed(job_id: Uuid) -> u64 {
    let bits = job_id.as_u128();
    (bits as u64) ^ ((bits >> 64) as u64)
}

fn stored_filename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
