//! Analysis service
//!
//! The operation surface the HTTP layer drives: submission of media
//! bytes, job status reads, result retrieval, history and per-owner
//! statistics. A submission is validated synchronously, persisted as a
//! `queued` job and handed to a bounded worker pool; the caller gets the
//! job id immediately and observes progress only through job status.
//!
//! Backpressure is explicit: when the queue is at capacity, submission
//! fails with a queue-full error and no job record is created.

mod runner;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use veriframe_capabilities::CapabilityRegistry;
use veriframe_common::{JobStatus, MediaKind, ProcessingError, Result};
use veriframe_pipeline::AugmentConfig;
use veriframe_storage::{AnalysisResult, Job, JobStore, LabelCounts, ResultStore};

use runner::WorkerContext;

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Directory uploads (and thumbnails) are stored in
    pub upload_dir: PathBuf,
    /// Maximum accepted upload size in bytes
    pub max_upload_bytes: usize,
    /// Number of concurrent analysis workers
    pub worker_count: usize,
    /// Capacity of the submission queue; submissions beyond it are
    /// rejected
    pub queue_capacity: usize,
    /// Augmentation stage settings
    pub augment: AugmentConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            max_upload_bytes: 10 * 1024 * 1024,
            worker_count: 4,
            queue_capacity: 64,
            augment: AugmentConfig::default(),
        }
    }
}

/// One accepted submission travelling through the worker queue
#[derive(Debug, Clone)]
pub(crate) struct QueuedJob {
    pub job_id: Uuid,
    pub owner_id: Uuid,
    pub media_kind: MediaKind,
    pub upload_path: PathBuf,
}

/// Status view returned to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusView {
    pub status: JobStatus,
    pub result_id: Option<Uuid>,
}

/// Per-owner dashboard statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerStats {
    pub total_count: u64,
    pub ai_generated_count: u64,
    pub real_count: u64,
    /// The five most recent results
    pub recent: Vec<AnalysisResult>,
}

/// The analysis service
///
/// Owns the worker pool and the handles every job shares: the stores and
/// the capability registry.
pub struct AnalysisService {
    config: ServiceConfig,
    jobs: Arc<dyn JobStore>,
    results: Arc<dyn ResultStore>,
    queue: mpsc::Sender<QueuedJob>,
}

impl AnalysisService {
    /// Create the upload directory, spawn the worker pool and return the
    /// service handle
    ///
    /// Must be called from within a Tokio runtime; the workers are
    /// spawned onto it.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload directory cannot be created.
    pub fn start(
        config: ServiceConfig,
        jobs: Arc<dyn JobStore>,
        results: Arc<dyn ResultStore>,
        registry: Arc<CapabilityRegistry>,
    ) -> Result<Arc<Self>> {
        std::fs::create_dir_all(&config.upload_dir)?;

        let (queue, receiver) = mpsc::channel::<QueuedJob>(config.queue_capacity.max(1));
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));

        let context = WorkerContext {
            jobs: Arc::clone(&jobs),
            results: Arc::clone(&results),
            registry,
            augment: config.augment.clone(),
        };

        for worker in 0..config.worker_count {
            tokio::spawn(runner::worker_loop(
                worker,
                Arc::clone(&receiver),
                context.clone(),
            ));
        }

        info!(
            workers = config.worker_count,
            queue_capacity = config.queue_capacity,
            upload_dir = %config.upload_dir.display(),
            "analysis service started"
        );

        Ok(Arc::new(Self {
            config,
            jobs,
            results,
            queue,
        }))
    }

    /// Accept an upload, create a `queued` job and enqueue it
    ///
    /// Returns the job id immediately; the caller never blocks on
    /// analysis.
    ///
    /// # Errors
    ///
    /// Fails synchronously on validation problems or when the queue is
    /// full; no job record is created in either case.
    pub async fn submit(
        &self,
        media_bytes: &[u8],
        original_filename: &str,
        media_kind: MediaKind,
        owner_id: Uuid,
    ) -> Result<Uuid> {
        if media_bytes.is_empty() {
            return Err(ProcessingError::Validation("empty upload".to_string()));
        }
        if media_bytes.len() > self.config.max_upload_bytes {
            return Err(ProcessingError::Validation(format!(
                "upload of {} bytes exceeds the {} byte limit",
                media_bytes.len(),
                self.config.max_upload_bytes
            )));
        }
        let safe_name = Path::new(original_filename)
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ProcessingError::Validation("missing filename".to_string()))?;

        // Reserve a queue slot before creating any state so a full queue
        // rejects cleanly
        let permit = self.queue.try_reserve().map_err(|e| match e {
            mpsc::error::TrySendError::Full(()) => ProcessingError::QueueFull,
            mpsc::error::TrySendError::Closed(()) => {
                ProcessingError::Other("job queue closed".to_string())
            }
        })?;

        let stored_name = format!("{}_{safe_name}", Uuid::new_v4());
        let upload_path = self.config.upload_dir.join(&stored_name);
        tokio::fs::write(&upload_path, media_bytes).await?;

        let job = Job::new(owner_id);
        let job_id = job.id;
        self.jobs.insert_job(job).await?;

        permit.send(QueuedJob {
            job_id,
            owner_id,
            media_kind,
            upload_path,
        });

        info!(
            job_id = %job_id,
            kind = media_kind.as_str(),
            filename = %stored_name,
            "submission accepted"
        );
        Ok(job_id)
    }

    /// Read a job's status
    ///
    /// # Errors
    ///
    /// Not-found when the job does not exist or is not owned by
    /// `owner_id`.
    pub async fn get_status(&self, job_id: Uuid, owner_id: Uuid) -> Result<JobStatusView> {
        let job = self.jobs.get_job(job_id).await?;
        if job.owner_id != owner_id {
            return Err(ProcessingError::NotFound(job_id.to_string()));
        }
        Ok(JobStatusView {
            status: job.status,
            result_id: job.result_id,
        })
    }

    /// Fetch a result record
    ///
    /// # Errors
    ///
    /// Not-found when the result does not exist or is not owned by
    /// `owner_id`.
    pub async fn get_result(&self, result_id: Uuid, owner_id: Uuid) -> Result<AnalysisResult> {
        let result = self.results.get_result(result_id).await?;
        if result.owner_id != owner_id {
            return Err(ProcessingError::NotFound(result_id.to_string()));
        }
        Ok(result)
    }

    /// All of an owner's results, most recent first
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn list_history(&self, owner_id: Uuid) -> Result<Vec<AnalysisResult>> {
        Ok(self.results.list_for_owner(owner_id).await?)
    }

    /// Per-owner statistics with the five most recent results
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn get_stats(&self, owner_id: Uuid) -> Result<OwnerStats> {
        let LabelCounts {
            total,
            ai_generated,
            real,
        } = self.results.count_by_label(owner_id).await?;
        let recent = self.results.recent_for_owner(owner_id, 5).await?;

        Ok(OwnerStats {
            total_count: total,
            ai_generated_count: ai_generated,
            real_count: real,
            recent,
        })
    }
}
