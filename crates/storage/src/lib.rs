//! Storage layer for the authenticity analysis system
//!
//! The job runner consumes persistence through the [`JobStore`] and
//! [`ResultStore`] traits; concrete backends (a hosted document store in
//! production) live behind them. [`MemoryStore`] is the in-process
//! reference implementation used by tests and local runs.
//!
//! The store is the single place that enforces the job lifecycle
//! invariant: status may only advance `queued -> processing -> {done |
//! error}`, `done` carries a result id and `error` carries a message.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use veriframe_common::{JobStatus, ProcessingError};

mod memory;
mod records;

pub use memory::MemoryStore;
pub use records::{AnalysisResult, Job, LabelCounts};

/// Storage layer errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(Uuid),

    #[error("Duplicate record id: {0}")]
    Duplicate(Uuid),

    #[error("Illegal job transition: {from:?} -> {to:?}")]
    IllegalTransition { from: JobStatus, to: JobStatus },

    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for ProcessingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ProcessingError::NotFound(id.to_string()),
            other => ProcessingError::StoreError(other.to_string()),
        }
    }
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence of job records
///
/// The `mark_*` operations are the only way a job changes state; each
/// performs an atomic read-validate-write of a single record and rejects
/// edges outside the lifecycle diagram.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a freshly created job (status `queued`)
    async fn insert_job(&self, job: Job) -> StoreResult<()>;

    /// Fetch a job by id
    async fn get_job(&self, id: Uuid) -> StoreResult<Job>;

    /// Transition `queued -> processing`
    async fn mark_processing(&self, id: Uuid) -> StoreResult<Job>;

    /// Transition `processing -> done`, recording the result id
    async fn mark_done(&self, id: Uuid, result_id: Uuid) -> StoreResult<Job>;

    /// Transition `processing -> error`, recording the failure message
    async fn mark_error(&self, id: Uuid, message: &str) -> StoreResult<Job>;
}

/// Persistence of analysis results
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Insert a result record; results are immutable once written
    async fn insert_result(&self, result: AnalysisResult) -> StoreResult<()>;

    /// Fetch a result by id
    async fn get_result(&self, id: Uuid) -> StoreResult<AnalysisResult>;

    /// All results for an owner, most recent first
    async fn list_for_owner(&self, owner_id: Uuid) -> StoreResult<Vec<AnalysisResult>>;

    /// The `limit` most recent results for an owner
    async fn recent_for_owner(
        &self,
        owner_id: Uuid,
        limit: usize,
    ) -> StoreResult<Vec<AnalysisResult>>;

    /// Per-label counts for an owner
    async fn count_by_label(&self, owner_id: Uuid) -> StoreResult<LabelCounts>;
}
