//! Persisted record types for jobs and analysis results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use veriframe_common::{JobStatus, Label, MediaKind, Verdict};

/// One tracked submission-to-verdict unit of work
///
/// Owned exclusively by the worker processing it while active; read-only
/// to everyone else. Never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub result_id: Option<Uuid>,
    pub error_message: Option<String>,
}

impl Job {
    /// Create a new job in the `queued` state
    #[must_use]
    pub fn new(owner_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            status: JobStatus::Queued,
            created_at: now,
            updated_at: now,
            result_id: None,
            error_message: None,
        }
    }
}

/// Persisted verdict and metadata for a completed job
///
/// Written exactly once; immutable thereafter. `is_deepfake`, `label`,
/// `confidence` and `confidence_percent` always agree because they are
/// copied from one [`Verdict`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub id: Uuid,
    pub job_id: Uuid,
    pub owner_id: Uuid,
    pub media_kind: MediaKind,
    pub filename: String,
    pub media_url: String,
    pub thumbnail_url: Option<String>,
    pub is_deepfake: bool,
    pub confidence: f64,
    pub label: Label,
    pub confidence_percent: f64,
    pub created_at: DateTime<Utc>,
}

impl AnalysisResult {
    /// Build the result record for a completed job
    #[must_use]
    pub fn new(
        job_id: Uuid,
        owner_id: Uuid,
        media_kind: MediaKind,
        filename: String,
        media_url: String,
        thumbnail_url: Option<String>,
        verdict: Verdict,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            owner_id,
            media_kind,
            filename,
            media_url,
            thumbnail_url,
            is_deepfake: verdict.is_deepfake,
            confidence: verdict.confidence,
            label: verdict.label,
            confidence_percent: verdict.confidence_percent,
            created_at: Utc::now(),
        }
    }
}

/// Per-label result counts for one owner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCounts {
    pub total: u64,
    pub ai_generated: u64,
    pub real: u64,
}
