//! In-memory document store
//!
//! Reference implementation of [`JobStore`] and [`ResultStore`] backed by
//! maps behind an async `RwLock`. Single-record updates are atomic by
//! construction: each mutation holds the write lock for the whole
//! read-validate-write.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use veriframe_common::{JobStatus, Label};

use crate::records::{AnalysisResult, Job, LabelCounts};
use crate::{JobStore, ResultStore, StoreError, StoreResult};

/// In-process store for jobs and results
#[derive(Default)]
pub struct MemoryStore {
    jobs: RwLock<HashMap<Uuid, Job>>,
    results: RwLock<HashMap<Uuid, AnalysisResult>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a validated status transition under the write lock
    async fn transition(
        &self,
        id: Uuid,
        next: JobStatus,
        apply: impl FnOnce(&mut Job),
    ) -> StoreResult<Job> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        if !job.status.can_transition_to(next) {
            return Err(StoreError::IllegalTransition {
                from: job.status,
                to: next,
            });
        }

        job.status = next;
        job.updated_at = Utc::now();
        apply(job);

        debug!(job_id = %id, status = next.as_str(), "job transitioned");
        Ok(job.clone())
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn insert_job(&self, job: Job) -> StoreResult<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(StoreError::Duplicate(job.id));
        }
        jobs.insert(job.id, job);
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> StoreResult<Job> {
        self.jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn mark_processing(&self, id: Uuid) -> StoreResult<Job> {
        self.transition(id, JobStatus::Processing, |_| {}).await
    }

    async fn mark_done(&self, id: Uuid, result_id: Uuid) -> StoreResult<Job> {
        self.transition(id, JobStatus::Done, |job| {
            job.result_id = Some(result_id);
        })
        .await
    }

    async fn mark_error(&self, id: Uuid, message: &str) -> StoreResult<Job> {
        debug_assert!(!message.is_empty(), "error transition requires a message");
        self.transition(id, JobStatus::Error, |job| {
            job.error_message = Some(message.to_string());
        })
        .await
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn insert_result(&self, result: AnalysisResult) -> StoreResult<()> {
        let mut results = self.results.write().await;
        if results.contains_key(&result.id) {
            return Err(StoreError::Duplicate(result.id));
        }
        results.insert(result.id, result);
        Ok(())
    }

    async fn get_result(&self, id: Uuid) -> StoreResult<AnalysisResult> {
        self.results
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn list_for_owner(&self, owner_id: Uuid) -> StoreResult<Vec<AnalysisResult>> {
        let results = self.results.read().await;
        let mut owned: Vec<AnalysisResult> = results
            .values()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn recent_for_owner(
        &self,
        owner_id: Uuid,
        limit: usize,
    ) -> StoreResult<Vec<AnalysisResult>> {
        let mut owned = self.list_for_owner(owner_id).await?;
        owned.truncate(limit);
        Ok(owned)
    }

    async fn count_by_label(&self, owner_id: Uuid) -> StoreResult<LabelCounts> {
        let results = self.results.read().await;
        let mut counts = LabelCounts::default();
        for result in results.values().filter(|r| r.owner_id == owner_id) {
            counts.total += 1;
            match result.label {
                Label::AiGenerated => counts.ai_generated += 1,
                Label::Real => counts.real += 1,
            }
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use veriframe_common::{MediaKind, Verdict};

    fn result_for(owner: Uuid, probability: f64) -> AnalysisResult {
        AnalysisResult::new(
            Uuid::new_v4(),
            owner,
            MediaKind::Image,
            "a.png".to_string(),
            "/uploads/a.png".to_string(),
            None,
            Verdict::from_probability(probability),
        )
    }

    #[tokio::test]
    async fn test_job_lifecycle_success_path() {
        let store = MemoryStore::new();
        let job = Job::new(Uuid::new_v4());
        let id = job.id;
        store.insert_job(job).await.unwrap();

        let job = store.mark_processing(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Processing);

        let result_id = Uuid::new_v4();
        let job = store.mark_done(id, result_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Done);
        assert_eq!(job.result_id, Some(result_id));
    }

    #[tokio::test]
    async fn test_job_lifecycle_error_path() {
        let store = MemoryStore::new();
        let job = Job::new(Uuid::new_v4());
        let id = job.id;
        store.insert_job(job).await.unwrap();

        store.mark_processing(id).await.unwrap();
        let job = store.mark_error(id, "no frames sampled").await.unwrap();
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.error_message.as_deref(), Some("no frames sampled"));
    }

    #[tokio::test]
    async fn test_illegal_transitions_rejected() {
        let store = MemoryStore::new();
        let job = Job::new(Uuid::new_v4());
        let id = job.id;
        store.insert_job(job).await.unwrap();

        // queued -> done is not an edge
        assert!(matches!(
            store.mark_done(id, Uuid::new_v4()).await,
            Err(StoreError::IllegalTransition { .. })
        ));

        store.mark_processing(id).await.unwrap();
        store.mark_done(id, Uuid::new_v4()).await.unwrap();

        // done is absorbing
        assert!(matches!(
            store.mark_error(id, "late failure").await,
            Err(StoreError::IllegalTransition { .. })
        ));
        assert!(matches!(
            store.mark_processing(id).await,
            Err(StoreError::IllegalTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_job_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.get_job(Uuid::new_v4()).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.mark_processing(Uuid::new_v4()).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_history_is_most_recent_first() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();

        let mut first = result_for(owner, 0.9);
        let mut second = result_for(owner, 0.1);
        let mut third = result_for(owner, 0.7);
        first.created_at = Utc::now() - Duration::seconds(20);
        second.created_at = Utc::now() - Duration::seconds(10);
        third.created_at = Utc::now();

        store.insert_result(first.clone()).await.unwrap();
        store.insert_result(second.clone()).await.unwrap();
        store.insert_result(third.clone()).await.unwrap();
        // A different owner's result must not leak into the listing
        store
            .insert_result(result_for(Uuid::new_v4(), 0.5))
            .await
            .unwrap();

        let history = store.list_for_owner(owner).await.unwrap();
        let ids: Vec<Uuid> = history.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);

        let recent = store.recent_for_owner(owner, 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, third.id);
    }

    #[tokio::test]
    async fn test_count_by_label() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();

        store.insert_result(result_for(owner, 0.9)).await.unwrap();
        store.insert_result(result_for(owner, 0.8)).await.unwrap();
        store.insert_result(result_for(owner, 0.2)).await.unwrap();

        let counts = store.count_by_label(owner).await.unwrap();
        assert_eq!(counts.total, 3);
        assert_eq!(counts.ai_generated, 2);
        assert_eq!(counts.real, 1);

        let empty = store.count_by_label(Uuid::new_v4()).await.unwrap();
        assert_eq!(empty, LabelCounts::default());
    }
}
