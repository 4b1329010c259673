//! `JobRepository`: the durable store for [`Job`] records, over the generic
//! Firestore REST transport in [`crate::client`].
//!
//! Jobs live in a per-owner subcollection, `owners/{owner_id}/jobs/{job_id}`,
//! so an owner's jobs list is a plain collection list rather than a
//! structured query.

use advgen_models::{Job, JobId, JobState};

use crate::client::FirestoreClient;
use crate::convert::{from_document, to_fields};
use crate::error::FirestoreResult;

const COLLECTION: &str = "jobs";

fn jobs_collection(owner_id: &str) -> String {
    format!("owners/{}/{}", owner_id, COLLECTION)
}

/// A page of an owner's jobs, newest first.
pub struct JobPage {
    pub jobs: Vec<Job>,
    pub next_page_token: Option<String>,
}

/// Optional filter/pagination parameters for [`JobRepository::query_by_owner`].
#[derive(Debug, Clone, Default)]
pub struct JobQuery {
    pub status: Option<JobState>,
    pub page_size: Option<u32>,
    pub page_token: Option<String>,
}

#[derive(Clone)]
pub struct JobRepository {
    client: FirestoreClient,
}

impl JobRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    /// Create a new job record. Fails with `AlreadyExists` if `job.id` is
    /// already taken (idempotency dedup is the caller's responsibility via
    /// `Job::idempotency_key`, looked up separately).
    pub async fn create(&self, job: &Job) -> FirestoreResult<Job> {
        let fields = to_fields(job)?;
        let doc = self
            .client
            .create_document(&jobs_collection(&job.owner_id), job.id.as_str(), fields)
            .await?;
        from_document(&doc)
    }

    pub async fn get(&self, owner_id: &str, job_id: &JobId) -> FirestoreResult<Option<Job>> {
        let doc = self
            .client
            .get_document(&jobs_collection(owner_id), job_id.as_str())
            .await?;
        doc.map(|d| from_document(&d)).transpose()
    }

    /// Update a job, rejecting the write with `PreconditionFailed` if the
    /// stored `updated_at` no longer matches `expected_updated_at` — guards
    /// against lost updates from a concurrent writer.
    pub async fn update(
        &self,
        job: &Job,
        expected_update_time: Option<&str>,
    ) -> FirestoreResult<Job> {
        let fields = to_fields(job)?;
        let doc = self
            .client
            .update_document_with_precondition(
                &jobs_collection(&job.owner_id),
                job.id.as_str(),
                fields,
                None,
                expected_update_time,
            )
            .await?;
        from_document(&doc)
    }

    pub async fn delete(&self, owner_id: &str, job_id: &JobId) -> FirestoreResult<()> {
        self.client
            .delete_document(&jobs_collection(owner_id), job_id.as_str())
            .await
    }

    /// List an owner's jobs, newest first, optionally filtered by state.
    ///
    /// Firestore's `listDocuments` only orders/paginates; the status filter
    /// is applied in memory after the page is decoded, which is fine for the
    /// bounded per-owner job counts this store expects.
    pub async fn query_by_owner(&self, owner_id: &str, query: JobQuery) -> FirestoreResult<JobPage> {
        let response = self
            .client
            .list_documents(
                &jobs_collection(owner_id),
                query.page_size,
                query.page_token.as_deref(),
                Some("created_at desc"),
            )
            .await?;

        let mut jobs = response
            .documents
            .unwrap_or_default()
            .iter()
            .map(from_document::<Job>)
            .collect::<FirestoreResult<Vec<_>>>()?;

        if let Some(status) = query.status {
            jobs.retain(|j| j.state == status);
        }

        Ok(JobPage {
            jobs,
            next_page_token: response.next_page_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jobs_collection_path_is_owner_scoped() {
        assert_eq!(jobs_collection("owner-1"), "owners/owner-1/jobs");
    }
}
