//! `SceneRepository`: per-scene documents nested under a job
//! (`owners/{owner_id}/jobs/{job_id}/scenes/{index}`), filled in
//! progressively by the scene-video stage.

use advgen_models::{JobId, Scene};

use crate::client::FirestoreClient;
use crate::convert::{from_document, to_fields};
use crate::error::FirestoreResult;

fn scenes_collection(owner_id: &str, job_id: &JobId) -> String {
    format!("owners/{}/jobs/{}/scenes", owner_id, job_id.as_str())
}

#[derive(Clone)]
pub struct SceneRepository {
    client: FirestoreClient,
}

impl SceneRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    /// Create every scene for a freshly-scripted job in one pass. Not an
    /// atomic batch: an orchestrator crash mid-way is recoverable by
    /// re-running the script stage, which regenerates `scenes` deterministically
    /// from the same script draft.
    pub async fn create_all(&self, owner_id: &str, job_id: &JobId, scenes: &[Scene]) -> FirestoreResult<()> {
        for scene in scenes {
            let fields = to_fields(scene)?;
            self.client
                .create_document(&scenes_collection(owner_id, job_id), &scene.index.to_string(), fields)
                .await?;
        }
        Ok(())
    }

    pub async fn get(&self, owner_id: &str, job_id: &JobId, index: u32) -> FirestoreResult<Option<Scene>> {
        let doc = self
            .client
            .get_document(&scenes_collection(owner_id, job_id), &index.to_string())
            .await?;
        doc.map(|d| from_document(&d)).transpose()
    }

    pub async fn list(&self, owner_id: &str, job_id: &JobId) -> FirestoreResult<Vec<Scene>> {
        let response = self
            .client
            .list_documents(&scenes_collection(owner_id, job_id), None, None, Some("index"))
            .await?;

        response
            .documents
            .unwrap_or_default()
            .iter()
            .map(from_document::<Scene>)
            .collect()
    }

    pub async fn update(&self, owner_id: &str, job_id: &JobId, scene: &Scene) -> FirestoreResult<Scene> {
        let fields = to_fields(scene)?;
        let doc = self
            .client
            .update_document(
                &scenes_collection(owner_id, job_id),
                &scene.index.to_string(),
                fields,
                None,
            )
            .await?;
        from_document(&doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenes_collection_path_is_job_scoped() {
        let job_id = JobId::from_string("job-1");
        assert_eq!(
            scenes_collection("owner-1", &job_id),
            "owners/owner-1/jobs/job-1/scenes"
        );
    }
}
