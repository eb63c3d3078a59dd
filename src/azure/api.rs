use super::types::{
    AttachmentReference, AttachmentRequest, AttachmentTarget, RunCreateModel, RunStatus,
    SuiteTestCase, TestCaseResult, TestPoint, TestRun, WorkItem,
};
use async_trait::async_trait;
use thiserror::Error;

/// Largest number of ids the work item batch endpoint accepts per request
pub const WORK_ITEM_BATCH_LIMIT: usize = 199;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid organization url: {0}")]
    InvalidUrl(String),
}

/// Remote operations the importer needs from the test management service
#[async_trait]
pub trait TestManagementApi: Send + Sync {
    async fn fetch_test_points(
        &self,
        project: &str,
        plan_id: u32,
        suite_ids: &[u32],
    ) -> Result<Vec<TestPoint>, ApiError>;

    async fn fetch_test_cases(
        &self,
        project: &str,
        plan_id: u32,
        suite_ids: &[u32],
    ) -> Result<Vec<SuiteTestCase>, ApiError>;

    async fn create_run(&self, project: &str, run: &RunCreateModel) -> Result<TestRun, ApiError>;

    async fn set_run_status(
        &self,
        project: &str,
        run_id: i64,
        status: RunStatus,
    ) -> Result<TestRun, ApiError>;

    async fn fetch_results(&self, project: &str, run_id: i64)
        -> Result<Vec<TestCaseResult>, ApiError>;

    async fn update_results(
        &self,
        project: &str,
        run_id: i64,
        results: &[TestCaseResult],
    ) -> Result<Vec<TestCaseResult>, ApiError>;

    async fn upload_attachment(
        &self,
        project: &str,
        run_id: i64,
        target: &AttachmentTarget,
        attachment: &AttachmentRequest,
    ) -> Result<AttachmentReference, ApiError>;

    /// Fetch up to [`WORK_ITEM_BATCH_LIMIT`] work items in one request
    async fn fetch_work_items_batch(
        &self,
        project: &str,
        ids: &[u32],
    ) -> Result<Vec<WorkItem>, ApiError>;
}

/// Fetch any number of work items, one batch request per
/// [`WORK_ITEM_BATCH_LIMIT`] ids.
pub async fn fetch_work_items(
    api: &dyn TestManagementApi,
    project: &str,
    ids: &[u32],
) -> Result<Vec<WorkItem>, ApiError> {
    let mut work_items = Vec::with_capacity(ids.len());
    for batch in ids.chunks(WORK_ITEM_BATCH_LIMIT) {
        log::debug!("Fetching {} work items", batch.len());
        work_items.extend(api.fetch_work_items_batch(project, batch).await?);
    }
    Ok(work_items)
}
