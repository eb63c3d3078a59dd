//! In-memory test management service used by unit tests

use super::api::{ApiError, TestManagementApi};
use super::types::*;
use async_trait::async_trait;
use std::sync::Mutex;

/// Everything the importer asked the service to do
#[derive(Debug, Default)]
pub struct Calls {
    pub created_runs: Vec<RunCreateModel>,
    pub statuses: Vec<RunStatus>,
    pub work_item_batches: Vec<Vec<u32>>,
    pub updated_results: Vec<TestCaseResult>,
    pub uploads: Vec<(AttachmentTarget, AttachmentRequest)>,
    pub fetched_points: usize,
}

#[derive(Default)]
pub struct FakeApi {
    pub test_cases: Vec<SuiteTestCase>,
    pub test_points: Vec<TestPoint>,
    pub created_results: Vec<TestCaseResult>,
    pub work_items: Vec<WorkItem>,
    /// `None` makes create-run answer without an id
    pub run_id: Option<i64>,
    pub fail_update: bool,
    pub fail_upload: bool,
    /// Status write that answers with an error
    pub fail_status: Option<RunStatus>,
    pub calls: Mutex<Calls>,
}

impl FakeApi {
    pub fn new(run_id: i64) -> Self {
        Self {
            run_id: Some(run_id),
            ..Default::default()
        }
    }

    pub fn statuses(&self) -> Vec<RunStatus> {
        self.calls.lock().unwrap().statuses.clone()
    }

    fn rejected(what: &str) -> ApiError {
        ApiError::Status {
            status: 500,
            url: format!("fake://{}", what),
            body: "Internal Server Error".to_string(),
        }
    }
}

#[async_trait]
impl TestManagementApi for FakeApi {
    async fn fetch_test_points(
        &self,
        _project: &str,
        _plan_id: u32,
        _suite_ids: &[u32],
    ) -> Result<Vec<TestPoint>, ApiError> {
        self.calls.lock().unwrap().fetched_points += 1;
        Ok(self.test_points.clone())
    }

    async fn fetch_test_cases(
        &self,
        _project: &str,
        _plan_id: u32,
        _suite_ids: &[u32],
    ) -> Result<Vec<SuiteTestCase>, ApiError> {
        Ok(self.test_cases.clone())
    }

    async fn create_run(&self, _project: &str, run: &RunCreateModel) -> Result<TestRun, ApiError> {
        self.calls.lock().unwrap().created_runs.push(run.clone());
        Ok(TestRun {
            id: self.run_id,
            name: Some(run.name.clone()),
            ..Default::default()
        })
    }

    async fn set_run_status(
        &self,
        _project: &str,
        run_id: i64,
        status: RunStatus,
    ) -> Result<TestRun, ApiError> {
        if self.fail_status == Some(status) {
            return Err(Self::rejected("status"));
        }
        self.calls.lock().unwrap().statuses.push(status);
        Ok(TestRun {
            id: Some(run_id),
            state: Some(status.as_str().to_string()),
            ..Default::default()
        })
    }

    async fn fetch_results(
        &self,
        _project: &str,
        _run_id: i64,
    ) -> Result<Vec<TestCaseResult>, ApiError> {
        Ok(self.created_results.clone())
    }

    async fn update_results(
        &self,
        _project: &str,
        _run_id: i64,
        results: &[TestCaseResult],
    ) -> Result<Vec<TestCaseResult>, ApiError> {
        if self.fail_update {
            return Err(Self::rejected("results"));
        }
        self.calls
            .lock()
            .unwrap()
            .updated_results
            .extend(results.iter().cloned());
        Ok(results.to_vec())
    }

    async fn upload_attachment(
        &self,
        _project: &str,
        _run_id: i64,
        target: &AttachmentTarget,
        attachment: &AttachmentRequest,
    ) -> Result<AttachmentReference, ApiError> {
        if self.fail_upload {
            return Err(Self::rejected("attachments"));
        }
        let mut calls = self.calls.lock().unwrap();
        calls.uploads.push((target.clone(), attachment.clone()));
        Ok(AttachmentReference {
            id: calls.uploads.len() as i64,
            url: None,
        })
    }

    async fn fetch_work_items_batch(
        &self,
        _project: &str,
        ids: &[u32],
    ) -> Result<Vec<WorkItem>, ApiError> {
        self.calls
            .lock()
            .unwrap()
            .work_item_batches
            .push(ids.to_vec());
        Ok(self
            .work_items
            .iter()
            .filter(|item| ids.contains(&item.id))
            .cloned()
            .collect())
    }
}
