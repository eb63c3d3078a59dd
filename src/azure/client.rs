//! Azure DevOps REST client
//!
//! Talks to the `test`, `testplan` and `wit` areas of the REST API using a
//! personal access token. One client is built per import and handed to the
//! pipeline by reference.

use super::api::{ApiError, TestManagementApi};
use super::types::{
    AttachmentReference, AttachmentRequest, AttachmentTarget, RunCreateModel, RunStatus,
    SuiteTestCase, TestCaseResult, TestPoint, TestRun, WorkItem,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::header::{HeaderMap, AUTHORIZATION};
use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

const API_VERSION: &str = "7.0";
const ATTACHMENT_API_VERSION: &str = "7.0-preview.1";
const CONTINUATION_TOKEN_HEADER: &str = "x-ms-continuationtoken";
const PAGE_SIZE: usize = 1000;

/// Fields requested from the work item batch endpoint
const WORK_ITEM_FIELDS: [&str; 3] = ["System.Id", "System.Rev", "Microsoft.VSTS.TCM.Steps"];

/// `{ "count": n, "value": [...] }` envelope of list responses
#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    value: Vec<T>,
}

pub struct AzureDevOpsClient {
    /// Organization URL (e.g., "https://dev.azure.com/my-org")
    base_url: Url,
    /// HTTP client
    client: reqwest::Client,
    /// Pre-computed basic auth header
    authorization: String,
}

impl AzureDevOpsClient {
    pub fn new(organization_url: &str, pat: &str) -> Result<Self, ApiError> {
        let base_url = Url::parse(organization_url)
            .map_err(|_| ApiError::InvalidUrl(organization_url.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(organization_url.to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            base_url,
            client,
            authorization: format!("Basic {}", STANDARD.encode(format!(":{}", pat))),
        })
    }

    /// Build `<org>/<project>/_apis/<segments...>`
    fn endpoint(&self, project: &str, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?;
            path.pop_if_empty().push(project).push("_apis");
            path.extend(segments);
        }
        Ok(url)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(AUTHORIZATION, &self.authorization)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<(T, HeaderMap), ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let url = response.url().to_string();
        let headers = response.headers().clone();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                url,
                body,
            });
        }

        let value = serde_json::from_str(&body).map_err(|source| ApiError::Decode {
            url: url.clone(),
            source,
        })?;
        Ok((value, headers))
    }

    /// Follow `$top`/`$skip` paging until a short page comes back
    async fn fetch_paged<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>, ApiError> {
        let mut items = Vec::new();
        loop {
            let skip = items.len().to_string();
            let top = PAGE_SIZE.to_string();
            let request = self.request(reqwest::Method::GET, url.clone()).query(&[
                ("$skip", skip.as_str()),
                ("$top", top.as_str()),
                ("api-version", API_VERSION),
            ]);
            let (page, _): (ListResponse<T>, _) = self.send(request).await?;
            let page_len = page.value.len();
            items.extend(page.value);
            if page_len < PAGE_SIZE {
                return Ok(items);
            }
        }
    }
}

#[async_trait]
impl TestManagementApi for AzureDevOpsClient {
    async fn fetch_test_points(
        &self,
        project: &str,
        plan_id: u32,
        suite_ids: &[u32],
    ) -> Result<Vec<TestPoint>, ApiError> {
        let mut points = Vec::new();
        for suite_id in suite_ids {
            let url = self.endpoint(
                project,
                &[
                    "test",
                    "Plans",
                    &plan_id.to_string(),
                    "Suites",
                    &suite_id.to_string(),
                    "points",
                ],
            )?;
            points.extend(self.fetch_paged::<TestPoint>(url).await?);
        }
        Ok(points)
    }

    async fn fetch_test_cases(
        &self,
        project: &str,
        plan_id: u32,
        suite_ids: &[u32],
    ) -> Result<Vec<SuiteTestCase>, ApiError> {
        let mut test_cases = Vec::new();
        for suite_id in suite_ids {
            let url = self.endpoint(
                project,
                &[
                    "testplan",
                    "Plans",
                    &plan_id.to_string(),
                    "Suites",
                    &suite_id.to_string(),
                    "TestCase",
                ],
            )?;

            let mut continuation_token = String::new();
            loop {
                let request = self.request(reqwest::Method::GET, url.clone()).query(&[
                    ("isRecursive", "true"),
                    ("continuationToken", continuation_token.as_str()),
                    ("api-version", API_VERSION),
                ]);
                let (page, headers): (ListResponse<SuiteTestCase>, _) =
                    self.send(request).await?;
                test_cases.extend(page.value);

                match headers
                    .get(CONTINUATION_TOKEN_HEADER)
                    .and_then(|token| token.to_str().ok())
                {
                    Some(token) if !token.is_empty() => continuation_token = token.to_string(),
                    _ => break,
                }
            }
        }
        Ok(test_cases)
    }

    async fn create_run(&self, project: &str, run: &RunCreateModel) -> Result<TestRun, ApiError> {
        let url = self.endpoint(project, &["test", "runs"])?;
        let request = self
            .request(reqwest::Method::POST, url)
            .query(&[("api-version", API_VERSION)])
            .json(run);
        Ok(self.send(request).await?.0)
    }

    async fn set_run_status(
        &self,
        project: &str,
        run_id: i64,
        status: RunStatus,
    ) -> Result<TestRun, ApiError> {
        let url = self.endpoint(project, &["test", "runs", &run_id.to_string()])?;
        let request = self
            .request(reqwest::Method::PATCH, url)
            .query(&[("api-version", API_VERSION)])
            .json(&serde_json::json!({ "state": status.as_str() }));
        Ok(self.send(request).await?.0)
    }

    async fn fetch_results(
        &self,
        project: &str,
        run_id: i64,
    ) -> Result<Vec<TestCaseResult>, ApiError> {
        let url = self.endpoint(project, &["test", "Runs", &run_id.to_string(), "results"])?;
        self.fetch_paged(url).await
    }

    async fn update_results(
        &self,
        project: &str,
        run_id: i64,
        results: &[TestCaseResult],
    ) -> Result<Vec<TestCaseResult>, ApiError> {
        let url = self.endpoint(project, &["test", "Runs", &run_id.to_string(), "results"])?;
        let request = self
            .request(reqwest::Method::PATCH, url)
            .query(&[("api-version", API_VERSION)])
            .json(results);
        let (updated, _): (ListResponse<TestCaseResult>, _) = self.send(request).await?;
        Ok(updated.value)
    }

    async fn upload_attachment(
        &self,
        project: &str,
        run_id: i64,
        target: &AttachmentTarget,
        attachment: &AttachmentRequest,
    ) -> Result<AttachmentReference, ApiError> {
        let url = self.endpoint(
            project,
            &[
                "test",
                "Runs",
                &run_id.to_string(),
                "Results",
                &target.result_id.to_string(),
                "attachments",
            ],
        )?;

        let iteration_id = target.iteration_id.to_string();
        let mut query = vec![
            ("iterationId", iteration_id.as_str()),
            ("api-version", ATTACHMENT_API_VERSION),
        ];
        if !target.action_path.is_empty() {
            query.push(("actionPath", target.action_path.as_str()));
        }

        let request = self
            .request(reqwest::Method::POST, url)
            .query(&query)
            .json(attachment);
        Ok(self.send(request).await?.0)
    }

    async fn fetch_work_items_batch(
        &self,
        project: &str,
        ids: &[u32],
    ) -> Result<Vec<WorkItem>, ApiError> {
        let url = self.endpoint(project, &["wit", "workitemsbatch"])?;
        let request = self
            .request(reqwest::Method::POST, url)
            .query(&[("api-version", API_VERSION)])
            .json(&serde_json::json!({ "ids": ids, "fields": WORK_ITEM_FIELDS }));
        let (batch, _): (ListResponse<WorkItem>, _) = self.send(request).await?;
        Ok(batch.value)
    }
}
