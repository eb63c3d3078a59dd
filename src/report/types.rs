use crate::azure::types::{id_string, AttachmentReference, TestCaseResult};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Execution results of one configuration, as written by a test runner
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    #[serde(
        default,
        deserialize_with = "id_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub azure_configuration_id: Option<String>,
    #[serde(default)]
    pub test_results: Vec<TestCaseResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub screenshots: Vec<Screenshot>,
}

/// Screenshot of one step of one result iteration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Screenshot {
    #[serde(
        default,
        deserialize_with = "id_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub test_case_id: Option<String>,
    /// Set once the screenshot is bound to a result of the run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_case_result_id: Option<i64>,
    pub iteration_id: i32,
    pub action_path: String,
    #[serde(rename = "base64encodedContent")]
    pub base64_encoded_content: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidReport {
    #[error("missing azureConfigurationId")]
    MissingConfiguration,

    #[error("azureConfigurationId `{0}` is not a numeric id")]
    NonNumericConfiguration(String),

    #[error("test result #{0} has no testCase.id")]
    MissingTestCase(usize),
}

impl TestReport {
    /// Configuration id, if present and non-blank
    pub fn configuration_id(&self) -> Option<&str> {
        self.azure_configuration_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Reject reports that can never be matched against a run
    pub fn validate(&self) -> Result<(), InvalidReport> {
        let configuration_id = self
            .configuration_id()
            .ok_or(InvalidReport::MissingConfiguration)?;
        if configuration_id.parse::<u32>().is_err() {
            return Err(InvalidReport::NonNumericConfiguration(
                configuration_id.to_string(),
            ));
        }

        if let Some(index) = self
            .test_results
            .iter()
            .position(|result| result.test_case_id().is_none())
        {
            return Err(InvalidReport::MissingTestCase(index));
        }

        Ok(())
    }
}

/// What an import wrote to the run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<i64>,
    pub test_case_results: Vec<TestCaseResult>,
    pub attachments: Vec<AttachmentReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
}
