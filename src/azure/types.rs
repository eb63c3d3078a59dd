//! Typed records exchanged with the Azure DevOps test management REST API.
//!
//! Only the fields the importer reads or writes are named. Result records keep
//! every other field in `extra` so a fetched result can be written back
//! without losing data the service expects to see again.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Work item field holding a test case's step markup
pub const STEPS_FIELD: &str = "Microsoft.VSTS.TCM.Steps";

/// Work item field holding a test case's automation status
pub const AUTOMATION_STATUS_FIELD: &str = "AutomationStatus";

/// `state` value of a finished test result
pub const RESULT_STATE_COMPLETED: &str = "Completed";

/// Test run status as understood by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    InProgress,
    Completed,
    Aborted,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::InProgress => "InProgress",
            RunStatus::Completed => "Completed",
            RunStatus::Aborted => "Aborted",
        }
    }
}

/// Test result / action outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Unspecified,
    None,
    Passed,
    Failed,
    Inconclusive,
    Timeout,
    Aborted,
    Blocked,
    NotExecuted,
    Warning,
    Error,
    NotApplicable,
    Paused,
    InProgress,
    NotImpacted,
}

/// Accepts ids sent either as JSON strings or numbers.
pub(crate) fn id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(Option::<RawId>::deserialize(deserializer)?.map(|raw| match raw {
        RawId::Text(text) => text,
        RawId::Number(number) => number.to_string(),
    }))
}

/// Reference to another entity (test case, configuration, plan, build)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShallowReference {
    #[serde(
        default,
        deserialize_with = "id_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ShallowReference {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }
}

/// Shared step invoked by a synthesized action result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedStepModel {
    pub id: u32,
    pub revision: i32,
}

/// Outcome of one step (action) inside one iteration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_step_model: Option<SharedStepModel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One repetition of a test case inside a result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationDetails {
    pub id: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_results: Option<Vec<ActionResult>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A test result, either created on a run by the service or read from a report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_case: Option<ShallowReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<ShallowReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration_details: Option<Vec<IterationDetails>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_in_ms: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TestCaseResult {
    pub fn test_case_id(&self) -> Option<&str> {
        self.test_case.as_ref().and_then(|r| r.id.as_deref())
    }

    pub fn configuration_id(&self) -> Option<&str> {
        self.configuration.as_ref().and_then(|r| r.id.as_deref())
    }

    pub fn has_iteration(&self, iteration_id: i32) -> bool {
        self.iteration_details
            .iter()
            .flatten()
            .any(|iteration| iteration.id == iteration_id)
    }

    /// Copy every field `executed` carries over this record.
    ///
    /// The record's own `id` is kept: it addresses the result on the run.
    pub fn overlay(&mut self, executed: &TestCaseResult) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if executed.$field.is_some() {
                    self.$field = executed.$field.clone();
                })*
            };
        }

        take!(
            outcome,
            state,
            test_case,
            configuration,
            iteration_details,
            comment,
            error_message,
            started_date,
            completed_date,
            duration_in_ms
        );

        for (key, value) in &executed.extra {
            self.extra.insert(key.clone(), value.clone());
        }
    }
}

/// `{ key, value }` pair attached to a test point
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItemProperty {
    #[serde(default)]
    pub work_item: Option<KeyValue>,
}

/// Planned execution slot of a test case for one configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestPoint {
    pub id: u32,
    #[serde(default)]
    pub configuration: Option<ShallowReference>,
    #[serde(default)]
    pub test_case: Option<ShallowReference>,
    #[serde(default)]
    pub work_item_properties: Vec<WorkItemProperty>,
}

impl TestPoint {
    pub fn automation_status(&self) -> Option<&str> {
        self.work_item_properties
            .iter()
            .filter_map(|property| property.work_item.as_ref())
            .find(|kv| kv.key.contains(AUTOMATION_STATUS_FIELD))
            .and_then(|kv| kv.value.as_str())
    }

    pub fn configuration_id(&self) -> Option<u32> {
        self.configuration
            .as_ref()
            .and_then(|c| c.id.as_deref())
            .and_then(|id| id.parse().ok())
    }
}

/// A test point as listed under a suite test case
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointAssignment {
    pub id: u32,
    #[serde(default)]
    pub configuration_id: u32,
    #[serde(default)]
    pub configuration_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteWorkItem {
    pub id: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub work_item_fields: Vec<Map<String, Value>>,
}

/// Test case entry of a suite, with its point assignments
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteTestCase {
    pub work_item: SuiteWorkItem,
    #[serde(default)]
    pub point_assignments: Vec<PointAssignment>,
}

impl SuiteTestCase {
    pub fn id(&self) -> String {
        self.work_item.id.to_string()
    }

    /// First work item field whose name contains `name`
    pub fn field(&self, name: &str) -> Option<&str> {
        self.work_item
            .work_item_fields
            .iter()
            .flat_map(|fields| fields.iter())
            .find(|(key, _)| key.contains(name))
            .and_then(|(_, value)| value.as_str())
    }

    pub fn automation_status(&self) -> Option<&str> {
        self.field(AUTOMATION_STATUS_FIELD)
    }

    pub fn steps_markup(&self) -> Option<&str> {
        self.field(STEPS_FIELD)
    }
}

/// Work item returned by the batch endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: u32,
    #[serde(default)]
    pub rev: Option<i32>,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl WorkItem {
    pub fn revision(&self) -> Option<i32> {
        self.rev.or_else(|| {
            self.fields
                .get("System.Rev")
                .and_then(Value::as_i64)
                .and_then(|rev| i32::try_from(rev).ok())
        })
    }

    pub fn steps_markup(&self) -> Option<&str> {
        self.fields.get(STEPS_FIELD).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRun {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Body of the create-run request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCreateModel {
    pub name: String,
    pub point_ids: Vec<u32>,
    pub configuration_ids: Vec<u32>,
    pub plan: ShallowReference,
    pub automated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<ShallowReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Where an attachment is filed within a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentTarget {
    pub result_id: i64,
    pub iteration_id: i32,
    pub action_path: String,
}

/// Body of the create-attachment request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRequest {
    pub file_name: String,
    /// Base64 encoded content
    pub stream: String,
    pub attachment_type: String,
}

impl AttachmentRequest {
    pub fn general(file_name: String, stream: String) -> Self {
        Self {
            file_name,
            stream,
            attachment_type: "GeneralAttachment".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttachmentReference {
    pub id: i64,
    #[serde(default)]
    pub url: Option<String>,
}
