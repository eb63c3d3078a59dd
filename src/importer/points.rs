use super::error::ImportError;
use crate::azure::{SuiteTestCase, TestManagementApi, TestPoint};
use crate::report::TestReport;
use crate::utils::ImporterConfig;
use std::collections::HashSet;

/// A test point reduced to what run creation filters on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedPoint {
    pub id: u32,
    pub configuration_id: Option<u32>,
    pub automation_status: Option<String>,
}

impl From<&TestPoint> for PlannedPoint {
    fn from(point: &TestPoint) -> Self {
        Self {
            id: point.id,
            configuration_id: point.configuration_id(),
            automation_status: point.automation_status().map(str::to_string),
        }
    }
}

/// Points assigned to suite test cases, carrying their case's automation status
pub fn planned_points(test_cases: &[SuiteTestCase]) -> Vec<PlannedPoint> {
    test_cases
        .iter()
        .flat_map(|case| {
            let status = case.automation_status().map(str::to_string);
            case.point_assignments
                .iter()
                .map(move |assignment| PlannedPoint {
                    id: assignment.id,
                    configuration_id: Some(assignment.configuration_id),
                    automation_status: status.clone(),
                })
        })
        .collect()
}

/// Which points go into a new run
#[derive(Debug, Clone, Copy)]
pub struct PointSelection<'a> {
    pub automated_status: &'a str,
    pub executed_configuration_ids: &'a [u32],
    /// Keep points of configurations nothing was executed for
    pub all_configurations: bool,
}

impl PointSelection<'_> {
    pub fn accepts(&self, point: &PlannedPoint) -> bool {
        point.id != 0
            && point.automation_status.as_deref() == Some(self.automated_status)
            && (self.all_configurations
                || point
                    .configuration_id
                    .map_or(false, |id| self.executed_configuration_ids.contains(&id)))
    }

    /// Ids of accepted points, first occurrence order, without duplicates
    pub fn select(&self, points: &[PlannedPoint]) -> Vec<u32> {
        let mut seen = HashSet::new();
        points
            .iter()
            .filter(|point| self.accepts(point))
            .filter(|point| seen.insert(point.id))
            .map(|point| point.id)
            .collect()
    }
}

/// Points of the configured suite a run for `reports` would be created with
pub async fn select_run_points(
    api: &dyn TestManagementApi,
    config: &ImporterConfig,
    reports: &[TestReport],
) -> Result<Vec<u32>, ImportError> {
    let points = api
        .fetch_test_points(&config.project, config.plan_id, &[config.suite_id])
        .await?;
    let planned: Vec<PlannedPoint> = points.iter().map(PlannedPoint::from).collect();
    let configuration_ids = executed_configuration_ids(reports);

    let selection = PointSelection {
        automated_status: &config.automated_status,
        executed_configuration_ids: &configuration_ids,
        all_configurations: config.override_configurations,
    };
    Ok(selection.select(&planned))
}

/// Numeric configuration ids of validated reports
pub fn executed_configuration_ids(reports: &[TestReport]) -> Vec<u32> {
    let mut ids = Vec::new();
    for id in reports
        .iter()
        .filter_map(|report| report.configuration_id())
        .filter_map(|id| id.parse::<u32>().ok())
    {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

/// Test case ids that appear in any report
pub fn executed_test_case_ids(reports: &[TestReport]) -> HashSet<String> {
    reports
        .iter()
        .flat_map(|report| report.test_results.iter())
        .filter_map(|result| result.test_case_id())
        .map(str::to_string)
        .collect()
}

/// Test cases some report has results for
pub fn filter_executed_test_cases<'a>(
    test_cases: &'a [SuiteTestCase],
    executed_ids: &HashSet<String>,
) -> Vec<&'a SuiteTestCase> {
    test_cases
        .iter()
        .filter(|case| executed_ids.contains(&case.id()))
        .collect()
}

/// Ids of test cases with the given automation status
pub fn automated_test_case_ids(test_cases: &[SuiteTestCase], automated_status: &str) -> Vec<String> {
    test_cases
        .iter()
        .filter(|case| case.automation_status() == Some(automated_status))
        .map(SuiteTestCase::id)
        .collect()
}
