use super::types::TestReport;
use std::collections::HashMap;

/// Merge reports sharing a configuration id.
///
/// The first report seen for a configuration receives the results and
/// screenshots of every later one; output keeps first-seen order. Reports
/// without a configuration id are dropped.
pub fn merge_reports(reports: Vec<TestReport>) -> Vec<TestReport> {
    let mut merged: Vec<TestReport> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for report in reports {
        let Some(configuration_id) = report.configuration_id().map(str::to_owned) else {
            log::warn!(
                "Dropping report with {} result(s): no configuration id",
                report.test_results.len()
            );
            continue;
        };

        match positions.get(&configuration_id) {
            Some(&position) => {
                log::debug!("Merging report into configuration {}", configuration_id);
                let target = &mut merged[position];
                target.test_results.extend(report.test_results);
                target.screenshots.extend(report.screenshots);
            }
            None => {
                positions.insert(configuration_id, merged.len());
                merged.push(report);
            }
        }
    }

    merged
}
