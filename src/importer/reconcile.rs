//! Result reconciliation
//!
//! Every result the service created for the run is matched to an executed
//! result by configuration id and then by test case id. Matched results get
//! their action results realigned with the test case's steps so that step
//! identifiers and action paths are the ones the service expects; screenshots
//! follow the corrected action paths and are bound to the created result.
//!
//! Realignment walks the steps with a cursor over each iteration's action
//! results, so the action results must already be in the order of the
//! flattened steps. Nothing here can detect a report that orders them
//! differently. Screenshots are remapped by their old action path, so a
//! report repeating a path within one iteration sends all of those
//! screenshots to the last step that carried it (logged as a warning).

use super::action_path;
use crate::azure::{
    ActionResult, IterationDetails, Outcome, SharedStepModel, TestCaseResult,
    RESULT_STATE_COMPLETED,
};
use crate::parser::{SharedStepBody, Step, StepMap};
use crate::report::{Screenshot, TestReport};
use std::collections::HashMap;

/// Results ready for the bulk update and screenshots ready for upload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdatePayload {
    pub test_case_results: Vec<TestCaseResult>,
    pub screenshots: Vec<Screenshot>,
}

/// Old action path -> corrected action path, per iteration id
type PathCorrections = HashMap<i32, HashMap<String, String>>;

pub fn reconcile(
    created_results: &[TestCaseResult],
    reports: &[TestReport],
    steps: &StepMap,
) -> UpdatePayload {
    let mut payload = UpdatePayload::default();

    for created in created_results {
        let mut result = created.clone();
        result.outcome = Some(Outcome::NotExecuted);
        result.state = Some(RESULT_STATE_COMPLETED.to_string());

        let Some(report) = find_report(reports, created) else {
            log::debug!(
                "Result {:?}: no report for configuration {:?}",
                created.id,
                created.configuration_id()
            );
            payload.test_case_results.push(result);
            continue;
        };

        let Some((test_case_id, executed)) = created.test_case_id().and_then(|id| {
            report
                .test_results
                .iter()
                .find(|executed| executed.test_case_id() == Some(id))
                .map(|executed| (id, executed))
        }) else {
            log::debug!(
                "Result {:?}: test case {:?} was not executed",
                created.id,
                created.test_case_id()
            );
            payload.test_case_results.push(result);
            continue;
        };

        let mut executed = executed.clone();
        let corrections = match steps.get(test_case_id) {
            Some(steps) if !steps.is_empty() => realign_action_paths(&mut executed, steps),
            _ => PathCorrections::new(),
        };

        result.overlay(&executed);
        payload.screenshots.extend(bind_screenshots(
            report,
            test_case_id,
            &executed,
            &corrections,
            created.id,
        ));
        payload.test_case_results.push(result);
    }

    log::info!(
        "Reconciled {} result(s) and {} screenshot(s)",
        payload.test_case_results.len(),
        payload.screenshots.len()
    );
    payload
}

fn find_report<'a>(reports: &'a [TestReport], created: &TestCaseResult) -> Option<&'a TestReport> {
    let configuration_id = created.configuration_id()?;
    reports
        .iter()
        .find(|report| report.configuration_id() == Some(configuration_id))
}

/// Rewrite step identifiers and action paths of every iteration
fn realign_action_paths(executed: &mut TestCaseResult, steps: &[Step]) -> PathCorrections {
    let mut corrections = PathCorrections::new();
    for iteration in executed.iteration_details.iter_mut().flatten() {
        let iteration_corrections = realign_iteration(iteration, steps);
        corrections.insert(iteration.id, iteration_corrections);
    }
    corrections
}

fn realign_iteration(iteration: &mut IterationDetails, steps: &[Step]) -> HashMap<String, String> {
    let mut corrections = HashMap::new();
    let iteration_id = iteration.id;
    let Some(actions) = iteration.action_results.as_mut() else {
        return corrections;
    };

    let mut cursor = 0;
    let mut shared_step_results = Vec::new();

    for step in steps {
        if cursor >= actions.len() {
            break;
        }

        match step {
            Step::Action { id } => {
                remap(
                    &mut actions[cursor],
                    id.to_string(),
                    action_path::encode(*id),
                    &mut corrections,
                );
                cursor += 1;
            }
            Step::SharedStep {
                id,
                shared_step_id,
                body: Some(body),
            } if !body.steps.is_empty() => {
                let consumed = &mut actions[cursor..];
                let taken = body.steps.len().min(consumed.len());
                let parent = expand_shared_step(
                    *id,
                    *shared_step_id,
                    body,
                    iteration_id,
                    &mut consumed[..taken],
                    &mut corrections,
                );
                shared_step_results.push(parent);
                cursor += taken;
            }
            Step::SharedStep { id, shared_step_id, .. } => {
                log::debug!(
                    "Step {}: shared step {} is not resolved, nothing to expand",
                    id,
                    shared_step_id
                );
            }
        }
    }

    actions.extend(shared_step_results);
    corrections
}

/// Remap the child actions of one shared step invocation and build the
/// action result summarising it
fn expand_shared_step(
    id: u32,
    shared_step_id: u32,
    body: &SharedStepBody,
    iteration_id: i32,
    children: &mut [ActionResult],
    corrections: &mut HashMap<String, String>,
) -> ActionResult {
    for (child, action) in body.steps.iter().zip(children.iter_mut()) {
        remap(
            action,
            format!("{};{}", id, child.id()),
            action_path::composite(id, child.id()),
            corrections,
        );
    }

    ActionResult {
        action_path: Some(action_path::encode(id)),
        iteration_id: Some(iteration_id),
        shared_step_model: Some(SharedStepModel {
            id: shared_step_id,
            revision: body.revision,
        }),
        step_identifier: Some(id.to_string()),
        outcome: Some(aggregate_outcome(children.iter().map(|a| a.outcome))),
        started_date: children.first().and_then(|a| a.started_date.clone()),
        completed_date: children.last().and_then(|a| a.completed_date.clone()),
        ..Default::default()
    }
}

fn remap(
    action: &mut ActionResult,
    step_identifier: String,
    action_path: String,
    corrections: &mut HashMap<String, String>,
) {
    if let Some(old) = action.action_path.replace(action_path.clone()) {
        if let Some(previous) = corrections.insert(old.clone(), action_path) {
            log::warn!(
                "Action path {} appears more than once, screenshots move from {} to {}",
                old,
                previous,
                corrections[&old]
            );
        }
    }
    action.step_identifier = Some(step_identifier);
}

/// Failed beats NotExecuted beats Passed
pub fn aggregate_outcome(outcomes: impl IntoIterator<Item = Option<Outcome>>) -> Outcome {
    let mut aggregate = Outcome::Passed;
    for outcome in outcomes.into_iter().flatten() {
        match outcome {
            Outcome::Failed => return Outcome::Failed,
            Outcome::NotExecuted => aggregate = Outcome::NotExecuted,
            _ => {}
        }
    }
    aggregate
}

/// Screenshots of `test_case_id` taken in an executed iteration, with
/// corrected action paths and bound to the created result
fn bind_screenshots(
    report: &TestReport,
    test_case_id: &str,
    executed: &TestCaseResult,
    corrections: &PathCorrections,
    result_id: Option<i64>,
) -> Vec<Screenshot> {
    report
        .screenshots
        .iter()
        .filter(|screenshot| screenshot.test_case_id.as_deref() == Some(test_case_id))
        .filter_map(|screenshot| {
            if !executed.has_iteration(screenshot.iteration_id) {
                log::debug!(
                    "Dropping screenshot of test case {}: no iteration {}",
                    test_case_id,
                    screenshot.iteration_id
                );
                return None;
            }

            let mut bound = screenshot.clone();
            if let Some(corrected) = corrections
                .get(&screenshot.iteration_id)
                .and_then(|paths| paths.get(&screenshot.action_path))
            {
                bound.action_path = corrected.clone();
            }
            bound.test_case_result_id = result_id;
            Some(bound)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azure::ShallowReference;
    use crate::parser::StepNode;

    fn created(id: i64, configuration: &str, test_case: &str) -> TestCaseResult {
        TestCaseResult {
            id: Some(id),
            outcome: Some(Outcome::Unspecified),
            state: Some("Pending".to_string()),
            test_case: Some(ShallowReference::with_id(test_case)),
            configuration: Some(ShallowReference::with_id(configuration)),
            ..Default::default()
        }
    }

    fn action(path: &str, outcome: Outcome, started: &str, completed: &str) -> ActionResult {
        ActionResult {
            action_path: Some(path.to_string()),
            iteration_id: Some(1),
            outcome: Some(outcome),
            started_date: Some(started.to_string()),
            completed_date: Some(completed.to_string()),
            ..Default::default()
        }
    }

    fn executed(test_case: &str, actions: Vec<ActionResult>) -> TestCaseResult {
        TestCaseResult {
            test_case: Some(ShallowReference::with_id(test_case)),
            outcome: Some(Outcome::Passed),
            iteration_details: Some(vec![IterationDetails {
                id: 1,
                outcome: Some(Outcome::Passed),
                action_results: Some(actions),
                ..Default::default()
            }]),
            ..Default::default()
        }
    }

    fn screenshot(test_case: &str, iteration: i32, path: &str) -> Screenshot {
        Screenshot {
            test_case_id: Some(test_case.to_string()),
            test_case_result_id: None,
            iteration_id: iteration,
            action_path: path.to_string(),
            base64_encoded_content: "iVBORw0KGgo=".to_string(),
        }
    }

    fn report(configuration: &str, results: Vec<TestCaseResult>, shots: Vec<Screenshot>) -> TestReport {
        TestReport {
            azure_configuration_id: Some(configuration.to_string()),
            test_results: results,
            screenshots: shots,
        }
    }

    fn shared_step_map(test_case: &str) -> StepMap {
        StepMap::from([(
            test_case.to_string(),
            vec![Step::SharedStep {
                id: 2,
                shared_step_id: 100,
                body: Some(SharedStepBody {
                    revision: 3,
                    steps: vec![StepNode::Action { id: 1 }, StepNode::Action { id: 2 }],
                }),
            }],
        )])
    }

    fn actions_of(result: &TestCaseResult) -> &[ActionResult] {
        result.iteration_details.as_ref().unwrap()[0]
            .action_results
            .as_deref()
            .unwrap()
    }

    #[test]
    fn test_unmatched_configuration_defaults_to_not_executed() {
        let reports = vec![report(
            "2",
            vec![executed("10", vec![])],
            vec![screenshot("10", 1, "1")],
        )];

        let payload = reconcile(&[created(500, "1", "10")], &reports, &StepMap::new());

        let mut expected = created(500, "1", "10");
        expected.outcome = Some(Outcome::NotExecuted);
        expected.state = Some("Completed".to_string());
        assert_eq!(payload.test_case_results, vec![expected]);
        assert!(payload.screenshots.is_empty());
    }

    #[test]
    fn test_unexecuted_test_case_defaults_to_not_executed() {
        let reports = vec![report("1", vec![executed("11", vec![])], vec![])];

        let payload = reconcile(&[created(500, "1", "10")], &reports, &StepMap::new());

        assert_eq!(payload.test_case_results.len(), 1);
        assert_eq!(
            payload.test_case_results[0].outcome,
            Some(Outcome::NotExecuted)
        );
    }

    #[test]
    fn test_single_action_step() {
        let reports = vec![report(
            "1",
            vec![executed("10", vec![action("a", Outcome::Passed, "t0", "t1")])],
            vec![],
        )];
        let steps = StepMap::from([("10".to_string(), vec![Step::Action { id: 1 }])]);

        let payload = reconcile(&[created(500, "1", "10")], &reports, &steps);

        let result = &payload.test_case_results[0];
        assert_eq!(result.id, Some(500));
        assert_eq!(result.outcome, Some(Outcome::Passed));
        assert_eq!(result.state.as_deref(), Some("Completed"));
        let actions = actions_of(result);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action_path.as_deref(), Some("00000001"));
        assert_eq!(actions[0].step_identifier.as_deref(), Some("1"));
    }

    #[test]
    fn test_shared_step_expansion() {
        let reports = vec![report(
            "1",
            vec![executed(
                "10",
                vec![
                    action("a", Outcome::Passed, "t0", "t1"),
                    action("b", Outcome::Failed, "t2", "t3"),
                ],
            )],
            vec![],
        )];

        let payload = reconcile(&[created(500, "1", "10")], &reports, &shared_step_map("10"));

        let actions = actions_of(&payload.test_case_results[0]);
        assert_eq!(actions.len(), 3);

        assert_eq!(actions[0].action_path.as_deref(), Some("0000000200000001"));
        assert_eq!(actions[0].step_identifier.as_deref(), Some("2;1"));
        assert_eq!(actions[1].action_path.as_deref(), Some("0000000200000002"));
        assert_eq!(actions[1].step_identifier.as_deref(), Some("2;2"));

        let parent = &actions[2];
        assert_eq!(parent.action_path.as_deref(), Some("00000002"));
        assert_eq!(parent.step_identifier.as_deref(), Some("2"));
        assert_eq!(parent.iteration_id, Some(1));
        assert_eq!(
            parent.shared_step_model,
            Some(SharedStepModel {
                id: 100,
                revision: 3
            })
        );
        assert_eq!(parent.outcome, Some(Outcome::Failed));
        assert_eq!(parent.started_date.as_deref(), Some("t0"));
        assert_eq!(parent.completed_date.as_deref(), Some("t3"));
    }

    #[test]
    fn test_unresolved_shared_step_is_skipped() {
        let reports = vec![report(
            "1",
            vec![executed(
                "10",
                vec![
                    action("a", Outcome::Passed, "t0", "t1"),
                    action("b", Outcome::Passed, "t2", "t3"),
                ],
            )],
            vec![],
        )];
        let steps = StepMap::from([(
            "10".to_string(),
            vec![
                Step::SharedStep {
                    id: 2,
                    shared_step_id: 404,
                    body: None,
                },
                Step::Action { id: 3 },
            ],
        )]);

        let payload = reconcile(&[created(500, "1", "10")], &reports, &steps);

        let actions = actions_of(&payload.test_case_results[0]);
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].action_path.as_deref(), Some("00000003"));
        assert_eq!(actions[1].action_path.as_deref(), Some("b"));
        assert!(actions[1].step_identifier.is_none());
    }

    #[test]
    fn test_screenshots_follow_corrected_paths() {
        let reports = vec![report(
            "1",
            vec![executed(
                "10",
                vec![
                    action("a", Outcome::Passed, "t0", "t1"),
                    action("b", Outcome::Passed, "t2", "t3"),
                ],
            )],
            vec![
                screenshot("10", 1, "b"),
                screenshot("10", 2, "a"),
                screenshot("99", 1, "a"),
            ],
        )];

        let payload = reconcile(&[created(500, "1", "10")], &reports, &shared_step_map("10"));

        assert_eq!(payload.screenshots.len(), 1);
        let shot = &payload.screenshots[0];
        assert_eq!(shot.action_path, "0000000200000002");
        assert_eq!(shot.test_case_result_id, Some(500));
    }

    #[test]
    fn test_screenshots_kept_without_steps() {
        let reports = vec![report(
            "1",
            vec![executed("10", vec![action("a", Outcome::Passed, "t0", "t1")])],
            vec![screenshot("10", 1, "a")],
        )];

        let payload = reconcile(&[created(500, "1", "10")], &reports, &StepMap::new());

        assert_eq!(payload.screenshots[0].action_path, "a");
        assert_eq!(payload.screenshots[0].test_case_result_id, Some(500));
    }

    #[test]
    fn test_repeated_action_path_maps_to_last_step() {
        let reports = vec![report(
            "1",
            vec![executed(
                "10",
                vec![
                    action("same", Outcome::Passed, "t0", "t1"),
                    action("same", Outcome::Passed, "t2", "t3"),
                ],
            )],
            vec![screenshot("10", 1, "same")],
        )];
        let steps = StepMap::from([(
            "10".to_string(),
            vec![Step::Action { id: 1 }, Step::Action { id: 2 }],
        )]);

        let payload = reconcile(&[created(500, "1", "10")], &reports, &steps);

        let actions = actions_of(&payload.test_case_results[0]);
        assert_eq!(actions[0].action_path.as_deref(), Some("00000001"));
        assert_eq!(actions[1].action_path.as_deref(), Some("00000002"));
        assert_eq!(payload.screenshots[0].action_path, "00000002");
    }

    #[test]
    fn test_more_steps_than_actions() {
        let reports = vec![report(
            "1",
            vec![executed("10", vec![action("a", Outcome::Passed, "t0", "t1")])],
            vec![],
        )];
        let steps = StepMap::from([(
            "10".to_string(),
            vec![
                Step::Action { id: 1 },
                Step::SharedStep {
                    id: 2,
                    shared_step_id: 100,
                    body: Some(SharedStepBody {
                        revision: 1,
                        steps: vec![StepNode::Action { id: 1 }],
                    }),
                },
            ],
        )]);

        let payload = reconcile(&[created(500, "1", "10")], &reports, &steps);

        assert_eq!(actions_of(&payload.test_case_results[0]).len(), 1);
    }

    #[test]
    fn test_reconcile_is_repeatable() {
        let reports = vec![report(
            "1",
            vec![executed(
                "10",
                vec![
                    action("a", Outcome::Passed, "t0", "t1"),
                    action("b", Outcome::NotExecuted, "t2", "t3"),
                ],
            )],
            vec![screenshot("10", 1, "a")],
        )];
        let created_results = vec![created(500, "1", "10"), created(501, "2", "10")];
        let steps = shared_step_map("10");

        let first = reconcile(&created_results, &reports, &steps);
        let second = reconcile(&created_results, &reports, &steps);

        assert_eq!(first, second);
    }

    #[test]
    fn test_aggregate_outcome() {
        use Outcome::{Failed, NotExecuted, Passed};
        assert_eq!(aggregate_outcome([Some(Passed), Some(Passed)]), Passed);
        assert_eq!(aggregate_outcome([Some(Passed), Option::None]), Passed);
        assert_eq!(aggregate_outcome([Some(NotExecuted), Some(Passed)]), NotExecuted);
        assert_eq!(aggregate_outcome([Some(NotExecuted), Some(Failed)]), Failed);
        assert_eq!(aggregate_outcome([Some(Failed), Some(NotExecuted)]), Failed);
    }
}
