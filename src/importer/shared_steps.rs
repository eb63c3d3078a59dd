use super::error::ImportError;
use crate::azure::{fetch_work_items, SuiteTestCase, TestManagementApi};
use crate::parser::steps::{decode_shared_step, decode_steps, referenced_shared_steps, resolve};
use crate::parser::{SharedStepBody, StepMap};
use std::collections::HashMap;

/// Decode the steps of `test_cases` and expand their shared step references
pub async fn load_test_case_steps(
    api: &dyn TestManagementApi,
    project: &str,
    test_cases: &[&SuiteTestCase],
) -> Result<StepMap, ImportError> {
    let mut forest = HashMap::with_capacity(test_cases.len());
    for case in test_cases {
        let nodes = decode_steps(case.steps_markup().unwrap_or_default()).map_err(|e| {
            log::error!("Test case {} has malformed steps", case.id());
            e
        })?;
        forest.insert(case.id(), nodes);
    }

    let shared_step_ids = referenced_shared_steps(&forest);
    let shared_steps = load_shared_steps(api, project, &shared_step_ids).await?;
    Ok(resolve(forest, &shared_steps))
}

/// Fetch shared step work items and decode their steps
pub async fn load_shared_steps(
    api: &dyn TestManagementApi,
    project: &str,
    ids: &[u32],
) -> Result<HashMap<u32, SharedStepBody>, ImportError> {
    let mut shared_steps = HashMap::new();
    if ids.is_empty() {
        return Ok(shared_steps);
    }

    for work_item in fetch_work_items(api, project, ids).await? {
        let Some(revision) = work_item.revision() else {
            log::warn!("Shared step {} came back without a revision", work_item.id);
            continue;
        };
        let body = decode_shared_step(
            work_item.id,
            revision,
            work_item.steps_markup().unwrap_or_default(),
        )?;
        shared_steps.insert(work_item.id, body);
    }

    if shared_steps.len() < ids.len() {
        log::debug!(
            "{} of {} shared step(s) could not be fetched",
            ids.len() - shared_steps.len(),
            ids.len()
        );
    }
    Ok(shared_steps)
}
