//! Import pipeline
//!
//! Creates a run for the executed configurations, reconciles the results the
//! service created with the executed ones, writes them back and uploads the
//! screenshots. Any failure after the run exists aborts it.

pub mod action_path;
pub mod error;
pub mod points;
pub mod reconcile;
pub mod run;
pub mod shared_steps;

pub use error::ImportError;
pub use points::{planned_points, PlannedPoint, PointSelection};
pub use reconcile::{reconcile, UpdatePayload};
pub use run::{Phase, RunEvent, RunLifecycle, RunState, TransitionError};
pub use shared_steps::{load_shared_steps, load_test_case_steps};

use crate::azure::{
    AttachmentReference, AttachmentRequest, AttachmentTarget, RunCreateModel, ShallowReference,
    TestManagementApi,
};
use crate::report::{self, ImportSummary, Screenshot, TestReport};
use crate::utils::ImporterConfig;
use std::path::{Path, PathBuf};

/// Import already loaded reports into a new run
pub async fn import_test_results(
    api: &dyn TestManagementApi,
    reports: Vec<TestReport>,
    config: &ImporterConfig,
) -> Result<ImportSummary, ImportError> {
    config.validate()?;

    let reports: Vec<TestReport> = reports
        .into_iter()
        .filter(|report| match report.validate() {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Skipping report: {}", e);
                false
            }
        })
        .collect();
    let reports = report::merge_reports(reports);
    if reports.is_empty() {
        log::warn!("No valid report to import");
        return Ok(ImportSummary::default());
    }

    let project = config.project.as_str();
    let configuration_ids = points::executed_configuration_ids(&reports);
    let test_cases = api
        .fetch_test_cases(project, config.plan_id, &[config.suite_id])
        .await?;
    let selection = PointSelection {
        automated_status: &config.automated_status,
        executed_configuration_ids: &configuration_ids,
        all_configurations: config.override_configurations,
    };
    let point_ids = selection.select(&planned_points(&test_cases));
    log::info!(
        "Selected {} point(s) from {} test case(s) for {} configuration(s)",
        point_ids.len(),
        test_cases.len(),
        configuration_ids.len()
    );

    let model = run_create_model(config, point_ids, configuration_ids);
    let mut run = RunLifecycle::create(api, project, &model).await?;
    let run_id = run.run_id();
    run.advance_within(Phase::Start, RunEvent::Start).await?;

    let payload = run
        .guard(Phase::Reconcile, async {
            let created = api.fetch_results(project, run_id).await?;
            let executed_ids = points::executed_test_case_ids(&reports);
            let executed_cases = points::filter_executed_test_cases(&test_cases, &executed_ids);
            let steps = load_test_case_steps(api, project, &executed_cases).await?;
            Ok::<_, ImportError>(reconcile(&created, &reports, &steps))
        })
        .await?;

    let test_case_results = run
        .guard(Phase::ResultImport, async {
            let updated = api
                .update_results(project, run_id, &payload.test_case_results)
                .await?;
            Ok::<_, ImportError>(updated)
        })
        .await?;
    log::info!(
        "Imported {} result(s) into test run {}",
        test_case_results.len(),
        run_id
    );
    run.advance_within(Phase::ResultImport, RunEvent::ResultsImported).await?;

    let attachments = run
        .guard(
            Phase::ScreenshotUpload,
            upload_screenshots(api, project, run_id, &payload.screenshots),
        )
        .await?;

    Ok(ImportSummary {
        run_id: Some(run_id),
        test_case_results,
        attachments,
        generated_at: Some(chrono::Local::now().to_rfc3339()),
    })
}

/// Load reports from `report_dir`, import them and write the summary next to them
pub async fn import_report_files(
    api: &dyn TestManagementApi,
    report_dir: &Path,
    config: &ImporterConfig,
) -> Result<(ImportSummary, PathBuf), ImportError> {
    config.validate()?;
    if !report_dir.is_absolute() || !report_dir.is_dir() {
        return Err(ImportError::InvalidReportDir(report_dir.to_path_buf()));
    }

    let reports = report::load_reports(report_dir)?;
    let summary = import_test_results(api, reports, config).await?;
    let path = report::write_summary(report_dir, &summary)?;
    Ok((summary, path))
}

fn run_create_model(
    config: &ImporterConfig,
    point_ids: Vec<u32>,
    configuration_ids: Vec<u32>,
) -> RunCreateModel {
    RunCreateModel {
        name: config.run_name.clone(),
        point_ids,
        configuration_ids,
        plan: ShallowReference {
            id: Some(config.plan_id.to_string()),
            name: Some(config.run_name.clone()),
            url: None,
        },
        automated: true,
        build: config
            .build_id
            .map(|id| ShallowReference::with_id(id.to_string())),
        comment: config.comment.clone(),
    }
}

/// Attachment file name of a screenshot
pub fn screenshot_file_name(test_case_id: &str, run_id: i64) -> String {
    format!("CaseID-{}-runid-{}.png", test_case_id, run_id)
}

async fn upload_screenshots(
    api: &dyn TestManagementApi,
    project: &str,
    run_id: i64,
    screenshots: &[Screenshot],
) -> Result<Vec<AttachmentReference>, ImportError> {
    let mut attachments = Vec::with_capacity(screenshots.len());
    for screenshot in screenshots {
        let Some(result_id) = screenshot.test_case_result_id else {
            log::debug!(
                "Screenshot of test case {:?} is not bound to a result",
                screenshot.test_case_id
            );
            continue;
        };

        let target = AttachmentTarget {
            result_id,
            iteration_id: screenshot.iteration_id,
            action_path: screenshot.action_path.clone(),
        };
        let request = AttachmentRequest::general(
            screenshot_file_name(screenshot.test_case_id.as_deref().unwrap_or_default(), run_id),
            screenshot.base64_encoded_content.clone(),
        );
        attachments.push(api.upload_attachment(project, run_id, &target, &request).await?);
    }

    log::info!(
        "Uploaded {} screenshot(s) into test run {}",
        attachments.len(),
        run_id
    );
    Ok(attachments)
}
