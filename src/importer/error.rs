use super::run::{Phase, TransitionError};
use crate::azure::ApiError;
use crate::parser::StepParseError;
use crate::report::ReportFileError;
use crate::utils::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Invalid configuration options: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("Report directory {} does not exist or is not an absolute path", .0.display())]
    InvalidReportDir(PathBuf),

    #[error("Failed to create test Run!")]
    RunNotCreated,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Failed to decode test steps: {0}")]
    StepParse(#[from] StepParseError),

    #[error(transparent)]
    ReportFile(#[from] ReportFileError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// A phase failed after the run was created; the run has been aborted
    #[error("Failed to {phase} with the following error: \n{source}")]
    PhaseFailed {
        phase: Phase,
        #[source]
        source: Box<ImportError>,
    },
}
