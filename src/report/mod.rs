pub mod json;
pub mod merge;
pub mod types;

pub use json::{load_reports, write_summary, ReportFileError, SUMMARY_FILE_NAME};
pub use merge::merge_reports;
pub use types::{ImportSummary, InvalidReport, Screenshot, TestReport};
