pub mod azure;
pub mod importer;
pub mod parser;
pub mod report;
pub mod utils;

// Re-export common items
pub use azure::{AzureDevOpsClient, TestManagementApi};
pub use importer::{import_report_files, import_test_results, ImportError};
pub use report::{merge_reports, ImportSummary, TestReport};
pub use utils::ImporterConfig;
