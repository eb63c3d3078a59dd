use super::types::{ImportSummary, TestReport};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// File written next to the reports after an import
pub const SUMMARY_FILE_NAME: &str = "uploadedData.json";

#[derive(Debug, Error)]
pub enum ReportFileError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Load every `*.json` report directly inside `dir`, in file name order.
///
/// Files that are not valid reports are logged and skipped.
pub fn load_reports(dir: &Path) -> Result<Vec<TestReport>, ReportFileError> {
    let mut reports = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| ReportFileError::Io {
            path: dir.to_path_buf(),
            source: e.into(),
        })?;
        let path = entry.path();
        let is_json = path.extension().map_or(false, |ext| ext == "json");
        if !entry.file_type().is_file() || !is_json || entry.file_name() == SUMMARY_FILE_NAME {
            continue;
        }

        let content = std::fs::read_to_string(path).map_err(|source| ReportFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        match serde_json::from_str::<TestReport>(&content) {
            Ok(report) => match report.validate() {
                Ok(()) => reports.push(report),
                Err(reason) => log::warn!("Skipping {}: {}", path.display(), reason),
            },
            Err(e) => log::warn!("Skipping {}: not a test report ({})", path.display(), e),
        }
    }

    log::info!("Loaded {} report(s) from {}", reports.len(), dir.display());
    Ok(reports)
}

/// Write `value` as pretty JSON
pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<(), ReportFileError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| ReportFileError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, json).map_err(|source| ReportFileError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Write the import summary into the report directory
pub fn write_summary(dir: &Path, summary: &ImportSummary) -> Result<PathBuf, ReportFileError> {
    let path = dir.join(SUMMARY_FILE_NAME);
    write_json(summary, &path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lumi-reports-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_load_reports_skips_invalid_files() {
        let dir = temp_dir();
        std::fs::write(
            dir.join("b.json"),
            r#"{"azureConfigurationId": "2", "testResults": [{"testCase": {"id": "7"}}]}"#,
        )
        .unwrap();
        std::fs::write(
            dir.join("a.json"),
            r#"{"azureConfigurationId": "1", "testResults": []}"#,
        )
        .unwrap();
        std::fs::write(dir.join("broken.json"), "{ not json").unwrap();
        std::fs::write(dir.join("nameless.json"), r#"{"testResults": []}"#).unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();
        std::fs::write(dir.join(SUMMARY_FILE_NAME), r#"{"azureConfigurationId": "9"}"#).unwrap();

        let reports = load_reports(&dir).unwrap();
        let ids: Vec<_> = reports.iter().filter_map(|r| r.configuration_id()).collect();
        assert_eq!(ids, vec!["1", "2"]);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_write_summary() {
        let dir = temp_dir();
        let summary = ImportSummary {
            run_id: Some(5),
            ..Default::default()
        };

        let path = write_summary(&dir, &summary).unwrap();
        let written: ImportSummary =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, summary);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
