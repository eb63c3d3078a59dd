use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable consulted when the config file carries no token
pub const PAT_ENV_VAR: &str = "AZURE_DEVOPS_PAT";

/// Automation status selected when the config does not name one
pub const DEFAULT_AUTOMATED_STATUS: &str = "Planned";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("missing personal access token (set `pat` or {})", PAT_ENV_VAR)]
    MissingPat,

    #[error("invalid organizationUrl `{0}`")]
    InvalidOrganizationUrl(String),

    #[error("`{0}` must not be empty")]
    Empty(&'static str),

    #[error("`{0}` must be a positive id")]
    InvalidId(&'static str),
}

/// Import configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImporterConfig {
    /// Personal access token
    #[serde(default, skip_serializing)]
    pub pat: String,

    /// Organization URL (e.g., "https://dev.azure.com/my-org")
    pub organization_url: String,

    pub project: String,

    pub plan_id: u32,

    pub suite_id: u32,

    /// Name given to the created run
    pub run_name: String,

    /// Only test cases with this automation status get points in the run
    #[serde(default = "default_automated_status")]
    pub automated_status: String,

    #[serde(default)]
    pub build_id: Option<u32>,

    #[serde(default)]
    pub comment: Option<String>,

    /// Include matching points of every configuration, not only executed ones
    #[serde(default, rename = "override")]
    pub override_configurations: bool,
}

fn default_automated_status() -> String {
    DEFAULT_AUTOMATED_STATUS.to_string()
}

impl fmt::Debug for ImporterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImporterConfig")
            .field("pat", &"<redacted>")
            .field("organization_url", &self.organization_url)
            .field("project", &self.project)
            .field("plan_id", &self.plan_id)
            .field("suite_id", &self.suite_id)
            .field("run_name", &self.run_name)
            .field("automated_status", &self.automated_status)
            .field("build_id", &self.build_id)
            .field("comment", &self.comment)
            .field("override_configurations", &self.override_configurations)
            .finish()
    }
}

impl ImporterConfig {
    /// Load config from a JSON file, falling back to [`PAT_ENV_VAR`] for the token
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: ImporterConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        if config.pat.trim().is_empty() {
            if let Ok(pat) = std::env::var(PAT_ENV_VAR) {
                config.pat = pat;
            }
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pat.trim().is_empty() {
            return Err(ConfigError::MissingPat);
        }

        match reqwest::Url::parse(&self.organization_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => {
                return Err(ConfigError::InvalidOrganizationUrl(
                    self.organization_url.clone(),
                ))
            }
        }

        if self.project.trim().is_empty() {
            return Err(ConfigError::Empty("project"));
        }
        if self.run_name.trim().is_empty() {
            return Err(ConfigError::Empty("runName"));
        }
        if self.automated_status.trim().is_empty() {
            return Err(ConfigError::Empty("automatedStatus"));
        }
        if self.plan_id == 0 {
            return Err(ConfigError::InvalidId("planId"));
        }
        if self.suite_id == 0 {
            return Err(ConfigError::InvalidId("suiteId"));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> ImporterConfig {
    ImporterConfig {
        pat: "secret".to_string(),
        organization_url: "https://dev.azure.com/nl-team".to_string(),
        project: "Lumi".to_string(),
        plan_id: 1,
        suite_id: 2,
        run_name: "Nightly".to_string(),
        automated_status: DEFAULT_AUTOMATED_STATUS.to_string(),
        build_id: None,
        comment: None,
        override_configurations: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: ImporterConfig = serde_json::from_str(
            r#"{
                "pat": "secret",
                "organizationUrl": "https://dev.azure.com/nl-team",
                "project": "Lumi",
                "planId": 1,
                "suiteId": 2,
                "runName": "Nightly"
            }"#,
        )
        .unwrap();

        assert_eq!(config.automated_status, "Planned");
        assert!(!config.override_configurations);
        assert!(config.build_id.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_override_key() {
        let config: ImporterConfig = serde_json::from_str(
            r#"{"organizationUrl": "https://x", "project": "P", "planId": 1, "suiteId": 1, "runName": "R", "override": true}"#,
        )
        .unwrap();
        assert!(config.override_configurations);
    }

    #[test]
    fn test_validate_failures() {
        let mut config = test_config();
        config.pat.clear();
        assert!(matches!(config.validate(), Err(ConfigError::MissingPat)));

        let mut config = test_config();
        config.organization_url = "dev.azure.com".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidOrganizationUrl(_))
        ));

        let mut config = test_config();
        config.suite_id = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidId("suiteId"))
        ));
    }

    #[test]
    fn test_pat_is_never_written_or_printed() {
        let config = test_config();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
        assert!(!format!("{:?}", config).contains("secret"));
    }
}
