//! Validator configuration.
//!
//! Defaults point at the published Open Geodata Model schemas. Every value
//! can be overridden from the environment (a `.env` file is honoured by the
//! binary), and the CLI may override again on top of that.

use std::time::Duration;

/// Raw GitHub base for the schema repository.
pub const DEFAULT_SCHEMA_BASE_URL: &str =
    "https://raw.githubusercontent.com/openkfw/open-geodata-model";

/// Branch of the schema repository the validator is pinned to.
pub const DEFAULT_SCHEMA_BRANCH: &str = "2025-02-10-devdocs";

/// The four documents that make up the project location schema graph.
pub const SCHEMA_FILES: [&str; 4] = [
    "sector_location_schema.json",
    "dac5_schema.json",
    "feature_project_schema.json",
    "project_core_schema.json",
];

/// `$id` of the schema every feature is validated against.
pub const ROOT_SCHEMA_ID: &str = "feature_project_schema.json";

/// Name of the second worksheet in the official Excel template.
pub const TEMPLATE_SHEET_NAME: &str = "Location Data";

/// Title/legend rows above the header row on the template sheet.
pub const SPREADSHEET_HEADER_OFFSET: usize = 2;

/// Default timeout for a single schema request.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 20;

/// File name offered for the processed GeoJSON download.
pub const DOWNLOAD_FILE_NAME: &str = "validated_data.geojson";

/// Media type of the processed GeoJSON download.
pub const DOWNLOAD_MEDIA_TYPE: &str = "application/geo+json";

/// Runtime configuration for a validation session.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatorConfig {
    pub schema_base_url: String,
    pub schema_branch: String,
    pub schema_files: Vec<String>,
    pub root_schema_id: String,
    pub template_sheet_name: String,
    pub header_offset: usize,
    pub fetch_timeout: Duration,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            schema_base_url: DEFAULT_SCHEMA_BASE_URL.to_string(),
            schema_branch: DEFAULT_SCHEMA_BRANCH.to_string(),
            schema_files: SCHEMA_FILES.iter().map(|s| s.to_string()).collect(),
            root_schema_id: ROOT_SCHEMA_ID.to_string(),
            template_sheet_name: TEMPLATE_SHEET_NAME.to_string(),
            header_offset: SPREADSHEET_HEADER_OFFSET,
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
        }
    }
}

impl ValidatorConfig {
    /// Build a configuration from `OGM_*` environment variables.
    ///
    /// Unset or unparsable variables keep their default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("OGM_SCHEMA_BASE_URL") {
            config.schema_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(branch) = lookup("OGM_SCHEMA_BRANCH") {
            config.schema_branch = branch;
        }
        if let Some(sheet) = lookup("OGM_TEMPLATE_SHEET") {
            config.template_sheet_name = sheet;
        }
        if let Some(secs) = lookup("OGM_FETCH_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            config.fetch_timeout = Duration::from_secs(secs);
        }

        config
    }

    /// URLs of the schema documents, in the order they are fetched.
    pub fn schema_urls(&self) -> Vec<String> {
        self.schema_files
            .iter()
            .map(|file| {
                format!(
                    "{}/{}/references/{}",
                    self.schema_base_url, self.schema_branch, file
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_schema_urls() {
        let urls = ValidatorConfig::default().schema_urls();
        assert_eq!(urls.len(), 4);
        assert_eq!(
            urls[2],
            "https://raw.githubusercontent.com/openkfw/open-geodata-model/2025-02-10-devdocs/references/feature_project_schema.json"
        );
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("OGM_SCHEMA_BASE_URL", "http://localhost:8080/"),
            ("OGM_SCHEMA_BRANCH", "main"),
            ("OGM_FETCH_TIMEOUT_SECS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let config = ValidatorConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(
            config.schema_urls()[0],
            "http://localhost:8080/main/references/sector_location_schema.json"
        );
        assert_eq!(config.fetch_timeout, Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS));
        assert_eq!(config.template_sheet_name, TEMPLATE_SHEET_NAME);
    }
}
