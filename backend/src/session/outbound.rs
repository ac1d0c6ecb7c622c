//! What leaves a session: the GeoJSON download and the mail draft.
//!
//! Neither is delivered anywhere. The download is a named blob for the
//! caller to save; the mail draft is a `mailto:` link for the user's own
//! mail client.

use serde_json::Value;

use crate::config::{DOWNLOAD_FILE_NAME, DOWNLOAD_MEDIA_TYPE};
use crate::error::{OutboundError, OutboundResult};
use crate::models::{FeatureCollection, OutcomeStatus, ValidationMode, ValidationOutcome};

/// Public address of the hosted validator, quoted in the mail body.
pub const VALIDATOR_URL: &str = "https://mapme-initiative.github.io/ogm-validator/";

// =============================================================================
// Download
// =============================================================================

/// The processed FeatureCollection, ready to be saved.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadArtifact {
    pub file_name: String,
    pub media_type: String,
    pub contents: String,
}

impl DownloadArtifact {
    pub fn from_collection(collection: &FeatureCollection) -> OutboundResult<Self> {
        Ok(Self {
            file_name: DOWNLOAD_FILE_NAME.to_string(),
            media_type: DOWNLOAD_MEDIA_TYPE.to_string(),
            contents: collection.to_geojson()?,
        })
    }

    /// Download for whatever data the outcome carries, valid or not.
    pub fn from_outcome(outcome: &ValidationOutcome) -> OutboundResult<Self> {
        let collection = outcome.data.as_ref().ok_or(OutboundError::NoData)?;
        Self::from_collection(collection)
    }
}

// =============================================================================
// Mail Draft
// =============================================================================

/// A prepared, unsent message listing the validated project numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct MailDraft {
    /// Distinct normalized `kfwProjectNoINPRO` values, first seen first.
    pub project_numbers: Vec<String>,
    pub subject: String,
    pub body: String,
}

impl MailDraft {
    /// Draft for a tabular outcome that validated without errors.
    ///
    /// Every record must carry a non-empty project number.
    pub fn from_outcome(outcome: &ValidationOutcome) -> OutboundResult<Self> {
        if outcome.status != OutcomeStatus::Valid || outcome.mode != Some(ValidationMode::Tabular) {
            return Err(OutboundError::NotValidTabular);
        }
        let collection = outcome.data.as_ref().ok_or(OutboundError::NoData)?;
        if collection.is_empty() {
            return Err(OutboundError::NoRecords);
        }

        let mut project_numbers: Vec<String> = Vec::new();
        for (index, feature) in collection.features.iter().enumerate() {
            let number = project_number(feature)
                .ok_or(OutboundError::MissingProjectNumber(index + 1))?;
            if !project_numbers.contains(&number) {
                project_numbers.push(number);
            }
        }

        Ok(Self::for_projects(project_numbers))
    }

    pub fn for_projects(project_numbers: Vec<String>) -> Self {
        let projects = project_numbers.join(", ");
        let subject = format!("Validated Location data for Project {}", projects);
        let body = format!(
            "Dear Sir or Madam,\n\nThis email contains validated location data for the project(s) {projects}. \
             It was validated by the \"Location Validator\" on {url}. You can use the Location Validator \
             Tool ({url}) yourself to check the data validity and see all project locations printed on a map.\n\n\
             Yours sincerely,\n",
            projects = projects,
            url = VALIDATOR_URL,
        );

        Self {
            project_numbers,
            subject,
            body,
        }
    }

    /// `mailto:` link with no recipient, for the user's mail client.
    pub fn mailto_link(&self) -> String {
        format!(
            "mailto:?subject={}&body={}",
            urlencoding::encode(&self.subject),
            urlencoding::encode(&self.body)
        )
    }
}

/// Trimmed, whitespace-free, upper-cased `kfwProjectNoINPRO`, if any.
fn project_number(feature: &Value) -> Option<String> {
    let raw = feature.get("properties")?.get("kfwProjectNoINPRO")?;
    let text = match raw {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };

    let normalized: String = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();
    (!normalized.is_empty()).then_some(normalized)
}
