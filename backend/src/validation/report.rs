//! Validation aggregation and report formatting.
//!
//! Three entry points, one per upload shape:
//! - [`validate_feature`] - a single GeoJSON Feature
//! - [`validate_collection`] - members of a GeoJSON FeatureCollection;
//!   failing members are dropped from the output
//! - [`validate_rows`] - transformed CSV/spreadsheet rows; failing rows are
//!   kept in the output and only flagged in the report
//!
//! Errors about the point geometry are collapsed into one line per record,
//! since they all mean the same thing to the user: the location cannot be
//! drawn.

use std::fmt;

use serde_json::Value;
use tracing::debug;

use super::{CompiledValidator, ValidationError};
use crate::error::AggregationError;
use crate::models::{FeatureCollection, LocationFeature, OutcomeStatus, ValidationMode, ValidationOutcome};

/// The one line that replaces every coordinate error of a record.
pub const COORDINATE_SUMMARY: &str =
    "Invalid or missing coordinates (latitude/longitude values). The project location is not printed on the map.";

const FEATURE_VALID: &str = "GeoJSON Feature is valid!";
const FEATURE_INVALID: &str = "GeoJSON Feature Validation Errors:";
const COLLECTION_VALID: &str = "GeoJSON FeatureCollection is valid!";
const COLLECTION_INVALID: &str = "Some features in the GeoJSON FeatureCollection failed validation.";
const ROWS_VALID: &str = "Excel/CSV data is valid!";
const ROWS_INVALID: &str = "Validation Errors:";

// =============================================================================
// Classification
// =============================================================================

/// True when the error means "this record has no drawable point".
pub fn is_coordinate_error(error: &ValidationError) -> bool {
    let path = error.path.as_str();
    if path.starts_with("/geometry/coordinates") || path == "/geometry/type" {
        return true;
    }
    if path != "/geometry" {
        return false;
    }

    matches!(error.code.as_str(), "required" | "oneOf")
        || ["required property", "exactly one schema", "must be null", "\"null\""]
            .iter()
            .any(|needle| error.message.contains(needle))
}

/// Which record a block of report lines talks about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordRef {
    /// The only record of a single-feature upload.
    Single,
    /// 1-based CSV/spreadsheet row.
    Row(usize),
    /// 1-based position in the uploaded FeatureCollection.
    Feature(usize),
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordRef::Single => write!(f, "Error"),
            RecordRef::Row(n) => write!(f, "Row {}", n),
            RecordRef::Feature(n) => write!(f, "Feature {}", n),
        }
    }
}

/// Report lines for one record: the coordinate summary first (at most
/// once), then every other error in validator order.
pub fn format_errors(record: RecordRef, errors: &[ValidationError]) -> Vec<String> {
    let (coordinate, other): (Vec<&ValidationError>, Vec<&ValidationError>) =
        errors.iter().partition(|e| is_coordinate_error(e));

    let mut lines = Vec::with_capacity(other.len() + 1);
    if !coordinate.is_empty() {
        lines.push(format!("{}: {}", record, COORDINATE_SUMMARY));
    }

    for error in other {
        let path = if error.path.is_empty() {
            String::new()
        } else {
            format!(" at \"{}\"", error.path)
        };
        let message = if error.message.is_empty() {
            String::new()
        } else {
            format!(": {}", error.message)
        };
        lines.push(format!("{}{}{}", record, path, message));
    }

    lines
}

// =============================================================================
// Aggregation
// =============================================================================

/// Validate a single uploaded Feature.
///
/// A valid feature is wrapped in a one-member collection; an invalid one
/// yields no data.
pub fn validate_feature(validator: &CompiledValidator, feature: Value) -> ValidationOutcome {
    let verdict = validator.validate(&feature);

    if verdict.valid {
        return ValidationOutcome {
            status: OutcomeStatus::Valid,
            mode: Some(ValidationMode::SingleFeature),
            report: vec![FEATURE_VALID.to_string()],
            data: Some(FeatureCollection::new(vec![feature])),
        };
    }

    let mut report = vec![FEATURE_INVALID.to_string()];
    report.extend(format_errors(RecordRef::Single, &verdict.errors));

    ValidationOutcome {
        status: OutcomeStatus::Invalid,
        mode: Some(ValidationMode::SingleFeature),
        report,
        data: None,
    }
}

/// Validate the members of an uploaded FeatureCollection.
///
/// Only passing members are kept. Failing ones are reported by their
/// position in the uploaded list.
pub fn validate_collection(validator: &CompiledValidator, features: Vec<Value>) -> ValidationOutcome {
    let total = features.len();
    let mut kept = Vec::with_capacity(total);
    let mut details = Vec::new();

    for (index, feature) in features.into_iter().enumerate() {
        let verdict = validator.validate(&feature);
        if verdict.valid {
            kept.push(feature);
        } else {
            debug!(feature = index + 1, errors = verdict.errors.len(), "Dropping invalid feature");
            details.extend(format_errors(RecordRef::Feature(index + 1), &verdict.errors));
        }
    }

    let failed = total - kept.len();
    let headline = if failed == 0 { COLLECTION_VALID } else { COLLECTION_INVALID };
    let mut report = vec![headline.to_string()];
    report.extend(details);

    ValidationOutcome {
        status: OutcomeStatus::from_counts(total, failed),
        mode: Some(ValidationMode::FeatureCollection),
        report,
        data: Some(FeatureCollection::new(kept)),
    }
}

/// Validate transformed rows.
///
/// Every row stays in the output collection, valid or not.
pub fn validate_rows(
    validator: &CompiledValidator,
    features: &[LocationFeature],
) -> Result<ValidationOutcome, AggregationError> {
    let mut values = Vec::with_capacity(features.len());
    let mut errors = Vec::new();
    let mut failed = 0;

    for (index, feature) in features.iter().enumerate() {
        let row = index + 1;
        let value = feature
            .to_value()
            .map_err(|source| AggregationError::Serialize { row, source })?;

        let verdict = validator.validate(&value);
        if !verdict.valid {
            failed += 1;
            errors.extend(format_errors(RecordRef::Row(row), &verdict.errors));
        }
        values.push(value);
    }

    let report = if failed == 0 {
        vec![ROWS_VALID.to_string()]
    } else {
        let mut report = vec![ROWS_INVALID.to_string()];
        report.extend(errors);
        report
    };

    Ok(ValidationOutcome {
        status: OutcomeStatus::from_counts(features.len(), failed),
        mode: Some(ValidationMode::Tabular),
        report,
        data: Some(FeatureCollection::new(values)),
    })
}
