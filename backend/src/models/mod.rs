//! Domain models for the validation pipeline.
//!
//! - [`RawRow`] - one untyped CSV/spreadsheet row
//! - [`LocationFeature`] - a normalized GeoJSON Point feature
//! - [`FeatureCollection`] - the unit handed to the map and the download
//! - [`ValidationOutcome`] - the tagged result of one upload

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// One parsed row: column name to scalar.
///
/// Spreadsheet rows leave empty cells out; CSV rows keep empty fields as
/// `""` and only lack the columns a short line never reached.
pub type RawRow = Map<String, Value>;

// =============================================================================
// Location Feature
// =============================================================================

/// A GeoJSON Point geometry.
///
/// `coordinates` is always `[longitude, latitude]`. Unparsable inputs are
/// kept as `NaN` rather than dropped; `NaN` serializes as JSON `null`.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(tag = "type", rename = "Point")]
pub struct PointGeometry {
    pub coordinates: [f64; 2],
}

impl PointGeometry {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            coordinates: [longitude, latitude],
        }
    }
}

/// The nested `sector_location` object.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SectorLocation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_type: Option<Value>,
}

/// Properties of a [`LocationFeature`].
///
/// Typed fields are the ones the transformers coerce; every other column
/// lands in `extra` untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LocationProperties {
    #[serde(rename = "primaryKey", skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,

    #[serde(rename = "kfwProjectNoINPRO", skip_serializing_if = "Option::is_none")]
    pub kfw_project_no_inpro: Option<String>,

    #[serde(rename = "uniqueId", skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,

    #[serde(rename = "budgetShare", skip_serializing_if = "Option::is_none")]
    pub budget_share: Option<f64>,

    #[serde(
        rename = "dac5PurposeCode",
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_integer"
    )]
    pub dac5_purpose_code: Option<f64>,

    #[serde(rename = "plannedOrActualStartDate", skip_serializing_if = "Option::is_none")]
    pub planned_or_actual_start_date: Option<String>,

    #[serde(rename = "plannedOrActualEndDate", skip_serializing_if = "Option::is_none")]
    pub planned_or_actual_end_date: Option<String>,

    #[serde(rename = "dateOfDataCollection", skip_serializing_if = "Option::is_none")]
    pub date_of_data_collection: Option<String>,

    pub sector_location: SectorLocation,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Integers are kept as `f64` so they can carry `NaN`; write them back as
/// JSON integers, as floats outside the `i64` range, or `null` when not
/// finite.
fn serialize_integer<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) if !v.is_finite() => serializer.serialize_none(),
        Some(v) if *v >= -I64_BOUND && *v < I64_BOUND => serializer.serialize_i64(*v as i64),
        Some(v) => serializer.serialize_f64(*v),
        None => serializer.serialize_none(),
    }
}

/// 2^63, the first `f64` past `i64::MAX`.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// A normalized project location, produced by the row transformers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename = "Feature")]
pub struct LocationFeature {
    pub geometry: PointGeometry,
    pub properties: LocationProperties,
}

impl LocationFeature {
    /// JSON form of the feature, as the schema validator sees it.
    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

// =============================================================================
// Feature Collection
// =============================================================================

/// A GeoJSON FeatureCollection. Feature order is input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "FeatureCollection")]
pub struct FeatureCollection {
    pub features: Vec<Value>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Value>) -> Self {
        Self { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Serialize as GeoJSON text.
    pub fn to_geojson(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// =============================================================================
// Validation Outcome
// =============================================================================

/// Overall verdict of one upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutcomeStatus {
    Valid,
    PartiallyValid,
    Invalid,
    UnsupportedInput,
}

impl OutcomeStatus {
    /// Verdict for a batch of `total` records of which `failed` did not pass.
    pub fn from_counts(total: usize, failed: usize) -> Self {
        if failed == 0 {
            OutcomeStatus::Valid
        } else if failed >= total {
            OutcomeStatus::Invalid
        } else {
            OutcomeStatus::PartiallyValid
        }
    }
}

/// Which validation path produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationMode {
    /// A single GeoJSON `Feature`.
    SingleFeature,
    /// Members of a GeoJSON `FeatureCollection`; invalid ones are dropped.
    FeatureCollection,
    /// CSV or spreadsheet rows; invalid ones are kept.
    Tabular,
}

/// The single value a session holds after an upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub status: OutcomeStatus,
    /// `None` when the upload never reached the aggregator.
    pub mode: Option<ValidationMode>,
    pub report: Vec<String>,
    pub data: Option<FeatureCollection>,
}

impl ValidationOutcome {
    /// Outcome for a file kind outside the accepted set.
    pub fn unsupported_input() -> Self {
        Self {
            status: OutcomeStatus::UnsupportedInput,
            mode: None,
            report: vec!["Unsupported file type. Please upload a JSON, CSV, or Excel file.".to_string()],
            data: None,
        }
    }

    /// Outcome for an upload rejected before validation (parse errors and
    /// the like).
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Invalid,
            mode: None,
            report: vec![message.into()],
            data: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.status == OutcomeStatus::Valid
    }

    /// The report as one block of text.
    pub fn report_text(&self) -> String {
        self.report.join("\n")
    }
}
