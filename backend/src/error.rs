//! Error types for the OGM validation pipeline.
//!
//! One enum per layer, each convertible into the next one up so that `?`
//! works across boundaries:
//!
//! - [`ParseError`] - malformed GeoJSON, CSV or spreadsheet bytes
//! - [`RegistryError`] - schema loading and compilation
//! - [`AggregationError`] - unexpected failures while validating a batch
//! - [`SessionError`] - state machine misuse and blocked sessions
//! - [`OutboundError`] - download and mail draft preconditions
//!
//! Schema violations are *not* errors in this sense: they are data, carried
//! by [`crate::validation::ValidationError`] and folded into the report.

use thiserror::Error;

use crate::parser::CsvError;

// =============================================================================
// Parse Errors
// =============================================================================

/// Errors raised at the parse boundary, before any transformation.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The upload is not valid JSON.
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A `FeatureCollection` without a `features` array.
    #[error("FeatureCollection has no features array")]
    MissingFeatures,

    /// The CSV could not be decoded or read.
    #[error("Invalid CSV: {0}")]
    Csv(#[from] CsvError),

    /// The workbook could not be opened or a sheet could not be read.
    #[error("Invalid spreadsheet: {0}")]
    Spreadsheet(String),

    /// The workbook has no sheet to read rows from.
    #[error("Spreadsheet has no worksheets")]
    NoWorksheet,
}

impl From<calamine::Error> for ParseError {
    fn from(err: calamine::Error) -> Self {
        ParseError::Spreadsheet(err.to_string())
    }
}

// =============================================================================
// Registry Errors
// =============================================================================

/// Errors while loading or compiling the schema documents.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A single schema could not be fetched.
    #[error("Failed to fetch schema {url}: {message}")]
    Fetch { url: String, message: String },

    /// A schema was fetched but is not usable JSON.
    #[error("Schema {source_name} is not valid JSON: {message}")]
    InvalidDocument { source_name: String, message: String },

    /// A schema document carries no `$id`.
    #[error("Schema {0} has no $id")]
    MissingId(String),

    /// None of the schema documents could be loaded.
    #[error("Schemas unavailable: none of the {attempted} schema documents could be loaded. An internet connection is required to validate files.")]
    Unavailable { attempted: usize },

    /// The root schema was not among the loaded documents.
    #[error("Root schema '{0}' could not be loaded")]
    MissingRootSchema(String),

    /// The documents were loaded but do not compile together.
    #[error("Schema compilation failed: {0}")]
    Compile(String),

    /// The HTTP client could not be set up.
    #[error("HTTP client error: {0}")]
    Client(String),

    /// Local schema directory could not be read.
    #[error("Schema IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RegistryError {
    /// True when the failure means "no connectivity" rather than a broken
    /// schema set.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, RegistryError::Unavailable { .. })
    }
}

// =============================================================================
// Aggregation Errors
// =============================================================================

/// Unexpected failures inside the validation aggregator.
///
/// These never describe invalid data; they surface verbatim in the report.
#[derive(Debug, Error)]
pub enum AggregationError {
    /// A transformed feature could not be turned into JSON.
    #[error("Failed to serialize row {row}: {source}")]
    Serialize {
        row: usize,
        #[source]
        source: serde_json::Error,
    },
}

// =============================================================================
// Session Errors
// =============================================================================

/// Errors from driving the upload state machine out of order.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Schemas failed to load; validation is blocked for this session.
    #[error("Validation is blocked: {0}")]
    SchemasUnavailable(String),

    /// Schemas have not been loaded yet.
    #[error("Schemas are not loaded yet")]
    NotReady,

    /// `continue_without_template` was called with no pending workbook.
    #[error("No spreadsheet is waiting for a template decision")]
    NoPendingDecision,
}

// =============================================================================
// Outbound Errors
// =============================================================================

/// Why the download or the mail draft cannot be produced.
#[derive(Debug, Error)]
pub enum OutboundError {
    /// No outcome with data is held.
    #[error("There is no validated data to export")]
    NoData,

    /// Mail drafts need a tabular upload that validated without errors.
    #[error("A mail draft is only available after a CSV or Excel upload validated without errors")]
    NotValidTabular,

    /// The validated upload holds no records.
    #[error("The validated data holds no project locations")]
    NoRecords,

    /// A record carries no project number.
    #[error("Feature {0} has no kfwProjectNoINPRO")]
    MissingProjectNumber(usize),

    /// The collection could not be written as GeoJSON.
    #[error("Failed to serialize GeoJSON: {0}")]
    Serialize(#[from] serde_json::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for parsing.
pub type ParseResult<T> = Result<T, ParseError>;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Result type for session transitions.
pub type SessionResult<T> = Result<T, SessionError>;

/// Result type for download and mail draft.
pub type OutboundResult<T> = Result<T, OutboundError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_error_converts_to_parse_error() {
        let csv_err = CsvError::new(3, "unterminated quote");
        let parse_err: ParseError = csv_err.into();
        assert!(parse_err.to_string().contains("Line 3"));
    }

    #[test]
    fn test_unavailable_is_connectivity() {
        let err = RegistryError::Unavailable { attempted: 4 };
        assert!(err.is_connectivity());
        assert!(err.to_string().contains("internet connection"));

        let err = RegistryError::MissingRootSchema("feature_project_schema.json".into());
        assert!(!err.is_connectivity());
        assert!(err.to_string().contains("feature_project_schema.json"));
    }
}
