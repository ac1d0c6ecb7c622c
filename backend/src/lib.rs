//! # OGM Validator - project location validation against the Open Geodata Model
//!
//! Takes one uploaded file of project locations (GeoJSON, CSV or an Excel
//! workbook), turns tabular rows into GeoJSON Point features, validates
//! every record against the published `feature_project_schema.json` and
//! reports which records failed and why.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌──────────────────┐
//! │ Upload      │────▶│   Parser    │────▶│  Transform  │────▶│  Validation      │
//! │ (json/csv/  │     │ (auto-enc,  │     │ (rows ->    │     │ (schema registry │
//! │  xls/xlsx)  │     │  sheets)    │     │  features)  │     │  + report)       │
//! └─────────────┘     └─────────────┘     └─────────────┘     └──────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ogm_validator::{SchemaRegistry, Session, UploadedFile, ValidatorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ValidatorConfig::from_env();
//!     let registry = SchemaRegistry::new(&config)?;
//!     let mut session = Session::new(config);
//!     session.load_schemas(&registry).await?;
//!
//!     let bytes = std::fs::read("locations.csv")?;
//!     session.upload(UploadedFile::new("locations.csv", "text/csv", bytes))?;
//!     if let Some(outcome) = session.outcome() {
//!         println!("{}", outcome.report_text());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per layer
//! - [`config`] - Schema source and spreadsheet layout settings
//! - [`models`] - Location features, collections and outcomes
//! - [`parser`] - GeoJSON, CSV and workbook parsing
//! - [`transform`] - Row to feature transformation
//! - [`validation`] - Compiled schema validator and report aggregation
//! - [`registry`] - Schema document loading
//! - [`session`] - Upload state machine, download and mail draft
//! - [`logs`] - Session progress feed

// Core modules
pub mod config;
pub mod error;
pub mod logs;
pub mod models;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Validation
pub mod registry;
pub mod validation;

// Session
pub mod session;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    AggregationError, OutboundError, ParseError, RegistryError, SessionError,
};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::ValidatorConfig;

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    FeatureCollection,
    LocationFeature,
    LocationProperties,
    OutcomeStatus,
    PointGeometry,
    RawRow,
    ValidationMode,
    ValidationOutcome,
};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{
    parse_csv_bytes,
    parse_csv_str,
    parse_geojson,
    detect_encoding,
    detect_delimiter,
    decode_content,
    CsvError,
    CsvTable,
    GeoJsonDocument,
    Workbook,
};

// =============================================================================
// Re-exports - Transformation
// =============================================================================

pub use transform::{
    from_csv_row,
    from_spreadsheet_row,
    transform_csv_rows,
    transform_spreadsheet_rows,
};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{
    CompiledValidator,
    SchemaDocument,
    ValidationError,
    Verdict,
    validate_collection,
    validate_feature,
    validate_rows,
};

pub use registry::SchemaRegistry;

// =============================================================================
// Re-exports - Session
// =============================================================================

pub use logs::{LogBroadcaster, LogEntry, LogLevel};

pub use session::{
    DownloadArtifact,
    InputKind,
    MailDraft,
    Session,
    SessionState,
    StructuralWarning,
    UploadedFile,
};
