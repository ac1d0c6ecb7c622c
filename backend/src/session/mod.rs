//! Upload session: the state machine driving one user's uploads.
//!
//! ```text
//! Idle -> SchemasLoading -> Ready ----upload----> Validating -> Resolved
//!                        \-> Blocked                 \-> AwaitingTemplateDecision
//! ```
//!
//! A session owns its compiled validator and its progress feed. Every
//! upload ends in exactly one of: a [`ValidationOutcome`], a pending
//! template decision, or a [`SessionError`] when schemas are missing.

pub mod outbound;

pub use outbound::{DownloadArtifact, MailDraft};

use std::path::Path;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use crate::config::ValidatorConfig;
use crate::error::{OutboundError, OutboundResult, RegistryError, SessionError, SessionResult};
use crate::logs::{LogBroadcaster, LogEntry};
use crate::models::{LocationFeature, ValidationOutcome};
use crate::parser::{parse_csv_bytes, parse_geojson, GeoJsonDocument, Workbook};
use crate::registry::{LoadedDocuments, SchemaRegistry};
use crate::transform::{transform_csv_rows, transform_spreadsheet_rows};
use crate::validation::{validate_collection, validate_feature, validate_rows, CompiledValidator};

// =============================================================================
// Input Kinds
// =============================================================================

pub const MEDIA_TYPE_JSON: &str = "application/json";
pub const MEDIA_TYPE_CSV: &str = "text/csv";
pub const MEDIA_TYPE_XLS: &str = "application/vnd.ms-excel";
pub const MEDIA_TYPE_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const GEOJSON_PARSE_ERROR: &str = "Error parsing GeoJSON file.";
const CSV_PARSE_ERROR: &str = "Error parsing CSV file.";
const EXCEL_PARSE_ERROR: &str = "Error parsing Excel file.";
const NOT_A_FEATURE: &str = "Error: GeoJSON file must be a Feature or FeatureCollection.";

/// The upload kinds the session accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    GeoJson,
    Csv,
    Spreadsheet,
}

impl InputKind {
    /// Kind for a declared media type; parameters such as `charset` are
    /// ignored.
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        let essence = media_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            MEDIA_TYPE_JSON => Some(InputKind::GeoJson),
            MEDIA_TYPE_CSV => Some(InputKind::Csv),
            MEDIA_TYPE_XLS | MEDIA_TYPE_XLSX => Some(InputKind::Spreadsheet),
            _ => None,
        }
    }

    /// Media type a browser would declare for this file name.
    pub fn media_type_for_path(path: &Path) -> Option<&'static str> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "json" | "geojson" => Some(MEDIA_TYPE_JSON),
            "csv" => Some(MEDIA_TYPE_CSV),
            "xls" => Some(MEDIA_TYPE_XLS),
            "xlsx" => Some(MEDIA_TYPE_XLSX),
            _ => None,
        }
    }
}

/// One uploaded file as the session receives it.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }
}

// =============================================================================
// States
// =============================================================================

/// A spreadsheet that does not look like the official template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralWarning {
    pub file_name: String,
    pub expected_sheet: String,
    pub found_sheets: Vec<String>,
}

impl StructuralWarning {
    pub fn message(&self) -> String {
        format!(
            "The file '{}' does not use the Excel template: its second sheet should be named '{}' (found: {}). \
             Continue only if the location data is on the second sheet below two title rows.",
            self.file_name,
            self.expected_sheet,
            self.found_sheets.join(", ")
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    SchemasLoading,
    Ready,
    /// Schemas could not be loaded; every upload is refused.
    Blocked { reason: String },
    Validating,
    /// A spreadsheet is parked until the user decides whether to continue.
    AwaitingTemplateDecision(StructuralWarning),
    Resolved(ValidationOutcome),
}

// =============================================================================
// Session
// =============================================================================

struct PendingWorkbook {
    file_name: String,
    workbook: Workbook,
}

/// One validation session.
pub struct Session {
    config: ValidatorConfig,
    validator: Option<Arc<CompiledValidator>>,
    state: SessionState,
    pending: Option<PendingWorkbook>,
    /// Why the last schema load failed, while no validator is installed.
    blocked: Option<String>,
    logs: LogBroadcaster,
}

impl Session {
    pub fn new(config: ValidatorConfig) -> Self {
        Self {
            config,
            validator: None,
            state: SessionState::Idle,
            pending: None,
            blocked: None,
            logs: LogBroadcaster::new(),
        }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn validator(&self) -> Option<&Arc<CompiledValidator>> {
        self.validator.as_ref()
    }

    /// The outcome of the last upload, once resolved.
    pub fn outcome(&self) -> Option<&ValidationOutcome> {
        match &self.state {
            SessionState::Resolved(outcome) => Some(outcome),
            _ => None,
        }
    }

    /// Live progress messages for this session.
    pub fn subscribe_logs(&self) -> broadcast::Receiver<LogEntry> {
        self.logs.subscribe()
    }

    // -------------------------------------------------------------------------
    // Schemas
    // -------------------------------------------------------------------------

    /// Use an already compiled validator.
    pub fn install_validator(&mut self, validator: Arc<CompiledValidator>) {
        self.logs.success(format!(
            "Schemas ready ({} documents)",
            validator.schema_ids().len()
        ));
        self.validator = Some(validator);
        self.blocked = None;
        self.state = SessionState::Ready;
    }

    /// Fetch the configured schema URLs and compile them.
    pub async fn load_schemas(&mut self, registry: &SchemaRegistry) -> SessionResult<()> {
        self.begin_schema_load();
        let urls = self.config.schema_urls();
        self.logs.info(format!("Loading {} schema documents", urls.len()));

        let loaded = registry.fetch_all(&urls).await;
        self.finish_schema_load(loaded)
    }

    /// Like [`Session::load_schemas`], from a local mirror directory.
    pub async fn load_schemas_from_dir(&mut self, registry: &SchemaRegistry, dir: &Path) -> SessionResult<()> {
        self.begin_schema_load();
        self.logs.info(format!("Loading schema documents from {}", dir.display()));

        match registry.read_dir(dir).await {
            Ok(loaded) => self.finish_schema_load(loaded),
            Err(e) => Err(self.block(&e)),
        }
    }

    fn begin_schema_load(&mut self) {
        self.validator = None;
        self.pending = None;
        self.blocked = None;
        self.state = SessionState::SchemasLoading;
    }

    fn finish_schema_load(&mut self, loaded: LoadedDocuments) -> SessionResult<()> {
        for failure in &loaded.failures {
            self.logs.log(LogEntry::warning(failure.to_string()).with_indent(1));
        }

        match loaded.compile(&self.config.root_schema_id) {
            Ok(validator) => {
                self.install_validator(Arc::new(validator));
                Ok(())
            }
            Err(e) => Err(self.block(&e)),
        }
    }

    fn block(&mut self, error: &RegistryError) -> SessionError {
        let reason = error.to_string();
        self.logs.error(reason.clone());
        self.blocked = Some(reason.clone());
        self.state = SessionState::Blocked {
            reason: reason.clone(),
        };
        SessionError::SchemasUnavailable(reason)
    }

    // -------------------------------------------------------------------------
    // Uploads
    // -------------------------------------------------------------------------

    /// Process one uploaded file.
    ///
    /// Any previous outcome or pending workbook is discarded first.
    pub fn upload(&mut self, file: UploadedFile) -> SessionResult<&SessionState> {
        self.pending = None;
        if matches!(self.state, SessionState::Resolved(_) | SessionState::AwaitingTemplateDecision(_)) {
            self.state = self.ready_state();
        }

        self.logs.info(format!("Received {} ({})", file.name, file.media_type));

        let Some(kind) = InputKind::from_media_type(&file.media_type) else {
            self.logs.warning("Unsupported file type");
            return Ok(self.resolve(ValidationOutcome::unsupported_input()));
        };

        let validator = self.require_validator()?;
        self.state = SessionState::Validating;
        debug!(file = %file.name, ?kind, bytes = file.bytes.len(), "Validating upload");

        let outcome = match kind {
            InputKind::GeoJson => self.process_geojson(&validator, &file.bytes),
            InputKind::Csv => self.process_csv(&validator, &file.bytes),
            InputKind::Spreadsheet => match Workbook::open(&file.bytes) {
                Err(e) => {
                    self.logs.error(e.to_string());
                    ValidationOutcome::rejected(EXCEL_PARSE_ERROR)
                }
                Ok(workbook) if !workbook.has_template_sheet(&self.config.template_sheet_name) => {
                    let warning = StructuralWarning {
                        file_name: file.name.clone(),
                        expected_sheet: self.config.template_sheet_name.clone(),
                        found_sheets: workbook.sheet_names().into_iter().map(str::to_owned).collect(),
                    };
                    self.logs.warning(warning.message());
                    self.pending = Some(PendingWorkbook {
                        file_name: file.name,
                        workbook,
                    });
                    self.state = SessionState::AwaitingTemplateDecision(warning);
                    return Ok(&self.state);
                }
                Ok(workbook) => self.process_workbook(&validator, &workbook),
            },
        };

        Ok(self.resolve(outcome))
    }

    /// Validate the parked spreadsheet despite the missing template sheet.
    pub fn continue_without_template(&mut self) -> SessionResult<&SessionState> {
        let validator = self.require_validator()?;
        let pending = self.pending.take().ok_or(SessionError::NoPendingDecision)?;

        self.logs.info(format!("Continuing with {} without the template sheet", pending.file_name));
        self.state = SessionState::Validating;
        let outcome = self.process_workbook(&validator, &pending.workbook);
        Ok(self.resolve(outcome))
    }

    /// Abandon the parked spreadsheet.
    pub fn dismiss_structural_warning(&mut self) -> SessionResult<()> {
        let pending = self.pending.take().ok_or(SessionError::NoPendingDecision)?;
        self.logs.info(format!("Discarded {}", pending.file_name));
        self.state = self.ready_state();
        Ok(())
    }

    /// Clear the outcome and any parked upload.
    pub fn reset(&mut self) {
        self.pending = None;
        if !matches!(self.state, SessionState::SchemasLoading) {
            self.state = self.ready_state();
        }
    }

    // -------------------------------------------------------------------------
    // Outbound
    // -------------------------------------------------------------------------

    /// The processed collection as a downloadable file.
    pub fn download(&self) -> OutboundResult<DownloadArtifact> {
        DownloadArtifact::from_outcome(self.outcome().ok_or(OutboundError::NoData)?)
    }

    /// A mail draft listing the validated project numbers.
    pub fn mail_draft(&self) -> OutboundResult<MailDraft> {
        MailDraft::from_outcome(self.outcome().ok_or(OutboundError::NotValidTabular)?)
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn ready_state(&self) -> SessionState {
        match (&self.validator, &self.blocked) {
            (Some(_), _) => SessionState::Ready,
            (None, Some(reason)) => SessionState::Blocked {
                reason: reason.clone(),
            },
            (None, None) => SessionState::Idle,
        }
    }

    fn require_validator(&self) -> SessionResult<Arc<CompiledValidator>> {
        match (&self.validator, &self.blocked) {
            (Some(validator), _) => Ok(Arc::clone(validator)),
            (None, Some(reason)) => Err(SessionError::SchemasUnavailable(reason.clone())),
            (None, None) => Err(SessionError::NotReady),
        }
    }

    fn resolve(&mut self, outcome: ValidationOutcome) -> &SessionState {
        let summary = format!("{:?}: {}", outcome.status, outcome.report.first().map(String::as_str).unwrap_or(""));
        if outcome.is_valid() {
            self.logs.success(summary);
        } else {
            self.logs.warning(summary);
        }
        self.state = SessionState::Resolved(outcome);
        &self.state
    }

    fn process_geojson(&self, validator: &CompiledValidator, bytes: &[u8]) -> ValidationOutcome {
        match parse_geojson(bytes) {
            Ok(GeoJsonDocument::Feature(feature)) => validate_feature(validator, feature),
            Ok(GeoJsonDocument::FeatureCollection(features)) => {
                self.logs.info(format!("Validating {} features", features.len()));
                validate_collection(validator, features)
            }
            Ok(GeoJsonDocument::Other(_)) => ValidationOutcome::rejected(NOT_A_FEATURE),
            Err(e) => {
                self.logs.error(e.to_string());
                ValidationOutcome::rejected(GEOJSON_PARSE_ERROR)
            }
        }
    }

    fn process_csv(&self, validator: &CompiledValidator, bytes: &[u8]) -> ValidationOutcome {
        let table = match parse_csv_bytes(bytes) {
            Ok(table) => table,
            Err(e) => {
                self.logs.error(e.to_string());
                return ValidationOutcome::rejected(CSV_PARSE_ERROR);
            }
        };

        self.logs.info(format!(
            "Parsed {} rows (encoding {}, delimiter '{}')",
            table.rows.len(),
            table.encoding,
            table.delimiter
        ));
        let features = transform_csv_rows(table.rows);
        self.aggregate_rows(validator, &features)
    }

    fn process_workbook(&self, validator: &CompiledValidator, workbook: &Workbook) -> ValidationOutcome {
        let rows = match workbook.data_rows(self.config.header_offset) {
            Ok(rows) => rows,
            Err(e) => {
                self.logs.error(e.to_string());
                return ValidationOutcome::rejected(EXCEL_PARSE_ERROR);
            }
        };

        self.logs.info(format!("Read {} rows from the spreadsheet", rows.len()));
        let features = transform_spreadsheet_rows(rows);
        self.aggregate_rows(validator, &features)
    }

    fn aggregate_rows(
        &self,
        validator: &CompiledValidator,
        features: &[LocationFeature],
    ) -> ValidationOutcome {
        match validate_rows(validator, features) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.logs.error(e.to_string());
                ValidationOutcome::rejected(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OutcomeStatus;
    use crate::validation::fixtures;

    fn ready_session() -> Session {
        let mut session = Session::new(ValidatorConfig::default());
        session.install_validator(Arc::new(fixtures::validator()));
        session
    }

    #[test]
    fn test_media_types() {
        assert_eq!(InputKind::from_media_type("application/json"), Some(InputKind::GeoJson));
        assert_eq!(InputKind::from_media_type("text/csv; charset=utf-8"), Some(InputKind::Csv));
        assert_eq!(InputKind::from_media_type(MEDIA_TYPE_XLS), Some(InputKind::Spreadsheet));
        assert_eq!(InputKind::from_media_type(MEDIA_TYPE_XLSX), Some(InputKind::Spreadsheet));
        assert_eq!(InputKind::from_media_type("application/pdf"), None);
        assert_eq!(InputKind::from_media_type("application/geo+json"), None);

        assert_eq!(InputKind::media_type_for_path(Path::new("a.GeoJSON")), Some(MEDIA_TYPE_JSON));
        assert_eq!(InputKind::media_type_for_path(Path::new("a.xlsx")), Some(MEDIA_TYPE_XLSX));
        assert_eq!(InputKind::media_type_for_path(Path::new("a.txt")), None);
        assert_eq!(InputKind::media_type_for_path(Path::new("noext")), None);
    }

    #[test]
    fn test_unsupported_input_needs_no_schemas() {
        let mut session = Session::new(ValidatorConfig::default());
        let state = session
            .upload(UploadedFile::new("notes.pdf", "application/pdf", vec![1, 2, 3]))
            .unwrap();

        match state {
            SessionState::Resolved(outcome) => {
                assert_eq!(outcome.status, OutcomeStatus::UnsupportedInput);
                assert!(outcome.data.is_none());
            }
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[test]
    fn test_upload_before_schemas() {
        let mut session = Session::new(ValidatorConfig::default());
        let err = session
            .upload(UploadedFile::new("a.csv", MEDIA_TYPE_CSV, b"latitude\n1".to_vec()))
            .unwrap_err();
        assert!(matches!(err, SessionError::NotReady));
        assert_eq!(session.state(), &SessionState::Idle);
    }

    #[test]
    fn test_parse_errors_resolve_with_generic_message() {
        let mut session = ready_session();

        session
            .upload(UploadedFile::new("a.json", MEDIA_TYPE_JSON, b"{ nope".to_vec()))
            .unwrap();
        assert_eq!(session.outcome().unwrap().report, vec![GEOJSON_PARSE_ERROR]);

        session
            .upload(UploadedFile::new("a.xlsx", MEDIA_TYPE_XLSX, b"not a workbook".to_vec()))
            .unwrap();
        assert_eq!(session.outcome().unwrap().report, vec![EXCEL_PARSE_ERROR]);

        session
            .upload(UploadedFile::new("a.csv", MEDIA_TYPE_CSV, Vec::new()))
            .unwrap();
        assert_eq!(session.outcome().unwrap().report, vec![CSV_PARSE_ERROR]);
        assert_eq!(session.outcome().unwrap().status, OutcomeStatus::Invalid);
    }

    #[test]
    fn test_non_feature_geojson() {
        let mut session = ready_session();
        session
            .upload(UploadedFile::new(
                "p.json",
                MEDIA_TYPE_JSON,
                br#"{"type":"Point","coordinates":[1,2]}"#.to_vec(),
            ))
            .unwrap();

        let outcome = session.outcome().unwrap();
        assert_eq!(outcome.report, vec![NOT_A_FEATURE]);
        assert_eq!(outcome.mode, None);
    }

    #[test]
    fn test_reset_returns_to_ready() {
        let mut session = ready_session();
        session
            .upload(UploadedFile::new("a.json", MEDIA_TYPE_JSON, b"[]".to_vec()))
            .unwrap();
        assert!(session.outcome().is_some());

        session.reset();
        assert_eq!(session.state(), &SessionState::Ready);
        assert!(session.outcome().is_none());
        assert!(matches!(session.download(), Err(OutboundError::NoData)));
    }

    #[test]
    fn test_no_pending_decision() {
        let mut session = ready_session();
        assert!(matches!(
            session.continue_without_template(),
            Err(SessionError::NoPendingDecision)
        ));
        assert!(matches!(
            session.dismiss_structural_warning(),
            Err(SessionError::NoPendingDecision)
        ));
    }

    #[test]
    fn test_progress_feed() {
        let mut session = ready_session();
        let mut rx = session.subscribe_logs();
        session
            .upload(UploadedFile::new("a.pdf", "application/pdf", vec![]))
            .unwrap();

        let first = rx.try_recv().unwrap();
        assert!(first.message.contains("a.pdf"));
    }
}
