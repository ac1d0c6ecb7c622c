//! JSON Schema validation for project locations.
//!
//! The schema graph is a handful of Draft 7 documents that `$ref` each other
//! by relative `$id`. They are compiled together, once, into a
//! [`CompiledValidator`]; every record of a session goes through that same
//! instance.
//!
//! # Example
//!
//! ```rust,ignore
//! use ogm_validator::validation::{CompiledValidator, SchemaDocument};
//!
//! let validator = CompiledValidator::compile(documents, "feature_project_schema.json")?;
//! let verdict = validator.validate(&feature);
//! for error in &verdict.errors {
//!     println!("{} {}: {}", error.code, error.path, error.message);
//! }
//! ```

pub mod report;

pub use report::{
    format_errors, is_coordinate_error, validate_collection, validate_feature, validate_rows,
    RecordRef, COORDINATE_SUMMARY,
};

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{RegistryError, RegistryResult};

/// Base URI relative `$id`s resolve against.
const DEFAULT_BASE_URI: &str = "json-schema:///";

// =============================================================================
// Schema Documents
// =============================================================================

/// One loaded schema document.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDocument {
    /// The document's `$id`.
    pub id: String,
    /// URL or path it was loaded from.
    pub source: String,
    pub contents: Value,
}

impl SchemaDocument {
    /// Wrap parsed JSON, reading the `$id` from the document itself.
    pub fn from_value(source: impl Into<String>, contents: Value) -> RegistryResult<Self> {
        let source = source.into();
        let id = contents
            .get("$id")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| RegistryError::MissingId(source.clone()))?;

        Ok(Self { id, source, contents })
    }

    /// Parse raw bytes into a document.
    pub fn from_slice(source: impl Into<String>, bytes: &[u8]) -> RegistryResult<Self> {
        let source = source.into();
        let contents: Value =
            serde_json::from_slice(bytes).map_err(|e| RegistryError::InvalidDocument {
                source_name: source.clone(),
                message: e.to_string(),
            })?;
        Self::from_value(source, contents)
    }

    /// URI under which sibling documents can `$ref` this one.
    fn resource_uri(&self) -> String {
        if self.id.contains(':') {
            self.id.clone()
        } else {
            format!("{}{}", DEFAULT_BASE_URI, self.id.trim_start_matches('/'))
        }
    }
}

// =============================================================================
// Verdicts
// =============================================================================

/// One schema violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    /// JSON pointer to the offending instance location; empty for the root.
    pub path: String,
    pub message: String,
    /// Keyword that failed (`required`, `type`, `oneOf`, ...).
    pub code: String,
}

/// Result of validating one value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
}

// =============================================================================
// Compiled Validator
// =============================================================================

/// All schema documents of a session, compiled against one root.
#[derive(Debug, Clone)]
pub struct CompiledValidator {
    validator: jsonschema::Validator,
    documents: Vec<SchemaDocument>,
    root_id: String,
}

impl CompiledValidator {
    /// Register every document and compile the one whose `$id` is `root_id`.
    ///
    /// Format keywords (`date`, `email`, ...) are enforced.
    pub fn compile(documents: Vec<SchemaDocument>, root_id: &str) -> RegistryResult<Self> {
        let root = documents
            .iter()
            .find(|doc| doc.id == root_id)
            .ok_or_else(|| RegistryError::MissingRootSchema(root_id.to_string()))?;

        let mut options = jsonschema::options().should_validate_formats(true);
        for doc in documents.iter().filter(|doc| doc.id != root_id) {
            debug!(id = %doc.id, uri = %doc.resource_uri(), "Registering schema");
            options = options.with_resource(
                doc.resource_uri(),
                jsonschema::Resource::from_contents(doc.contents.clone()),
            );
        }

        let validator = options
            .build(&root.contents)
            .map_err(|e| RegistryError::Compile(e.to_string()))?;

        Ok(Self {
            validator,
            root_id: root_id.to_string(),
            documents,
        })
    }

    /// Validate against the root schema, collecting every violation.
    pub fn validate(&self, value: &Value) -> Verdict {
        let errors: Vec<ValidationError> = self
            .validator
            .iter_errors(value)
            .map(|e| ValidationError {
                path: e.instance_path().as_str().to_string(),
                message: e.to_string(),
                code: keyword_of(e.schema_path().as_str()),
            })
            .collect();

        Verdict {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Look a loaded document up by `$id`.
    pub fn schema(&self, id: &str) -> Option<&SchemaDocument> {
        self.documents.iter().find(|doc| doc.id == id)
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    /// Ids of every registered document, in load order.
    pub fn schema_ids(&self) -> Vec<&str> {
        self.documents.iter().map(|doc| doc.id.as_str()).collect()
    }
}

/// Last segment of a keyword location, ignoring array indices.
fn keyword_of(schema_path: &str) -> String {
    schema_path
        .rsplit('/')
        .find(|segment| !segment.is_empty() && !segment.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! The bundled schema set, for tests.

    use super::*;

    pub const SCHEMAS: [(&str, &str); 4] = [
        ("sector_location_schema.json", include_str!("../../schemas/sector_location_schema.json")),
        ("dac5_schema.json", include_str!("../../schemas/dac5_schema.json")),
        ("feature_project_schema.json", include_str!("../../schemas/feature_project_schema.json")),
        ("project_core_schema.json", include_str!("../../schemas/project_core_schema.json")),
    ];

    pub fn documents() -> Vec<SchemaDocument> {
        SCHEMAS
            .iter()
            .map(|(name, text)| SchemaDocument::from_slice(*name, text.as_bytes()).unwrap())
            .collect()
    }

    pub fn validator() -> CompiledValidator {
        CompiledValidator::compile(documents(), "feature_project_schema.json").unwrap()
    }

    pub fn valid_feature() -> Value {
        serde_json::json!({
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": [36.8219, -1.2921] },
            "properties": {
                "kfwProjectNoINPRO": "2019 65 123",
                "budgetShare": 40.0,
                "dac5PurposeCode": 14020,
                "sector_location": { "sector": "Water and Sanitation", "location_type": "Well" },
                "plannedOrActualStartDate": "2023-03-15"
            }
        })
    }
}
