//! Schema Registry - fetch the schema documents and compile them together.
//!
//! Loading is best-effort: every document is requested concurrently, a
//! document that fails to download or parse is logged and left out, and
//! compilation runs over whatever arrived. Only when *nothing* arrived is the
//! load reported as [`RegistryError::Unavailable`], which callers treat as
//! "no connectivity" and block on.
//!
//! # Example
//!
//! ```rust,ignore
//! use ogm_validator::{SchemaRegistry, ValidatorConfig};
//!
//! let config = ValidatorConfig::from_env();
//! let registry = SchemaRegistry::new(&config)?;
//! let validator = registry.load(&config.schema_urls()).await?;
//! ```

use std::path::Path;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::config::ValidatorConfig;
use crate::error::{RegistryError, RegistryResult};
use crate::validation::{CompiledValidator, SchemaDocument};

/// Documents that arrived plus the failures for those that did not.
#[derive(Debug, Default)]
pub struct LoadedDocuments {
    pub documents: Vec<SchemaDocument>,
    pub failures: Vec<RegistryError>,
}

impl LoadedDocuments {
    fn push(&mut self, result: RegistryResult<SchemaDocument>) {
        match result {
            Ok(doc) => {
                debug!(id = %doc.id, source = %doc.source, "Schema loaded");
                self.documents.push(doc);
            }
            Err(e) => {
                warn!(error = %e, "Schema skipped");
                self.failures.push(e);
            }
        }
    }

    /// Compile what arrived against `root_id`.
    pub fn compile(self, root_id: &str) -> RegistryResult<CompiledValidator> {
        if self.documents.is_empty() {
            return Err(RegistryError::Unavailable {
                attempted: self.failures.len(),
            });
        }

        let validator = CompiledValidator::compile(self.documents, root_id)?;
        info!(
            root = root_id,
            schemas = validator.schema_ids().len(),
            skipped = self.failures.len(),
            "Schemas compiled"
        );
        Ok(validator)
    }
}

/// Loads schema documents over HTTP or from a local mirror.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    client: reqwest::Client,
    root_id: String,
    schema_files: Vec<String>,
}

impl SchemaRegistry {
    pub fn new(config: &ValidatorConfig) -> RegistryResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .build()
            .map_err(|e| RegistryError::Client(e.to_string()))?;

        Ok(Self {
            client,
            root_id: config.root_schema_id.clone(),
            schema_files: config.schema_files.clone(),
        })
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    /// Fetch and parse one document.
    pub async fn fetch(&self, url: &str) -> RegistryResult<SchemaDocument> {
        let fetch_error = |e: reqwest::Error| RegistryError::Fetch {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(fetch_error)?
            .error_for_status()
            .map_err(fetch_error)?;
        let body = response.bytes().await.map_err(fetch_error)?;

        SchemaDocument::from_slice(url, &body)
    }

    /// Fetch every URL concurrently and wait for all of them.
    pub async fn fetch_all(&self, urls: &[String]) -> LoadedDocuments {
        let results = join_all(urls.iter().map(|url| self.fetch(url))).await;

        let mut loaded = LoadedDocuments::default();
        for result in results {
            loaded.push(result);
        }
        loaded
    }

    /// Fetch the documents and compile them.
    pub async fn load(&self, urls: &[String]) -> RegistryResult<CompiledValidator> {
        self.fetch_all(urls).await.compile(&self.root_id)
    }

    /// Read the configured schema files from a local directory.
    pub async fn read_dir(&self, dir: &Path) -> RegistryResult<LoadedDocuments> {
        tokio::fs::metadata(dir).await?;

        let mut loaded = LoadedDocuments::default();
        for file in &self.schema_files {
            let path = dir.join(file);
            let source = path.display().to_string();
            let result = match tokio::fs::read(&path).await {
                Ok(bytes) => SchemaDocument::from_slice(source, &bytes),
                Err(e) => Err(RegistryError::Fetch {
                    url: source,
                    message: e.to_string(),
                }),
            };
            loaded.push(result);
        }
        Ok(loaded)
    }

    /// Read the configured schema files from a local directory and compile
    /// them, with the same best-effort policy as [`SchemaRegistry::load`].
    pub async fn load_dir(&self, dir: &Path) -> RegistryResult<CompiledValidator> {
        self.read_dir(dir).await?.compile(&self.root_id)
    }
}
