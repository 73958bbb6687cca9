//! Sequential schema registration
//!
//! Entries are registered one at a time, in declaration order, because later
//! entries may reference subjects registered by earlier ones.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::checksum::Checksum;
use crate::client::{HttpRegistryClient, RegisterRequest, SchemaRegistryApi};
use crate::config::RegistryTarget;
use crate::error::{RegistrarError, Result};
use crate::schema::{RegistrationEntry, SchemaFormat, SchemaReference};

/// Result of registering a single entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationOutcome {
    pub subject: String,
    pub schema_path: PathBuf,
    pub format: SchemaFormat,
    pub checksum: Checksum,
    /// References as sent, with "latest" resolved to a concrete version
    pub references: Vec<SchemaReference>,
    pub id: Option<i64>,
    pub version: Option<i32>,
}

/// A failed entry, as recorded in the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryFailure {
    pub subject: String,
    pub schema_path: PathBuf,
    pub kind: String,
    pub message: String,
    pub retryable: bool,
}

/// Everything that happened during a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub registry_url: String,
    pub registered: Vec<RegistrationOutcome>,
    pub failed: Vec<EntryFailure>,
    /// Subjects never attempted because the run stopped early
    pub not_attempted: Vec<String>,
}

impl RunReport {
    pub fn new(registry_url: impl Into<String>) -> Self {
        Self {
            generated_at: Utc::now(),
            registry_url: registry_url.into(),
            registered: Vec::new(),
            failed: Vec::new(),
            not_attempted: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.not_attempted.is_empty()
    }
}

/// Registers entries against a registry
pub struct Registrar<C> {
    client: C,
    quiet: bool,
    continue_on_error: bool,
}

impl Registrar<HttpRegistryClient> {
    /// Registrar talking HTTP to `target`
    pub fn connect(target: RegistryTarget) -> Result<Self> {
        let quiet = target.quiet;
        let client = HttpRegistryClient::new(target)?;
        Ok(Self::new(client).quiet(quiet))
    }
}

impl<C: SchemaRegistryApi> Registrar<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            quiet: false,
            continue_on_error: false,
        }
    }

    /// Suppress per-entry success output
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Record failures and keep going instead of stopping at the first one
    pub fn continue_on_error(mut self, enabled: bool) -> Self {
        self.continue_on_error = enabled;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Register all entries, returning the report or the first error
    pub fn register_all(&self, entries: &[RegistrationEntry]) -> Result<RunReport> {
        let mut report = RunReport::new(self.client.base_url());
        self.run(entries, &mut report)?;
        Ok(report)
    }

    /// Register all entries in order, filling `report` as the run progresses.
    ///
    /// Returns the first error. Unless continue-on-error is enabled, nothing
    /// after the failing entry is attempted.
    pub fn run(&self, entries: &[RegistrationEntry], report: &mut RunReport) -> Result<()> {
        let mut first_error = None;

        for (index, entry) in entries.iter().enumerate() {
            match self.register(entry) {
                Ok(outcome) => report.registered.push(outcome),
                Err(err) => {
                    tracing::error!(
                        subject = %entry.subject,
                        path = %entry.schema_path.display(),
                        "Failed to register schema: {}",
                        err
                    );
                    report.failed.push(EntryFailure {
                        subject: entry.subject.clone(),
                        schema_path: entry.schema_path.clone(),
                        kind: err.kind().to_string(),
                        message: err.to_string(),
                        retryable: err.is_retryable(),
                    });

                    if !self.continue_on_error {
                        report.not_attempted = entries[index + 1..]
                            .iter()
                            .map(|e| e.subject.clone())
                            .collect();
                        return Err(err);
                    }
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Register a single entry
    pub fn register(&self, entry: &RegistrationEntry) -> Result<RegistrationOutcome> {
        let source = entry.read_schema()?;
        let references = self.resolve_references(entry)?;

        let request = RegisterRequest {
            schema_type: entry.format,
            schema: source.text,
            references,
        };
        let registered = self.client.register(&entry.subject, &request)?;

        let id = registered
            .id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "n/a".to_string());
        if self.quiet {
            tracing::debug!(subject = %entry.subject, %id, "Registered schema");
        } else {
            tracing::info!(
                checksum = %source.checksum.short(),
                "Registered schema \"{}\" with id: {}",
                entry.subject,
                id
            );
        }

        Ok(RegistrationOutcome {
            subject: entry.subject.clone(),
            schema_path: entry.schema_path.clone(),
            format: entry.format,
            checksum: source.checksum,
            references: request.references,
            id: registered.id,
            version: registered.version,
        })
    }

    /// Pin every "latest" reference to the version currently registered
    fn resolve_references(&self, entry: &RegistrationEntry) -> Result<Vec<SchemaReference>> {
        entry
            .references
            .iter()
            .map(|reference| -> Result<SchemaReference> {
                if !reference.is_latest() {
                    return Ok(reference.clone());
                }
                let latest = self
                    .client
                    .latest_version(&reference.subject)
                    .map_err(|err| match err {
                        RegistrarError::RegistrationRejected { status, error_code, message, .. } => {
                            RegistrarError::RegistrationRejected {
                                subject: entry.subject.clone(),
                                status,
                                error_code,
                                message: format!(
                                    "reference \"{}\" to subject \"{}\" cannot be resolved: {}",
                                    reference.name, reference.subject, message
                                ),
                            }
                        }
                        other => other,
                    })?;
                tracing::debug!(
                    subject = %entry.subject,
                    reference = %reference.subject,
                    version = latest.version,
                    "resolved latest reference"
                );
                Ok(SchemaReference::new(&reference.name, &reference.subject, latest.version))
            })
            .collect()
    }
}
