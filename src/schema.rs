//! Subject registration entries
//!
//! `SubjectConfig` is the raw, deserialized form of one `[[subjects]]` table.
//! [`plan`] validates a whole list of them up front and turns it into
//! [`RegistrationEntry`] values, so nothing malformed ever reaches the network.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::checksum::Checksum;
use crate::error::{RegistrarError, Result};

/// Version number meaning "latest registered version"
pub const LATEST_VERSION: i32 = -1;

/// Format of a schema as understood by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SchemaFormat {
    Protobuf,
    Avro,
    Json,
}

impl SchemaFormat {
    /// Value of the `schemaType` field in registration requests
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaFormat::Protobuf => "PROTOBUF",
            SchemaFormat::Avro => "AVRO",
            SchemaFormat::Json => "JSON",
        }
    }
}

impl fmt::Display for SchemaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemaFormat {
    type Err = RegistrarError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PROTOBUF" => Ok(SchemaFormat::Protobuf),
            "AVRO" => Ok(SchemaFormat::Avro),
            "JSON" => Ok(SchemaFormat::Json),
            other => Err(RegistrarError::invalid(format!(
                "unknown schema format \"{}\" (expected PROTOBUF, AVRO or JSON)",
                other
            ))),
        }
    }
}

/// A reference from one schema to another, already registered, schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaReference {
    /// Import name used inside the referencing schema (e.g. "claimStatus.proto")
    pub name: String,
    /// Subject the referenced schema is registered under
    pub subject: String,
    /// Version of the referenced subject; -1 for latest
    #[serde(default = "default_version")]
    pub version: i32,
}

impl SchemaReference {
    pub fn new(name: impl Into<String>, subject: impl Into<String>, version: i32) -> Self {
        Self {
            name: name.into(),
            subject: subject.into(),
            version,
        }
    }

    /// Whether this reference should be resolved to the latest version
    pub fn is_latest(&self) -> bool {
        self.version == LATEST_VERSION
    }
}

/// One `[[subjects]]` entry as written in the configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectConfig {
    /// Subject name in the registry
    #[serde(default)]
    pub subject: String,

    /// Schema source file
    pub path: PathBuf,

    /// Schema format (PROTOBUF, AVRO or JSON)
    #[serde(default = "default_format")]
    pub format: String,

    /// Schemas this one imports
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<SchemaReference>,
}

impl SubjectConfig {
    pub fn new(subject: impl Into<String>, path: impl Into<PathBuf>, format: SchemaFormat) -> Self {
        Self {
            subject: subject.into(),
            path: path.into(),
            format: format.as_str().to_string(),
            references: Vec::new(),
        }
    }

    /// Add a reference, builder style
    pub fn add_reference(mut self, name: impl Into<String>, subject: impl Into<String>, version: i32) -> Self {
        self.references.push(SchemaReference::new(name, subject, version));
        self
    }

    /// Validate this entry and resolve its path against `schema_root`
    pub fn to_entry(&self, schema_root: Option<&Path>) -> Result<RegistrationEntry> {
        let subject = self.subject.trim();
        if subject.is_empty() {
            return Err(RegistrarError::invalid(format!(
                "entry for {:?} has an empty subject",
                self.path
            )));
        }

        let format: SchemaFormat = self.format.parse().map_err(|e: RegistrarError| {
            RegistrarError::invalid(format!("subject \"{}\": {}", subject, strip_prefix(&e)))
        })?;

        if self.path.as_os_str().is_empty() {
            return Err(RegistrarError::invalid(format!(
                "subject \"{}\" has an empty schema path",
                subject
            )));
        }

        for reference in &self.references {
            if reference.name.trim().is_empty() || reference.subject.trim().is_empty() {
                return Err(RegistrarError::invalid(format!(
                    "subject \"{}\" has a reference with an empty name or subject",
                    subject
                )));
            }
            if reference.version != LATEST_VERSION && reference.version < 1 {
                return Err(RegistrarError::invalid(format!(
                    "subject \"{}\": reference \"{}\" has version {} (expected -1 or >= 1)",
                    subject, reference.name, reference.version
                )));
            }
        }

        let schema_path = match schema_root {
            Some(root) if self.path.is_relative() => root.join(&self.path),
            _ => self.path.clone(),
        };

        Ok(RegistrationEntry {
            subject: subject.to_string(),
            schema_path,
            format,
            references: self.references.clone(),
        })
    }
}

/// A validated entry, ready to be registered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationEntry {
    pub subject: String,
    pub schema_path: PathBuf,
    pub format: SchemaFormat,
    pub references: Vec<SchemaReference>,
}

impl RegistrationEntry {
    /// Read the schema source as UTF-8 text
    pub fn read_schema(&self) -> Result<SchemaSource> {
        let text = fs::read_to_string(&self.schema_path).map_err(|cause| {
            RegistrarError::SchemaFileNotFound {
                subject: self.subject.clone(),
                path: self.schema_path.clone(),
                cause,
            }
        })?;
        let checksum = Checksum::of_text(&text);
        Ok(SchemaSource { text, checksum })
    }
}

/// Schema text together with its fingerprint
#[derive(Debug, Clone)]
pub struct SchemaSource {
    pub text: String,
    pub checksum: Checksum,
}

/// Validate every configured subject before anything is sent.
///
/// Fails on the first malformed entry. References to subjects that are only
/// declared further down the list are allowed (the registry may already know
/// them) but logged, since entries are never reordered.
pub fn plan(subjects: &[SubjectConfig], schema_root: Option<&Path>) -> Result<Vec<RegistrationEntry>> {
    let entries = subjects
        .iter()
        .map(|s| s.to_entry(schema_root))
        .collect::<Result<Vec<_>>>()?;

    let mut seen: HashSet<&str> = HashSet::new();
    for (index, entry) in entries.iter().enumerate() {
        for reference in &entry.references {
            let declared_later = entries[index + 1..]
                .iter()
                .any(|later| later.subject == reference.subject);
            if !seen.contains(reference.subject.as_str()) && declared_later {
                tracing::warn!(
                    subject = %entry.subject,
                    reference = %reference.subject,
                    "reference points at a subject declared later in the list"
                );
            }
        }
        seen.insert(entry.subject.as_str());
    }

    Ok(entries)
}

fn strip_prefix(err: &RegistrarError) -> String {
    match err {
        RegistrarError::InvalidConfiguration(msg) => msg.clone(),
        other => other.to_string(),
    }
}

fn default_version() -> i32 {
    LATEST_VERSION
}

fn default_format() -> String {
    SchemaFormat::Protobuf.as_str().to_string()
}
