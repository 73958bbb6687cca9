//! Schema Registrar
//!
//! Registers schema files (protobuf, Avro, JSON Schema) under their subjects
//! in a Confluent-compatible Schema Registry.
//!
//! ## Features
//!
//! - **Declarative**: subjects, files, formats and references live in a TOML table
//! - **Ordered**: entries are registered in declaration order, never reordered
//! - **Fail-fast**: the first failing entry stops the run, with subject and cause
//! - **Reference pinning**: `version = -1` references are resolved to the latest version
//! - **Env override**: `SCHEMA_REGISTRY_URL` replaces the configured registry URL
//!
//! ## Flow
//!
//! ```text
//! registrar.toml ──► RegistrarConfig ──► plan() ──► [RegistrationEntry]
//!                          │                               │
//!        SCHEMA_REGISTRY_URL ──► RegistryTarget ──► Registrar::run ──► RunReport
//!                                                          │
//!                                      POST /subjects/{subject}/versions
//! ```

pub mod checksum;
pub mod client;
pub mod config;
pub mod error;
pub mod registrar;
pub mod schema;

pub use checksum::Checksum;
pub use client::{HttpRegistryClient, RegisterRequest, RegisteredSchema, SchemaRegistryApi, SubjectVersion};
pub use config::{RegistrarConfig, RegistryConfig, RegistryTarget, REGISTRY_URL_ENV};
pub use error::{RegistrarError, Result};
pub use registrar::{EntryFailure, Registrar, RegistrationOutcome, RunReport};
pub use schema::{plan, RegistrationEntry, SchemaFormat, SchemaReference, SubjectConfig};
