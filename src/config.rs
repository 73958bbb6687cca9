//! Configuration management for the registrar
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (registrar.toml)
//! - Environment variables (REGISTRAR__*)
//!
//! The registry URL additionally honours `SCHEMA_REGISTRY_URL`, which is read
//! once when the [`RegistryTarget`] is resolved.
//!
//! ## Example config file (registrar.toml):
//! ```toml
//! schema_root = "claims-schema-setter/src/main/resources/proto"
//!
//! [registry]
//! url = "http://localhost:58003/"
//! quiet = true
//! timeout_secs = 10
//!
//! [[subjects]]
//! subject = "claimStatus"
//! path = "claimStatus.proto"
//! format = "PROTOBUF"
//!
//! [[subjects]]
//! subject = "claim"
//! path = "claim.proto"
//! format = "PROTOBUF"
//! references = [{ name = "claimStatus.proto", subject = "claimStatus", version = -1 }]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use config_crate::{Config, Environment, File};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{RegistrarError, Result};
use crate::schema::{self, RegistrationEntry, SubjectConfig};

/// Environment variable overriding the configured registry URL
pub const REGISTRY_URL_ENV: &str = "SCHEMA_REGISTRY_URL";

/// Main configuration for a registration run
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RegistrarConfig {
    /// Directory that relative schema paths are resolved against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_root: Option<PathBuf>,

    /// Registry connection settings
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Subjects to register, in order
    #[serde(default)]
    pub subjects: Vec<SubjectConfig>,
}

/// Registry connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Base URL of the Schema Registry
    #[serde(default = "default_url")]
    pub url: String,

    /// Suppress per-entry output
    #[serde(default)]
    pub quiet: bool,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Keep going after a failed entry (the run still fails)
    #[serde(default)]
    pub continue_on_error: bool,

    /// Basic auth user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Basic auth password
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
}

fn default_url() -> String {
    "http://localhost:8081/".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            quiet: false,
            timeout_secs: default_timeout_secs(),
            continue_on_error: false,
            username: None,
            password: None,
        }
    }
}

/// Basic auth credentials for the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

/// Where and how to talk to the registry, fixed for the whole run
#[derive(Debug, Clone)]
pub struct RegistryTarget {
    pub base_url: Url,
    pub quiet: bool,
    pub timeout: Duration,
    pub credentials: Option<Credentials>,
}

impl RegistryTarget {
    /// Build a target from an explicit URL with default settings
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            quiet: false,
            timeout: Duration::from_secs(default_timeout_secs()),
            credentials: None,
        })
    }
}

impl RegistrarConfig {
    /// Load configuration, layering `config_path` over the default locations.
    ///
    /// A relative `schema_root` is taken relative to the directory of
    /// `config_path` when one is given, so a config file can live next to its
    /// schemas and be used from any working directory.
    pub fn load_from(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_locations = [
            "registrar.toml",
            ".registrar.toml",
            "config/registrar.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "registrar") {
            let xdg_config = config_dir.config_dir().join("registrar.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // REGISTRAR__REGISTRY__TIMEOUT_SECS=30 and friends
        builder = builder.add_source(
            Environment::with_prefix("REGISTRAR")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let mut loaded: Self = config.try_deserialize()?;

        let config_dir = config_path.and_then(|p| Path::new(p).parent());
        if let (Some(dir), Some(root)) = (config_dir, loaded.schema_root.as_ref()) {
            if root.is_relative() {
                loaded.schema_root = Some(dir.join(root));
            }
        }
        Ok(loaded)
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| RegistrarError::invalid(format!("cannot render configuration: {}", e)))
    }

    /// Validate all subjects into registration entries
    pub fn entries(&self) -> Result<Vec<RegistrationEntry>> {
        schema::plan(&self.subjects, self.schema_root.as_deref())
    }

    /// Resolve the registry target, reading `SCHEMA_REGISTRY_URL` once.
    ///
    /// Precedence: `cli_url`, then the environment, then the config file.
    pub fn resolve_target(&self, cli_url: Option<&str>) -> Result<RegistryTarget> {
        let env_url = std::env::var(REGISTRY_URL_ENV).ok();
        self.resolve_target_with(cli_url, env_url.as_deref())
    }

    /// Resolve the registry target against an explicit environment value
    pub fn resolve_target_with(&self, cli_url: Option<&str>, env_url: Option<&str>) -> Result<RegistryTarget> {
        let non_empty = |s: &&str| !s.trim().is_empty();
        let url = cli_url
            .filter(non_empty)
            .or(env_url.filter(non_empty))
            .unwrap_or(&self.registry.url);

        if self.registry.timeout_secs == 0 {
            return Err(RegistrarError::invalid("registry.timeout_secs must be at least 1"));
        }

        let credentials = self.registry.username.as_ref().map(|username| Credentials {
            username: username.clone(),
            password: self.registry.password.clone(),
        });

        Ok(RegistryTarget {
            base_url: parse_base_url(url)?,
            quiet: self.registry.quiet,
            timeout: Duration::from_secs(self.registry.timeout_secs),
            credentials,
        })
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| RegistrarError::invalid(format!("registry URL \"{}\" is malformed: {}", raw, e)))?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(RegistrarError::invalid(format!(
            "registry URL \"{}\" must be an absolute http(s) URL",
            raw
        )));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaFormat;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = RegistrarConfig::default();
        assert_eq!(config.registry.url, "http://localhost:8081/");
        assert_eq!(config.registry.timeout_secs, 10);
        assert!(!config.registry.quiet);
        assert!(config.subjects.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("claims.toml");
        std::fs::write(
            &path,
            r#"
schema_root = "protos"

[registry]
url = "http://localhost:58003/"
quiet = true

[[subjects]]
subject = "claimStatus"
path = "claim.proto"
format = "PROTOBUF"

[[subjects]]
subject = "claim"
path = "claim.proto"
references = [{ name = "claimStatus.proto", subject = "claimStatus" }]
"#,
        )
        .unwrap();

        let config = RegistrarConfig::load_from(path.to_str()).unwrap();
        assert_eq!(config.registry.url, "http://localhost:58003/");
        assert!(config.registry.quiet);
        assert_eq!(config.subjects.len(), 2);
        assert_eq!(config.subjects[1].format, "PROTOBUF");
        assert_eq!(config.subjects[1].references[0].version, -1);

        let entries = config.entries().unwrap();
        assert_eq!(entries[0].schema_path, dir.path().join("protos/claim.proto"));
        assert_eq!(entries[1].format, SchemaFormat::Protobuf);
    }

    #[test]
    fn test_env_url_overrides_config() {
        let config = RegistrarConfig::default();
        let target = config
            .resolve_target_with(None, Some("http://registry:8081/"))
            .unwrap();
        assert_eq!(target.base_url.as_str(), "http://registry:8081/");
    }

    #[test]
    fn test_empty_env_url_is_ignored() {
        let config = RegistrarConfig::default();
        let target = config.resolve_target_with(None, Some("  ")).unwrap();
        assert_eq!(target.base_url.as_str(), "http://localhost:8081/");
    }

    #[test]
    fn test_cli_url_wins_over_env() {
        let config = RegistrarConfig::default();
        let target = config
            .resolve_target_with(Some("http://cli:1/"), Some("http://env:2/"))
            .unwrap();
        assert_eq!(target.base_url.host_str(), Some("cli"));
    }

    #[test]
    fn test_malformed_url_is_invalid_configuration() {
        let config = RegistrarConfig::default();
        let err = config.resolve_target_with(Some("not a url"), None).unwrap_err();
        assert!(matches!(err, RegistrarError::InvalidConfiguration(_)));
        assert!(RegistryTarget::new("ftp://localhost/").is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = RegistrarConfig::default();
        config.registry.timeout_secs = 0;
        let err = config.resolve_target_with(None, None).unwrap_err();
        assert!(matches!(err, RegistrarError::InvalidConfiguration(_)));
        assert!(err.to_string().contains("timeout_secs"));
    }

    #[test]
    fn test_absolute_schema_root_kept() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("registrar.toml");
        std::fs::write(&path, "schema_root = \"/srv/protos\"\n").unwrap();

        let config = RegistrarConfig::load_from(path.to_str()).unwrap();
        assert_eq!(config.schema_root, Some(PathBuf::from("/srv/protos")));
    }

    #[test]
    fn test_credentials_from_config() {
        let mut config = RegistrarConfig::default();
        config.registry.username = Some("svc".to_string());
        config.registry.password = Some("secret".to_string());
        let target = config.resolve_target_with(None, None).unwrap();
        let creds = target.credentials.unwrap();
        assert_eq!(creds.username, "svc");
        assert_eq!(creds.password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_toml_omits_password() {
        let mut config = RegistrarConfig::default();
        config.registry.password = Some("secret".to_string());
        config.subjects.push(SubjectConfig::new("claim", "claim.proto", SchemaFormat::Protobuf));
        let toml_str = config.to_toml().unwrap();
        assert!(toml_str.contains("[registry]"));
        assert!(toml_str.contains("[[subjects]]"));
        assert!(!toml_str.contains("secret"));
    }
}
