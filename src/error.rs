//! Error types for schema registration

use std::path::PathBuf;

use thiserror::Error;

/// Result type for registrar operations
pub type Result<T> = std::result::Result<T, RegistrarError>;

/// Registration errors
#[derive(Error, Debug)]
pub enum RegistrarError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Schema file for subject \"{subject}\" could not be read ({path}): {cause}")]
    SchemaFileNotFound {
        subject: String,
        path: PathBuf,
        cause: std::io::Error,
    },

    #[error("Schema registry at {url} is unreachable: {cause}")]
    RegistryUnreachable { url: String, cause: String },

    #[error("Registry rejected subject \"{subject}\" (HTTP {status}, error code {error_code}): {message}")]
    RegistrationRejected {
        subject: String,
        status: u16,
        error_code: i64,
        message: String,
    },

    #[error(transparent)]
    Config(#[from] config_crate::ConfigError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl RegistrarError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            RegistrarError::RegistrationRejected { .. } => 1,
            RegistrarError::InvalidConfiguration(_)
            | RegistrarError::SchemaFileNotFound { .. }
            | RegistrarError::Config(_)
            | RegistrarError::Json(_) => 2,
            RegistrarError::RegistryUnreachable { .. } => 3,
        }
    }

    /// Whether re-running the same input could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, RegistrarError::RegistryUnreachable { .. })
    }

    /// Short name of the error category, as used in run reports
    pub fn kind(&self) -> &'static str {
        match self {
            RegistrarError::InvalidConfiguration(_) | RegistrarError::Config(_) => "InvalidConfiguration",
            RegistrarError::SchemaFileNotFound { .. } => "SchemaFileNotFound",
            RegistrarError::RegistryUnreachable { .. } => "RegistryUnreachable",
            RegistrarError::RegistrationRejected { .. } => "RegistrationRejected",
            RegistrarError::Json(_) => "Json",
        }
    }

    /// Subject the error is tied to, if any
    pub fn subject(&self) -> Option<&str> {
        match self {
            RegistrarError::SchemaFileNotFound { subject, .. }
            | RegistrarError::RegistrationRejected { subject, .. } => Some(subject),
            _ => None,
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        RegistrarError::InvalidConfiguration(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_distinguish_config_and_network() {
        let config = RegistrarError::invalid("empty subject");
        let network = RegistrarError::RegistryUnreachable {
            url: "http://localhost:58003/".to_string(),
            cause: "connection refused".to_string(),
        };
        assert_eq!(config.exit_code(), 2);
        assert_eq!(network.exit_code(), 3);
        assert!(network.is_retryable());
        assert!(!config.is_retryable());
    }

    #[test]
    fn test_rejection_message_carries_context() {
        let err = RegistrarError::RegistrationRejected {
            subject: "claim".to_string(),
            status: 422,
            error_code: 42201,
            message: "Invalid schema".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("\"claim\""));
        assert!(text.contains("42201"));
        assert_eq!(err.subject(), Some("claim"));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_io_cause_printed_once_in_error_chain() {
        let err = RegistrarError::SchemaFileNotFound {
            subject: "claim".to_string(),
            path: PathBuf::from("proto/claim.proto"),
            cause: std::io::Error::new(std::io::ErrorKind::NotFound, "no such schema"),
        };
        let chain = format!("{:#}", anyhow::Error::from(err));
        assert_eq!(chain.matches("no such schema").count(), 1);
        assert!(chain.contains("proto/claim.proto"));
    }
}
