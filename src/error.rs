//! Error types for chartkit
//!
//! All modules use `ChartkitResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for chartkit operations
pub type ChartkitResult<T> = Result<T, ChartkitError>;

/// All errors that can occur in chartkit
#[derive(Error, Debug)]
pub enum ChartkitError {
    // Configuration errors
    #[error("Invalid cache configuration: {0}")]
    CacheConfig(String),

    #[error("Invalid TLS configuration: {reason}")]
    TlsConfig { reason: String },

    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache metrics already registered for {0}")]
    MetricsAlreadyRegistered(String),

    // Cache errors
    #[error("Cache key already exists: {0}")]
    CacheKeyExists(String),

    // Credential errors
    #[error("Credentials file error while {stage}: {source}")]
    CredentialsFile {
        stage: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("No credentials found for registry {0}")]
    CredentialsNotFound(String),

    #[error("Malformed credentials for registry {registry}: {reason}")]
    CredentialsMalformed { registry: String, reason: String },

    // Registry errors
    #[error("Login to {registry} failed: {reason}")]
    RegistryLogin { registry: String, reason: String },

    #[error("Request to {registry} failed: {source}")]
    RegistryHttp {
        registry: String,
        #[source]
        source: ureq::Error,
    },

    #[error("Login to {registry} did not complete before the deadline")]
    LoginTimeout { registry: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChartkitError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a TLS configuration error
    pub fn tls(reason: impl Into<String>) -> Self {
        Self::TlsConfig {
            reason: reason.into(),
        }
    }

    /// Create a registry login error
    pub fn login(registry: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RegistryLogin {
            registry: registry.into(),
            reason: reason.into(),
        }
    }

    /// Check if error is retryable by the caller
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RegistryHttp { .. } | Self::LoginTimeout { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::CredentialsNotFound(_) => {
                Some("Pass --username/--password-stdin or run: docker login <registry>")
            }
            Self::TlsConfig { .. } => {
                Some("Check the CA bundle and client certificate files; --cert-file needs a matching --key-file")
            }
            Self::LoginTimeout { .. } => Some("Increase registry.login_timeout_secs"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ChartkitError::CredentialsNotFound("ghcr.io".to_string());
        assert!(err.to_string().contains("ghcr.io"));
    }

    #[test]
    fn error_hint() {
        let err = ChartkitError::LoginTimeout {
            registry: "ghcr.io".to_string(),
        };
        assert_eq!(err.hint(), Some("Increase registry.login_timeout_secs"));
        assert!(ChartkitError::CacheConfig("x".into()).hint().is_none());
    }

    #[test]
    fn error_retryable() {
        assert!(ChartkitError::LoginTimeout {
            registry: "ghcr.io".to_string()
        }
        .is_retryable());
        assert!(!ChartkitError::tls("missing key").is_retryable());
        assert!(!ChartkitError::login("ghcr.io", "denied").is_retryable());
    }
}
