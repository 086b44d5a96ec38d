//! Registry credential material
//!
//! Credentials are persisted in the Docker `config.json` layout, the format
//! registry tooling expects for a file-based credential store:
//!
//! ```json
//! { "auths": { "ghcr.io": { "auth": "<base64 username:password>" } } }
//! ```
//!
//! A [`CredentialsFile`] owns one such file for the lifetime of a single
//! registry client. The file is removed by [`CredentialsFile::close`], or when
//! the handle is dropped.

use crate::error::{ChartkitError, ChartkitResult};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::debug;

/// Username/password pair for a registry
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

impl BasicCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// base64 of `username:password`
    pub fn encode(&self) -> String {
        BASE64.encode(format!("{}:{}", self.username, self.password))
    }

    /// Value for an HTTP `Authorization` header
    pub fn authorization(&self) -> String {
        format!("Basic {}", self.encode())
    }

    fn decode(registry: &str, auth: &str) -> ChartkitResult<Self> {
        let malformed = |reason: &str| ChartkitError::CredentialsMalformed {
            registry: registry.to_string(),
            reason: reason.to_string(),
        };

        let bytes = BASE64
            .decode(auth.trim())
            .map_err(|_| malformed("auth is not valid base64"))?;
        let decoded = String::from_utf8(bytes).map_err(|_| malformed("auth is not UTF-8"))?;
        let (username, password) = decoded
            .split_once(':')
            .ok_or_else(|| malformed("auth is not in username:password form"))?;
        Ok(Self::new(username, password))
    }
}

impl fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A single entry of the `auths` map
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Docker-style credential store document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DockerConfig {
    #[serde(default)]
    pub auths: BTreeMap<String, AuthEntry>,
}

impl DockerConfig {
    /// Document holding a single registry's credentials
    pub fn with_auth(registry: &str, credentials: &BasicCredentials) -> Self {
        let mut auths = BTreeMap::new();
        auths.insert(
            registry_host(registry),
            AuthEntry {
                auth: Some(credentials.encode()),
                ..Default::default()
            },
        );
        Self { auths }
    }

    /// Load a document, returning `None` if the file does not exist
    pub fn load(path: &Path) -> ChartkitResult<Option<Self>> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ChartkitError::io(
                    format!("reading docker config {}", path.display()),
                    e,
                ))
            }
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Credentials stored for `registry`, matched by host
    pub fn credentials_for(&self, registry: &str) -> ChartkitResult<Option<BasicCredentials>> {
        let host = registry_host(registry);
        let entry = self
            .auths
            .iter()
            .find(|(key, _)| registry_host(key) == host)
            .map(|(_, entry)| entry);

        let Some(entry) = entry else {
            return Ok(None);
        };

        if let Some(auth) = entry.auth.as_deref().filter(|a| !a.is_empty()) {
            return BasicCredentials::decode(&host, auth).map(Some);
        }
        match (&entry.username, &entry.password) {
            (Some(username), Some(password)) => {
                Ok(Some(BasicCredentials::new(username, password)))
            }
            _ => Ok(None),
        }
    }
}

/// Host part of a registry reference, as used for `auths` keys
///
/// Accepts bare hosts, `host:port`, URLs with `http(s)://` or `oci://`
/// schemes and references with a repository path. Docker Hub aliases map to
/// `index.docker.io`.
pub fn registry_host(registry: &str) -> String {
    let trimmed = registry.trim();
    let without_scheme = trimmed
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(trimmed);
    let host = without_scheme
        .split('/')
        .next()
        .unwrap_or(without_scheme)
        .to_ascii_lowercase();

    match host.as_str() {
        "docker.io" | "registry-1.docker.io" => "index.docker.io".to_string(),
        _ => host,
    }
}

/// Default location of the ambient Docker credential store
pub fn default_docker_config_path() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os("DOCKER_CONFIG").filter(|d| !d.is_empty()) {
        return Some(PathBuf::from(dir).join("config.json"));
    }
    dirs::home_dir().map(|home| home.join(".docker").join("config.json"))
}

/// Resolve credentials for `registry` from a Docker config file
///
/// Uses `override_path` when given, otherwise [`default_docker_config_path`].
pub fn resolve_credentials(
    registry: &str,
    override_path: Option<&Path>,
) -> ChartkitResult<BasicCredentials> {
    let path = match override_path {
        Some(path) => Some(path.to_path_buf()),
        None => default_docker_config_path(),
    };

    if let Some(path) = path {
        if let Some(config) = DockerConfig::load(&path)? {
            if let Some(credentials) = config.credentials_for(registry)? {
                debug!(
                    registry = %registry_host(registry),
                    source = %path.display(),
                    "Resolved registry credentials"
                );
                return Ok(credentials);
            }
        }
    }

    Err(ChartkitError::CredentialsNotFound(registry_host(registry)))
}

/// Exclusive handle to a temporary credentials file
///
/// Created with a random name and owner-only permissions. The caller that
/// receives the handle owns the file: [`CredentialsFile::close`] removes it and
/// reports failures, dropping the handle removes it silently.
#[derive(Debug)]
pub struct CredentialsFile {
    path: TempPath,
}

impl CredentialsFile {
    /// Create an empty credentials file in `dir`, or the OS temp dir
    pub(crate) fn create(dir: Option<&Path>) -> ChartkitResult<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("chartkit-credentials-").suffix(".json");

        let file = match dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| ChartkitError::CredentialsFile {
            stage: "creating",
            source: e,
        })?;

        let path = file.into_temp_path();
        debug!(path = %path.display(), "Created credentials file");
        Ok(Self { path })
    }

    /// Location of the file on disk
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the file's content with `config`
    pub(crate) async fn store(&self, config: &DockerConfig) -> ChartkitResult<()> {
        let content = serde_json::to_vec_pretty(config)?;
        tokio::fs::write(self.path(), content)
            .await
            .map_err(|e| ChartkitError::CredentialsFile {
                stage: "writing",
                source: e,
            })
    }

    /// Read the stored document back
    pub fn load(&self) -> ChartkitResult<DockerConfig> {
        DockerConfig::load(self.path())?.ok_or_else(|| ChartkitError::CredentialsFile {
            stage: "reading",
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        })
    }

    /// Remove the file
    pub fn close(self) -> ChartkitResult<()> {
        let shown = self.path.display().to_string();
        self.path
            .close()
            .map_err(|e| ChartkitError::CredentialsFile {
                stage: "removing",
                source: e,
            })?;
        debug!(path = %shown, "Removed credentials file");
        Ok(())
    }

    /// Give up ownership, leaving the file on disk
    ///
    /// The caller becomes responsible for deleting the returned path.
    pub fn keep(self) -> ChartkitResult<PathBuf> {
        self.path.keep().map_err(|e| ChartkitError::CredentialsFile {
            stage: "persisting",
            source: e.error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn encode_matches_docker_format() {
        let creds = BasicCredentials::new("user", "pass");
        assert_eq!(creds.encode(), "dXNlcjpwYXNz");
        assert_eq!(creds.authorization(), "Basic dXNlcjpwYXNz");
    }

    #[test]
    fn debug_redacts_password() {
        let creds = BasicCredentials::new("user", "hunter2");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("user"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn registry_host_normalization() {
        assert_eq!(registry_host("ghcr.io"), "ghcr.io");
        assert_eq!(registry_host("oci://ghcr.io/org/charts"), "ghcr.io");
        assert_eq!(registry_host("https://Registry.Example.com:5000/v2/"), "registry.example.com:5000");
        assert_eq!(registry_host("https://index.docker.io/v1/"), "index.docker.io");
        assert_eq!(registry_host("docker.io"), "index.docker.io");
    }

    #[test]
    fn credentials_lookup_by_host() {
        let json = r#"{
            "auths": {
                "https://ghcr.io": { "auth": "dXNlcjpwYXNz" },
                "registry.example.com": { "username": "bot", "password": "secret" },
                "empty.example.com": {}
            }
        }"#;
        let config: DockerConfig = serde_json::from_str(json).unwrap();

        let ghcr = config.credentials_for("oci://ghcr.io/org/charts").unwrap().unwrap();
        assert_eq!(ghcr, BasicCredentials::new("user", "pass"));

        let example = config.credentials_for("registry.example.com").unwrap().unwrap();
        assert_eq!(example.username, "bot");

        assert!(config.credentials_for("empty.example.com").unwrap().is_none());
        assert!(config.credentials_for("quay.io").unwrap().is_none());
    }

    #[test]
    fn malformed_auth_is_reported() {
        let json = r#"{ "auths": { "ghcr.io": { "auth": "bm9jb2xvbg==" } } }"#;
        let config: DockerConfig = serde_json::from_str(json).unwrap();
        let err = config.credentials_for("ghcr.io").unwrap_err();
        assert!(matches!(err, ChartkitError::CredentialsMalformed { .. }));
    }

    #[test]
    fn resolve_from_override_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let config = DockerConfig::with_auth("ghcr.io", &BasicCredentials::new("u", "p"));
        std::fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();

        let creds = resolve_credentials("oci://ghcr.io/org", Some(&path)).unwrap();
        assert_eq!(creds, BasicCredentials::new("u", "p"));

        let err = resolve_credentials("quay.io", Some(&path)).unwrap_err();
        assert!(matches!(err, ChartkitError::CredentialsNotFound(host) if host == "quay.io"));
    }

    #[test]
    #[serial]
    fn resolve_honours_docker_config_env() {
        let dir = TempDir::new().unwrap();
        let config = DockerConfig::with_auth("quay.io", &BasicCredentials::new("robot", "token"));
        std::fs::write(
            dir.path().join("config.json"),
            serde_json::to_string(&config).unwrap(),
        )
        .unwrap();

        std::env::set_var("DOCKER_CONFIG", dir.path());
        let resolved = resolve_credentials("quay.io", None);
        std::env::remove_var("DOCKER_CONFIG");

        assert_eq!(resolved.unwrap().username, "robot");
    }

    #[test]
    fn missing_config_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = resolve_credentials("ghcr.io", Some(&dir.path().join("missing.json"))).unwrap_err();
        assert!(matches!(err, ChartkitError::CredentialsNotFound(_)));
    }

    #[tokio::test]
    async fn credentials_file_lifecycle() {
        let dir = TempDir::new().unwrap();
        let file = CredentialsFile::create(Some(dir.path())).unwrap();
        let path = file.path().to_path_buf();
        assert!(path.exists());
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("chartkit-credentials-"));

        let config = DockerConfig::with_auth("ghcr.io", &BasicCredentials::new("u", "p"));
        file.store(&config).await.unwrap();
        let loaded = file.load().unwrap();
        assert_eq!(
            loaded.credentials_for("ghcr.io").unwrap(),
            Some(BasicCredentials::new("u", "p"))
        );

        file.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn close_reports_missing_file() {
        let dir = TempDir::new().unwrap();
        let file = CredentialsFile::create(Some(dir.path())).unwrap();
        std::fs::remove_file(file.path()).unwrap();

        let err = file.close().unwrap_err();
        assert!(matches!(
            err,
            ChartkitError::CredentialsFile { stage: "removing", .. }
        ));
    }

    #[test]
    fn dropping_handle_removes_file() {
        let dir = TempDir::new().unwrap();
        let file = CredentialsFile::create(Some(dir.path())).unwrap();
        let path = file.path().to_path_buf();
        drop(file);
        assert!(!path.exists());
    }

    #[test]
    fn keep_leaves_file_on_disk() {
        let dir = TempDir::new().unwrap();
        let file = CredentialsFile::create(Some(dir.path())).unwrap();
        let path = file.keep().unwrap();
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let file = CredentialsFile::create(Some(dir.path())).unwrap();
        let mode = std::fs::metadata(file.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn create_fails_in_missing_directory() {
        let dir = TempDir::new().unwrap();
        let err = CredentialsFile::create(Some(&dir.path().join("missing"))).unwrap_err();
        assert!(matches!(
            err,
            ChartkitError::CredentialsFile { stage: "creating", .. }
        ));
    }
}
