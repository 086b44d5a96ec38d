//! Per-request registry client generation
//!
//! Each call to [`ClientGenerator::generate`] yields a fresh client. Login
//! generations also yield the [`CredentialsFile`] the client is bound to; the
//! caller owns that file and removes it when the attempt ends. The generator
//! keeps no record of the files it hands out.

use super::client::RegistryClient;
use super::credentials::{resolve_credentials, BasicCredentials, CredentialsFile, DockerConfig};
use super::tls::TlsOptions;
use crate::config::RegistryConfig;
use crate::error::ChartkitResult;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Default bound on a login exchange
pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(30);

/// What the generated client is for
#[derive(Debug, Clone)]
pub enum Access {
    /// Unauthenticated access, no credentials file
    Anonymous,
    /// Log in and persist credentials for the client
    Login(LoginRequest),
}

/// Registry to log in to, and optionally the credentials to use
///
/// Without explicit credentials the ambient Docker config is consulted.
#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub registry: String,
    pub credentials: Option<BasicCredentials>,
}

impl LoginRequest {
    pub fn new(registry: impl Into<String>) -> Self {
        Self {
            registry: registry.into(),
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, credentials: BasicCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }
}

/// Result of a generation
#[derive(Debug)]
pub struct GeneratedClient {
    pub client: RegistryClient,
    /// Present only for login generations
    pub credentials: Option<CredentialsFile>,
}

impl GeneratedClient {
    pub fn credentials_path(&self) -> Option<&Path> {
        self.credentials.as_ref().map(CredentialsFile::path)
    }

    pub fn into_parts(self) -> (RegistryClient, Option<CredentialsFile>) {
        (self.client, self.credentials)
    }
}

/// Builds registry clients with isolated credential material
#[derive(Debug, Clone)]
pub struct ClientGenerator {
    plain_http: bool,
    login_timeout: Duration,
    temp_dir: Option<PathBuf>,
    docker_config: Option<PathBuf>,
}

impl Default for ClientGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientGenerator {
    pub fn new() -> Self {
        Self {
            plain_http: false,
            login_timeout: DEFAULT_LOGIN_TIMEOUT,
            temp_dir: None,
            docker_config: None,
        }
    }

    pub fn from_config(config: &RegistryConfig) -> Self {
        Self {
            plain_http: config.plain_http,
            login_timeout: config.login_timeout(),
            temp_dir: config.temp_dir.clone(),
            docker_config: config.docker_config.clone(),
        }
    }

    pub fn with_plain_http(mut self, plain_http: bool) -> Self {
        self.plain_http = plain_http;
        self
    }

    pub fn with_login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    /// Directory credentials files are created in
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Docker config consulted when a login request carries no credentials
    pub fn with_docker_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.docker_config = Some(path.into());
        self
    }

    /// Generate a client, bounding any login by the configured timeout
    pub async fn generate(
        &self,
        tls: &TlsOptions,
        access: Access,
    ) -> ChartkitResult<GeneratedClient> {
        let deadline = Instant::now() + self.login_timeout;
        self.generate_with_deadline(tls, access, deadline).await
    }

    /// Generate a client, bounding any login by `deadline`
    ///
    /// On error no credentials file remains on disk. Dropping the returned
    /// future before it completes also removes the file.
    pub async fn generate_with_deadline(
        &self,
        tls: &TlsOptions,
        access: Access,
        deadline: Instant,
    ) -> ChartkitResult<GeneratedClient> {
        let tls = tls.build()?;

        let request = match access {
            Access::Anonymous => {
                debug!("Generated anonymous registry client");
                return Ok(GeneratedClient {
                    client: RegistryClient::new(tls, self.plain_http, self.login_timeout, None),
                    credentials: None,
                });
            }
            Access::Login(request) => request,
        };

        let credentials = match request.credentials {
            Some(credentials) => credentials,
            None => resolve_credentials(&request.registry, self.docker_config.as_deref())?,
        };

        let file = CredentialsFile::create(self.temp_dir.as_deref())?;
        let client = RegistryClient::new(
            tls,
            self.plain_http,
            self.login_timeout,
            Some(file.path().to_path_buf()),
        );

        let result = async {
            client
                .login(&request.registry, &credentials, deadline)
                .await?;
            file.store(&DockerConfig::with_auth(&request.registry, &credentials))
                .await
        }
        .await;

        match result {
            Ok(()) => Ok(GeneratedClient {
                client,
                credentials: Some(file),
            }),
            Err(e) => {
                let path = file.path().display().to_string();
                if let Err(cleanup) = file.close() {
                    warn!(path = %path, error = %cleanup, "Failed to remove credentials file");
                }
                Err(e)
            }
        }
    }
}
