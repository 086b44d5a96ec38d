//! Registry client handed out by the generator
//!
//! Implements only the handshake needed to prove credentials against an OCI
//! distribution endpoint: `GET /v2/` with basic auth, following a `Bearer`
//! challenge to the token realm when the registry uses token auth.
//!
//! The HTTP exchange is blocking and runs on tokio's blocking pool. Every
//! exchange is bounded twice by the caller's deadline: ureq's global timeout
//! aborts the connection, and `timeout_at` stops waiting for it.

use super::credentials::{registry_host, BasicCredentials, DockerConfig};
use crate::error::{ChartkitError, ChartkitResult};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};
use ureq::http::StatusCode;
use ureq::tls::TlsConfig;
use ureq::Agent;

/// Client bound to an optional credentials file
pub struct RegistryClient {
    tls: TlsConfig,
    plain_http: bool,
    timeout: Duration,
    credentials: Option<PathBuf>,
}

impl fmt::Debug for RegistryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryClient")
            .field("plain_http", &self.plain_http)
            .field("timeout", &self.timeout)
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl RegistryClient {
    pub(crate) fn new(
        tls: TlsConfig,
        plain_http: bool,
        timeout: Duration,
        credentials: Option<PathBuf>,
    ) -> Self {
        Self {
            tls,
            plain_http,
            timeout,
            credentials,
        }
    }

    /// Credentials file backing this client, if it was created for login
    pub fn credentials_path(&self) -> Option<&Path> {
        self.credentials.as_deref()
    }

    /// True when the client has no credentials file
    pub fn is_anonymous(&self) -> bool {
        self.credentials.is_none()
    }

    /// Base URL for a registry reference
    pub fn base_url(&self, registry: &str) -> String {
        let scheme = if self.plain_http { "http" } else { "https" };
        format!("{}://{}", scheme, registry_host(registry))
    }

    /// Authenticate against `registry` with explicit credentials
    pub async fn login(
        &self,
        registry: &str,
        credentials: &BasicCredentials,
        deadline: Instant,
    ) -> ChartkitResult<()> {
        info!(registry = %registry_host(registry), "Logging in to registry");
        self.exchange(registry, Some(credentials.clone()), deadline)
            .await?;
        info!(registry = %registry_host(registry), "Login succeeded");
        Ok(())
    }

    /// Check that `registry` accepts this client
    ///
    /// Uses the credentials stored in the client's credentials file for
    /// `registry`, or no credentials for an anonymous client.
    pub async fn ping(&self, registry: &str) -> ChartkitResult<()> {
        let credentials = match &self.credentials {
            Some(path) => DockerConfig::load(path)?
                .ok_or_else(|| ChartkitError::CredentialsNotFound(registry_host(registry)))?
                .credentials_for(registry)?,
            None => None,
        };
        self.exchange(registry, credentials, Instant::now() + self.timeout)
            .await
    }

    async fn exchange(
        &self,
        registry: &str,
        credentials: Option<BasicCredentials>,
        deadline: Instant,
    ) -> ChartkitResult<()> {
        let host = registry_host(registry);
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(ChartkitError::LoginTimeout { registry: host });
        }

        let agent = self.agent(remaining);
        let base = self.base_url(registry);
        let task_host = host.clone();
        let task = tokio::task::spawn_blocking(move || {
            authenticate(&agent, &base, &task_host, credentials.as_ref())
        });

        match tokio::time::timeout_at(deadline, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(ChartkitError::Internal(format!(
                "registry exchange task failed: {}",
                e
            ))),
            Err(_) => Err(ChartkitError::LoginTimeout { registry: host }),
        }
    }

    fn agent(&self, timeout: Duration) -> Agent {
        Agent::config_builder()
            .tls_config(self.tls.clone())
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build()
            .into()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

fn http_error(registry: &str, source: ureq::Error) -> ChartkitError {
    match source {
        ureq::Error::Timeout(_) => ChartkitError::LoginTimeout {
            registry: registry.to_string(),
        },
        source => ChartkitError::RegistryHttp {
            registry: registry.to_string(),
            source,
        },
    }
}

fn authenticate(
    agent: &Agent,
    base: &str,
    registry: &str,
    credentials: Option<&BasicCredentials>,
) -> ChartkitResult<()> {
    let url = format!("{}/v2/", base);
    let mut request = agent.get(&url);
    if let Some(credentials) = credentials {
        request = request.header("Authorization", credentials.authorization().as_str());
    }
    let response = request.call().map_err(|e| http_error(registry, e))?;

    let status = response.status();
    debug!(registry, %status, "Registry ping");
    if status.is_success() {
        return Ok(());
    }
    if status != StatusCode::UNAUTHORIZED {
        return Err(ChartkitError::login(
            registry,
            format!("unexpected status {}", status),
        ));
    }

    let challenge = response
        .headers()
        .get("www-authenticate")
        .and_then(|value| value.to_str().ok())
        .and_then(BearerChallenge::parse);

    match challenge {
        Some(challenge) => fetch_token(agent, registry, &challenge, credentials),
        None => Err(ChartkitError::login(registry, "credentials rejected")),
    }
}

fn fetch_token(
    agent: &Agent,
    registry: &str,
    challenge: &BearerChallenge,
    credentials: Option<&BasicCredentials>,
) -> ChartkitResult<()> {
    debug!(registry, realm = %challenge.realm, "Requesting registry token");

    let mut request = agent.get(&challenge.realm);
    if let Some(service) = &challenge.service {
        request = request.query("service", service);
    }
    if let Some(scope) = &challenge.scope {
        request = request.query("scope", scope);
    }
    if let Some(credentials) = credentials {
        request = request.header("Authorization", credentials.authorization().as_str());
    }

    let mut response = request.call().map_err(|e| http_error(registry, e))?;
    let status = response.status();
    if !status.is_success() {
        return Err(ChartkitError::login(
            registry,
            format!("token request returned {}", status),
        ));
    }

    let body = response
        .body_mut()
        .read_to_string()
        .map_err(|e| http_error(registry, e))?;
    let token: TokenResponse = serde_json::from_str(&body)
        .map_err(|e| ChartkitError::login(registry, format!("invalid token response: {}", e)))?;

    match token.token.or(token.access_token) {
        Some(token) if !token.is_empty() => Ok(()),
        _ => Err(ChartkitError::login(registry, "token response contained no token")),
    }
}

/// Parsed `WWW-Authenticate: Bearer ...` challenge
#[derive(Debug, Clone, PartialEq, Eq)]
struct BearerChallenge {
    realm: String,
    service: Option<String>,
    scope: Option<String>,
}

impl BearerChallenge {
    fn parse(header: &str) -> Option<Self> {
        let header = header.trim();
        let (scheme, params) = header.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }

        let mut realm = None;
        let mut service = None;
        let mut scope = None;
        for (key, value) in parse_params(params) {
            match key.to_ascii_lowercase().as_str() {
                "realm" => realm = Some(value),
                "service" => service = Some(value),
                "scope" => scope = Some(value),
                _ => {}
            }
        }

        Some(Self {
            realm: realm.filter(|r| !r.is_empty())?,
            service,
            scope,
        })
    }
}

/// Split `k1="v,1",k2=v2` into pairs; commas inside quotes stay in the value
fn parse_params(params: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut key = String::new();
    let mut value = String::new();
    let mut in_value = false;
    let mut quoted = false;

    for c in params.chars() {
        match c {
            '"' => quoted = !quoted,
            '=' if !in_value && !quoted => in_value = true,
            ',' if !quoted => {
                if !key.trim().is_empty() {
                    pairs.push((key.trim().to_string(), value.clone()));
                }
                key.clear();
                value.clear();
                in_value = false;
            }
            c if in_value => value.push(c),
            c => key.push(c),
        }
    }
    if !key.trim().is_empty() {
        pairs.push((key.trim().to_string(), value));
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bearer_challenge() {
        let challenge = BearerChallenge::parse(
            r#"Bearer realm="https://auth.example.com/token",service="registry.example.com",scope="repository:charts/podinfo:pull,push""#,
        )
        .unwrap();

        assert_eq!(challenge.realm, "https://auth.example.com/token");
        assert_eq!(challenge.service.as_deref(), Some("registry.example.com"));
        assert_eq!(
            challenge.scope.as_deref(),
            Some("repository:charts/podinfo:pull,push")
        );
    }

    #[test]
    fn rejects_non_bearer_challenge() {
        assert!(BearerChallenge::parse(r#"Basic realm="registry""#).is_none());
        assert!(BearerChallenge::parse("Bearer service=\"x\"").is_none());
        assert!(BearerChallenge::parse("").is_none());
    }

    #[test]
    fn base_url_follows_scheme_setting() {
        let tls = crate::registry::TlsOptions::new().build().unwrap();
        let client = RegistryClient::new(tls.clone(), false, Duration::from_secs(1), None);
        assert_eq!(client.base_url("oci://ghcr.io/org"), "https://ghcr.io");
        assert!(client.is_anonymous());

        let client = RegistryClient::new(tls, true, Duration::from_secs(1), None);
        assert_eq!(client.base_url("localhost:5000"), "http://localhost:5000");
    }
}
