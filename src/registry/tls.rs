//! TLS settings for registry clients
//!
//! [`TlsOptions`] is validated and converted into the HTTP client's TLS
//! configuration before any credentials file is created or any connection is
//! attempted, so a broken configuration never leaves anything behind.

use crate::error::{ChartkitError, ChartkitResult};
use rustls::crypto::ring::sign::any_supported_type;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs1KeyDer, PrivatePkcs8KeyDer, PrivateSec1KeyDer};
use rustls::sign::CertifiedKey;
use rustls::{Error as RustlsError, InconsistentKeys};
use std::path::PathBuf;
use std::sync::Arc;
use ureq::tls::{Certificate, ClientCert, PemItem, PrivateKey, RootCerts, TlsConfig};

/// Where PEM material comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PemSource {
    /// Read from a file on disk
    File(PathBuf),
    /// Already in memory, e.g. from a Kubernetes secret
    Inline(Vec<u8>),
}

impl PemSource {
    fn read(&self, what: &str) -> ChartkitResult<Vec<u8>> {
        match self {
            Self::File(path) => std::fs::read(path).map_err(|e| {
                ChartkitError::tls(format!("reading {} {}: {}", what, path.display(), e))
            }),
            Self::Inline(bytes) => Ok(bytes.clone()),
        }
    }
}

/// TLS configuration for talking to a registry
///
/// An empty configuration uses the platform's default trust roots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsOptions {
    /// CA bundle replacing the default trust roots
    pub ca: Option<PemSource>,
    /// Client certificate chain for mutual TLS
    pub client_cert: Option<PemSource>,
    /// Private key matching `client_cert`
    pub client_key: Option<PemSource>,
    /// Skip server certificate verification
    pub insecure_skip_verify: bool,
}

impl TlsOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ca(mut self, ca: PemSource) -> Self {
        self.ca = Some(ca);
        self
    }

    pub fn with_client_identity(mut self, cert: PemSource, key: PemSource) -> Self {
        self.client_cert = Some(cert);
        self.client_key = Some(key);
        self
    }

    pub fn with_insecure_skip_verify(mut self, skip: bool) -> Self {
        self.insecure_skip_verify = skip;
        self
    }

    /// True when nothing beyond the defaults is configured
    pub fn is_default(&self) -> bool {
        self == &Self::default()
    }

    /// Validate the options and build the HTTP client's TLS configuration
    pub(crate) fn build(&self) -> ChartkitResult<TlsConfig> {
        let mut builder = TlsConfig::builder();

        if let Some(ca) = &self.ca {
            let certs = parse_certificates(&ca.read("CA bundle")?, "CA bundle")?;
            builder = builder.root_certs(RootCerts::Specific(Arc::new(certs)));
        }

        match (&self.client_cert, &self.client_key) {
            (Some(cert), Some(key)) => {
                let chain = parse_certificates(
                    &cert.read("client certificate")?,
                    "client certificate",
                )?;
                let key = PrivateKey::from_pem(&key.read("client key")?)
                    .map_err(|e| ChartkitError::tls(format!("client key: {}", e)))?;
                check_key_matches(&chain, &key)?;
                builder = builder.client_cert(Some(ClientCert::new_with_certs(&chain, key)));
            }
            (Some(_), None) => {
                return Err(ChartkitError::tls(
                    "client certificate provided without a matching key",
                ))
            }
            (None, Some(_)) => {
                return Err(ChartkitError::tls(
                    "client key provided without a certificate",
                ))
            }
            (None, None) => {}
        }

        if self.insecure_skip_verify {
            builder = builder.disable_verification(true);
        }

        Ok(builder.build())
    }
}

fn parse_certificates(pem: &[u8], what: &str) -> ChartkitResult<Vec<Certificate<'static>>> {
    let mut certs = Vec::new();
    for item in ureq::tls::parse_pem(pem) {
        let item = item.map_err(|e| ChartkitError::tls(format!("{}: {}", what, e)))?;
        if let PemItem::Certificate(cert) = item {
            certs.push(cert.to_owned());
        }
    }

    if certs.is_empty() {
        return Err(ChartkitError::tls(format!(
            "{} contains no PEM certificates",
            what
        )));
    }
    Ok(certs)
}

/// Reject a private key that does not belong to the leaf certificate
fn check_key_matches(chain: &[Certificate<'static>], key: &PrivateKey<'static>) -> ChartkitResult<()> {
    // ureq does not re-export its key-kind enum, so match on the variant name
    let der = match format!("{:?}", key.kind()).as_str() {
        "Pkcs1" => PrivateKeyDer::Pkcs1(PrivatePkcs1KeyDer::from(key.der().to_vec())),
        "Sec1" => PrivateKeyDer::Sec1(PrivateSec1KeyDer::from(key.der().to_vec())),
        _ => PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key.der().to_vec())),
    };
    let signing_key = any_supported_type(&der)
        .map_err(|e| ChartkitError::tls(format!("client key: {}", e)))?;

    let certs = chain
        .iter()
        .map(|cert| CertificateDer::from(cert.der().to_vec()))
        .collect();
    match CertifiedKey::new(certs, signing_key).keys_match() {
        Ok(()) | Err(RustlsError::InconsistentKeys(InconsistentKeys::Unknown)) => Ok(()),
        Err(RustlsError::InconsistentKeys(InconsistentKeys::KeyMismatch)) => Err(
            ChartkitError::tls("client key does not match the client certificate"),
        ),
        Err(e) => Err(ChartkitError::tls(format!("client certificate: {}", e))),
    }
}
