//! Registry client generation with isolated, disposable credentials
//!
//! ```rust,ignore
//! use chartkit::registry::{Access, ClientGenerator, LoginRequest, TlsOptions};
//!
//! let generator = ClientGenerator::from_config(&config.registry);
//! let generated = generator
//!     .generate(&TlsOptions::new(), Access::Login(LoginRequest::new("ghcr.io")))
//!     .await?;
//!
//! // ... pull with generated.client ...
//!
//! if let Some(file) = generated.credentials {
//!     file.close()?;
//! }
//! ```

pub mod client;
pub mod credentials;
pub mod generator;
pub mod tls;

pub use client::RegistryClient;
pub use credentials::{
    default_docker_config_path, registry_host, resolve_credentials, BasicCredentials,
    CredentialsFile, DockerConfig,
};
pub use generator::{Access, ClientGenerator, GeneratedClient, LoginRequest, DEFAULT_LOGIN_TIMEOUT};
pub use tls::{PemSource, TlsOptions};
