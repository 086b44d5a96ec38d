//! Login command - verify registry credentials with a throwaway client

use crate::cli::args::LoginArgs;
use crate::config::Config;
use crate::error::{ChartkitError, ChartkitResult};
use crate::registry::{
    registry_host, Access, BasicCredentials, ClientGenerator, LoginRequest, PemSource, TlsOptions,
};
use crate::ui::{self, UiContext};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::debug;

/// Execute the login command
pub async fn execute(args: LoginArgs, config: &Config) -> ChartkitResult<()> {
    let ctx = UiContext::detect();
    let tls = tls_options(&args);

    let mut generator = ClientGenerator::from_config(&config.registry);
    if args.plain_http {
        generator = generator.with_plain_http(true);
    }
    if let Some(secs) = args.timeout {
        generator = generator.with_login_timeout(Duration::from_secs(secs));
    }

    let mut request = LoginRequest::new(&args.registry);
    if let Some(username) = args.username {
        let password = read_password(BufReader::new(tokio::io::stdin()), &args.registry).await?;
        request = request.with_credentials(BasicCredentials::new(username, password));
    }

    let generated = generator.generate(&tls, Access::Login(request)).await?;

    ui::section(&ctx, "Registry login");
    ui::key_value(&ctx, "registry", &registry_host(&args.registry));
    ui::step_ok(&ctx, "Login succeeded");

    if let Some(file) = generated.credentials {
        debug!(path = %file.path().display(), "Discarding credentials file");
        file.close()?;
    }

    Ok(())
}

fn tls_options(args: &LoginArgs) -> TlsOptions {
    TlsOptions {
        ca: args.ca_file.clone().map(PemSource::File),
        client_cert: args.cert_file.clone().map(PemSource::File),
        client_key: args.key_file.clone().map(PemSource::File),
        insecure_skip_verify: args.insecure_skip_tls_verify,
    }
}

async fn read_password<R>(mut reader: R, registry: &str) -> ChartkitResult<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .await
        .map_err(|e| ChartkitError::io("reading password from stdin", e))?;

    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        return Err(ChartkitError::CredentialsMalformed {
            registry: registry_host(registry),
            reason: "empty password on stdin".to_string(),
        });
    }
    Ok(password)
}
