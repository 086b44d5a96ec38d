//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// chartkit - artifact cache keys and registry logins for chart reconcilers
#[derive(Parser, Debug)]
#[command(name = "chartkit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "CHARTKIT_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in to an OCI registry and verify the credentials
    Login(LoginArgs),

    /// Print the cache key for a chart or repository index
    Key(KeyArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Arguments for the login command
#[derive(Parser, Debug)]
pub struct LoginArgs {
    /// Registry host or reference (e.g. ghcr.io, oci://ghcr.io/org/charts)
    pub registry: String,

    /// Registry username (requires --password-stdin)
    #[arg(short, long, requires = "password_stdin")]
    pub username: Option<String>,

    /// Read the password from stdin
    #[arg(long, requires = "username")]
    pub password_stdin: bool,

    /// CA bundle used to verify the registry
    #[arg(long)]
    pub ca_file: Option<PathBuf>,

    /// Client certificate for mutual TLS
    #[arg(long)]
    pub cert_file: Option<PathBuf>,

    /// Private key for --cert-file
    #[arg(long)]
    pub key_file: Option<PathBuf>,

    /// Skip registry certificate verification
    #[arg(long)]
    pub insecure_skip_tls_verify: bool,

    /// Use plain HTTP instead of HTTPS
    #[arg(long)]
    pub plain_http: bool,

    /// Login timeout in seconds (default: from config)
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// Arguments for the key command
#[derive(Parser, Debug)]
pub struct KeyArgs {
    /// Chart repository URL
    pub repository: String,

    /// Chart name
    #[arg(required_unless_present = "index")]
    pub chart: Option<String>,

    /// Chart version
    #[arg(value_name = "VERSION", required_unless_present = "index")]
    pub chart_version: Option<String>,

    /// Print the key of the repository index instead
    #[arg(long, conflicts_with_all = ["chart", "chart_version"])]
    pub index: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_parses_login() {
        let cli = Cli::parse_from([
            "chartkit",
            "login",
            "ghcr.io",
            "--username",
            "bot",
            "--password-stdin",
            "--plain-http",
        ]);
        match cli.command {
            Commands::Login(args) => {
                assert_eq!(args.registry, "ghcr.io");
                assert_eq!(args.username.as_deref(), Some("bot"));
                assert!(args.password_stdin);
                assert!(args.plain_http);
                assert!(args.timeout.is_none());
            }
            _ => panic!("expected Login command"),
        }
    }

    #[test]
    fn cli_login_username_requires_password() {
        assert!(Cli::try_parse_from(["chartkit", "login", "ghcr.io", "-u", "bot"]).is_err());
    }

    #[test]
    fn cli_parses_key() {
        let cli = Cli::parse_from(["chartkit", "key", "https://charts.example.com", "podinfo", "6.5.0"]);
        match cli.command {
            Commands::Key(args) => {
                assert_eq!(args.chart.as_deref(), Some("podinfo"));
                assert_eq!(args.chart_version.as_deref(), Some("6.5.0"));
                assert!(!args.index);
            }
            _ => panic!("expected Key command"),
        }
    }

    #[test]
    fn cli_parses_index_key() {
        let cli = Cli::parse_from(["chartkit", "key", "--index", "https://charts.example.com"]);
        assert!(matches!(cli.command, Commands::Key(KeyArgs { index: true, .. })));
        assert!(Cli::try_parse_from(["chartkit", "key", "https://charts.example.com"]).is_err());
    }

    #[test]
    fn cli_parses_config_init() {
        let cli = Cli::parse_from(["chartkit", "config", "init", "--force"]);
        match cli.command {
            Commands::Config(args) => {
                assert!(matches!(args.action, Some(ConfigAction::Init { force: true })));
            }
            _ => panic!("expected Config command"),
        }
    }

    #[test]
    fn cli_verbose_is_global() {
        let cli = Cli::parse_from(["chartkit", "config", "show", "-vv"]);
        assert_eq!(cli.verbose, 2);
    }
}
