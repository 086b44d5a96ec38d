//! Integration tests for chartkit

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use tempfile::TempDir;

    /// Command isolated from the user's config and Docker credentials
    fn chartkit(dir: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("chartkit");
        cmd.env("CHARTKIT_CONFIG", dir.path().join("config.toml"))
            .env("DOCKER_CONFIG", dir.path().join("docker"))
            .env("TMPDIR", dir.path());
        cmd
    }

    #[test]
    fn help_displays() {
        let dir = TempDir::new().unwrap();
        chartkit(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("login"))
            .stdout(predicate::str::contains("key"));
    }

    #[test]
    fn version_displays() {
        let dir = TempDir::new().unwrap();
        chartkit(&dir)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("chartkit"));
    }

    #[test]
    fn key_prints_sha256() {
        let dir = TempDir::new().unwrap();
        chartkit(&dir)
            .args(["key", "https://charts.example.com", "podinfo", "6.5.0"])
            .assert()
            .success()
            .stdout(predicate::str::is_match("^[0-9a-f]{64}\n$").unwrap());
    }

    #[test]
    fn key_ignores_trailing_slash() {
        let dir = TempDir::new().unwrap();
        let first = chartkit(&dir)
            .args(["key", "https://charts.example.com/", "podinfo", "6.5.0"])
            .assert()
            .success();
        let second = chartkit(&dir)
            .args(["key", "https://charts.example.com", "podinfo", "6.5.0"])
            .assert()
            .success();
        let first = &first.get_output().stdout;
        assert_eq!(first.len(), 65);
        assert_eq!(first, &second.get_output().stdout);
    }

    #[test]
    fn key_prints_index_key() {
        let dir = TempDir::new().unwrap();
        chartkit(&dir)
            .args(["key", "--index", "https://charts.example.com"])
            .assert()
            .success()
            .stdout(predicate::str::is_match("^[0-9a-f]{64}\n$").unwrap());
    }

    #[test]
    fn config_path() {
        let dir = TempDir::new().unwrap();
        chartkit(&dir)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let dir = TempDir::new().unwrap();
        chartkit(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]"))
            .stdout(predicate::str::contains("max_items = 1000"));
    }

    #[test]
    fn config_init_creates_file() {
        let dir = TempDir::new().unwrap();
        chartkit(&dir).args(["config", "init"]).assert().success();
        assert!(dir.path().join("config.toml").exists());
    }

    #[test]
    fn invalid_config_is_reported() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.toml"), "[cache\nmax_items = ").unwrap();
        chartkit(&dir)
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn login_rejects_cert_without_key() {
        let dir = TempDir::new().unwrap();
        let cert = dir.path().join("client.pem");
        std::fs::write(&cert, "unused").unwrap();

        chartkit(&dir)
            .args(["login", "127.0.0.1:1", "--plain-http", "--cert-file"])
            .arg(&cert)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid TLS configuration"));
    }

    #[test]
    fn login_without_credentials_fails() {
        let dir = TempDir::new().unwrap();
        chartkit(&dir)
            .args(["login", "registry.invalid"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No credentials found"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn login_requires_password_with_username() {
        let dir = TempDir::new().unwrap();
        chartkit(&dir)
            .args(["login", "ghcr.io", "--username", "bot"])
            .assert()
            .failure();
    }
}
