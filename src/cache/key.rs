//! Stable cache keys for fetched artifacts
//!
//! Keys are SHA256 digests over the normalized artifact identity, so the same
//! chart version fetched from the same repository always maps to the same
//! entry regardless of trailing slashes or letter case in the URL scheme/host.

use sha2::{Digest, Sha256};

/// Key for a packaged chart: repository URL + chart name + version
pub fn artifact_key(repository_url: &str, chart: &str, version: &str) -> String {
    digest(&[&normalize_url(repository_url), chart.trim(), version.trim()])
}

/// Key for a repository index document
pub fn index_key(repository_url: &str) -> String {
    digest(&[&normalize_url(repository_url), "index.yaml"])
}

fn digest(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        // Separator keeps ("ab", "c") and ("a", "bc") apart.
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

/// Lowercase scheme and host, drop trailing slashes
fn normalize_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    let (scheme, rest) = match url.split_once("://") {
        Some((scheme, rest)) => (Some(scheme.to_ascii_lowercase()), rest),
        None => (None, url),
    };
    let (host, path) = match rest.find('/') {
        Some(idx) => rest.split_at(idx),
        None => (rest, ""),
    };

    let host = host.to_ascii_lowercase();
    match scheme {
        Some(scheme) => format!("{}://{}{}", scheme, host, path),
        None => format!("{}{}", host, path),
    }
}
