//! Connection-settings fingerprint.
//!
//! If the fingerprint stored with the markers differs from the one computed
//! from the active settings, every cached entry is considered stale.

use sha2::{Digest, Sha256};

use crate::config::UpstreamConfig;

/// Hex SHA-256 over the settings that identify the upstream account.
///
/// Fields are length-prefixed so that moving characters between adjacent
/// fields changes the hash. The request timeout is deliberately excluded.
pub fn config_fingerprint(config: &UpstreamConfig) -> String {
    let mut hasher = Sha256::new();
    for part in [
        config.server_url.trim_end_matches('/'),
        config.token.as_str(),
        config
            .analytics_url
            .as_deref()
            .unwrap_or("")
            .trim_end_matches('/'),
        config.analytics_api_key.as_deref().unwrap_or(""),
    ] {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream() -> UpstreamConfig {
        UpstreamConfig {
            server_url: "http://media.local:32400".to_string(),
            token: "secret".to_string(),
            analytics_url: Some("http://media.local:8181".to_string()),
            analytics_api_key: Some("key".to_string()),
            request_timeout_secs: 15,
        }
    }

    #[test]
    fn stable_and_hex() {
        let a = config_fingerprint(&upstream());
        let b = config_fingerprint(&upstream());
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn token_change_changes_fingerprint() {
        let mut changed = upstream();
        changed.token = "other".to_string();
        assert_ne!(config_fingerprint(&upstream()), config_fingerprint(&changed));
    }

    #[test]
    fn timeout_and_trailing_slash_ignored() {
        let mut changed = upstream();
        changed.request_timeout_secs = 60;
        changed.server_url.push('/');
        assert_eq!(config_fingerprint(&upstream()), config_fingerprint(&changed));
    }
}
