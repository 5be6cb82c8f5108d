//! Process configuration, read from the environment at startup.

use std::path::PathBuf;

/// Runtime configuration for the proxy.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Short key clients must present as `Authorization: Bearer <key>`.
    pub proxy_api_key: String,
    /// Credentials exchanged for an upstream JWT.
    pub bloxs_api_key: String,
    pub bloxs_api_secret: String,
    /// Upstream base URL, without trailing slash.
    pub bloxs_base_url: String,
    /// Whether schema learning is switched on.
    pub enable_learning: bool,
    /// Path of the SQLite file backing the learning KV, if configured.
    pub learning_kv: Option<PathBuf>,
}

impl ProxyConfig {
    pub fn from_env() -> Result<Self, String> {
        let proxy_api_key = require("PROXY_API_KEY")?;
        let bloxs_base_url = require("BLOXS_BASE_URL")?
            .trim_end_matches('/')
            .to_string();

        let bloxs_api_key = std::env::var("BLOXS_API_KEY").unwrap_or_default();
        let bloxs_api_secret = std::env::var("BLOXS_API_SECRET").unwrap_or_default();
        if bloxs_api_key.is_empty() || bloxs_api_secret.is_empty() {
            tracing::warn!(
                "BLOXS_API_KEY / BLOXS_API_SECRET not set; upstream authentication will fail"
            );
        }

        let enable_learning = std::env::var("ENABLE_LEARNING")
            .map(|v| is_truthy(&v))
            .unwrap_or(false);
        let learning_kv = std::env::var("LEARNING_KV")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            proxy_api_key,
            bloxs_api_key,
            bloxs_api_secret,
            bloxs_base_url,
            enable_learning,
            learning_kv,
        })
    }
}

/// Feature flags accept `1`, `true` or `yes`, case-insensitively.
pub fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes")
}

fn require(name: &str) -> Result<String, String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| format!("{} must be set", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthy_flag_variants() {
        assert!(is_truthy("1"));
        assert!(is_truthy("true"));
        assert!(is_truthy("TRUE"));
        assert!(is_truthy(" Yes "));
        assert!(!is_truthy("0"));
        assert!(!is_truthy("false"));
        assert!(!is_truthy("on"));
        assert!(!is_truthy(""));
    }
}
