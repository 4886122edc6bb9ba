// SPDX-License-Identifier: MIT
//! Engine configuration.
//!
//! Priority, highest to lowest: CLI / env var > `config.toml` > built-in
//! default. The TOML file lives next to wherever the embedding process
//! keeps its data; pass its path explicitly.

use std::path::Path;

use serde::Deserialize;
use tracing::error;

use crate::cache::DEFAULT_CACHE_TTL_SECS;

const DEFAULT_API_BASE_URL: &str = "https://api.clickup.com/api/v2";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// `config.toml` — all fields are optional overrides.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// Override the workspace API base URL.
    api_base_url: Option<String>,
    /// API token. Prefer the `TASKBRIDGE_API_TOKEN` env var over the file.
    api_token: Option<String>,
    /// Workspace (team) id the engine operates in.
    team_id: Option<String>,
    /// Trust window for validation caches, in seconds (default: 300).
    cache_ttl_secs: Option<u64>,
    /// Per-call HTTP timeout in seconds (default: 30).
    http_timeout_secs: Option<u64>,
    /// Log level filter string, e.g. "debug", "info,taskbridge=trace".
    log: Option<String>,
}

fn load_toml(path: &Path) -> Option<TomlConfig> {
    let contents = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config.toml — using defaults");
            None
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Workspace API base URL (TASKBRIDGE_API_URL env var).
    pub api_base_url: String,
    /// API token (TASKBRIDGE_API_TOKEN env var). Required to build the
    /// HTTP gateway.
    pub api_token: Option<String>,
    /// Workspace (team) id (TASKBRIDGE_TEAM_ID env var). Required to build
    /// the HTTP gateway.
    pub team_id: Option<String>,
    /// Trust window for the validation caches.
    pub cache_ttl_secs: u64,
    /// Per-call HTTP timeout.
    pub http_timeout_secs: u64,
    /// Log level filter string.
    pub log: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_token: None,
            team_id: None,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            log: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Build config from env vars layered over an optional TOML file.
    pub fn load(config_path: Option<&Path>) -> Self {
        let toml = config_path.and_then(load_toml).unwrap_or_default();

        Self {
            api_base_url: env_var("TASKBRIDGE_API_URL")
                .or(toml.api_base_url)
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            api_token: env_var("TASKBRIDGE_API_TOKEN").or(toml.api_token),
            team_id: env_var("TASKBRIDGE_TEAM_ID").or(toml.team_id),
            cache_ttl_secs: env_var("TASKBRIDGE_CACHE_TTL")
                .and_then(|s| s.parse().ok())
                .or(toml.cache_ttl_secs)
                .unwrap_or(DEFAULT_CACHE_TTL_SECS),
            http_timeout_secs: env_var("TASKBRIDGE_HTTP_TIMEOUT")
                .and_then(|s| s.parse().ok())
                .or(toml.http_timeout_secs)
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
            log: env_var("TASKBRIDGE_LOG")
                .or(toml.log)
                .unwrap_or_else(|| "info".to_string()),
        }
    }

    pub fn http_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.http_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_hold_without_file_or_env() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.cache_ttl_secs, 300);
        assert_eq!(cfg.http_timeout_secs, 30);
        assert_eq!(cfg.api_base_url, DEFAULT_API_BASE_URL);
        assert!(cfg.api_token.is_none());
    }

    #[test]
    fn toml_values_parse() {
        let toml: TomlConfig = toml::from_str(
            r#"
            api_base_url = "https://pm.internal/api/v2"
            team_id = "9001"
            cache_ttl_secs = 60
            "#,
        )
        .unwrap();
        assert_eq!(toml.api_base_url.as_deref(), Some("https://pm.internal/api/v2"));
        assert_eq!(toml.team_id.as_deref(), Some("9001"));
        assert_eq!(toml.cache_ttl_secs, Some(60));
        assert!(toml.api_token.is_none());
    }
}
