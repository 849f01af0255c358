use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_USER_AGENT: &str = "mwdump/0.1";
pub const DEFAULT_API_PATH: &str = "/api.php";
pub const DEFAULT_LINK_PREFIX: &str = "/wiki/";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_CONFIG_FILENAME: &str = "mwdump.toml";

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct MwdumpConfig {
    #[serde(default)]
    pub wiki: WikiSection,
    #[serde(default)]
    pub http: HttpSection,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct WikiSection {
    pub host: Option<String>,
    pub api_path: Option<String>,
    pub user_agent: Option<String>,
    pub link_prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct HttpSection {
    pub timeout_ms: Option<u64>,
}

impl MwdumpConfig {
    /// Resolve the wiki host: `--wiki-host` flag > config. Blank values count
    /// as unset.
    pub fn wiki_host(&self, flag: Option<&str>) -> Option<String> {
        flag.or(self.wiki.host.as_deref())
            .map(str::trim)
            .filter(|host| !host.is_empty())
            .map(str::to_string)
    }

    /// Resolve the API path: config > DEFAULT_API_PATH.
    pub fn api_path(&self) -> &str {
        self.wiki.api_path.as_deref().unwrap_or(DEFAULT_API_PATH)
    }

    /// Resolve user agent: env MWDUMP_USER_AGENT > config > DEFAULT_USER_AGENT.
    pub fn user_agent(&self) -> String {
        if let Some(value) = env_override("MWDUMP_USER_AGENT") {
            return value;
        }
        self.wiki
            .user_agent
            .clone()
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
    }

    pub fn link_prefix(&self) -> &str {
        self.wiki
            .link_prefix
            .as_deref()
            .unwrap_or(DEFAULT_LINK_PREFIX)
    }

    /// Resolve the HTTP timeout: env MWDUMP_HTTP_TIMEOUT_MS > config > DEFAULT_TIMEOUT_MS.
    pub fn timeout_ms(&self) -> u64 {
        env_override("MWDUMP_HTTP_TIMEOUT_MS")
            .and_then(|value| value.parse::<u64>().ok())
            .or(self.http.timeout_ms)
            .unwrap_or(DEFAULT_TIMEOUT_MS)
    }
}

/// Load and parse an MwdumpConfig from a TOML file. Returns default if file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<MwdumpConfig> {
    if !config_path.exists() {
        return Ok(MwdumpConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: MwdumpConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

/// Join a wiki host (with scheme) and an API path into the endpoint URL.
pub fn api_url(wiki_host: &str, api_path: &str) -> String {
    let host = wiki_host.trim().trim_end_matches('/');
    let path = api_path.trim();
    if path.starts_with('/') {
        format!("{host}{path}")
    } else {
        format!("{host}/{path}")
    }
}

fn env_override(key: &str) -> Option<String> {
    let value = env::var(key).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
