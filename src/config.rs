use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::alarm::scheduler::DEFAULT_TICK;
use crate::gateway::spotify::{DEFAULT_API_BASE, DEFAULT_REQUEST_TIMEOUT};
use crate::selection::DEFAULT_PLAYLIST_LIMIT;

/// Settings after merging the optional settings file with CLI overrides.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AppConfig {
    pub access_token: Option<String>,
    pub api_base: String,
    pub request_timeout: Duration,
    pub playlist_limit: u32,
    pub tick: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            playlist_limit: DEFAULT_PLAYLIST_LIMIT,
            tick: DEFAULT_TICK,
        }
    }
}

/// Values given on the command line; each one wins over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub access_token: Option<String>,
    pub api_base: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub playlist_limit: Option<u32>,
    pub tick_ms: Option<u64>,
}

pub fn load_app_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read settings file {}", path.display()))?;
    parse_app_config_text(&content)
}

pub fn parse_app_config_text(content: &str) -> Result<AppConfig> {
    let raw = serde_json::from_str::<AppConfigFile>(content).map_err(|err| {
        let line = err.line();
        let column = err.column();
        anyhow::anyhow!("invalid JSON at line {line}, column {column}: {err}")
    })?;

    if raw.version != 1 {
        bail!(
            "unsupported settings version {}; expected version 1",
            raw.version
        );
    }

    let defaults = AppConfig::default();
    let config = AppConfig {
        access_token: raw.spotify.access_token,
        api_base: raw.spotify.api_base.unwrap_or(defaults.api_base),
        request_timeout: raw
            .spotify
            .request_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout),
        playlist_limit: raw.spotify.playlist_limit.unwrap_or(defaults.playlist_limit),
        tick: raw
            .scheduler
            .tick_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.tick),
    };
    validate(&config)?;
    Ok(config)
}

impl AppConfig {
    pub fn apply(mut self, overrides: ConfigOverrides) -> Result<Self> {
        if let Some(token) = overrides.access_token {
            self.access_token = Some(token);
        }
        if let Some(api_base) = overrides.api_base {
            self.api_base = api_base;
        }
        if let Some(secs) = overrides.request_timeout_secs {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(limit) = overrides.playlist_limit {
            self.playlist_limit = limit;
        }
        if let Some(tick_ms) = overrides.tick_ms {
            self.tick = Duration::from_millis(tick_ms);
        }
        validate(&self)?;
        Ok(self)
    }

    pub fn require_access_token(&self) -> Result<&str> {
        self.access_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .context(
                "no access token configured; pass --access-token, set SPOTIFY_ACCESS_TOKEN or add spotify.access_token to the settings file",
            )
    }
}

fn validate(config: &AppConfig) -> Result<()> {
    if config.tick.is_zero() {
        bail!("tick_ms must be greater than zero");
    }
    if config.request_timeout.is_zero() {
        bail!("request_timeout_secs must be greater than zero");
    }
    if !(1..=50).contains(&config.playlist_limit) {
        bail!(
            "playlist_limit must be between 1 and 50, got {}",
            config.playlist_limit
        );
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AppConfigFile {
    version: u32,
    #[serde(default)]
    spotify: SpotifySection,
    #[serde(default)]
    scheduler: SchedulerSection,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SpotifySection {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    api_base: Option<String>,
    #[serde(default)]
    request_timeout_secs: Option<u64>,
    #[serde(default)]
    playlist_limit: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SchedulerSection {
    #[serde(default)]
    tick_ms: Option<u64>,
}
