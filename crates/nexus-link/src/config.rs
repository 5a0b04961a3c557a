//! Console configuration: defaults, then an optional TOML file, then
//! `NEXUS_*` environment overrides.

use std::path::Path;
use std::time::Duration;

use nexus_core::{AudioConfig, CoordinatorConfig, ProjectionConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LinkError, Result};
use crate::stream::StreamConfig;

pub const DEFAULT_API_URL: &str = "http://localhost:8003";
pub const DEFAULT_WS_URL: &str = "ws://localhost:8003/ws";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub api_url: String,
    pub ws_url: String,
    pub stream_enabled: bool,
    pub request_timeout_ms: u64,
    pub reconnect_interval_ms: u64,
    pub max_reconnect_attempts: u32,
    pub display_window_ms: u64,
    pub audio_enabled: bool,
    pub audio_volume: f64,
    pub health_poll_ms: u64,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            stream_enabled: true,
            request_timeout_ms: 10_000,
            reconnect_interval_ms: 3_000,
            max_reconnect_attempts: 10,
            display_window_ms: 3_000,
            audio_enabled: true,
            audio_volume: nexus_core::constants::DEFAULT_VOLUME,
            health_poll_ms: 5_000,
        }
    }
}

impl ConsoleConfig {
    /// Load all three layers using the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Load with an explicit environment lookup.
    pub fn load_with(path: Option<&Path>, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    LinkError::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                debug!(path = %path.display(), "loaded config file");
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Override fields from `NEXUS_*` variables. Unset variables are skipped;
    /// set but unparseable ones are errors.
    pub fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = env("NEXUS_API_URL") {
            self.api_url = v;
        }
        if let Some(v) = env("NEXUS_WS_URL") {
            self.ws_url = v;
        }
        if let Some(v) = env("NEXUS_STREAM_ENABLED") {
            self.stream_enabled = parse_bool("NEXUS_STREAM_ENABLED", &v)?;
        }
        if let Some(v) = env("NEXUS_REQUEST_TIMEOUT_MS") {
            self.request_timeout_ms = parse_num("NEXUS_REQUEST_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = env("NEXUS_RECONNECT_INTERVAL_MS") {
            self.reconnect_interval_ms = parse_num("NEXUS_RECONNECT_INTERVAL_MS", &v)?;
        }
        if let Some(v) = env("NEXUS_MAX_RECONNECT_ATTEMPTS") {
            self.max_reconnect_attempts = parse_num("NEXUS_MAX_RECONNECT_ATTEMPTS", &v)?;
        }
        if let Some(v) = env("NEXUS_DISPLAY_WINDOW_MS") {
            self.display_window_ms = parse_num("NEXUS_DISPLAY_WINDOW_MS", &v)?;
        }
        if let Some(v) = env("NEXUS_AUDIO_ENABLED") {
            self.audio_enabled = parse_bool("NEXUS_AUDIO_ENABLED", &v)?;
        }
        if let Some(v) = env("NEXUS_AUDIO_VOLUME") {
            self.audio_volume = parse_num("NEXUS_AUDIO_VOLUME", &v)?;
        }
        if let Some(v) = env("NEXUS_HEALTH_POLL_MS") {
            self.health_poll_ms = parse_num("NEXUS_HEALTH_POLL_MS", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(LinkError::Config(format!(
                "api_url must be an http(s) URL, got '{}'",
                self.api_url
            )));
        }
        if !(self.ws_url.starts_with("ws://") || self.ws_url.starts_with("wss://")) {
            return Err(LinkError::Config(format!(
                "ws_url must be a ws(s) URL, got '{}'",
                self.ws_url
            )));
        }
        if !(0.0..=1.0).contains(&self.audio_volume) {
            return Err(LinkError::Config(format!(
                "audio_volume must be within [0, 1], got {}",
                self.audio_volume
            )));
        }
        for (name, value) in [
            ("request_timeout_ms", self.request_timeout_ms),
            ("reconnect_interval_ms", self.reconnect_interval_ms),
            ("display_window_ms", self.display_window_ms),
            ("health_poll_ms", self.health_poll_ms),
        ] {
            if value == 0 {
                return Err(LinkError::Config(format!("{name} must be greater than zero")));
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn health_poll(&self) -> Duration {
        Duration::from_millis(self.health_poll_ms)
    }

    pub fn stream(&self) -> StreamConfig {
        StreamConfig {
            url: self.ws_url.clone(),
            enabled: self.stream_enabled,
            reconnect_interval: Duration::from_millis(self.reconnect_interval_ms),
            max_reconnect_attempts: self.max_reconnect_attempts,
        }
    }

    pub fn audio(&self) -> AudioConfig {
        AudioConfig {
            enabled: self.audio_enabled,
            volume: self.audio_volume,
        }
    }

    pub fn coordinator(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            projection: ProjectionConfig {
                display_window: Duration::from_millis(self.display_window_ms),
                ..ProjectionConfig::default()
            },
            ..CoordinatorConfig::default()
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(LinkError::Config(format!(
            "{key}: expected a boolean, got '{other}'"
        ))),
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| LinkError::Config(format!("{key}: {e} ('{}')", value.trim())))
}
