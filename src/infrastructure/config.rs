use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::application::feed_connection::FeedSettings;
use crate::application::live_feed::IntegrityPolicy;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub preferences: PreferencesConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    /// Live source; unset or empty means local generator only
    #[serde(default)]
    pub upstream_url: Option<String>,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_generator_interval_ms")]
    pub generator_interval_ms: u64,
    #[serde(default)]
    pub integrity_policy: IntegrityPolicy,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            upstream_url: None,
            connect_timeout_ms: default_connect_timeout_ms(),
            generator_interval_ms: default_generator_interval_ms(),
            integrity_policy: IntegrityPolicy::default(),
        }
    }
}

impl FeedConfig {
    pub fn settings(&self) -> FeedSettings {
        FeedSettings {
            upstream_url: self
                .upstream_url
                .as_ref()
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty()),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            generator_interval: Duration::from_millis(self.generator_interval_ms.max(1)),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    /// History backend; unset means simulated history
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_history_latency_ms")]
    pub simulated_latency_ms: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            simulated_latency_ms: default_history_latency_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PreferencesConfig {
    /// JSON file backing the preference store; empty keeps preferences in memory
    #[serde(default = "default_preferences_path")]
    pub path: Option<PathBuf>,
}

impl Default for PreferencesConfig {
    fn default() -> Self {
        Self {
            path: default_preferences_path(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LayoutConfig {
    #[serde(default = "default_transition_ms")]
    pub transition_ms: u64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            transition_ms: default_transition_ms(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    3000
}

fn default_generator_interval_ms() -> u64 {
    2000
}

fn default_history_latency_ms() -> u64 {
    600
}

fn default_preferences_path() -> Option<PathBuf> {
    Some(PathBuf::from("data/preferences.json"))
}

fn default_transition_ms() -> u64 {
    320
}

/// `config/dashboard.*` (optional) overlaid by `DASHBOARD__SECTION__KEY` env vars
pub fn load_app_config() -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/dashboard").required(false))
        .add_source(config::Environment::with_prefix("DASHBOARD").separator("__"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Replace `${name}` placeholders in a URL template, encoding each value
pub fn prepare_url(template: &str, vars: &HashMap<String, String>) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        let placeholder = format!("${{{}}}", key);
        result = result.replace(&placeholder, &urlencoding::encode(value));
    }
    result
}
