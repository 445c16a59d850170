// Operator display preferences
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::schema::SchemaError;

pub const MIN_REFRESH_INTERVAL_MS: u32 = 1000;
pub const MAX_REFRESH_INTERVAL_MS: u32 = 60_000;
pub const MIN_FEED_ITEMS: usize = 10;
pub const MAX_FEED_ITEMS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChartTimeRange {
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "24h")]
    OneDay,
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "30d")]
    ThirtyDays,
}

impl ChartTimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartTimeRange::OneHour => "1h",
            ChartTimeRange::OneDay => "24h",
            ChartTimeRange::SevenDays => "7d",
            ChartTimeRange::ThirtyDays => "30d",
        }
    }
}

impl std::str::FromStr for ChartTimeRange {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1h" => Ok(ChartTimeRange::OneHour),
            "24h" => Ok(ChartTimeRange::OneDay),
            "7d" => Ok(ChartTimeRange::SevenDays),
            "30d" => Ok(ChartTimeRange::ThirtyDays),
            other => Err(SchemaError::OutOfRange {
                field: "chartTimeRange",
                reason: format!("unknown range {other}"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub theme: Theme,
    pub refresh_interval_ms: u32,
    pub max_feed_items: usize,
    pub chart_time_range: ChartTimeRange,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: Theme::System,
            refresh_interval_ms: 5000,
            max_feed_items: 100,
            chart_time_range: ChartTimeRange::OneDay,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum PreferencesError {
    #[error("refreshIntervalMs must be within [1000, 60000], got {0}")]
    RefreshInterval(u32),

    #[error("maxFeedItems must be within [10, 500], got {0}")]
    MaxFeedItems(usize),
}

impl Preferences {
    pub fn check(&self) -> Result<(), PreferencesError> {
        if !(MIN_REFRESH_INTERVAL_MS..=MAX_REFRESH_INTERVAL_MS).contains(&self.refresh_interval_ms) {
            return Err(PreferencesError::RefreshInterval(self.refresh_interval_ms));
        }
        if !(MIN_FEED_ITEMS..=MAX_FEED_ITEMS).contains(&self.max_feed_items) {
            return Err(PreferencesError::MaxFeedItems(self.max_feed_items));
        }
        Ok(())
    }

    /// Strict parse of a stored or submitted preferences object
    pub fn parse(raw: &Value) -> Result<Self, SchemaError> {
        let prefs: Preferences =
            serde_json::from_value(raw.clone()).map_err(|e| SchemaError::Malformed(e.to_string()))?;
        prefs.check().map_err(|e| SchemaError::OutOfRange {
            field: match e {
                PreferencesError::RefreshInterval(_) => "refreshIntervalMs",
                PreferencesError::MaxFeedItems(_) => "maxFeedItems",
            },
            reason: e.to_string(),
        })?;
        Ok(prefs)
    }

    /// Parse stored text, falling back to defaults on anything unexpected
    pub fn parse_or_default(stored: Option<&str>) -> Self {
        let Some(text) = stored else {
            return Self::default();
        };
        let parsed = serde_json::from_str::<Value>(text)
            .map_err(|e| SchemaError::Malformed(e.to_string()))
            .and_then(|raw| Self::parse(&raw));
        match parsed {
            Ok(prefs) => prefs,
            Err(e) => {
                tracing::warn!("Stored preferences rejected, using defaults: {}", e);
                Self::default()
            }
        }
    }

    pub fn merged(&self, patch: &PreferencesPatch) -> Self {
        Self {
            theme: patch.theme.unwrap_or(self.theme),
            refresh_interval_ms: patch.refresh_interval_ms.unwrap_or(self.refresh_interval_ms),
            max_feed_items: patch.max_feed_items.unwrap_or(self.max_feed_items),
            chart_time_range: patch.chart_time_range.unwrap_or(self.chart_time_range),
        }
    }
}

/// Partial update; absent fields keep their current value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PreferencesPatch {
    pub theme: Option<Theme>,
    pub refresh_interval_ms: Option<u32>,
    pub max_feed_items: Option<usize>,
    pub chart_time_range: Option<ChartTimeRange>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let prefs = Preferences::default();
        let json = serde_json::to_value(prefs).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "theme": "system",
                "refreshIntervalMs": 5000,
                "maxFeedItems": 100,
                "chartTimeRange": "24h"
            })
        );
    }

    #[test]
    fn test_parse_or_default_fallbacks() {
        assert_eq!(Preferences::parse_or_default(None), Preferences::default());
        assert_eq!(Preferences::parse_or_default(Some("{not json")), Preferences::default());
        assert_eq!(Preferences::parse_or_default(Some("[1,2]")), Preferences::default());

        let out_of_range = r#"{"theme":"dark","refreshIntervalMs":5000,"maxFeedItems":5000,"chartTimeRange":"7d"}"#;
        assert_eq!(Preferences::parse_or_default(Some(out_of_range)), Preferences::default());

        let unknown_theme = r#"{"theme":"neon","refreshIntervalMs":5000,"maxFeedItems":50,"chartTimeRange":"7d"}"#;
        assert_eq!(Preferences::parse_or_default(Some(unknown_theme)), Preferences::default());
    }

    #[test]
    fn test_parse_or_default_accepts_valid() {
        let stored = r#"{"theme":"dark","refreshIntervalMs":2000,"maxFeedItems":50,"chartTimeRange":"7d"}"#;
        let prefs = Preferences::parse_or_default(Some(stored));
        assert_eq!(prefs.theme, Theme::Dark);
        assert_eq!(prefs.max_feed_items, 50);
        assert_eq!(prefs.chart_time_range, ChartTimeRange::SevenDays);
    }

    #[test]
    fn test_merge_and_check() {
        let patch = PreferencesPatch {
            max_feed_items: Some(20),
            ..Default::default()
        };
        let merged = Preferences::default().merged(&patch);
        assert_eq!(merged.max_feed_items, 20);
        assert_eq!(merged.theme, Theme::System);
        assert!(merged.check().is_ok());

        let bad = Preferences::default().merged(&PreferencesPatch {
            refresh_interval_ms: Some(10),
            ..Default::default()
        });
        assert_eq!(bad.check(), Err(PreferencesError::RefreshInterval(10)));
    }

    #[test]
    fn test_range_from_str() {
        assert_eq!("30d".parse::<ChartTimeRange>().unwrap(), ChartTimeRange::ThirtyDays);
        assert!("90d".parse::<ChartTimeRange>().is_err());
    }
}
