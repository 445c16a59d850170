// History repositories - Simulated aggregates and an HTTP backend
use crate::application::history_repository::HistoryRepository;
use crate::domain::preferences::ChartTimeRange;
use crate::domain::telemetry::HistoricalPoint;
use crate::infrastructure::config::prepare_url;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use rand::Rng;
use std::collections::HashMap;
use std::time::Duration;

/// Synthetic history; stands in when no history backend is configured
#[derive(Debug, Clone)]
pub struct SimulatedHistoryRepository {
    latency: Duration,
}

impl SimulatedHistoryRepository {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }

    fn layout(range: ChartTimeRange) -> (i64, ChronoDuration) {
        match range {
            ChartTimeRange::OneHour => (12, ChronoDuration::minutes(5)),
            ChartTimeRange::OneDay => (24, ChronoDuration::hours(1)),
            ChartTimeRange::SevenDays => (7, ChronoDuration::days(1)),
            ChartTimeRange::ThirtyDays => (30, ChronoDuration::days(1)),
        }
    }
}

#[async_trait]
impl HistoryRepository for SimulatedHistoryRepository {
    async fn fetch_history(&self, range: ChartTimeRange) -> Result<Vec<HistoricalPoint>> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let (count, step) = Self::layout(range);
        let now = Utc::now();
        let mut rng = rand::thread_rng();

        let points = (0..count)
            .rev()
            .map(|i| {
                let t = now - step * i as i32;
                HistoricalPoint::new(
                    t.to_rfc3339(),
                    rng.gen_range(100..500) as f64,
                    Some(t.format("%Y-%m-%d").to_string()),
                )
            })
            .collect();

        Ok(points)
    }
}

#[derive(Debug, Clone)]
pub struct HttpHistoryRepository {
    base_url: String,
    client: reqwest::Client,
}

impl HttpHistoryRepository {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn build_query_url(&self, range: ChartTimeRange) -> String {
        let mut vars = HashMap::new();
        vars.insert("range".to_string(), range.as_str().to_string());
        format!("{}{}", self.base_url, prepare_url("/history?range=${range}", &vars))
    }
}

#[async_trait]
impl HistoryRepository for HttpHistoryRepository {
    async fn fetch_history(&self, range: ChartTimeRange) -> Result<Vec<HistoricalPoint>> {
        let url = self.build_query_url(range);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to send request to history backend")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("History query failed with status {}: {}", status, body);
        }

        let raw = response
            .json::<Vec<serde_json::Value>>()
            .await
            .context("Failed to parse history response")?;

        Ok(parse_points(raw))
    }
}

/// Keep well-formed points, log and drop the rest
fn parse_points(raw: Vec<serde_json::Value>) -> Vec<HistoricalPoint> {
    raw.iter()
        .filter_map(|value| match HistoricalPoint::parse(value) {
            Ok(point) => Some(point),
            Err(e) => {
                tracing::warn!("Dropping malformed history point: {}", e);
                None
            }
        })
        .collect()
}
