// Historical telemetry domain models
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::schema::SchemaError;

/// One aggregate point returned by the history collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPoint {
    /// ISO-8601 timestamp
    pub time: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl HistoricalPoint {
    pub fn new(time: String, value: f64, label: Option<String>) -> Self {
        Self { time, value, label }
    }

    pub fn parse(raw: &Value) -> Result<Self, SchemaError> {
        let point: HistoricalPoint =
            serde_json::from_value(raw.clone()).map_err(|e| SchemaError::Malformed(e.to_string()))?;
        if !point.value.is_finite() {
            return Err(SchemaError::OutOfRange {
                field: "value",
                reason: "not a finite number".to_string(),
            });
        }
        if chrono::DateTime::parse_from_rfc3339(&point.time).is_err() {
            return Err(SchemaError::OutOfRange {
                field: "time",
                reason: format!("{} is not ISO-8601", point.time),
            });
        }
        Ok(point)
    }

    fn time_ms(&self) -> Option<i64> {
        chrono::DateTime::parse_from_rfc3339(&self.time)
            .ok()
            .map(|t| t.timestamp_millis())
    }
}

/// Downsample using bucket averaging; keeps the middle point's time and label
pub fn downsample_points(points: Vec<HistoricalPoint>, max_points: usize) -> Vec<HistoricalPoint> {
    if max_points == 0 || points.len() <= max_points {
        return points;
    }

    let bucket_size = (points.len() as f64 / max_points as f64).ceil() as usize;
    let mut downsampled = Vec::with_capacity(max_points);

    for chunk in points.chunks(bucket_size) {
        let mid = &chunk[chunk.len() / 2];
        let avg_value = chunk.iter().map(|p| p.value).sum::<f64>() / chunk.len() as f64;
        downsampled.push(HistoricalPoint::new(mid.time.clone(), avg_value, mid.label.clone()));
    }

    downsampled
}

/// True when points are in non-decreasing time order
pub fn is_ordered(points: &[HistoricalPoint]) -> bool {
    points
        .windows(2)
        .all(|w| match (w[0].time_ms(), w[1].time_ms()) {
            (Some(a), Some(b)) => a <= b,
            _ => false,
        })
}
