// Live event domain model
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::physics::SensorSample;
use super::schema::SchemaError;

/// Payload keys that mark an embedded sensor sample
const SAMPLE_KEYS: [&str; 2] = ["motorSpeed", "powerConsumptionWatts"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Metric,
    Alert,
    Heartbeat,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [EventKind::Metric, EventKind::Alert, EventKind::Heartbeat];
}

/// One telemetry/alert/heartbeat record. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub timestamp: i64,
    pub payload: Map<String, Value>,
}

impl LiveEvent {
    pub fn new(id: String, kind: EventKind, timestamp: i64, payload: Map<String, Value>) -> Self {
        Self {
            id,
            kind,
            timestamp,
            payload,
        }
    }

    /// Parse-or-fail boundary for events arriving from outside the process
    pub fn parse(raw: &Value) -> Result<Self, SchemaError> {
        let event: LiveEvent =
            serde_json::from_value(raw.clone()).map_err(|e| SchemaError::Malformed(e.to_string()))?;
        if event.id.is_empty() {
            return Err(SchemaError::OutOfRange {
                field: "id",
                reason: "empty id".to_string(),
            });
        }
        Ok(event)
    }

    /// Sensor sample embedded in the payload, whatever the event kind.
    /// `Some(Err(_))` means the payload claims to carry a sample but it is malformed.
    pub fn sensor_sample(&self) -> Option<Result<SensorSample, SchemaError>> {
        if !SAMPLE_KEYS.iter().any(|key| self.payload.contains_key(*key)) {
            return None;
        }
        let mut raw = self.payload.clone();
        raw.entry("timestamp").or_insert_with(|| Value::from(self.timestamp));
        Some(SensorSample::parse(&Value::Object(raw)))
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Build a simulated event. Metric events carry `sample` in their payload when given.
pub fn synthesize_event(timestamp: i64, sample: Option<&SensorSample>) -> LiveEvent {
    let mut rng = rand::thread_rng();
    let kind = *EventKind::ALL.choose(&mut rng).unwrap_or(&EventKind::Heartbeat);

    let mut payload = Map::new();
    payload.insert("value".to_string(), Value::from(rng.gen_range(0..=1000)));
    payload.insert("source".to_string(), Value::from("simulation"));

    if let (EventKind::Metric, Some(sample)) = (kind, sample) {
        payload.insert("motorSpeed".to_string(), Value::from(sample.motor_speed));
        payload.insert(
            "powerConsumptionWatts".to_string(),
            Value::from(sample.power_consumption_watts),
        );
        payload.insert("temperatureC".to_string(), Value::from(sample.temperature_c));
    }

    LiveEvent::new(uuid::Uuid::new_v4().to_string(), kind, timestamp, payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_valid_event() {
        let raw = json!({
            "id": "evt-1",
            "type": "alert",
            "timestamp": 1_700_000_000_000i64,
            "payload": { "value": 3 }
        });
        let event = LiveEvent::parse(&raw).unwrap();
        assert_eq!(event.kind, EventKind::Alert);
        assert_eq!(event.payload["value"], json!(3));
    }

    #[test]
    fn test_parse_rejects_unknown_kind_and_missing_payload() {
        let bad_kind = json!({ "id": "a", "type": "gossip", "timestamp": 1, "payload": {} });
        assert!(LiveEvent::parse(&bad_kind).is_err());

        let no_payload = json!({ "id": "a", "type": "metric", "timestamp": 1 });
        assert!(LiveEvent::parse(&no_payload).is_err());

        let empty_id = json!({ "id": "", "type": "metric", "timestamp": 1, "payload": {} });
        assert!(LiveEvent::parse(&empty_id).is_err());
    }

    #[test]
    fn test_synthesized_event_round_trips_through_schema() {
        let sample = SensorSample::new(40.0, 202.0, 23.0, 5);
        for _ in 0..20 {
            let event = synthesize_event(5, Some(&sample));
            let parsed = LiveEvent::parse(&event.to_value()).unwrap();
            assert_eq!(parsed, event);
            assert_eq!(event.payload["source"], json!("simulation"));
            if event.kind == EventKind::Metric {
                let embedded = event.sensor_sample().unwrap().unwrap();
                assert_eq!(embedded, sample);
            } else {
                assert!(event.sensor_sample().is_none());
            }
        }
    }

    #[test]
    fn test_sample_found_on_any_kind() {
        let mut payload = Map::new();
        payload.insert("motorSpeed".to_string(), json!(100.0));
        payload.insert("powerConsumptionWatts".to_string(), json!(0.0));
        payload.insert("temperatureC".to_string(), json!(40.0));

        for kind in EventKind::ALL {
            let event = LiveEvent::new("s".to_string(), kind, 7, payload.clone());
            let sample = event.sensor_sample().unwrap().unwrap();
            assert_eq!(sample.timestamp, 7);
            assert_eq!(sample.power_consumption_watts, 0.0);
        }
    }

    #[test]
    fn test_partial_sample_is_malformed() {
        let mut payload = Map::new();
        payload.insert("powerConsumptionWatts".to_string(), json!(0.0));
        let event = LiveEvent::new("p".to_string(), EventKind::Heartbeat, 1, payload);
        assert!(matches!(event.sensor_sample(), Some(Err(_))));
    }

    #[test]
    fn test_synthesized_ids_are_unique() {
        let a = synthesize_event(1, None);
        let b = synthesize_event(1, None);
        assert_ne!(a.id, b.id);
    }
}
