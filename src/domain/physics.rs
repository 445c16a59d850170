// Physical model - Motor power draw and thermal dynamics
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::schema::SchemaError;

pub const BASE_LOAD_WATTS: f64 = 50.0;
pub const MAX_POWER_WATTS: f64 = 1000.0;
pub const AMBIENT_TEMP_C: f64 = 22.0;
pub const HEAT_RATE_PER_KW_MS: f64 = 0.002;
pub const COOL_RATE_PER_MS: f64 = 0.001;
/// Below this draw the motor counts as idle and sheds heat twice as fast
pub const IDLE_POWER_KW: f64 = 0.1;
pub const MIN_TEMP_C: f64 = 15.0;
pub const MAX_TEMP_C: f64 = 95.0;
/// Longest gap we extrapolate thermal dynamics over
pub const MAX_DELTA_MS: i64 = 10_000;

/// One speed/power/temperature measurement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorSample {
    pub motor_speed: f64,
    pub power_consumption_watts: f64,
    pub temperature_c: f64,
    pub timestamp: i64,
}

impl SensorSample {
    pub fn new(motor_speed: f64, power_consumption_watts: f64, temperature_c: f64, timestamp: i64) -> Self {
        Self {
            motor_speed,
            power_consumption_watts,
            temperature_c,
            timestamp,
        }
    }

    /// Shape-check untyped input. Range checks here are schema checks only;
    /// physical plausibility is the integrity validator's job.
    pub fn parse(raw: &Value) -> Result<Self, SchemaError> {
        let sample: SensorSample = serde_json::from_value(raw.clone())
            .map_err(|e| SchemaError::Malformed(e.to_string()))?;

        let numbers = [
            ("motorSpeed", sample.motor_speed),
            ("powerConsumptionWatts", sample.power_consumption_watts),
            ("temperatureC", sample.temperature_c),
        ];
        if let Some(&(field, _)) = numbers.iter().find(|(_, v)| !v.is_finite()) {
            return Err(SchemaError::OutOfRange {
                field,
                reason: "not a finite number".to_string(),
            });
        }
        if !(0.0..=100.0).contains(&sample.motor_speed) {
            return Err(SchemaError::OutOfRange {
                field: "motorSpeed",
                reason: format!("{} outside [0, 100]", sample.motor_speed),
            });
        }
        if sample.power_consumption_watts < 0.0 {
            return Err(SchemaError::OutOfRange {
                field: "powerConsumptionWatts",
                reason: format!("{} is negative", sample.power_consumption_watts),
            });
        }

        Ok(sample)
    }
}

/// Expected electrical draw for a motor speed in percent
pub fn power_from_speed(motor_speed: f64) -> f64 {
    if motor_speed <= 0.0 {
        return 0.0;
    }
    let ratio = motor_speed / 100.0;
    BASE_LOAD_WATTS + ratio * ratio * (MAX_POWER_WATTS - BASE_LOAD_WATTS)
}

/// Temperature after `delta_ms` at the given draw, rounded to 0.1°C
pub fn next_temperature(power_consumption_watts: f64, current_temp_c: f64, delta_ms: i64) -> f64 {
    let delta = delta_ms as f64;
    let power_kw = power_consumption_watts / 1000.0;
    let heat_gain = power_kw * HEAT_RATE_PER_KW_MS * delta;
    let idle_factor = if power_kw < IDLE_POWER_KW { 2.0 } else { 1.0 };
    let cooling = (current_temp_c - AMBIENT_TEMP_C) * COOL_RATE_PER_MS * delta * idle_factor;

    let next = (current_temp_c + heat_gain - cooling).clamp(MIN_TEMP_C, MAX_TEMP_C);
    (next * 10.0).round() / 10.0
}

pub fn clamp_delta_ms(delta_ms: i64) -> i64 {
    delta_ms.clamp(0, MAX_DELTA_MS)
}

/// Simulated sensor that walks the physical model forward
#[derive(Debug, Clone)]
pub struct SampleGenerator {
    previous: Option<(f64, i64)>,
    fixed_speed: Option<f64>,
}

impl Default for SampleGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleGenerator {
    pub fn new() -> Self {
        Self {
            previous: None,
            fixed_speed: None,
        }
    }

    pub fn with_fixed_speed(motor_speed: f64) -> Self {
        Self {
            previous: None,
            fixed_speed: Some(motor_speed.clamp(0.0, 100.0)),
        }
    }

    pub fn next_sample(&mut self, now_ms: i64) -> SensorSample {
        let (prev_temp, prev_ts) = self.previous.unwrap_or((AMBIENT_TEMP_C, now_ms.saturating_sub(5000)));
        let delta_ms = clamp_delta_ms(now_ms.saturating_sub(prev_ts));

        let motor_speed = self
            .fixed_speed
            .unwrap_or_else(|| rand::thread_rng().gen_range(30..80) as f64);
        let power = power_from_speed(motor_speed).round();
        let temperature = next_temperature(power, prev_temp, delta_ms);

        self.previous = Some((temperature, now_ms));
        SensorSample::new(motor_speed, power, temperature, now_ms)
    }
}
