// Integrity validator - Rejects physically implausible sensor samples
use serde::{Deserialize, Serialize};

use super::physics::{clamp_delta_ms, next_temperature, power_from_speed, SensorSample};

/// Allowed relative deviation from the modelled power draw
pub const POWER_TOLERANCE: f64 = 0.15;
/// Additive slack on the upper power bound, absorbs rounding
pub const POWER_SLACK_WATTS: f64 = 1.0;
pub const MAX_TEMP_DEVIATION_C: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ValidationOutcome {
    Valid,
    Invalid { reason: String },
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            ValidationOutcome::Valid => None,
            ValidationOutcome::Invalid { reason } => Some(reason),
        }
    }

    fn invalid(reason: String) -> Self {
        ValidationOutcome::Invalid { reason }
    }
}

/// Check a sample against the physical model.
///
/// `previous` must be the last *accepted* sample of the same stream; without
/// it the temperature check is skipped.
pub fn validate(sample: &SensorSample, previous: Option<&SensorSample>) -> ValidationOutcome {
    if sample.motor_speed > 0.0 && sample.power_consumption_watts < 1.0 {
        return ValidationOutcome::invalid(format!(
            "physical impossibility: motor running at {}% with zero power",
            sample.motor_speed
        ));
    }

    let expected_power = power_from_speed(sample.motor_speed);
    let min_power = expected_power * (1.0 - POWER_TOLERANCE);
    let max_power = expected_power * (1.0 + POWER_TOLERANCE) + POWER_SLACK_WATTS;
    if sample.power_consumption_watts < min_power || sample.power_consumption_watts > max_power {
        return ValidationOutcome::invalid(format!(
            "physical impossibility: power {}W inconsistent with speed {}% (expected ~{}W)",
            sample.power_consumption_watts,
            sample.motor_speed,
            expected_power.round()
        ));
    }

    let Some(previous) = previous else {
        return ValidationOutcome::Valid;
    };

    let delta_ms = clamp_delta_ms(sample.timestamp.saturating_sub(previous.timestamp));
    let expected_temp = next_temperature(sample.power_consumption_watts, previous.temperature_c, delta_ms);
    if (sample.temperature_c - expected_temp).abs() > MAX_TEMP_DEVIATION_C {
        return ValidationOutcome::invalid(format!(
            "temperature {}°C inconsistent with power/time (expected ~{:.1}°C)",
            sample.temperature_c, expected_temp
        ));
    }

    ValidationOutcome::Valid
}

/// Threads the last accepted sample through consecutive validations
#[derive(Debug, Clone, Default)]
pub struct IntegrityGate {
    last_accepted: Option<SensorSample>,
    rejected: u64,
}

impl IntegrityGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, sample: &SensorSample) -> ValidationOutcome {
        let outcome = validate(sample, self.last_accepted.as_ref());
        if outcome.is_valid() {
            self.last_accepted = Some(*sample);
        } else {
            self.rejected += 1;
        }
        outcome
    }

    pub fn last_accepted(&self) -> Option<&SensorSample> {
        self.last_accepted.as_ref()
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    pub fn reset(&mut self) {
        self.last_accepted = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::physics::SampleGenerator;
    use proptest::prelude::*;

    fn sample(speed: f64, power: f64, temp: f64, ts: i64) -> SensorSample {
        SensorSample::new(speed, power, temp, ts)
    }

    #[test]
    fn test_full_speed_zero_power_rejected() {
        let outcome = validate(&sample(100.0, 0.0, 25.0, 0), None);
        assert!(!outcome.is_valid());
        assert!(outcome.reason().unwrap().contains("zero power"));
    }

    #[test]
    fn test_half_speed_nominal_power_accepted() {
        let outcome = validate(&sample(50.0, 288.0, 30.0, 0), None);
        assert_eq!(outcome, ValidationOutcome::Valid);
    }

    #[test]
    fn test_power_outside_band_reports_expected() {
        let outcome = validate(&sample(50.0, 500.0, 30.0, 0), None);
        let reason = outcome.reason().unwrap().to_string();
        assert!(reason.contains("expected ~288W"), "{reason}");

        let outcome = validate(&sample(50.0, 200.0, 30.0, 0), None);
        assert!(!outcome.is_valid());
    }

    #[test]
    fn test_stopped_motor_with_no_power_is_fine() {
        assert!(validate(&sample(0.0, 0.0, 22.0, 0), None).is_valid());
        assert!(validate(&sample(0.0, 0.5, 22.0, 0), None).is_valid());
    }

    #[test]
    fn test_temperature_jump_rejected() {
        let previous = sample(50.0, 288.0, 30.0, 0);
        let expected = next_temperature(288.0, 30.0, 2000);
        let ok = sample(50.0, 288.0, expected + 4.0, 2000);
        assert!(validate(&ok, Some(&previous)).is_valid());

        let jump = sample(50.0, 288.0, expected + 6.0, 2000);
        let outcome = validate(&jump, Some(&previous));
        assert!(outcome.reason().unwrap().contains("inconsistent with power/time"));
    }

    #[test]
    fn test_stale_timestamp_gap_is_capped() {
        let previous = sample(50.0, 288.0, 40.0, 0);
        let capped = next_temperature(288.0, 40.0, 10_000);
        let later = sample(50.0, 288.0, capped, 3_600_000);
        assert!(validate(&later, Some(&previous)).is_valid());
    }

    #[test]
    fn test_extreme_timestamps_do_not_overflow() {
        let now = 1_700_000_000_000i64;
        let ancient = sample(50.0, 288.0, 30.0, i64::MIN);
        let capped = next_temperature(288.0, 30.0, 10_000);
        assert!(validate(&sample(50.0, 288.0, capped, now), Some(&ancient)).is_valid());

        // a sample from the far future counts as zero elapsed time
        let future = sample(50.0, 288.0, 30.0, i64::MAX);
        assert!(validate(&sample(50.0, 288.0, 30.0, i64::MIN), Some(&future)).is_valid());
        assert!(validate(&sample(50.0, 288.0, 30.0, now), Some(&future)).is_valid());
    }

    #[test]
    fn test_gate_threads_only_accepted_samples() {
        let mut gate = IntegrityGate::new();
        let first = sample(50.0, 288.0, 30.0, 0);
        assert!(gate.check(&first).is_valid());

        let bogus = sample(50.0, 0.0, 30.0, 1000);
        assert!(!gate.check(&bogus).is_valid());
        assert_eq!(gate.last_accepted(), Some(&first));
        assert_eq!(gate.rejected(), 1);
    }

    proptest! {
        #[test]
        fn prop_generated_stream_always_accepted(
            gaps in proptest::collection::vec(0i64..30_000, 1..60),
        ) {
            let mut generator = SampleGenerator::new();
            let mut gate = IntegrityGate::new();
            let mut now = 1_700_000_000_000i64;
            for gap in gaps {
                now += gap;
                let s = generator.next_sample(now);
                let outcome = gate.check(&s);
                prop_assert!(outcome.is_valid(), "{:?} rejected: {:?}", s, outcome);
            }
        }

        #[test]
        fn prop_running_without_power_never_accepted(
            speed in 0.001f64..=100.0,
            power in 0.0f64..1.0,
        ) {
            prop_assert!(!validate(&sample(speed, power, 22.0, 0), None).is_valid());
        }
    }
}
