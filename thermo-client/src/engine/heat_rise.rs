//! Correction for heat rising from a lower zone into the monitored zone.
//!
//! Below the threshold the lower zone's furnace is assumed to be running, so
//! the monitored zone sees a milder effective outdoor temperature.

use time::OffsetDateTime;

use super::EngineError;
use crate::domain::ThermostatReading;

pub const HEAT_RISE_THRESHOLD_F: f64 = 65.0;

pub fn adjusted_outdoor_temperature(outdoor_f: f64, factor: f64) -> f64 {
    if outdoor_f < HEAT_RISE_THRESHOLD_F {
        outdoor_f + factor * (HEAT_RISE_THRESHOLD_F - outdoor_f)
    } else {
        outdoor_f
    }
}

/// Factor for which the adjusted temperature at `outdoor_f` equals `setpoint_f`.
///
/// The event is the monitored zone calling for heat at `outdoor_f`, i.e. the
/// rising heat alone could no longer hold `setpoint_f`.
pub fn calibrate_heat_rise_factor(outdoor_f: f64, setpoint_f: f64) -> Result<f64, EngineError> {
    if outdoor_f >= HEAT_RISE_THRESHOLD_F {
        return Err(EngineError::OutOfDomainCalibration {
            outdoor_f,
            threshold_f: HEAT_RISE_THRESHOLD_F,
        });
    }
    Ok((setpoint_f - outdoor_f) / (HEAT_RISE_THRESHOLD_F - outdoor_f))
}

/// A reading where the zone's heating switched on.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatingOnset {
    pub recorded_at: OffsetDateTime,
    pub outdoor_f: f64,
    pub setpoint_f: f64,
}

impl HeatingOnset {
    pub fn calibrated_factor(&self) -> Result<f64, EngineError> {
        calibrate_heat_rise_factor(self.outdoor_f, self.setpoint_f)
    }
}

/// Off-to-on heating transitions in a time-ordered series.
///
/// The first reading never counts as an onset since its predecessor is
/// unknown. Transitions without an outdoor temperature are skipped.
pub fn heating_onsets(readings: &[ThermostatReading]) -> Vec<HeatingOnset> {
    readings
        .windows(2)
        .filter(|w| !w[0].is_heating && w[1].is_heating)
        .filter_map(|w| {
            let r = &w[1];
            r.outdoor_temp_f.map(|outdoor_f| HeatingOnset {
                recorded_at: r.recorded_at,
                outdoor_f,
                setpoint_f: f64::from(r.heat_setpoint_f),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FanMode, ThermostatMode};
    use time::macros::datetime;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn warm_temperatures_are_unchanged_for_any_factor() {
        for t in [65.0, 66.0, 80.5] {
            for f in [0.0, 0.3, 0.75, 1.0] {
                assert_eq!(adjusted_outdoor_temperature(t, f), t);
            }
        }
    }

    #[test]
    fn boundary_factors() {
        for t in [-10.0, 20.0, 50.0, 64.9] {
            assert_eq!(adjusted_outdoor_temperature(t, 0.0), t);
            assert!(close(adjusted_outdoor_temperature(t, 1.0), 65.0));
        }
    }

    #[test]
    fn worked_examples() {
        assert!(close(adjusted_outdoor_temperature(50.0, 0.3), 54.5));
        assert!(close(adjusted_outdoor_temperature(40.0, 0.3), 47.5));
        assert!((adjusted_outdoor_temperature(27.0, 0.3) - 38.4).abs() < 0.05);
    }

    #[test]
    fn calibration_round_trips() {
        for (t, s) in [(27.0, 38.4), (40.0, 68.0), (-5.0, 62.0), (64.0, 64.5)] {
            let f = calibrate_heat_rise_factor(t, s).unwrap();
            assert!(close(adjusted_outdoor_temperature(t, f), s));
        }
    }

    #[test]
    fn calibration_rejected_at_or_above_threshold() {
        assert_eq!(
            calibrate_heat_rise_factor(65.0, 68.0),
            Err(EngineError::OutOfDomainCalibration {
                outdoor_f: 65.0,
                threshold_f: 65.0
            })
        );
        assert!(calibrate_heat_rise_factor(72.0, 68.0).is_err());
    }

    fn reading(ts: OffsetDateTime, outdoor: Option<f64>, heating: bool) -> ThermostatReading {
        ThermostatReading {
            recorded_at: ts,
            indoor_temp_f: 67.0,
            outdoor_temp_f: outdoor,
            adjusted_outdoor_temp_f: outdoor.map(|t| adjusted_outdoor_temperature(t, 0.3)),
            heat_setpoint_f: 68,
            cool_setpoint_f: 76,
            humidity_pct: Some(40),
            mode: ThermostatMode::Heat,
            fan_mode: FanMode::Auto,
            is_heating: heating,
            is_cooling: false,
        }
    }

    #[test]
    fn onsets_are_off_to_on_transitions() {
        let readings = vec![
            reading(datetime!(2026-01-05 00:00 UTC), Some(30.0), true),
            reading(datetime!(2026-01-05 00:15 UTC), Some(30.0), false),
            reading(datetime!(2026-01-05 00:30 UTC), Some(28.0), true),
            reading(datetime!(2026-01-05 00:45 UTC), Some(27.0), true),
            reading(datetime!(2026-01-05 01:00 UTC), Some(27.0), false),
            reading(datetime!(2026-01-05 01:15 UTC), None, true),
        ];

        let onsets = heating_onsets(&readings);
        assert_eq!(onsets.len(), 1);
        assert_eq!(onsets[0].recorded_at, datetime!(2026-01-05 00:30 UTC));
        assert_eq!(onsets[0].outdoor_f, 28.0);
        assert_eq!(onsets[0].setpoint_f, 68.0);

        let f = onsets[0].calibrated_factor().unwrap();
        assert!(close(adjusted_outdoor_temperature(28.0, f), 68.0));
    }
}
