use crate::pipeline::{Envelope, PipelineError, Transform};
use thermo_client::{
    domain::{GasMeterReading, ThermostatReading},
    engine::adjusted_outdoor_temperature,
};
use time::{macros::datetime, OffsetDateTime};

fn check_timestamp(ts: OffsetDateTime) -> Result<(), PipelineError> {
    let min_ts = datetime!(2000-01-01 00:00:00 UTC);
    let max_ts = datetime!(2100-01-01 00:00:00 UTC);

    if ts < min_ts || ts > max_ts {
        return Err(PipelineError::Transform("timestamp out of allowed range".to_string()));
    }
    Ok(())
}

/// Pure validation of a `ThermostatReading`.
///
/// Rules:
/// - indoor temperature within [-40, 130] °F.
/// - humidity, when present, within [0, 100] %.
/// - recorded_at within [2000-01-01, 2100-01-01].
pub fn validate_thermostat_reading(
    env: Envelope<ThermostatReading>,
) -> Result<Envelope<ThermostatReading>, PipelineError> {
    let r = &env.payload;

    if !(-40.0..=130.0).contains(&r.indoor_temp_f) {
        return Err(PipelineError::Transform(format!(
            "indoor temperature {} out of range",
            r.indoor_temp_f
        )));
    }
    if let Some(h) = r.humidity_pct {
        if !(0..=100).contains(&h) {
            return Err(PipelineError::Transform(format!("humidity {h} out of range")));
        }
    }
    check_timestamp(r.recorded_at)?;

    Ok(env)
}

/// Meter values are non-negative and read to the nearest half CCF.
pub fn check_meter_value(value: f64) -> Result<(), PipelineError> {
    if !value.is_finite() || value < 0.0 {
        return Err(PipelineError::Transform(format!(
            "meter reading {value} must be a non-negative number"
        )));
    }
    if (value * 2.0).fract() != 0.0 {
        return Err(PipelineError::Transform(format!(
            "meter reading {value} is not a multiple of 0.5 CCF"
        )));
    }
    Ok(())
}

/// Pure validation of a `GasMeterReading` before its delta is computed.
pub fn validate_gas_meter_reading(
    env: Envelope<GasMeterReading>,
) -> Result<Envelope<GasMeterReading>, PipelineError> {
    check_meter_value(env.payload.meter_reading)?;
    check_timestamp(env.payload.recorded_at)?;
    Ok(env)
}

#[derive(Clone, Default)]
pub struct ThermostatReadingValidation;

#[async_trait::async_trait]
impl Transform<ThermostatReading, ThermostatReading> for ThermostatReadingValidation {
    async fn apply(
        &self,
        input: Envelope<ThermostatReading>,
    ) -> Result<Envelope<ThermostatReading>, PipelineError> {
        validate_thermostat_reading(input).inspect_err(|_| {
            metrics::counter!("validation_thermostat_reading_rejected_total").increment(1);
        })
    }
}

/// Fills `adjusted_outdoor_temp_f` from the raw outdoor temperature.
#[derive(Clone)]
pub struct AdjustOutdoorTemperature {
    heat_rise_factor: f64,
}

impl AdjustOutdoorTemperature {
    pub fn new(heat_rise_factor: f64) -> Self {
        Self { heat_rise_factor }
    }
}

#[async_trait::async_trait]
impl Transform<ThermostatReading, ThermostatReading> for AdjustOutdoorTemperature {
    async fn apply(
        &self,
        mut input: Envelope<ThermostatReading>,
    ) -> Result<Envelope<ThermostatReading>, PipelineError> {
        let r = &mut input.payload;
        r.adjusted_outdoor_temp_f = r
            .outdoor_temp_f
            .map(|t| adjusted_outdoor_temperature(t, self.heat_rise_factor));
        Ok(input)
    }
}

#[derive(Clone, Default)]
pub struct GasMeterReadingValidation;

#[async_trait::async_trait]
impl Transform<GasMeterReading, GasMeterReading> for GasMeterReadingValidation {
    async fn apply(
        &self,
        input: Envelope<GasMeterReading>,
    ) -> Result<Envelope<GasMeterReading>, PipelineError> {
        validate_gas_meter_reading(input).inspect_err(|_| {
            metrics::counter!("validation_gas_meter_reading_rejected_total").increment(1);
        })
    }
}
