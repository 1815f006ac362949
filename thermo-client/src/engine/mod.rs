//! Pure estimation model: degree days, heat-rise correction, usage factor,
//! meter deltas and bill projection. Nothing here performs I/O.

pub mod billing;
pub mod degree_days;
mod error;
pub mod heat_rise;
pub mod meter;
pub mod usage;
pub mod wna;

pub use billing::{project_bill, BillProjection, ForecastDay, LineItem, RateSchedule, SubRate};
pub use degree_days::{degree_day_samples, heating_degree_days, total_hdd, DailyTemperature, DegreeDaySample};
pub use error::EngineError;
pub use heat_rise::{adjusted_outdoor_temperature, calibrate_heat_rise_factor, heating_onsets, HeatingOnset};
pub use meter::meter_delta;
pub use usage::{averaged_usage_factor, billing_periods, usage_factor, BillingPeriod};
pub use wna::WeatherNormalization;

/// Calibration constants and rate table passed into every computation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    pub base_temperature_f: f64,
    pub heat_rise_factor: f64,
    pub usage_factor_ccf_per_hdd: f64,
    pub rates: RateSchedule,
    /// Enables the WNA rate override when set.
    pub weather_normalization: Option<WeatherNormalization>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_temperature_f: 65.0,
            heat_rise_factor: 0.3,
            usage_factor_ccf_per_hdd: 0.12,
            rates: RateSchedule::default(),
            weather_normalization: None,
        }
    }
}

impl EngineConfig {
    pub fn adjusted_outdoor_temperature(&self, outdoor_f: f64) -> f64 {
        heat_rise::adjusted_outdoor_temperature(outdoor_f, self.heat_rise_factor)
    }

    pub fn heating_degree_days(&self, temperature: DailyTemperature) -> f64 {
        degree_days::heating_degree_days(self.base_temperature_f, temperature)
    }

    /// Projection using the configured usage factor.
    pub fn project_bill(
        &self,
        actual_ccf: f64,
        actual_days: &[DegreeDaySample],
        forecast: &[ForecastDay],
    ) -> BillProjection {
        project_bill(
            &self.rates,
            self.base_temperature_f,
            self.usage_factor_ccf_per_hdd,
            actual_ccf,
            actual_days,
            forecast,
        )
    }
}
