//! Weather normalization adjustment (WNA) applied to the distribution rate.
//!
//! `WNAF = R * (HSF * (NDD - ADD)) / (BL + HSF * ADD)` in $/Mcf. A colder than
//! normal cycle (ADD > NDD) yields a credit, a warmer one a surcharge.

use time::Month;

use super::EngineError;

/// Mcf to CCF.
const CCF_PER_MCF: f64 = 10.0;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct WeatherNormalization {
    /// R, $/Mcf.
    pub distribution_rate_per_mcf: f64,
    /// HSF, Mcf per HDD.
    pub heat_sensitivity: f64,
    /// BL, Mcf.
    pub base_load: f64,
    /// Normal HDD per day used to derive NDD for a cycle.
    pub normal_daily_hdd: f64,
}

impl Default for WeatherNormalization {
    fn default() -> Self {
        Self {
            distribution_rate_per_mcf: 1.6261,
            heat_sensitivity: 0.012576,
            base_load: 1.0556,
            normal_daily_hdd: 24.0,
        }
    }
}

impl WeatherNormalization {
    /// WNA only applies to cycles billed November through April.
    pub fn applies_in(month: Month) -> bool {
        matches!(
            month,
            Month::November | Month::December | Month::January | Month::February | Month::March | Month::April
        )
    }

    pub fn normal_hdd(&self, days: u32) -> f64 {
        self.normal_daily_hdd * f64::from(days)
    }

    /// WNA factor in $/Mcf for normal (`ndd`) and actual (`add`) degree days.
    pub fn factor_per_mcf(&self, ndd: f64, add: f64) -> Result<f64, EngineError> {
        let denominator = self.base_load + self.heat_sensitivity * add;
        if denominator == 0.0 {
            return Err(EngineError::DegenerateDenominator("WNA base load term"));
        }
        Ok(self.distribution_rate_per_mcf * (self.heat_sensitivity * (ndd - add)) / denominator)
    }

    pub fn factor_per_ccf(&self, ndd: f64, add: f64) -> Result<f64, EngineError> {
        Ok(self.factor_per_mcf(ndd, add)? / CCF_PER_MCF)
    }
}
