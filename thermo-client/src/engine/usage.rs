use time::{Duration, OffsetDateTime, UtcOffset};

use super::{degree_days, EngineError};
use crate::domain::GasMeterReading;

/// Gas consumed and heating demand accumulated between two meter readings.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BillingPeriod {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
    pub ccf: f64,
    pub hdd: f64,
}

impl BillingPeriod {
    pub fn usage_factor(&self) -> Result<f64, EngineError> {
        usage_factor(self.ccf, self.hdd)
    }
}

/// CCF consumed per heating degree day.
pub fn usage_factor(total_ccf: f64, total_hdd: f64) -> Result<f64, EngineError> {
    if total_hdd == 0.0 {
        return Err(EngineError::DegenerateDenominator("total HDD"));
    }
    Ok(total_ccf / total_hdd)
}

/// Mean of the per-period factors of several completed billing periods.
pub fn averaged_usage_factor(periods: &[BillingPeriod]) -> Result<f64, EngineError> {
    if periods.is_empty() {
        return Err(EngineError::MissingPriorData("completed billing period"));
    }

    let mut sum = 0.0;
    for period in periods {
        sum += period.usage_factor()?;
    }
    Ok(sum / periods.len() as f64)
}

/// Split a time-ordered meter history into periods spanning at least
/// `min_span`. Usage is the sum of the stored deltas after the opening
/// reading; HDD comes from outdoor samples in `[start, end)`. A trailing
/// span shorter than `min_span` is dropped.
pub fn billing_periods(
    meter: &[GasMeterReading],
    outdoor: &[(OffsetDateTime, f64)],
    base_f: f64,
    offset: UtcOffset,
    min_span: Duration,
) -> Vec<BillingPeriod> {
    let mut periods = Vec::new();
    let Some(first) = meter.first() else {
        return periods;
    };

    let mut start = first.recorded_at;
    let mut ccf = 0.0;
    for reading in &meter[1..] {
        ccf += reading.ccf_since_last.unwrap_or(0.0);
        if reading.recorded_at - start < min_span {
            continue;
        }

        let end = reading.recorded_at;
        let samples = outdoor
            .iter()
            .copied()
            .filter(|(ts, _)| *ts >= start && *ts < end);
        let hdd = degree_days::total_hdd(&degree_days::degree_day_samples(base_f, samples, offset));
        periods.push(BillingPeriod { start, end, ccf, hdd });

        start = end;
        ccf = 0.0;
    }

    periods
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{datetime, offset};

    fn period(ccf: f64, hdd: f64) -> BillingPeriod {
        BillingPeriod {
            start: datetime!(2025-11-13 00:00 UTC),
            end: datetime!(2025-12-11 00:00 UTC),
            ccf,
            hdd,
        }
    }

    #[test]
    fn factor_from_single_period() {
        let f = usage_factor(69.0, 588.0).unwrap();
        assert!((f - 0.1173).abs() < 1e-4);
        assert_eq!(period(69.0, 588.0).usage_factor(), Ok(f));
    }

    #[test]
    fn zero_hdd_is_reported_not_coerced() {
        assert_eq!(
            usage_factor(12.0, 0.0),
            Err(EngineError::DegenerateDenominator("total HDD"))
        );
    }

    #[test]
    fn averaged_factor_is_mean_of_period_factors() {
        let f = averaged_usage_factor(&[period(50.0, 500.0), period(60.0, 400.0)]).unwrap();
        assert!((f - 0.125).abs() < 1e-12);
    }

    #[test]
    fn averaged_factor_needs_periods_with_heating_demand() {
        assert!(matches!(
            averaged_usage_factor(&[]),
            Err(EngineError::MissingPriorData(_))
        ));
        assert!(matches!(
            averaged_usage_factor(&[period(50.0, 500.0), period(3.0, 0.0)]),
            Err(EngineError::DegenerateDenominator(_))
        ));
    }

    fn meter(at: OffsetDateTime, value: f64, delta: Option<f64>) -> GasMeterReading {
        GasMeterReading {
            recorded_at: at,
            meter_reading: value,
            ccf_since_last: delta,
        }
    }

    #[test]
    fn readings_merge_until_min_span() {
        let history = [
            meter(datetime!(2026-01-01 12:00 UTC), 1300.0, None),
            meter(datetime!(2026-01-04 12:00 UTC), 1310.0, Some(10.0)),
            meter(datetime!(2026-01-08 12:00 UTC), 1322.5, Some(12.5)),
            meter(datetime!(2026-01-10 12:00 UTC), 1330.0, Some(7.5)),
        ];
        // One sample a day at a constant 40F: 25 HDD per day.
        let outdoor: Vec<_> = (0..10)
            .map(|d| (datetime!(2026-01-01 18:00 UTC) + Duration::days(d), 40.0))
            .collect();

        let periods = billing_periods(&history, &outdoor, 65.0, offset!(UTC), Duration::days(7));
        assert_eq!(periods.len(), 1);
        let p = &periods[0];
        assert_eq!(p.start, datetime!(2026-01-01 12:00 UTC));
        assert_eq!(p.end, datetime!(2026-01-08 12:00 UTC));
        assert_eq!(p.ccf, 22.5);
        assert_eq!(p.hdd, 7.0 * 25.0);
        assert!((p.usage_factor().unwrap() - 22.5 / 175.0).abs() < 1e-12);
    }

    #[test]
    fn empty_history_has_no_periods() {
        assert!(billing_periods(&[], &[], 65.0, offset!(UTC), Duration::days(7)).is_empty());
    }
}
