use time::Date;

use super::degree_days::{heating_degree_days, total_hdd, DailyTemperature, DegreeDaySample};

/// One named per-CCF component of the variable rate.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SubRate {
    pub name: String,
    pub per_ccf: f64,
}

impl SubRate {
    pub fn new(name: &str, per_ccf: f64) -> Self {
        Self {
            name: name.to_string(),
            per_ccf,
        }
    }
}

/// A computed charge on the bill.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LineItem {
    pub name: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RateSchedule {
    pub customer_charge: f64,
    pub sub_rates: Vec<SubRate>,
}

impl Default for RateSchedule {
    fn default() -> Self {
        Self {
            customer_charge: 25.00,
            sub_rates: vec![
                SubRate::new("distribution", 0.16261),
                SubRate::new("weather_normalization", 0.01531),
                SubRate::new("pipeline_replacement", 0.08214),
                SubRate::new("gas_cost", 0.54034),
                SubRate::new("school_tax", 0.03),
                SubRate::new("franchise_fee", 0.01),
            ],
        }
    }
}

impl RateSchedule {
    /// Sum of all sub-rates, $/CCF.
    pub fn variable_rate(&self) -> f64 {
        self.sub_rates.iter().map(|r| r.per_ccf).sum()
    }

    pub fn rate(&self, name: &str) -> Option<f64> {
        self.sub_rates.iter().find(|r| r.name == name).map(|r| r.per_ccf)
    }

    /// Replace the named sub-rate, or append it if absent.
    pub fn with_rate(mut self, name: &str, per_ccf: f64) -> Self {
        match self.sub_rates.iter_mut().find(|r| r.name == name) {
            Some(existing) => existing.per_ccf = per_ccf,
            None => self.sub_rates.push(SubRate::new(name, per_ccf)),
        }
        self
    }

    /// Total bill for `ccf`, rounded to cents.
    pub fn bill(&self, ccf: f64) -> f64 {
        round_cents(self.customer_charge + ccf * self.variable_rate())
    }

    /// Customer charge followed by one item per sub-rate, unrounded.
    pub fn line_items(&self, ccf: f64) -> Vec<LineItem> {
        let mut items = Vec::with_capacity(self.sub_rates.len() + 1);
        items.push(LineItem {
            name: "customer_charge".to_string(),
            amount: self.customer_charge,
        });
        items.extend(self.sub_rates.iter().map(|r| LineItem {
            name: r.name.clone(),
            amount: ccf * r.per_ccf,
        }));
        items
    }
}

pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Predicted high/low for a future date.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ForecastDay {
    pub date: Date,
    pub high_f: f64,
    pub low_f: f64,
}

impl ForecastDay {
    pub fn hdd(&self, base_f: f64) -> f64 {
        heating_degree_days(
            base_f,
            DailyTemperature::HighLow {
                high: self.high_f,
                low: self.low_f,
            },
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BillProjection {
    pub actual_ccf: f64,
    pub actual_hdd: f64,
    pub forecast_hdd: f64,
    pub usage_factor: f64,
    pub projected_additional_ccf: f64,
    /// Always `actual_ccf + projected_additional_ccf`.
    pub projected_total_ccf: f64,
    pub projected_bill: f64,
}

/// Project the in-progress period's total from usage so far plus forecast demand.
pub fn project_bill(
    rates: &RateSchedule,
    base_f: f64,
    usage_factor: f64,
    actual_ccf: f64,
    actual_days: &[DegreeDaySample],
    forecast: &[ForecastDay],
) -> BillProjection {
    let forecast_hdd: f64 = forecast.iter().map(|d| d.hdd(base_f)).sum();
    let projected_additional_ccf = forecast_hdd * usage_factor;
    let projected_total_ccf = actual_ccf + projected_additional_ccf;

    BillProjection {
        actual_ccf,
        actual_hdd: total_hdd(actual_days),
        forecast_hdd,
        usage_factor,
        projected_additional_ccf,
        projected_total_ccf,
        projected_bill: rates.bill(projected_total_ccf),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn default_sub_rates_sum_to_variable_rate() {
        let rates = RateSchedule::default();
        assert!((rates.variable_rate() - 0.8404).abs() < 1e-12);
        assert_eq!(rates.rate("gas_cost"), Some(0.54034));
        assert_eq!(rates.rate("nonexistent"), None);
    }

    #[test]
    fn bill_worked_examples() {
        let rates = RateSchedule::default();
        assert!((rates.bill(50.0) - 67.02).abs() < 1e-9);
        assert!((rates.bill(90.0) - 100.64).abs() < 1e-9);
        assert_eq!(rates.bill(0.0), 25.0);
    }

    #[test]
    fn overriding_a_sub_rate_changes_only_that_component() {
        let rates = RateSchedule::default().with_rate("weather_normalization", 0.0);
        assert!((rates.variable_rate() - 0.82509).abs() < 1e-12);
        assert_eq!(rates.sub_rates.len(), 6);

        let rates = rates.with_rate("storm_recovery", 0.002);
        assert_eq!(rates.sub_rates.last().unwrap().name, "storm_recovery");
    }

    #[test]
    fn line_items_add_up_to_bill() {
        let rates = RateSchedule::default();
        let items = rates.line_items(70.0);
        assert_eq!(items[0].name, "customer_charge");
        assert_eq!(items.len(), 7);
        let total: f64 = items.iter().map(|i| i.amount).sum();
        assert_eq!(round_cents(total), rates.bill(70.0));
    }

    #[test]
    fn projection_fields_compose_exactly() {
        let actual = [
            DegreeDaySample { date: date!(2026-01-05), hdd: 30.0 },
            DegreeDaySample { date: date!(2026-01-06), hdd: 25.5 },
        ];
        let forecast = [
            ForecastDay { date: date!(2026-01-10), high_f: 40.0, low_f: 24.0 },
            ForecastDay { date: date!(2026-01-11), high_f: 52.0, low_f: 33.0 },
            ForecastDay { date: date!(2026-01-12), high_f: 75.0, low_f: 61.0 },
        ];

        let p = project_bill(&RateSchedule::default(), 65.0, 0.12, 70.5, &actual, &forecast);

        assert_eq!(p.actual_hdd, 55.5);
        assert_eq!(p.forecast_hdd, 33.0 + 22.5);
        assert!((p.projected_additional_ccf - 55.5 * 0.12).abs() < 1e-12);
        assert_eq!(p.projected_total_ccf, p.actual_ccf + p.projected_additional_ccf);
        assert_eq!(p.projected_bill, RateSchedule::default().bill(p.projected_total_ccf));
    }

    #[test]
    fn empty_forecast_projects_actual_usage_only() {
        let p = project_bill(&RateSchedule::default(), 65.0, 0.12, 50.0, &[], &[]);
        assert_eq!(p.projected_additional_ccf, 0.0);
        assert_eq!(p.projected_total_ccf, 50.0);
        assert!((p.projected_bill - 67.02).abs() < 1e-9);
    }
}
