use anyhow::{bail, Context, Result};
use collector_service::{
    config::{AppConfig, BillingCycleConfig},
    observability,
    sources::NwsForecastClient,
};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use std::env;
use thermo_client::{
    db::{gas_meter_queries, thermostat_queries},
    engine::{
        degree_days::daily_mean_temperatures, heating_degree_days, meter_delta, BillProjection, DailyTemperature,
        DegreeDaySample, EngineConfig, ForecastDay, LineItem, WeatherNormalization,
    },
};
use time::{Date, OffsetDateTime, Time, UtcOffset};

#[derive(Serialize)]
struct Estimate {
    #[serde(with = "iso_date")]
    cycle_start: Date,
    #[serde(with = "iso_date")]
    cycle_end: Date,
    start_meter_reading: f64,
    latest_meter_reading: f64,
    #[serde(with = "time::serde::rfc3339")]
    latest_reading_at: OffsetDateTime,
    forecast_days: usize,
    fallback_days: usize,
    wna_rate_per_ccf: Option<f64>,
    projection: BillProjection,
    line_items: Vec<LineItem>,
}

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Remaining days `(after, end]`, taken from the forecast where it has them.
/// Days the forecast does not cover get `fallback_hdd` degree days.
fn remaining_days(
    forecast: &[ForecastDay],
    after: Date,
    end: Date,
    base_f: f64,
    fallback_hdd: f64,
) -> (Vec<ForecastDay>, usize) {
    let mut days = Vec::new();
    let mut fallback = 0;
    let mut date = after;
    while let Some(next) = date.next_day() {
        if next > end {
            break;
        }
        date = next;
        match forecast.iter().find(|d| d.date == date) {
            Some(day) => days.push(*day),
            None => {
                fallback += 1;
                let avg = base_f - fallback_hdd;
                days.push(ForecastDay {
                    date,
                    high_f: avg,
                    low_f: avg,
                });
            }
        }
    }
    (days, fallback)
}

/// Engine config for this cycle, with the WNA sub-rate replaced when the
/// cycle is billed in the heating season.
fn cycle_engine(
    engine: &EngineConfig,
    cycle: &BillingCycleConfig,
    projected_hdd: f64,
) -> Result<(EngineConfig, Option<f64>)> {
    let mut engine = engine.clone();
    let Some(wna) = engine.weather_normalization.clone() else {
        return Ok((engine, None));
    };
    if !WeatherNormalization::applies_in(cycle.end.month()) {
        return Ok((engine, None));
    }

    // Both ends count, matching the days summed into `projected_hdd`.
    let cycle_days = u32::try_from((cycle.end - cycle.start).whole_days() + 1).context("billing cycle length")?;
    let rate = wna.factor_per_ccf(wna.normal_hdd(cycle_days), projected_hdd)?;
    engine.rates = engine.rates.with_rate("weather_normalization", rate);
    Ok((engine, Some(rate)))
}

/// Split whole-day means into metered days (before `metered_until`) and
/// observed days after the latest meter reading (before `today`). Observed
/// days count toward the projection like forecast days.
fn split_observed(
    daily_means: &[(Date, f64)],
    metered_until: Date,
    today: Date,
    base_f: f64,
) -> (Vec<DegreeDaySample>, Vec<ForecastDay>) {
    let mut metered = Vec::new();
    let mut observed = Vec::new();
    for &(date, avg) in daily_means {
        if date < metered_until {
            metered.push(DegreeDaySample {
                date,
                hdd: heating_degree_days(base_f, DailyTemperature::Average(avg)),
            });
        } else if date < today {
            observed.push(ForecastDay {
                date,
                high_f: avg,
                low_f: avg,
            });
        }
    }
    (metered, observed)
}

fn local_midnight(date: Date, offset: UtcOffset) -> OffsetDateTime {
    date.with_time(Time::MIDNIGHT).assume_offset(offset)
}

fn print_table(e: &Estimate) {
    let p = &e.projection;
    println!("Billing cycle {} to {}", e.cycle_start, e.cycle_end);
    println!("  Meter: {:.1} -> {:.1} CCF (as of {})", e.start_meter_reading, e.latest_meter_reading, e.latest_reading_at);
    println!();
    println!("  {:<28}{:>10.1}", "Actual usage (CCF)", p.actual_ccf);
    println!("  {:<28}{:>10.1}", "Actual HDD", p.actual_hdd);
    println!("  {:<28}{:>10.1}", "Forecast HDD", p.forecast_hdd);
    println!("  {:<28}{:>10.4}", "Usage factor (CCF/HDD)", p.usage_factor);
    println!("  {:<28}{:>10.1}", "Projected additional CCF", p.projected_additional_ccf);
    println!("  {:<28}{:>10.1}", "Projected total CCF", p.projected_total_ccf);
    if e.fallback_days > 0 {
        println!("  ({} of {} remaining days estimated without a forecast)", e.fallback_days, e.forecast_days);
    }
    if let Some(rate) = e.wna_rate_per_ccf {
        println!("  WNA rate applied: {rate:.5} $/CCF");
    }
    println!();
    for item in &e.line_items {
        println!("  {:<28}{:>10.2}", item.name, item.amount);
    }
    println!("  {:<28}{:>10.2}", "Projected bill ($)", p.projected_bill);
}

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_cli_tracing();

    let json = env::args().skip(1).any(|a| a == "--json");

    let cfg = AppConfig::load()?;
    let cycle = cfg.billing_cycle()?;
    let offset = cfg.site.utc_offset()?;

    let pool = PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .connect(cfg.database_uri()?)
        .await?;

    let cycle_start = local_midnight(cycle.start, offset);

    let start_meter = match cycle.start_meter_reading {
        Some(v) => v,
        None => gas_meter_queries::reading_at_or_before(&pool, cycle_start)
            .await?
            .map(|r| r.meter_reading)
            .context("no meter reading at or before the cycle start; set billing_cycle.start_meter_reading")?,
    };
    let Some(latest) = gas_meter_queries::latest_reading(&pool).await? else {
        bail!("no gas meter readings stored yet");
    };
    if latest.recorded_at < cycle_start {
        bail!("latest meter reading {} predates the billing cycle", latest.recorded_at);
    }
    let actual_ccf = meter_delta(latest.meter_reading, Some(start_meter))?.unwrap_or(0.0);

    // Only whole local days enter the HDD sums; today's partial day is
    // forecast instead.
    let today = OffsetDateTime::now_utc().to_offset(offset).date();
    let latest_date = latest.recorded_at.to_offset(offset).date();
    let temps =
        thermostat_queries::outdoor_temperatures_between(&pool, cycle_start, local_midnight(today, offset)).await?;
    let (actual_days, mut known_days) = split_observed(
        &daily_mean_temperatures(temps, offset),
        latest_date,
        today,
        cfg.engine.base_temperature_f,
    );

    let forecast = match NwsForecastClient::new(&cfg.forecast)?.daily_forecast().await {
        Ok(days) => days,
        Err(e) => {
            tracing::warn!(error = %e, "forecast unavailable, using fallback HDD");
            Vec::new()
        }
    };
    known_days.extend(forecast);

    let (remaining, fallback_days) = match latest_date.previous_day() {
        Some(after) => remaining_days(
            &known_days,
            after,
            cycle.end,
            cfg.engine.base_temperature_f,
            cfg.forecast.fallback_daily_hdd,
        ),
        None => (Vec::new(), 0),
    };

    let actual_hdd: f64 = actual_days.iter().map(|d| d.hdd).sum();
    let forecast_hdd: f64 = remaining.iter().map(|d| d.hdd(cfg.engine.base_temperature_f)).sum();
    let (engine, wna_rate) = cycle_engine(&cfg.engine, cycle, actual_hdd + forecast_hdd)?;

    let projection = engine.project_bill(actual_ccf, &actual_days, &remaining);
    let estimate = Estimate {
        cycle_start: cycle.start,
        cycle_end: cycle.end,
        start_meter_reading: start_meter,
        latest_meter_reading: latest.meter_reading,
        latest_reading_at: latest.recorded_at,
        forecast_days: remaining.len(),
        fallback_days,
        wna_rate_per_ccf: wna_rate,
        line_items: engine.rates.line_items(projection.projected_total_ccf),
        projection,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&estimate)?);
    } else {
        print_table(&estimate);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn uncovered_days_use_fallback_hdd() {
        let forecast = [ForecastDay {
            date: date!(2026-01-11),
            high_f: 45.0,
            low_f: 25.0,
        }];
        let (days, fallback) = remaining_days(&forecast, date!(2026-01-10), date!(2026-01-13), 65.0, 25.0);
        assert_eq!(days.len(), 3);
        assert_eq!(fallback, 2);
        assert_eq!(days[0], forecast[0]);
        assert_eq!(days[1].hdd(65.0), 25.0);
        assert_eq!(days[2].date, date!(2026-01-13));
    }

    #[test]
    fn no_remaining_days_after_cycle_end() {
        let (days, fallback) = remaining_days(&[], date!(2026-01-13), date!(2026-01-13), 65.0, 25.0);
        assert!(days.is_empty());
        assert_eq!(fallback, 0);
    }

    #[test]
    fn normal_cycle_has_no_wna_adjustment() {
        let engine = EngineConfig {
            weather_normalization: Some(WeatherNormalization::default()),
            ..EngineConfig::default()
        };
        let cycle = BillingCycleConfig {
            start: date!(2025-12-12),
            end: date!(2026-01-13),
            start_meter_reading: None,
        };
        // 2025-12-12 through 2026-01-13 is 33 days at 24 normal HDD.
        let (_, rate) = cycle_engine(&engine, &cycle, 33.0 * 24.0).unwrap();
        assert!(rate.unwrap().abs() < 1e-12);
    }

    #[test]
    fn latest_meter_day_is_projected_not_metered() {
        let means = [
            (date!(2026-01-08), 40.0),
            (date!(2026-01-09), 35.0),
            (date!(2026-01-10), 30.0),
            (date!(2026-01-11), 50.0),
        ];
        let (metered, observed) = split_observed(&means, date!(2026-01-09), date!(2026-01-11), 65.0);
        assert_eq!(
            metered,
            vec![DegreeDaySample {
                date: date!(2026-01-08),
                hdd: 25.0
            }]
        );
        assert_eq!(observed.len(), 2);
        assert_eq!(observed[0].date, date!(2026-01-09));
        assert_eq!(observed[1].hdd(65.0), 35.0);

        // Observed days take precedence over the fallback in the remaining window.
        let (days, fallback) = remaining_days(&observed, date!(2026-01-08), date!(2026-01-11), 65.0, 25.0);
        assert_eq!(days.len(), 3);
        assert_eq!(fallback, 1);
        let total: f64 = metered.iter().map(|d| d.hdd).sum::<f64>() + days.iter().map(|d| d.hdd(65.0)).sum::<f64>();
        assert_eq!(total, 25.0 + 30.0 + 35.0 + 25.0);
    }

    #[test]
    fn wna_override_only_in_heating_season() {
        let engine = EngineConfig {
            weather_normalization: Some(WeatherNormalization::default()),
            ..EngineConfig::default()
        };
        let winter = BillingCycleConfig {
            start: date!(2025-12-12),
            end: date!(2026-01-13),
            start_meter_reading: None,
        };
        // 33 days at 24 normal HDD is 792; 900 actual is colder than normal.
        let (cfg, rate) = cycle_engine(&engine, &winter, 900.0).unwrap();
        let rate = rate.unwrap();
        assert!(rate < 0.0);
        assert_eq!(cfg.rates.rate("weather_normalization"), Some(rate));

        let summer = BillingCycleConfig {
            start: date!(2026-06-12),
            end: date!(2026-07-13),
            start_meter_reading: None,
        };
        let (cfg, rate) = cycle_engine(&engine, &summer, 10.0).unwrap();
        assert!(rate.is_none());
        assert_eq!(cfg.rates, engine.rates);
    }
}
