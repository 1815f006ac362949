use anyhow::{bail, Context, Result};
use collector_service::{config::AppConfig, observability};
use sqlx::postgres::PgPoolOptions;
use std::env;
use thermo_client::{
    db::{gas_meter_queries, thermostat_queries},
    engine::{averaged_usage_factor, billing_periods, heating_onsets, HeatingOnset},
};
use time::{Duration, OffsetDateTime};

const MIN_PERIOD_DAYS: i64 = 7;

fn parse_days() -> Result<i64> {
    let args: Vec<String> = env::args().skip(1).collect();
    match args.as_slice() {
        [] => Ok(90),
        [flag, n] if flag == "--days" => {
            let days: i64 = n.parse().with_context(|| format!("--days expects a number, got '{n}'"))?;
            if days <= 0 {
                bail!("--days must be positive");
            }
            Ok(days)
        }
        _ => bail!("usage: calibrate [--days N]"),
    }
}

/// Mean factor over the onsets that calibrate cleanly.
fn heat_rise_summary(onsets: &[HeatingOnset]) -> Option<(f64, usize)> {
    let factors: Vec<f64> = onsets.iter().filter_map(|o| o.calibrated_factor().ok()).collect();
    if factors.is_empty() {
        return None;
    }
    Some((factors.iter().sum::<f64>() / factors.len() as f64, factors.len()))
}

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_cli_tracing();

    let days = parse_days()?;
    let cfg = AppConfig::load()?;
    let offset = cfg.site.utc_offset()?;

    let pool = PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .connect(cfg.database_uri()?)
        .await?;

    let end = OffsetDateTime::now_utc();
    let start = end - Duration::days(days);

    let readings = thermostat_queries::readings_between(&pool, start, end).await?;
    let onsets = heating_onsets(&readings);

    println!("Calibration over the last {days} days ({} thermostat readings)", readings.len());
    println!();
    println!("Heat-rise factor (configured {:.3})", cfg.engine.heat_rise_factor);
    for onset in &onsets {
        match onset.calibrated_factor() {
            Ok(f) => println!(
                "  {}  outdoor {:>5.1}F  setpoint {:>4.0}F  factor {:.3}",
                onset.recorded_at, onset.outdoor_f, onset.setpoint_f, f
            ),
            Err(e) => println!("  {}  skipped: {e}", onset.recorded_at),
        }
    }
    match heat_rise_summary(&onsets) {
        Some((mean, n)) => println!("  mean of {n} heating onsets: {mean:.3}"),
        None => println!("  no heating onsets below 65F in range"),
    }

    let meter = gas_meter_queries::readings_between(&pool, start, end).await?;
    let temps = thermostat_queries::outdoor_temperatures_between(&pool, start, end).await?;
    let periods = billing_periods(
        &meter,
        &temps,
        cfg.engine.base_temperature_f,
        offset,
        Duration::days(MIN_PERIOD_DAYS),
    );

    println!();
    println!("Usage factor (configured {:.4} CCF/HDD)", cfg.engine.usage_factor_ccf_per_hdd);
    for p in &periods {
        let factor = p
            .usage_factor()
            .map(|f| format!("{f:.4}"))
            .unwrap_or_else(|e| e.to_string());
        println!(
            "  {} to {}  {:>6.1} CCF  {:>6.1} HDD  {}",
            p.start.to_offset(offset).date(),
            p.end.to_offset(offset).date(),
            p.ccf,
            p.hdd,
            factor
        );
    }
    match averaged_usage_factor(&periods) {
        Ok(f) => println!("  mean of {} periods: {f:.4}", periods.len()),
        Err(e) => println!("  no usable estimate: {e}"),
    }

    Ok(())
}
