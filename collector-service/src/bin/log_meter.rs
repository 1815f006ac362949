use anyhow::{bail, Context, Result};
use collector_service::{
    config::AppConfig,
    observability,
    sinks::{record_meter_reading, DecreasePolicy},
    transform,
};
use sqlx::postgres::PgPoolOptions;
use std::env;
use thermo_client::domain::GasMeterReading;
use time::OffsetDateTime;

const USAGE: &str = "usage: log_meter <reading_ccf> [--allow-decrease]";

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_cli_tracing();

    let mut value = None;
    let mut policy = DecreasePolicy::Reject;
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--allow-decrease" => policy = DecreasePolicy::Accept,
            "-h" | "--help" => {
                println!("{USAGE}");
                return Ok(());
            }
            other if value.is_none() => {
                let v: f64 = other
                    .parse()
                    .with_context(|| format!("meter reading '{other}' is not a number"))?;
                value = Some(v);
            }
            other => bail!("unexpected argument '{other}'\n{USAGE}"),
        }
    }
    let Some(meter_reading) = value else {
        bail!(USAGE);
    };
    transform::check_meter_value(meter_reading)?;

    let cfg = AppConfig::load()?;
    let pool = PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .connect(cfg.database_uri()?)
        .await?;

    let reading = GasMeterReading {
        recorded_at: OffsetDateTime::now_utc(),
        meter_reading,
        ccf_since_last: None,
    };
    let stored = record_meter_reading(&pool, reading, policy).await?;

    println!("Saved meter reading #{}: {:.1} CCF", stored.id, stored.reading.meter_reading);
    match stored.reading.ccf_since_last {
        Some(delta) if stored.accepted_decrease => {
            println!("Usage since last reading: {delta:.1} CCF (decrease accepted)")
        }
        Some(delta) => println!("Usage since last reading: {delta:.1} CCF"),
        None => println!("First reading stored; usage starts with the next one."),
    }

    Ok(())
}
