use std::{sync::Arc, time::Duration};

use anyhow::{bail, Result};
use collector_service::{
    config::AppConfig,
    keepalive,
    observability,
    pipeline::Pipeline,
    sinks::PgThermostatSink,
    sources::{HoneywellClient, PollSchedule, ThermostatSource},
    status::{CollectionState, CollectionStatus},
    transform,
};
use sqlx::postgres::PgPoolOptions;
use thermo_client::domain::ThermostatReading;
use tokio::sync::Notify;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let once = std::env::args().skip(1).any(|a| a == "--once");

    let cfg = AppConfig::load()?;
    let client = HoneywellClient::new(&cfg.honeywell)?;

    let pool = PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .connect(cfg.database_uri()?)
        .await?;

    let status = CollectionStatus::default();
    let trigger = Arc::new(Notify::new());

    // A one-shot run is driven by an external scheduler and needs no server.
    let schedule = if once {
        PollSchedule::Once
    } else {
        keepalive::init(&cfg.keepalive.bind_addr, status.clone(), trigger.clone()).await?;
        if let Some(url) = &cfg.keepalive.self_ping_url {
            keepalive::spawn_self_ping(url.clone(), Duration::from_secs(cfg.keepalive.ping_interval_secs))?;
        }
        PollSchedule::Every(cfg.collector.interval())
    };

    tracing::info!(
        device_id = cfg.honeywell.device_id,
        interval_secs = cfg.collector.interval_secs,
        heat_rise_factor = cfg.engine.heat_rise_factor,
        once,
        "starting thermostat collector"
    );

    let pipeline: Pipeline<_, ThermostatReading, _> = Pipeline {
        source: ThermostatSource::new(client, schedule, trigger),
        transforms: vec![
            Arc::new(transform::ThermostatReadingValidation),
            Arc::new(transform::AdjustOutdoorTemperature::new(cfg.engine.heat_rise_factor)),
        ],
        sink: PgThermostatSink::new(
            pool,
            cfg.collector.max_retries,
            cfg.collector.retry_backoff(),
            status.clone(),
        ),
    };

    pipeline.run().await?;

    let last = status.snapshot();
    if last.status == CollectionState::Error {
        bail!(
            "collection failed: {}",
            last.error.unwrap_or_else(|| "unknown error".to_string())
        );
    }

    Ok(())
}
