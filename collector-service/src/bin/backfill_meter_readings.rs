use anyhow::{bail, Result};
use collector_service::{
    config::AppConfig,
    observability,
    pipeline::Pipeline,
    sinks::{DecreasePolicy, PgGasMeterSink},
    sources::MeterReadingCsvFileSource,
    transform,
};
use sqlx::postgres::PgPoolOptions;
use std::{env, sync::Arc};
use thermo_client::domain::GasMeterReading;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    let allow_decrease = args.iter().any(|a| a == "--allow-decrease");
    let files: Vec<&String> = args.iter().filter(|a| !a.starts_with("--")).collect();
    let [file_path] = files.as_slice() else {
        bail!("usage: backfill_meter_readings <csv_file_path> [--allow-decrease]");
    };

    // Point THERMO_CONFIG at another file to back-fill a different database.
    let cfg = AppConfig::load()?;

    let pool = PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .connect(cfg.database_uri()?)
        .await?;

    let policy = if allow_decrease {
        DecreasePolicy::Accept
    } else {
        DecreasePolicy::Reject
    };

    let pipeline: Pipeline<_, GasMeterReading, _> = Pipeline {
        source: MeterReadingCsvFileSource::new(file_path.as_str()),
        transforms: vec![Arc::new(transform::GasMeterReadingValidation)],
        sink: PgGasMeterSink::new(pool, policy),
    };

    pipeline.run().await?;

    Ok(())
}
