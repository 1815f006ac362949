use std::time::{Duration, SystemTime};

use anyhow::bail;
use futures::StreamExt;
use sqlx::postgres::PgPool;
use thermo_client::{
    db::{gas_meter_queries, thermostat_queries},
    domain::{GasMeterReading, ThermostatReading},
    engine::meter_delta,
};

use crate::{
    pipeline::{Envelope, PipelineError, Sink},
    status::CollectionStatus,
};

/// Writes one thermostat row per envelope, retrying transient failures.
pub struct PgThermostatSink {
    pool: PgPool,
    max_retries: u32,
    retry_backoff: Duration,
    status: CollectionStatus,
}

impl PgThermostatSink {
    pub fn new(pool: PgPool, max_retries: u32, retry_backoff: Duration, status: CollectionStatus) -> Self {
        Self {
            pool,
            max_retries,
            retry_backoff,
            status,
        }
    }

    async fn write(&self, env: &Envelope<ThermostatReading>) -> Result<i64, PipelineError> {
        let mut attempt: u32 = 0;
        loop {
            match thermostat_queries::insert_reading(&self.pool, &env.payload).await {
                Ok(id) => {
                    metrics::counter!("thermostat_readings_written_total").increment(1);
                    if let Ok(dur) = SystemTime::now().duration_since(env.fetched_at) {
                        metrics::histogram!("thermostat_fetch_to_write_seconds").record(dur.as_secs_f64());
                    }
                    if let Some(t) = env.payload.outdoor_temp_f {
                        metrics::gauge!("thermostat_outdoor_temperature_f").set(t);
                    }
                    metrics::gauge!("thermostat_indoor_temperature_f").set(env.payload.indoor_temp_f);
                    return Ok(id);
                }
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    let sleep_for = self.retry_backoff * attempt;
                    tracing::warn!(
                        error = %e,
                        attempt,
                        "thermostat insert failed, retrying with backoff"
                    );
                    tokio::time::sleep(sleep_for).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "thermostat insert failed, giving up");
                    metrics::counter!("thermostat_sink_errors_total").increment(1);
                    return Err(PipelineError::Sink(e.to_string()));
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl Sink<ThermostatReading> for PgThermostatSink {
    async fn run<S>(&self, mut input: S) -> Result<(), PipelineError>
    where
        S: futures::Stream<Item = Result<Envelope<ThermostatReading>, PipelineError>> + Send + Unpin + 'static,
    {
        while let Some(item) = input.next().await {
            let env = match item {
                Ok(env) => env,
                Err(e) => {
                    tracing::error!(error = %e, "collection cycle failed, no row written");
                    self.status.record_failure(&e);
                    continue;
                }
            };

            // A failed write ends this cycle only; the next tick tries again.
            match self.write(&env).await {
                Ok(id) => {
                    let r = &env.payload;
                    tracing::info!(
                        record_id = id,
                        indoor = r.indoor_temp_f,
                        outdoor = ?r.outdoor_temp_f,
                        adjusted = ?r.adjusted_outdoor_temp_f,
                        setpoint = r.heat_setpoint_f,
                        heating = r.is_heating,
                        "thermostat reading saved"
                    );
                    self.status.record_success(id, r);
                }
                Err(e) => self.status.record_failure(&e),
            }
        }

        Ok(())
    }
}

/// What to do with a reading lower than the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecreasePolicy {
    Reject,
    /// Store the negative delta, e.g. after a meter replacement or rollover.
    Accept,
}

#[derive(Debug, Clone)]
pub struct StoredMeterReading {
    pub id: i64,
    pub reading: GasMeterReading,
    pub accepted_decrease: bool,
}

/// Delta for `reading` against the latest stored row, and whether a
/// decrease was accepted under `policy`.
pub fn resolve_delta(
    reading: &GasMeterReading,
    previous: Option<&GasMeterReading>,
    policy: DecreasePolicy,
) -> anyhow::Result<(Option<f64>, bool)> {
    if let Some(prev) = previous {
        if reading.recorded_at <= prev.recorded_at {
            bail!(
                "reading at {} is not newer than the latest stored reading at {}",
                reading.recorded_at,
                prev.recorded_at
            );
        }
    }

    match meter_delta(reading.meter_reading, previous.map(|p| p.meter_reading)) {
        Ok(delta) => Ok((delta, false)),
        Err(e) => match (policy, e.rejected_delta()) {
            (DecreasePolicy::Accept, Some(delta)) => {
                tracing::warn!(error = %e, delta, "accepting meter decrease");
                Ok((Some(delta), true))
            }
            _ => Err(e.into()),
        },
    }
}

/// Compute the delta against the latest stored reading and append the row.
pub async fn record_meter_reading(
    pool: &PgPool,
    mut reading: GasMeterReading,
    policy: DecreasePolicy,
) -> anyhow::Result<StoredMeterReading> {
    let previous = gas_meter_queries::latest_reading(pool).await?;
    let (delta, accepted_decrease) = resolve_delta(&reading, previous.as_ref(), policy)?;
    reading.ccf_since_last = delta;
    if accepted_decrease {
        metrics::counter!("gas_meter_decreases_accepted_total").increment(1);
    }

    let id = gas_meter_queries::insert_reading(pool, &reading).await?;
    metrics::counter!("gas_meter_readings_written_total").increment(1);

    Ok(StoredMeterReading {
        id,
        reading,
        accepted_decrease,
    })
}

/// Outcome of a back-fill run. A source error ends the CSV stream, so any
/// rows after it were never read and the run fails.
fn import_outcome(stored: u64, rejected: u64, stopped_early: bool) -> Result<(), PipelineError> {
    if stopped_early {
        return Err(PipelineError::Sink(format!(
            "import stopped early after {stored} stored and {rejected} rejected rows; later rows were not read"
        )));
    }
    if stored == 0 && rejected > 0 {
        return Err(PipelineError::Sink(format!("all {rejected} meter readings were rejected")));
    }
    Ok(())
}

/// Appends meter readings in stream order. Rejected rows are logged and
/// counted; the run reports how many were stored.
pub struct PgGasMeterSink {
    pool: PgPool,
    policy: DecreasePolicy,
}

impl PgGasMeterSink {
    pub fn new(pool: PgPool, policy: DecreasePolicy) -> Self {
        Self { pool, policy }
    }
}

#[async_trait::async_trait]
impl Sink<GasMeterReading> for PgGasMeterSink {
    async fn run<S>(&self, mut input: S) -> Result<(), PipelineError>
    where
        S: futures::Stream<Item = Result<Envelope<GasMeterReading>, PipelineError>> + Send + Unpin + 'static,
    {
        let mut stored = 0u64;
        let mut rejected = 0u64;
        let mut stopped_early = false;

        while let Some(item) = input.next().await {
            let env = match item {
                Ok(env) => env,
                Err(e) => {
                    if matches!(e, PipelineError::Source(_)) {
                        tracing::error!(error = %e, "meter reading source failed, import stops here");
                        stopped_early = true;
                    } else {
                        tracing::error!(error = %e, "meter reading rejected upstream");
                    }
                    rejected += 1;
                    continue;
                }
            };

            match record_meter_reading(&self.pool, env.payload, self.policy).await {
                Ok(s) => {
                    tracing::info!(
                        record_id = s.id,
                        meter_reading = s.reading.meter_reading,
                        ccf_since_last = ?s.reading.ccf_since_last,
                        "meter reading stored"
                    );
                    stored += 1;
                }
                Err(e) => {
                    tracing::error!(error = %e, "meter reading not stored");
                    metrics::counter!("gas_meter_sink_errors_total").increment(1);
                    rejected += 1;
                }
            }
        }

        tracing::info!(stored, rejected, stopped_early, "meter reading import finished");
        import_outcome(stored, rejected, stopped_early)
    }
}
