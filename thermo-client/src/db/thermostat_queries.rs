use anyhow::Result;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::domain::ThermostatReading;

/// Insert one snapshot and return its row id.
pub async fn insert_reading(pool: &PgPool, reading: &ThermostatReading) -> Result<i64> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO thermostat_readings (
            recorded_at,
            indoor_temp_f,
            outdoor_temp_f,
            adjusted_outdoor_temp_f,
            heat_setpoint_f,
            cool_setpoint_f,
            humidity_pct,
            mode,
            fan_mode,
            is_heating,
            is_cooling
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING id
        "#,
    )
    .bind(reading.recorded_at)
    .bind(reading.indoor_temp_f)
    .bind(reading.outdoor_temp_f)
    .bind(reading.adjusted_outdoor_temp_f)
    .bind(reading.heat_setpoint_f)
    .bind(reading.cool_setpoint_f)
    .bind(reading.humidity_pct)
    .bind(reading.mode.as_str())
    .bind(reading.fan_mode.as_str())
    .bind(reading.is_heating)
    .bind(reading.is_cooling)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Time-ordered readings in `[start, end)`.
pub async fn readings_between(
    pool: &PgPool,
    start: OffsetDateTime,
    end: OffsetDateTime,
) -> Result<Vec<ThermostatReading>> {
    let rows = sqlx::query_as::<_, ThermostatReading>(
        r#"
        SELECT
            recorded_at,
            indoor_temp_f,
            outdoor_temp_f,
            adjusted_outdoor_temp_f,
            heat_setpoint_f,
            cool_setpoint_f,
            humidity_pct,
            mode,
            fan_mode,
            is_heating,
            is_cooling
        FROM thermostat_readings
        WHERE recorded_at >= $1
          AND recorded_at <  $2
        ORDER BY recorded_at
        "#,
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// `(recorded_at, outdoor_temp_f)` pairs in `[start, end)`, skipping samples
/// without an outdoor temperature.
pub async fn outdoor_temperatures_between(
    pool: &PgPool,
    start: OffsetDateTime,
    end: OffsetDateTime,
) -> Result<Vec<(OffsetDateTime, f64)>> {
    let rows = sqlx::query_as::<_, (OffsetDateTime, f64)>(
        r#"
        SELECT recorded_at, outdoor_temp_f
        FROM thermostat_readings
        WHERE recorded_at >= $1
          AND recorded_at <  $2
          AND outdoor_temp_f IS NOT NULL
        ORDER BY recorded_at
        "#,
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
