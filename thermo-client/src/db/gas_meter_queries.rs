use anyhow::Result;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::domain::GasMeterReading;

/// Most recently recorded meter reading, if any.
pub async fn latest_reading(pool: &PgPool) -> Result<Option<GasMeterReading>> {
    let row = sqlx::query_as::<_, GasMeterReading>(
        r#"
        SELECT recorded_at, meter_reading, ccf_since_last
        FROM gas_meter_readings
        ORDER BY recorded_at DESC
        LIMIT 1
        "#,
    )
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Latest reading recorded at or before `ts`.
pub async fn reading_at_or_before(pool: &PgPool, ts: OffsetDateTime) -> Result<Option<GasMeterReading>> {
    let row = sqlx::query_as::<_, GasMeterReading>(
        r#"
        SELECT recorded_at, meter_reading, ccf_since_last
        FROM gas_meter_readings
        WHERE recorded_at <= $1
        ORDER BY recorded_at DESC
        LIMIT 1
        "#,
    )
    .bind(ts)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Time-ordered readings in `[start, end]`.
pub async fn readings_between(
    pool: &PgPool,
    start: OffsetDateTime,
    end: OffsetDateTime,
) -> Result<Vec<GasMeterReading>> {
    let rows = sqlx::query_as::<_, GasMeterReading>(
        r#"
        SELECT recorded_at, meter_reading, ccf_since_last
        FROM gas_meter_readings
        WHERE recorded_at >= $1
          AND recorded_at <= $2
        ORDER BY recorded_at
        "#,
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Append one reading and return its row id. `ccf_since_last` must already
/// be computed against the latest stored reading.
pub async fn insert_reading(pool: &PgPool, reading: &GasMeterReading) -> Result<i64> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO gas_meter_readings (recorded_at, meter_reading, ccf_since_last)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(reading.recorded_at)
    .bind(reading.meter_reading)
    .bind(reading.ccf_since_last)
    .fetch_one(pool)
    .await?;

    Ok(id)
}
