use time::OffsetDateTime;

/// One cumulative gas meter observation, in CCF.
///
/// `ccf_since_last` is fixed at insert time and is `None` only for the first
/// reading ever stored.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct GasMeterReading {
    pub recorded_at: OffsetDateTime,
    pub meter_reading: f64,
    pub ccf_since_last: Option<f64>,
}
