use super::EngineError;

/// Consumption since the previous cumulative reading.
///
/// `Ok(None)` means there is no previous reading, which is distinct from a
/// zero delta. A decrease is surfaced as [`EngineError::NonMonotonicMeter`].
pub fn meter_delta(current: f64, previous: Option<f64>) -> Result<Option<f64>, EngineError> {
    match previous {
        None => Ok(None),
        Some(previous) if current < previous => {
            Err(EngineError::NonMonotonicMeter { previous, current })
        }
        Some(previous) => Ok(Some(current - previous)),
    }
}
