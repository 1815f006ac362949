use std::{fs::File, path::PathBuf};

use csv::StringRecord;
use thermo_client::domain::GasMeterReading;
use time::OffsetDateTime;

use crate::pipeline::{Envelope, EnvelopeStream, PipelineError, Source};

/// CSV back-fill of historical gas meter readings.
///
/// Expected header columns (by name):
/// - recorded_at (RFC3339 timestamp)
/// - meter_reading (cumulative CCF)
///
/// Rows must be in chronological order. `ccf_since_last` is never read from
/// the file; it is computed when the row is stored.
pub struct MeterReadingCsvFileSource {
    path: PathBuf,
}

impl MeterReadingCsvFileSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

fn record_to_meter_reading(
    record: &StringRecord,
    headers: &StringRecord,
) -> Result<GasMeterReading, PipelineError> {
    let get = |name: &str| -> Result<&str, PipelineError> {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .and_then(|idx| record.get(idx))
            .map(str::trim)
            .ok_or_else(|| PipelineError::Source(format!("missing column '{name}' in CSV record")))
    };

    let ts_str = get("recorded_at")?;
    let recorded_at = OffsetDateTime::parse(ts_str, &time::format_description::well_known::Rfc3339)
        .map_err(|e| PipelineError::Source(format!("invalid recorded_at '{ts_str}': {e}")))?;

    let value_str = get("meter_reading")?;
    let meter_reading: f64 = value_str
        .parse()
        .map_err(|e| PipelineError::Source(format!("invalid meter_reading '{value_str}': {e}")))?;

    Ok(GasMeterReading {
        recorded_at,
        meter_reading,
        ccf_since_last: None,
    })
}

#[async_trait::async_trait]
impl Source<GasMeterReading> for MeterReadingCsvFileSource {
    async fn stream(&self) -> EnvelopeStream<GasMeterReading> {
        // Meter logs are a few hundred rows at most; a blocking reader is fine.
        let path = self.path.clone();
        let s = async_stream::try_stream! {
            let file = File::open(&path)
                .map_err(|e| PipelineError::Source(format!("failed to open CSV file: {e}")))?;
            let mut rdr = csv::Reader::from_reader(file);
            let headers = rdr
                .headers()
                .map_err(|e| PipelineError::Source(format!("failed to read CSV headers: {e}")))?
                .clone();

            for result in rdr.records() {
                let record = result.map_err(|e| PipelineError::Source(format!(
                    "failed to read CSV record: {e}"
                )))?;

                let reading = match record_to_meter_reading(&record, &headers) {
                    Ok(r) => r,
                    Err(e) => {
                        metrics::counter!("meter_reading_csv_parse_errors_total").increment(1);
                        Err(e)?
                    }
                };

                yield Envelope::new(reading);
            }
        };

        Box::pin(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn headers() -> StringRecord {
        StringRecord::from(vec!["recorded_at", "meter_reading"])
    }

    #[test]
    fn parses_row_without_delta() {
        let record = StringRecord::from(vec!["2026-01-09T08:15:00-06:00", " 1408.5 "]);
        let r = record_to_meter_reading(&record, &headers()).unwrap();
        assert_eq!(r.recorded_at, datetime!(2026-01-09 14:15 UTC));
        assert_eq!(r.meter_reading, 1408.5);
        assert_eq!(r.ccf_since_last, None);
    }

    #[test]
    fn rejects_bad_values() {
        let bad_ts = StringRecord::from(vec!["yesterday", "1408.5"]);
        assert!(matches!(
            record_to_meter_reading(&bad_ts, &headers()),
            Err(PipelineError::Source(_))
        ));

        let bad_value = StringRecord::from(vec!["2026-01-09T08:15:00-06:00", "fourteen"]);
        assert!(record_to_meter_reading(&bad_value, &headers()).is_err());

        let short_headers = StringRecord::from(vec!["recorded_at"]);
        let record = StringRecord::from(vec!["2026-01-09T08:15:00-06:00", "1408.5"]);
        assert!(record_to_meter_reading(&record, &short_headers).is_err());
    }
}
