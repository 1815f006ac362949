use std::sync::{Arc, RwLock};

use serde::Serialize;
use thermo_client::domain::ThermostatReading;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionState {
    #[default]
    NotRun,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectedSummary {
    pub record_id: i64,
    pub indoor_temp_f: f64,
    pub outdoor_temp_f: Option<f64>,
    pub adjusted_outdoor_temp_f: Option<f64>,
    pub is_heating: bool,
}

/// Outcome of the most recent collection cycle, served by `/status`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LastCollection {
    #[serde(with = "time::serde::rfc3339::option")]
    pub time: Option<OffsetDateTime>,
    pub status: CollectionState,
    pub error: Option<String>,
    pub data: Option<CollectedSummary>,
}

#[derive(Debug, Clone, Default)]
pub struct CollectionStatus {
    inner: Arc<RwLock<LastCollection>>,
}

impl CollectionStatus {
    pub fn record_success(&self, record_id: i64, reading: &ThermostatReading) {
        self.set(LastCollection {
            time: Some(OffsetDateTime::now_utc()),
            status: CollectionState::Success,
            error: None,
            data: Some(CollectedSummary {
                record_id,
                indoor_temp_f: reading.indoor_temp_f,
                outdoor_temp_f: reading.outdoor_temp_f,
                adjusted_outdoor_temp_f: reading.adjusted_outdoor_temp_f,
                is_heating: reading.is_heating,
            }),
        });
    }

    pub fn record_failure(&self, error: impl ToString) {
        self.set(LastCollection {
            time: Some(OffsetDateTime::now_utc()),
            status: CollectionState::Error,
            error: Some(error.to_string()),
            data: None,
        });
    }

    pub fn snapshot(&self) -> LastCollection {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set(&self, value: LastCollection) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_not_run_and_tracks_latest_outcome() {
        let status = CollectionStatus::default();
        assert_eq!(status.snapshot().status, CollectionState::NotRun);

        status.record_failure("portal rejected the session");
        let snap = status.snapshot();
        assert_eq!(snap.status, CollectionState::Error);
        assert_eq!(snap.error.as_deref(), Some("portal rejected the session"));
        assert!(snap.time.is_some());

        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["status"], "error");
        assert!(json["data"].is_null());
    }
}
