//! National Weather Service forecast, reduced to one high/low per day.

use std::{collections::BTreeMap, time::Duration};

use anyhow::{Context, Result};
use serde::Deserialize;
use thermo_client::engine::ForecastDay;
use time::{Date, OffsetDateTime};

use crate::config::ForecastConfig;

#[derive(Debug, Deserialize)]
struct PointsResponse {
    properties: PointsProperties,
}

#[derive(Debug, Deserialize)]
struct PointsProperties {
    forecast: String,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    properties: ForecastProperties,
}

#[derive(Debug, Deserialize)]
struct ForecastProperties {
    periods: Vec<ForecastPeriod>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForecastPeriod {
    #[serde(with = "time::serde::rfc3339")]
    start_time: OffsetDateTime,
    is_daytime: bool,
    temperature: f64,
}

/// Group day/night periods by the local date of their start time. Daytime
/// periods give the high, night periods the low. Days without a high are
/// dropped; a missing low is estimated as `high - missing_low_spread_f`.
fn daily_forecast(periods: &[ForecastPeriod], missing_low_spread_f: f64) -> Vec<ForecastDay> {
    let mut days: BTreeMap<Date, (Option<f64>, Option<f64>)> = BTreeMap::new();
    for p in periods {
        let entry = days.entry(p.start_time.date()).or_default();
        if p.is_daytime {
            entry.0 = Some(p.temperature);
        } else {
            entry.1 = Some(p.temperature);
        }
    }

    days.into_iter()
        .filter_map(|(date, (high, low))| {
            let high_f = high?;
            Some(ForecastDay {
                date,
                high_f,
                low_f: low.unwrap_or(high_f - missing_low_spread_f),
            })
        })
        .collect()
}

pub struct NwsForecastClient {
    client: reqwest::Client,
    points_url: String,
    missing_low_spread_f: f64,
}

impl NwsForecastClient {
    pub fn new(cfg: &ForecastConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            points_url: cfg.points_url.clone(),
            missing_low_spread_f: cfg.missing_low_spread_f,
        })
    }

    pub async fn daily_forecast(&self) -> Result<Vec<ForecastDay>> {
        let points: PointsResponse = self
            .client
            .get(&self.points_url)
            .send()
            .await?
            .error_for_status()
            .context("NWS points lookup failed")?
            .json()
            .await?;

        let forecast: ForecastResponse = self
            .client
            .get(&points.properties.forecast)
            .send()
            .await?
            .error_for_status()
            .context("NWS forecast request failed")?
            .json()
            .await?;

        let days = daily_forecast(&forecast.properties.periods, self.missing_low_spread_f);
        tracing::debug!(days = days.len(), "NWS forecast fetched");
        Ok(days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn periods(json: &str) -> Vec<ForecastPeriod> {
        let parsed: ForecastResponse = serde_json::from_str(json).unwrap();
        parsed.properties.periods
    }

    #[test]
    fn day_and_night_periods_pair_into_days() {
        let ps = periods(
            r#"{"properties": {"periods": [
                {"name": "Tonight", "startTime": "2026-01-09T18:00:00-06:00", "isDaytime": false, "temperature": 22},
                {"name": "Saturday", "startTime": "2026-01-10T06:00:00-06:00", "isDaytime": true, "temperature": 41},
                {"name": "Saturday Night", "startTime": "2026-01-10T18:00:00-06:00", "isDaytime": false, "temperature": 25},
                {"name": "Sunday", "startTime": "2026-01-11T06:00:00-06:00", "isDaytime": true, "temperature": 50}
            ]}}"#,
        );

        let days = daily_forecast(&ps, 20.0);
        assert_eq!(
            days,
            vec![
                ForecastDay { date: date!(2026-01-10), high_f: 41.0, low_f: 25.0 },
                ForecastDay { date: date!(2026-01-11), high_f: 50.0, low_f: 30.0 },
            ]
        );
        assert_eq!(days[0].hdd(65.0), 32.0);
    }

    #[test]
    fn empty_forecast_yields_no_days() {
        assert!(daily_forecast(&[], 20.0).is_empty());
    }
}
