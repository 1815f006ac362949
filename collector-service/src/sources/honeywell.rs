//! Total Connect Comfort portal client and the polling source built on it.

use std::{sync::Arc, time::Duration};

use serde::Deserialize;
use thermo_client::domain::{FanMode, ThermostatMode, ThermostatReading};
use time::OffsetDateTime;
use tokio::{sync::Notify, time::MissedTickBehavior};

use crate::{
    config::HoneywellConfig,
    pipeline::{Envelope, EnvelopeStream, PipelineError, Source},
};

/// Value the portal reports when it has no reading for a sensor.
const UNAVAILABLE_SENTINEL: f64 = 128.0;

const EQUIPMENT_HEATING: i64 = 1;
const EQUIPMENT_COOLING: i64 = 2;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckDataSession {
    success: bool,
    #[serde(default)]
    communication_lost: bool,
    latest_data: Option<LatestData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LatestData {
    ui_data: UiData,
    fan_data: FanData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UiData {
    disp_temperature: f64,
    heat_setpoint: f64,
    cool_setpoint: f64,
    system_switch_position: i64,
    #[serde(default)]
    equipment_output_status: i64,
    indoor_humidity: Option<f64>,
    outdoor_temperature: Option<f64>,
    #[serde(default = "default_true")]
    outdoor_temperature_available: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FanData {
    fan_mode: i64,
}

fn available(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != UNAVAILABLE_SENTINEL)
}

/// Decode one `CheckDataSession` payload into a reading. The adjusted
/// outdoor temperature is left unset for the pipeline to derive.
fn decode_session(body: &str, recorded_at: OffsetDateTime) -> Result<ThermostatReading, PipelineError> {
    let session: CheckDataSession = serde_json::from_str(body)
        .map_err(|e| PipelineError::Source(format!("invalid portal payload: {e}")))?;

    if !session.success {
        return Err(PipelineError::Source("portal rejected the session".to_string()));
    }
    if session.communication_lost {
        return Err(PipelineError::Source("portal lost contact with the thermostat".to_string()));
    }
    let data = session
        .latest_data
        .ok_or_else(|| PipelineError::Source("portal payload has no latestData".to_string()))?;
    let ui = data.ui_data;

    let mode = ThermostatMode::from_switch_position(ui.system_switch_position)
        .map_err(|e| PipelineError::Source(e.to_string()))?;
    let fan_mode =
        FanMode::from_code(data.fan_data.fan_mode).map_err(|e| PipelineError::Source(e.to_string()))?;

    let outdoor_temp_f = if ui.outdoor_temperature_available {
        available(ui.outdoor_temperature)
    } else {
        None
    };

    Ok(ThermostatReading {
        recorded_at,
        indoor_temp_f: ui.disp_temperature,
        outdoor_temp_f,
        adjusted_outdoor_temp_f: None,
        heat_setpoint_f: ui.heat_setpoint.round() as i32,
        cool_setpoint_f: ui.cool_setpoint.round() as i32,
        humidity_pct: available(ui.indoor_humidity).map(|h| h.round() as i32),
        mode,
        fan_mode,
        is_heating: ui.equipment_output_status == EQUIPMENT_HEATING,
        is_cooling: ui.equipment_output_status == EQUIPMENT_COOLING,
    })
}

pub struct HoneywellClient {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    device_id: i64,
}

impl HoneywellClient {
    pub fn new(cfg: &HoneywellConfig) -> Result<Self, PipelineError> {
        if cfg.username.is_empty() || cfg.password.is_empty() {
            return Err(PipelineError::Source(
                "portal credentials missing: set HONEYWELL_USERNAME and HONEYWELL_PASSWORD".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()
            .map_err(|e| PipelineError::Source(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            username: cfg.username.clone(),
            password: cfg.password.clone(),
            device_id: cfg.device_id,
        })
    }

    async fn login(&self) -> Result<(), PipelineError> {
        let form = [
            ("UserName", self.username.as_str()),
            ("Password", self.password.as_str()),
            ("RememberMe", "false"),
            ("timeOffset", "0"),
        ];
        let response = self
            .client
            .post(format!("{}/portal/", self.base_url))
            .form(&form)
            .send()
            .await
            .map_err(|e| PipelineError::Source(format!("portal login failed: {e}")))?;

        if !response.status().is_success() {
            return Err(PipelineError::Source(format!(
                "portal login returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Log in and read the current state of the configured device.
    pub async fn fetch_reading(&self) -> Result<ThermostatReading, PipelineError> {
        self.login().await?;

        let response = self
            .client
            .get(format!(
                "{}/portal/Device/CheckDataSession/{}",
                self.base_url, self.device_id
            ))
            .header("X-Requested-With", "XMLHttpRequest")
            .send()
            .await
            .map_err(|e| PipelineError::Source(format!("portal request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PipelineError::Source(format!("failed to read portal response: {e}")))?;
        if !status.is_success() {
            return Err(PipelineError::Source(format!("portal returned {status}")));
        }

        decode_session(&body, OffsetDateTime::now_utc())
    }
}

#[derive(Debug, Clone, Copy)]
pub enum PollSchedule {
    Once,
    Every(Duration),
}

/// Emits one reading per tick; manual triggers poll between ticks.
pub struct ThermostatSource {
    client: Arc<HoneywellClient>,
    schedule: PollSchedule,
    trigger: Arc<Notify>,
}

impl ThermostatSource {
    pub fn new(client: HoneywellClient, schedule: PollSchedule, trigger: Arc<Notify>) -> Self {
        Self {
            client: Arc::new(client),
            schedule,
            trigger,
        }
    }
}

async fn poll(client: &HoneywellClient) -> Result<Envelope<ThermostatReading>, PipelineError> {
    metrics::counter!("thermostat_polls_total").increment(1);
    match client.fetch_reading().await {
        Ok(reading) => {
            tracing::debug!(indoor = reading.indoor_temp_f, outdoor = ?reading.outdoor_temp_f, "thermostat polled");
            Ok(Envelope::new(reading))
        }
        Err(e) => {
            metrics::counter!("thermostat_poll_failures_total").increment(1);
            tracing::warn!(error = %e, "thermostat poll failed");
            Err(e)
        }
    }
}

#[async_trait::async_trait]
impl Source<ThermostatReading> for ThermostatSource {
    async fn stream(&self) -> EnvelopeStream<ThermostatReading> {
        let client = self.client.clone();
        let schedule = self.schedule;
        let trigger = self.trigger.clone();

        let s = async_stream::stream! {
            match schedule {
                PollSchedule::Once => yield poll(&client).await,
                PollSchedule::Every(period) => {
                    let mut ticker = tokio::time::interval(period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    loop {
                        tokio::select! {
                            _ = ticker.tick() => {}
                            _ = trigger.notified() => {
                                tracing::info!("manual collection requested");
                            }
                        }
                        yield poll(&client).await;
                    }
                }
            }
        };

        Box::pin(s)
    }
}
