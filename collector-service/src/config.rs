use std::{env, fs, path::Path, time::Duration};

use anyhow::{bail, Context};
use serde::Deserialize;
use thermo_client::engine::EngineConfig;
use time::{Date, UtcOffset};

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub uri: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            uri: String::new(),
            max_connections: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HoneywellConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub device_id: i64,
    pub request_timeout_secs: u64,
}

impl Default for HoneywellConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.mytotalconnectcomfort.com".to_string(),
            username: String::new(),
            password: String::new(),
            device_id: 0,
            request_timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub interval_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 15 * 60,
            max_retries: 3,
            retry_backoff_ms: 2_000,
        }
    }
}

impl CollectorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeepAliveConfig {
    pub bind_addr: String,
    /// Public URL of this service; pinged so the host keeps it resident.
    pub self_ping_url: Option<String>,
    pub ping_interval_secs: u64,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
            self_ping_url: None,
            ping_interval_secs: 10 * 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub points_url: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    /// Degrees subtracted from a day's high when the forecast has no low.
    pub missing_low_spread_f: f64,
    /// HDD per remaining day when no forecast can be fetched.
    pub fallback_daily_hdd: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            points_url: "https://api.weather.gov/points/36.9685,-86.4808".to_string(),
            user_agent: "GasBillEstimator/1.0".to_string(),
            request_timeout_secs: 10,
            missing_low_spread_f: 20.0,
            fallback_daily_hdd: 25.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BillingCycleConfig {
    #[serde(with = "iso_date")]
    pub start: Date,
    #[serde(with = "iso_date")]
    pub end: Date,
    /// Meter value at the start of the cycle, as printed on the bill. Looked
    /// up in the store when absent.
    pub start_meter_reading: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Offset used to group samples into local calendar days.
    pub utc_offset_hours: i8,
}

impl SiteConfig {
    pub fn utc_offset(&self) -> anyhow::Result<UtcOffset> {
        UtcOffset::from_hms(self.utc_offset_hours, 0, 0)
            .with_context(|| format!("invalid site.utc_offset_hours {}", self.utc_offset_hours))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub honeywell: HoneywellConfig,
    #[serde(default)]
    pub collector: CollectorConfig,
    #[serde(default)]
    pub keepalive: KeepAliveConfig,
    #[serde(default)]
    pub forecast: ForecastConfig,
    pub billing_cycle: Option<BillingCycleConfig>,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl AppConfig {
    /// Load `THERMO_CONFIG` (default `thermo-config.toml`), then apply
    /// `DATABASE_URL`, `HONEYWELL_USERNAME` and `HONEYWELL_PASSWORD` from the
    /// environment or a `.env` file.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let explicit = env::var("THERMO_CONFIG").ok();
        let path = explicit.clone().unwrap_or_else(|| "thermo-config.toml".to_string());

        let mut cfg = if explicit.is_some() || Path::new(&path).exists() {
            let contents = fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            Self::from_toml_str(&contents)?
        } else {
            tracing::debug!(path = %path, "no config file, using defaults");
            Self::default()
        };

        if let Ok(uri) = env::var("DATABASE_URL") {
            cfg.database.uri = uri;
        }
        if let Ok(user) = env::var("HONEYWELL_USERNAME") {
            cfg.honeywell.username = user;
        }
        if let Ok(pass) = env::var("HONEYWELL_PASSWORD") {
            cfg.honeywell.password = pass;
        }

        Ok(cfg)
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        if cfg.database.max_connections == 0 {
            bail!("invalid config: database.max_connections must be positive");
        }
        if let Some(cycle) = &cfg.billing_cycle {
            if cycle.end < cycle.start {
                bail!("invalid config: billing_cycle.end is before billing_cycle.start");
            }
        }
        Ok(cfg)
    }

    pub fn database_uri(&self) -> anyhow::Result<&str> {
        if self.database.uri.is_empty() {
            bail!("no database configured: set DATABASE_URL or database.uri");
        }
        Ok(&self.database.uri)
    }

    pub fn billing_cycle(&self) -> anyhow::Result<&BillingCycleConfig> {
        self.billing_cycle
            .as_ref()
            .context("no [billing_cycle] section in config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn empty_config_uses_defaults() {
        let cfg = AppConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.collector.interval_secs, 900);
        assert_eq!(cfg.database.max_connections, 2);
        assert_eq!(cfg.engine, EngineConfig::default());
        assert!(cfg.billing_cycle.is_none());
        assert!(cfg.database_uri().is_err());
    }

    #[test]
    fn defaults_without_config_file_allow_a_pool() {
        assert_eq!(AppConfig::default().database.max_connections, 2);

        let cfg = AppConfig::from_toml_str("[site]\nutc_offset_hours = -6\n").unwrap();
        assert_eq!(cfg.database.max_connections, 2);

        let cfg = AppConfig::from_toml_str("[database]\nuri = \"postgres://localhost/thermo\"\n").unwrap();
        assert_eq!(cfg.database.max_connections, 2);
    }

    #[test]
    fn full_config_parses() {
        let cfg = AppConfig::from_toml_str(
            r#"
            [database]
            uri = "postgres://localhost/thermo"

            [honeywell]
            device_id = 4242

            [site]
            utc_offset_hours = -6

            [billing_cycle]
            start = "2025-12-12"
            end = "2026-01-13"
            start_meter_reading = 1339.0

            [engine]
            heat_rise_factor = 0.25
            usage_factor_ccf_per_hdd = 0.1173

            [engine.rates]
            customer_charge = 26.5

            [[engine.rates.sub_rates]]
            name = "distribution"
            per_ccf = 0.2

            [[engine.rates.sub_rates]]
            name = "gas_cost"
            per_ccf = 0.5

            [engine.weather_normalization]
            normal_daily_hdd = 22.0
            "#,
        )
        .unwrap();

        assert_eq!(cfg.database_uri().unwrap(), "postgres://localhost/thermo");
        assert_eq!(cfg.honeywell.device_id, 4242);
        assert_eq!(cfg.honeywell.request_timeout_secs, 15);
        assert_eq!(cfg.site.utc_offset().unwrap(), UtcOffset::from_hms(-6, 0, 0).unwrap());

        let cycle = cfg.billing_cycle().unwrap();
        assert_eq!(cycle.start, date!(2025-12-12));
        assert_eq!(cycle.end, date!(2026-01-13));
        assert_eq!(cycle.start_meter_reading, Some(1339.0));

        assert_eq!(cfg.engine.base_temperature_f, 65.0);
        assert_eq!(cfg.engine.heat_rise_factor, 0.25);
        assert_eq!(cfg.engine.rates.customer_charge, 26.5);
        assert!((cfg.engine.rates.variable_rate() - 0.7).abs() < 1e-12);

        let wna = cfg.engine.weather_normalization.unwrap();
        assert_eq!(wna.normal_daily_hdd, 22.0);
        assert_eq!(wna.base_load, 1.0556);
    }

    #[test]
    fn inverted_billing_cycle_is_rejected() {
        let res = AppConfig::from_toml_str(
            r#"
            [billing_cycle]
            start = "2026-01-13"
            end = "2025-12-12"
            "#,
        );
        assert!(res.is_err());
    }
}
