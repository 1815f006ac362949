use std::fmt;

use time::OffsetDateTime;

/// One thermostat snapshot as stored in `thermostat_readings`.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ThermostatReading {
    pub recorded_at: OffsetDateTime,
    pub indoor_temp_f: f64,
    /// `None` when the device's weather lookup had no value.
    pub outdoor_temp_f: Option<f64>,
    /// Derived from `outdoor_temp_f` at write time, never measured.
    pub adjusted_outdoor_temp_f: Option<f64>,
    pub heat_setpoint_f: i32,
    pub cool_setpoint_f: i32,
    pub humidity_pct: Option<i32>,
    #[sqlx(try_from = "String")]
    pub mode: ThermostatMode,
    #[sqlx(try_from = "String")]
    pub fan_mode: FanMode,
    pub is_heating: bool,
    pub is_cooling: bool,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} value '{value}'")]
pub struct UnknownCode {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ThermostatMode {
    EmHeat,
    Heat,
    Off,
    Cool,
    Auto,
}

impl ThermostatMode {
    /// Decode the portal's `SystemSwitchPosition` code.
    pub fn from_switch_position(code: i64) -> Result<Self, UnknownCode> {
        match code {
            0 => Ok(Self::EmHeat),
            1 => Ok(Self::Heat),
            2 => Ok(Self::Off),
            3 => Ok(Self::Cool),
            4 => Ok(Self::Auto),
            other => Err(UnknownCode {
                kind: "SystemSwitchPosition",
                value: other.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmHeat => "emheat",
            Self::Heat => "heat",
            Self::Off => "off",
            Self::Cool => "cool",
            Self::Auto => "auto",
        }
    }
}

impl TryFrom<String> for ThermostatMode {
    type Error = UnknownCode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "emheat" => Ok(Self::EmHeat),
            "heat" => Ok(Self::Heat),
            "off" => Ok(Self::Off),
            "cool" => Ok(Self::Cool),
            "auto" => Ok(Self::Auto),
            _ => Err(UnknownCode { kind: "mode", value }),
        }
    }
}

impl fmt::Display for ThermostatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FanMode {
    Auto,
    On,
    Circulate,
}

impl FanMode {
    /// Decode the portal's `fanMode` code.
    pub fn from_code(code: i64) -> Result<Self, UnknownCode> {
        match code {
            0 => Ok(Self::Auto),
            1 => Ok(Self::On),
            2 => Ok(Self::Circulate),
            other => Err(UnknownCode {
                kind: "fanMode",
                value: other.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::On => "on",
            Self::Circulate => "circulate",
        }
    }
}

impl TryFrom<String> for FanMode {
    type Error = UnknownCode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "auto" => Ok(Self::Auto),
            "on" => Ok(Self::On),
            "circulate" => Ok(Self::Circulate),
            _ => Err(UnknownCode { kind: "fan_mode", value }),
        }
    }
}

impl fmt::Display for FanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
