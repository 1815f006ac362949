mod gas_meter_reading;
mod thermostat_reading;

pub use gas_meter_reading::GasMeterReading;
pub use thermostat_reading::{FanMode, ThermostatMode, ThermostatReading, UnknownCode};
