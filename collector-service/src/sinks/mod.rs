pub mod postgres;

pub use postgres::{record_meter_reading, DecreasePolicy, PgGasMeterSink, PgThermostatSink, StoredMeterReading};
