pub mod honeywell;
pub mod meter_reading_csv_file;
pub mod nws;

pub use honeywell::{HoneywellClient, PollSchedule, ThermostatSource};
pub use meter_reading_csv_file::MeterReadingCsvFileSource;
pub use nws::NwsForecastClient;
