pub mod gas_meter_queries;
pub mod thermostat_queries;
