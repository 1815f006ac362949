pub mod config;
pub mod keepalive;
pub mod observability;
pub mod pipeline;
pub mod sinks;
pub mod sources;
pub mod status;
pub mod transform;

pub use pipeline::{Envelope, Pipeline};
