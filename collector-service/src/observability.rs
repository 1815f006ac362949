use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &str = "collector_service=info,thermo_client=info";

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// Logging for the long-running collector.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_target(false)
        .init();
}

/// Logging for report-printing CLIs: logs go to stderr so stdout stays clean.
pub fn init_cli_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
