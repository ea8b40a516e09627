use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub mod formatter;

pub use formatter::*;

use crate::configs::Config;

/// Builds the filter string: configured level, extra directives, and
/// the noisy HTTP internals capped at `warn`.
pub fn filter_directives(config: &Config) -> String {
    let log_level = if config.logging.debug {
        "debug"
    } else {
        config.logging.level.as_deref().unwrap_or("info")
    };

    let filters = config.logging.filters.as_deref().unwrap_or("");

    if filters.is_empty() {
        format!("{},hyper=warn,reqwest=warn", log_level)
    } else {
        format!("{},hyper=warn,reqwest=warn,{}", log_level, filters)
    }
}

pub fn init(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(config)));

    let stdout_layer = fmt::layer()
        .event_format(LineFormatter::new(config.logging.ansi))
        .with_ansi(config.logging.ansi);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .init();
}
