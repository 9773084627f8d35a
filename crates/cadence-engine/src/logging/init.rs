use std::sync::Once;

/// Environment variable consulted before `RUST_LOG`.
pub const LOG_ENV_VAR: &str = "CADENCE_LOG";

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax (e.g. "info",
/// "cadence_engine=debug").
///
/// `write_style` controls ANSI coloring behavior.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,
    /// Prefix each record with a millisecond timestamp.
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
            timestamps: true,
        }
    }
}

static INIT: Once = Once::new();

/// Resolves the filter: explicit config, then `CADENCE_LOG`, then `RUST_LOG`.
fn resolve_filter<E>(config: &LoggingConfig, env: E) -> Option<String>
where
    E: Fn(&str) -> Option<String>,
{
    config
        .env_filter
        .clone()
        .or_else(|| env(LOG_ENV_VAR))
        .or_else(|| env("RUST_LOG"))
}

/// Initializes the global logger once.
///
/// Idempotent; later calls are ignored. A logger installed elsewhere first is
/// left in place.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        match resolve_filter(&config, |key| std::env::var(key).ok()) {
            Some(filter) => {
                builder.parse_filters(&filter);
            }
            // Tick-level chatter is debug; info keeps lifecycle messages visible.
            None => {
                builder.filter_level(log::LevelFilter::Info);
            }
        }

        builder.write_style(config.write_style);

        if config.timestamps {
            builder.format_timestamp_millis();
        } else {
            builder.format_timestamp(None);
        }

        if builder.try_init().is_err() {
            return;
        }

        log::debug!("logging initialized");
    });
}
