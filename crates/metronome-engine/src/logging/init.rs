use std::sync::Once;

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax (e.g. "warn",
/// "metronome_engine=debug"). Debug level on the engine shows every
/// interval correction the regulator makes.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,
    /// Prefix each line with the emitting module path.
    pub show_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
            show_target: true,
        }
    }
}

impl LoggingConfig {
    pub fn with_filter(filter: impl Into<String>) -> Self {
        Self {
            env_filter: Some(filter.into()),
            ..Self::default()
        }
    }
}

static INIT: Once = Once::new();

/// Initializes the global logger once.
///
/// Filter precedence: `config.env_filter`, then `RUST_LOG`, then `info`.
/// Subsequent calls are ignored, as is a logger installed by someone else.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        if let Some(filter) = config.env_filter {
            builder.parse_filters(&filter);
        } else if let Ok(filter) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filter);
        } else {
            // Degradation warnings and lifecycle info are the useful defaults.
            builder.filter_level(log::LevelFilter::Info);
        }

        builder
            .write_style(config.write_style)
            .format_target(config.show_target);

        if builder.try_init().is_err() {
            log::debug!("a global logger was already installed; keeping it");
            return;
        }

        log::debug!("logging initialized");
    });
}
