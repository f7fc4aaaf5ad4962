//! Process-wide logger setup.

use std::sync::Once;

/// Logger configuration.
///
/// `env_filter` uses `env_logger` filter syntax (`"debug"`,
/// `"spritebatch_core=trace,warn"`). When unset, `RUST_LOG` is consulted,
/// then the level falls back to `warn`.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
        }
    }
}

impl LoggingConfig {
    /// `--verbose` forces `debug` regardless of `RUST_LOG`.
    pub fn from_verbosity(verbose: bool) -> Self {
        Self {
            env_filter: verbose.then(|| "debug".to_string()),
            ..Self::default()
        }
    }
}

static INIT: Once = Once::new();

/// Installs the global logger. Later calls are ignored.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();
        match config.env_filter {
            Some(filter) => {
                builder.parse_filters(&filter);
            }
            None => match std::env::var("RUST_LOG") {
                Ok(filter) => {
                    builder.parse_filters(&filter);
                }
                Err(_) => {
                    builder.filter_level(log::LevelFilter::Warn);
                }
            },
        }
        builder.write_style(config.write_style);
        // another logger may already be installed in tests
        if builder.try_init().is_ok() {
            log::debug!("logging initialized");
        }
    });
}
