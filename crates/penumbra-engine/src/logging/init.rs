use std::sync::Once;

/// Default filter when neither the config nor `RUST_LOG` provide one.
///
/// wgpu is chatty at info level; keep it to warnings unless asked.
const DEFAULT_FILTER: &str = "info,wgpu_core=warn,wgpu_hal=warn,naga=warn";

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax (e.g. "info",
/// "penumbra_engine=debug,wgpu_core=warn").
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

static INIT: Once = Once::new();

/// Initializes the global logger once.
///
/// Subsequent calls are ignored, so both the demo binary and embedding hosts may
/// call it.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        match config.env_filter {
            Some(filter) => builder.parse_filters(&filter),
            None => match std::env::var("RUST_LOG") {
                Ok(filter) => builder.parse_filters(&filter),
                Err(_) => builder.parse_filters(DEFAULT_FILTER),
            },
        };

        builder.write_style(config.write_style);

        // Another logger may already be installed by the host.
        if builder.try_init().is_err() {
            return;
        }

        log::debug!("logging initialized");
    });
}
