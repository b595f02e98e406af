use anyhow::Result;
use once_cell::sync::OnceCell;
use ryze_config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

static ACTIVE_FORMAT: OnceCell<LogFormat> = OnceCell::new();

/// Format of the subscriber installed by this crate, if any
pub fn active_format() -> Option<LogFormat> {
    ACTIVE_FORMAT.get().copied()
}

/// Build the event filter for a configuration; `RUST_LOG` is used when the
/// configured expression does not parse
pub fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_new(config.filter_expression())
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize logging from configuration
pub fn init_logging_from_config(config: &LoggingConfig) -> Result<()> {
    let filter = build_env_filter(config);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.include_target)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    // Use try_init to avoid panic if global subscriber already set
    let installed = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Text => builder.try_init(),
    };

    match installed {
        Ok(()) => {
            let _ = ACTIVE_FORMAT.set(config.format);
            tracing::debug!("Tracing initialised with {:?} format", config.format);
        }
        Err(_) => {
            tracing::debug!("Global tracing subscriber already initialized, skipping");
        }
    }

    Ok(())
}

/// Initialize simple tracing for basic console output
pub fn init_simple_tracing(log_level: &str) -> Result<()> {
    let env_filter = EnvFilter::try_new(log_level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init()
        .is_ok()
    {
        let _ = ACTIVE_FORMAT.set(LogFormat::Text);
    } else {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

/// Route events through the test harness writer so output is captured per test
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}
