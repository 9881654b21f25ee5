use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use orbit::error::{AppError, Result};

/// Environment variable holding a filter directive; wins over the config.
pub const LOG_ENV: &str = "ORBIT_LOG";

/// Resolve the filter from `$ORBIT_LOG`, else from `level`.
pub fn build_filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| AppError::Config(format!("invalid log filter '{level}': {e}")))
}

/// Send all tracing output to `file`. The terminal belongs to the UI.
pub fn init(file: &Path, level: &str) -> Result<()> {
    if let Some(dir) = file.parent() {
        fs::create_dir_all(dir)?;
    }
    let writer = OpenOptions::new().create(true).append(true).open(file)?;

    tracing_subscriber::registry()
        .with(build_filter(level)?)
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(Mutex::new(writer)),
        )
        .try_init()
        .map_err(|e| AppError::Config(format!("logging already initialized: {e}")))
}
