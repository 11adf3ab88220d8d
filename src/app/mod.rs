mod config;
mod coordinator;
mod error;
mod logging;
mod runtime;
pub mod services;

pub use config::AppConfig;
pub use coordinator::{Coordinator, RefreshError};
pub use error::AppError;
pub use runtime::{Poller, SystemClock};

fn bootstrap() -> Result<AppConfig, AppError> {
    logging::init()?;

    let config = AppConfig::from_env()?;

    tracing::info!(
        url = %config.url,
        name = %config.name,
        scan_interval_seconds = config.scan_interval_seconds,
        power_unit = %config.power_unit,
        db_path = %config.db_path,
        http_bind = %config.http_bind,
        replay_file = config.replay_file.as_deref().unwrap_or("-"),
        "application bootstrap initialized"
    );

    Ok(config)
}

pub fn run() -> Result<(), AppError> {
    runtime::run(bootstrap()?)
}

pub fn run_service() -> Result<(), AppError> {
    runtime::run_headless(bootstrap()?)
}
