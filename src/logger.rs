use anyhow::Result;
use tracing_subscriber::EnvFilter;

use crate::config::MonitoringConfig;

pub fn init_logging(config: &MonitoringConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    if config.json_logs {
        builder.json().init();
    } else {
        builder.compact().init();
    }

    Ok(())
}
