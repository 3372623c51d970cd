use anyhow::{Context, Result};
use csm_config::Config;

/// Print spawn infos to the log.
pub fn dump_spawn_infos(config: &Config) {
    if config.path().join(csm_config::CONFIG_FILE_NAME).exists() {
        csm_log::info!("loaded config from folder {}", config.path().display());
    } else {
        csm_log::info!("launching without config file, using defaults");
    }

    csm_log::info!(
        "  queue capacity: {} ({})",
        config.queue().capacity,
        config.queue().overflow
    );
    csm_log::info!("  batch size: {}", config.dispatch().batch_size);
    csm_log::info!("  dispatch interval: {:?}", config.dispatch().interval());
    csm_log::info!("  consent vendor id: {}", config.privacy().vendor_id);
    csm_log::info!("  log level: {}", config.logging().level);
}

/// Initialize the metric system.
pub fn init_metrics(config: &Config) -> Result<()> {
    let Some(metrics_config) = config.metrics_config() else {
        return Ok(());
    };

    let host = metrics_config.host.clone();
    csm_statsd::init(metrics_config)
        .with_context(|| format!("failed to initialize statsd client for {host}"))?;

    Ok(())
}
