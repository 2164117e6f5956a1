use anyhow::Result;
use tracing_log::LogTracer;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Install a stderr subscriber for binaries built on this crate. Calling it
/// again, or after another subscriber was installed, is harmless.
pub fn init(cfg: &LoggingConfig) -> Result<()> {
    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .compact();

    tracing_subscriber::registry()
        .with(build_filter(cfg))
        .with(stderr_layer)
        .try_init()
        .ok();
    let _ = LogTracer::init();
    Ok(())
}

fn build_filter(cfg: &LoggingConfig) -> EnvFilter {
    if !cfg.enabled {
        return EnvFilter::new("off");
    }
    EnvFilter::try_new(cfg.level.clone()).unwrap_or_else(|_| EnvFilter::new("warn"))
}
