//! Shared components for CLI commands

use crate::cli::args::GlobalArgs;
use crate::config::MetricsConfig;
use anyhow::{Context, Result};
use tracing::debug;

/// Set up structured logging on stderr
pub fn setup_logging(args: &GlobalArgs) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("asterasys_metrics={}", log_level)));

    if args.quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    debug!("Logging initialized at level: {}", log_level);
}

/// Layer the config file, environment and flags
pub fn load_config(args: &GlobalArgs) -> Result<MetricsConfig> {
    MetricsConfig::load_layered(args.config.as_deref(), args.data_root.clone())
        .context("Failed to load configuration")
}
