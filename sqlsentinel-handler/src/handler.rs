//! Invocation wiring: configuration loading, event input, and the
//! store/notifier selection for one batch.

use std::path::Path;

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;

use sqlsentinel_core::config::SentinelConfig;
use sqlsentinel_core::types::InvocationResult;
use sqlsentinel_log_pipeline::{
    AlertConfig, DedupStore, FileDedupStore, MemoryDedupStore, Notifier, Orchestrator,
    SystemClock, WebhookNotifier,
};

use crate::cli::HandlerCli;

/// Load configuration from the CLI's sources and apply CLI overrides.
///
/// Order: defaults, then the TOML file (if given), then environment
/// variables, then `--log-level` / `--log-format`.
pub async fn load_config(cli: &HandlerCli) -> Result<SentinelConfig> {
    let mut config = match &cli.config {
        Some(path) => SentinelConfig::load(path)
            .await
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => SentinelConfig::from_env().context("invalid configuration from environment")?,
    };

    if let Some(level) = &cli.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.general.log_format = format.clone();
    }

    config.validate().context("configuration validation failed")?;
    Ok(config)
}

/// Read the inbound event from a file, or stdin when `source` is `-`.
pub async fn read_event(source: &str) -> Result<Vec<u8>> {
    if source == "-" {
        let mut buf = Vec::new();
        tokio::io::stdin()
            .read_to_end(&mut buf)
            .await
            .context("failed to read event from stdin")?;
        return Ok(buf);
    }

    let path = Path::new(source);
    tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read event file {}", path.display()))
}

/// Run one invocation with the configured store backend and webhook.
pub async fn run_invocation(config: &SentinelConfig, raw_event: &[u8]) -> Result<InvocationResult> {
    let alert_config = AlertConfig::from_core(config)?;
    let notifier = WebhookNotifier::from_config(&config.notifier)?;

    match config.dedup.backend.as_str() {
        "memory" => {
            tracing::warn!("memory dedup backend selected, cooldown state is not persisted");
            run_with(alert_config, MemoryDedupStore::new(), notifier, raw_event).await
        }
        _ => {
            let store = FileDedupStore::open(&config.dedup.data_dir, &config.dedup.table_name)
                .await
                .context("failed to open dedup store")?;
            run_with(alert_config, store, notifier, raw_event).await
        }
    }
}

async fn run_with<S, N>(
    alert_config: AlertConfig,
    store: S,
    notifier: N,
    raw_event: &[u8],
) -> Result<InvocationResult>
where
    S: DedupStore,
    N: Notifier,
{
    let orchestrator = Orchestrator::new(alert_config, store, notifier, SystemClock)?;
    Ok(orchestrator.process_raw_event(raw_event).await)
}
