//! Tracing setup for the handler binary.
//!
//! Output goes to stderr; stdout is reserved for the invocation result JSON.

use anyhow::{Context, Result, bail};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use sqlsentinel_core::config::GeneralConfig;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Build the stderr fmt layer for `json` or `pretty`.
fn stderr_layer(format: &str) -> Result<BoxedLayer> {
    let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    Ok(match format {
        "json" => layer.json().boxed(),
        "pretty" => layer.pretty().boxed(),
        other => bail!("unknown log format '{other}', expected 'json' or 'pretty'"),
    })
}

/// Install the global subscriber. `RUST_LOG` takes precedence over
/// `general.log_level`.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(stderr_layer(&config.log_format)?)
        .with(filter)
        .try_init()
        .context("failed to install tracing subscriber")
}
