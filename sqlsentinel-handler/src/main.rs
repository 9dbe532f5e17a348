use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use sqlsentinel_handler::cli::HandlerCli;
use sqlsentinel_handler::handler;
use sqlsentinel_handler::logging::init_tracing;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = HandlerCli::parse();

    let config = handler::load_config(&cli).await?;

    if cli.validate {
        println!("configuration is valid");
        return Ok(ExitCode::SUCCESS);
    }

    init_tracing(&config.general)?;
    sqlsentinel_core::metrics::describe_all();

    tracing::info!(
        event = %cli.event,
        stdin = cli.reads_stdin(),
        backend = %config.dedup.backend,
        cooldown_minutes = config.dedup.cooldown_minutes,
        "sqlsentinel-handler starting"
    );

    let raw_event = handler::read_event(&cli.event).await?;
    let result = handler::run_invocation(&config, &raw_event).await?;

    println!("{}", serde_json::to_string(&result)?);

    if result.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
