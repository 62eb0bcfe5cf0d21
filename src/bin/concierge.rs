//! Interactive concierge desk on stdin/stdout.
//!
//! Usage: `concierge [config.toml]`. Without a file, settings come from the
//! environment (`OPENAI_API_KEY` is required). Diagnostics go to stderr and are
//! filtered by `RUST_LOG`.

use std::sync::Arc;

use concierge_agents::{
    AppConfig, Dispatcher, OpenAIProvider, Repl, RetryingProvider, Roster, RunContext,
};
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact()
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::from_env()?,
    };
    info!(?config, "configuration loaded");

    let provider = RetryingProvider::new(OpenAIProvider::new(&config), config.retry.clone());
    let ctx = RunContext::new(Arc::new(provider)).with_max_turns(config.max_turns);

    let roster = Roster::new()?;
    let dispatcher = Dispatcher::new(&roster.concierge, roster.specialists, ctx.clone())?;

    let mut repl = Repl::new(
        dispatcher,
        BufReader::new(tokio::io::stdin()),
        std::io::stdout(),
    );
    repl.run().await?;

    info!(usage = %ctx.usage_stats().summary(), "session finished");
    Ok(())
}
