use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ops_investigator::{
    config::{Config, LogFormat},
    Investigator, OperationCatalog, ProcessExecutor,
};

/// Investigate an operational question and print the session as JSON.
#[derive(Debug, Parser)]
#[command(name = "ops-investigator", version, about)]
struct Cli {
    /// Overall deadline in milliseconds (defaults to INVESTIGATION_DEADLINE_MS)
    #[arg(long)]
    deadline_ms: Option<u64>,

    /// The question to investigate
    #[arg(required = true, num_args = 1..)]
    query: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        program = %config.executor.program,
        "Ops investigator starting..."
    );

    let deadline = cli
        .deadline_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.investigation.deadline());

    let investigator = Investigator::new(
        config.investigation.clone(),
        Arc::new(ProcessExecutor::new(&config.executor)),
        Arc::new(OperationCatalog::default()),
    );

    // Ctrl-C cancels the running investigation
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling investigation");
            ctrl_c.cancel();
        }
    });

    let query = cli.query.join(" ");
    let session = match investigator.investigate(&cancel, &query, deadline).await {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Investigation failed");
            return Err(e.into());
        }
    };

    println!("{}", serde_json::to_string_pretty(&session)?);

    info!(status = %session.status(), "Investigation complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
