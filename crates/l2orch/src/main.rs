//! SONiC bridge orchestration agent entry point.
//!
//! Starts the VLAN/bridge port/FDB stack against an in-process virtual
//! switch. With `--script` the given table operations are replayed and the
//! daemon exits once the last one has settled; otherwise it runs until
//! interrupted.

use anyhow::{Context, Result};
use clap::Parser;
use sonic_l2orch::config::{L2OrchConfig, DEFAULT_CONFIG_PATH};
use sonic_l2orch::{script, OrchStack};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

/// SONiC bridge orchestration agent
#[derive(Parser, Debug)]
#[command(name = "l2orchd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error), overridden by RUST_LOG
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Front-panel interfaces, overriding the configured layout
    #[arg(short = 'p', long, value_delimiter = ',')]
    ports: Vec<String>,

    /// JSON list of table operations to replay, then exit
    #[arg(short = 's', long)]
    script: Option<PathBuf>,

    /// Print ASIC_STATE as JSON before exiting
    #[arg(short = 'd', long)]
    dump: bool,
}

fn init_logging(log_level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true),
        )
        .init();
}

async fn run(args: Args) -> Result<()> {
    let mut config = L2OrchConfig::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if !args.ports.is_empty() {
        config.switch.ports = args.ports.clone();
    }

    let stack = OrchStack::build(&config).context("starting bridge stack")?;

    match &args.script {
        Some(path) => {
            let steps =
                script::load(path).with_context(|| format!("loading {}", path.display()))?;
            info!(steps = steps.len(), script = %path.display(), "replaying script");
            script::run(&stack, &steps).await.context("replaying script")?;
        }
        None => {
            info!("running, press Ctrl-C to stop");
            tokio::signal::ctrl_c()
                .await
                .context("waiting for Ctrl-C")?;
            warn!("Received SIGINT, shutting down gracefully...");
        }
    }

    stack.settled().await;
    for line in stack.dump() {
        info!("{}", line);
    }
    let diagnostics = stack.diagnostics.all();
    if !diagnostics.is_empty() {
        warn!(count = diagnostics.len(), "unresolved diagnostics remain");
        for diag in &diagnostics {
            warn!(table = %diag.table, key = %diag.key, kind = %diag.kind, detail = %diag.message, "diagnostic");
        }
    }

    if args.dump {
        let json = serde_json::to_string_pretty(&stack.asic_state())
            .context("serializing ASIC_STATE")?;
        println!("{}", json);
    }

    stack.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    info!("Starting l2orchd");
    match run(args).await {
        Ok(()) => {
            info!("l2orchd shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = format!("{:#}", e), "l2orchd exiting with error");
            ExitCode::FAILURE
        }
    }
}
