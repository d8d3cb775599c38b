//! flowline - configurable flow-processing pipelines
//!
//! Reads a YAML list of segments, wires them into one or more pipeline
//! replicas and runs them until a source ends the pipeline or SIGINT
//! arrives.
//!
//! ```bash
//! flowline -c config.yml
//! flowline -c config.yml -l debug -- extra-arg-for-dollar-expansion
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// How long a graceful shutdown may take before the process force-quits
const GRACE_PERIOD: Duration = Duration::from_secs(15);
/// Exit code used when the grace period runs out
const EXIT_FORCED: i32 = 5;

#[derive(Parser, Debug)]
#[command(name = "flowline", version, about, long_about = None)]
struct Cli {
    /// Location of the pipeline config file
    #[arg(short, long, default_value = "config.yml")]
    config: std::path::PathBuf,

    /// Log level: one of 'trace', 'debug', 'info', 'warning' or 'error'
    #[arg(short = 'l', long, default_value = "warning")]
    log_level: String,

    /// Log as JSON instead of human-readable lines
    #[arg(short = 'j', long)]
    json_log: bool,

    /// Number of concurrent pipeline replicas. 0 spawns one per
    /// available core. Only the default of 1 guarantees a stable order
    /// of flows in and out of flowline.
    #[arg(short = 'n', long, default_value_t = 1)]
    concurrency: usize,

    /// Free arguments, available to config values as $0, $1, ...
    #[arg(trailing_var_arg = true)]
    args: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.json_log)?;

    let config = std::fs::read_to_string(&cli.config)
        .with_context(|| format!("reading config file {}", cli.config.display()))?;
    let specs = flowline_config::specs_from_yaml(&config).context("parsing configuration")?;

    let replicas = if cli.concurrency == 0 {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    } else {
        cli.concurrency
    };

    let registry = flowline_segments::default_registry();
    let pipeline_ended = CancellationToken::new();
    let mut pipelines = Vec::with_capacity(replicas);
    for replica in 0..replicas {
        let mut pipeline = flowline_pipeline::build(&specs, &registry, &cli.args)
            .with_context(|| format!("building pipeline replica {replica}"))?;
        pipeline.start();
        pipeline.auto_drain();

        let ended = pipeline_ended.clone();
        let token = pipeline.shutdown_token();
        tokio::spawn(async move {
            token.cancelled().await;
            ended.cancel();
        });
        pipelines.push(pipeline);
    }
    tracing::info!(
        replicas,
        segments = specs.len(),
        "pipelines running"
    );

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("listening for SIGINT")?;
            tracing::info!("received exit signal");
        }
        _ = pipeline_ended.cancelled() => {
            tracing::info!("a pipeline requested shutdown");
        }
    }

    // force-quit watchdog: if draining hangs, take the process down
    tokio::spawn(async {
        tokio::time::sleep(GRACE_PERIOD).await;
        tracing::error!("failed to shut down gracefully, force quitting");
        std::process::exit(EXIT_FORCED);
    });

    for mut pipeline in pipelines {
        pipeline.close().await;
    }
    tracing::info!("shut down gracefully");
    Ok(())
}

fn init_logging(level: &str, json: bool) -> Result<()> {
    // accept the historical 'warning' spelling next to tracing's 'warn'
    let level = match level {
        "warning" => "warn",
        other => other,
    };
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|error| anyhow::anyhow!("invalid log level: {error}"))?;

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
    Ok(())
}
