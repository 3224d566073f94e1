//! CLI entry point for the BART ETD → OMF ingress.
//!
//! `start` bootstraps the OMF type and containers from a first fetch, then
//! sends fresh estimates every interval until Ctrl+C, and finally deletes what
//! it created.

use anyhow::Result;
use bart_ingress::config::{DEFAULT_CONFIG_PATH, Settings};
use bart_ingress::coordinator::DeliveryCoordinator;
use bart_ingress::infra::bart::BartClient;
use bart_ingress::scheduler::{IngestionScheduler, TickOutcome};
use bart_ingress::sink::OmfSink;
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "bart_ingress")]
#[command(about = "Sends BART real-time departure estimates to OMF endpoints", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start ingress; runs until interrupted with Ctrl+C
    Start {
        /// Settings file
        #[arg(short, long, env = "BART_INGRESS_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
        config: String,

        /// Override the poll interval from the settings file, in seconds
        #[arg(short = 'i', long)]
        interval_secs: Option<u64>,

        /// Run a single tick after bootstrap, then clean up and exit
        #[arg(long, default_value_t = false)]
        once: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/bart_ingress.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("bart_ingress.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            config,
            interval_secs,
            once,
        } => {
            let mut settings = Settings::load(&config)?;
            if let Some(secs) = interval_secs {
                settings.interval_secs = secs;
            }
            start(&settings, once).await?;
        }
    }

    Ok(())
}

/// Builds the pipeline from `settings` and runs it until Ctrl+C.
#[tracing::instrument(skip_all, fields(orig = %settings.bart_api_orig, dest = %settings.bart_api_dest))]
async fn start(settings: &Settings, once: bool) -> Result<()> {
    let sinks = settings
        .sink_configs()?
        .iter()
        .map(OmfSink::connect)
        .collect::<Result<Vec<_>, _>>()?;
    info!(destinations = sinks.len(), "OMF destinations ready");

    let source = BartClient::new(
        &settings.bart_api_key,
        &settings.bart_api_orig,
        &settings.bart_api_dest,
    )?;
    let coordinator = DeliveryCoordinator::new(sinks, settings.compression());
    let mut scheduler = IngestionScheduler::new(source, coordinator, settings.interval());

    let plan = match scheduler.bootstrap().await {
        Ok(plan) => plan,
        Err(e) => {
            scheduler.shutdown(None).await;
            return Err(e.into());
        }
    };

    if once {
        if let TickOutcome::Failed(e) = scheduler.trigger(&plan).await {
            warn!(error = %e, "Single tick failed");
        }
    } else {
        info!("Started, press Ctrl+C to quit");
        scheduler
            .run_until(&plan, async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!(error = %e, "Failed to listen for Ctrl+C");
                    // Without a signal handler the process can only be killed.
                    std::future::pending::<()>().await;
                }
            })
            .await;
    }

    // Cleanup must not hold the process up indefinitely.
    if tokio::time::timeout(Duration::from_secs(60), scheduler.shutdown(Some(plan)))
        .await
        .is_err()
    {
        warn!("Cleanup timed out, exiting anyway");
    }
    info!("Stopped");
    Ok(())
}
