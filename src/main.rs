use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use threshold_logger::adapters::{
    InMemoryLogStore, JsonFileMarketSource, MarketSource, SheetsLogStore,
};
use threshold_logger::cli::{Cli, Commands};
use threshold_logger::config::{AppConfig, LoggingConfig};
use threshold_logger::coordination::{
    install_signal_handlers, CycleScheduler, GracefulShutdown, StopReason,
};
use threshold_logger::error::{LoggerError, Result};
use threshold_logger::persistence::{LogSink, LogStore};
use threshold_logger::pipeline::{effective_markets, BatchAssembler};

/// Exit code when the process cannot start logging
const EXIT_STARTUP: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match AppConfig::load_from(&cli.config) {
        Ok(config) => config,
        Err(e) => return fatal(&LoggerError::from(e)),
    };

    let _guard = init_logging(&config.logging);

    if let Err(errors) = config.validate(cli.dry_run) {
        return fatal(&LoggerError::InvalidConfig(errors.join("; ")));
    }

    let source: Arc<dyn MarketSource> = Arc::new(JsonFileMarketSource::new(&config.markets.path));

    match cli.command() {
        Commands::Markets => show_markets(source.as_ref()).await,
        Commands::Run | Commands::Once => run_logger(&cli, &config, source).await,
    }
}

async fn run_logger(cli: &Cli, config: &AppConfig, source: Arc<dyn MarketSource>) -> ExitCode {
    println!("Starting continuous logging...");
    println!("Press Ctrl+C to stop");

    let store = match open_store(cli, config).await {
        Ok(store) => store,
        Err(e) => {
            println!("Total cycles completed: 0");
            return fatal(&e);
        }
    };
    info!("Logging into {}", store.describe());

    let sink_config = if cli.dry_run {
        config.sink_config().unthrottled()
    } else {
        config.sink_config()
    };

    let shutdown = Arc::new(GracefulShutdown::new());
    install_signal_handlers(shutdown.clone());

    let assembler = match cli.seed {
        Some(seed) => BatchAssembler::seeded(seed),
        None => BatchAssembler::from_entropy(),
    };

    let mut scheduler = CycleScheduler::new(
        config.scheduler_config(cli.cycle_limit()),
        source,
        assembler,
        LogSink::new(store, sink_config),
        shutdown.token(),
    );
    let report = scheduler.run().await;

    match &report.reason {
        StopReason::Interrupted => println!(
            "\nLogging stopped by user. Total cycles completed: {}",
            report.cycles_completed
        ),
        StopReason::Completed => println!(
            "Finished. Total cycles completed: {}",
            report.cycles_completed
        ),
        StopReason::Failed { cycle, error } => {
            eprintln!("Fatal error in cycle {}: {}", cycle, error);
            println!("Total cycles completed: {}", report.cycles_completed);
        }
    }
    println!("Records written: {}", report.records_written);

    ExitCode::from(report.reason.exit_code())
}

async fn open_store(cli: &Cli, config: &AppConfig) -> Result<Arc<dyn LogStore>> {
    if cli.dry_run {
        warn!("Dry run: records are kept in memory only");
        return Ok(Arc::new(InMemoryLogStore::new(&config.sheet.sheet_name)));
    }
    Ok(Arc::new(SheetsLogStore::open(&config.sheet).await?))
}

/// Report an error that ended the process before or outside the cycle loop
fn fatal(e: &LoggerError) -> ExitCode {
    error!("{}", e);
    eprintln!("Fatal error: {}", e);
    if e.is_startup_failure() {
        ExitCode::from(EXIT_STARTUP)
    } else {
        ExitCode::FAILURE
    }
}

async fn show_markets(source: &dyn MarketSource) -> ExitCode {
    let configs = match source.load().await {
        Ok(configs) => configs,
        Err(e) => return fatal(&e),
    };

    if configs.is_empty() {
        println!("No markets configured, the default market will be used:");
    }
    for market in effective_markets(&configs).iter() {
        let [t1, t2, t3] = market.thresholds();
        println!(
            "{:<10} {:<40} thresholds {} / {} / {}",
            market.market_id, market.market_label, t1, t2, t3
        );
    }
    ExitCode::SUCCESS
}

/// Console logging plus an optional daily-rotated file.
///
/// The returned guard flushes the file writer on drop.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.level)));

    let (file_layer, guard) = match config.dir.as_deref().and_then(writable_log_dir) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "threshold-logger.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let (json_layer, text_layer) = if config.json {
        (Some(tracing_subscriber::fmt::layer().json()), None)
    } else {
        (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            ),
        )
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .with(file_layer)
        .init();

    guard
}

fn default_directives(level: &str) -> String {
    if level.eq_ignore_ascii_case("info") {
        "info,threshold_logger=debug".to_string()
    } else {
        level.to_string()
    }
}

/// `rolling::daily` panics if it cannot create its file, so check first
fn writable_log_dir(dir: &Path) -> Option<&Path> {
    if let Err(e) = std::fs::create_dir_all(dir) {
        eprintln!(
            "Warning: Could not create log directory {} ({}), file logging disabled",
            dir.display(),
            e
        );
        return None;
    }

    let probe = dir.join(".threshold_logger_write_test");
    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&probe)
    {
        Ok(_) => {
            let _ = std::fs::remove_file(&probe);
            Some(dir)
        }
        Err(e) => {
            eprintln!(
                "Warning: Could not write to log directory {} ({}), file logging disabled",
                dir.display(),
                e
            );
            None
        }
    }
}
