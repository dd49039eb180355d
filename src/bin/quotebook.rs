//! Quote Book Server Binary
//!
//! # Examples
//!
//! ```bash
//! # Start server with a config file
//! CONFIG_PATH=config.json quotebook serve
//!
//! # Override the listen address, log as JSON
//! quotebook --log-format json serve --bind 0.0.0.0:8080
//!
//! # Show the resolved configuration
//! quotebook config
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use quotebook::server::start_server;
use quotebook::{storage, AppConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

/// Quote Book - concurrent in-memory quote store
#[derive(Parser, Debug)]
#[command(name = "quotebook")]
#[command(version = quotebook::VERSION)]
#[command(about = "Quote Book - concurrent in-memory quote store", long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Config file (JSON or TOML)
    #[arg(long, global = true, env = "CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Also write daily rolling log files into this directory
    #[arg(long, global = true, env = "QUOTEBOOK_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Console log format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP server
    Serve(ServeArgs),

    /// Print the resolved configuration as TOML
    Config,

    /// Show version
    Version,
}

/// Server configuration overrides
#[derive(Args, Debug)]
struct ServeArgs {
    /// Listen address (host:port)
    #[arg(short, long)]
    bind: Option<String>,

    /// Tombstone ratio that triggers compaction
    #[arg(long)]
    gc_threshold: Option<f64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(&cli)?;

    match cli.command {
        Commands::Serve(ref args) => serve_command(&cli, args).await,
        Commands::Config => {
            let config = AppConfig::load(cli.config.as_deref())?;
            print!("{}", config.to_toml()?);
            Ok(())
        }
        Commands::Version => {
            println!("quotebook {}", quotebook::VERSION);
            Ok(())
        }
    }
}

/// Setup logging: console (pretty or JSON) plus optional rolling files
fn setup_logging(cli: &Cli) -> anyhow::Result<()> {
    let console: Box<dyn Layer<Registry> + Send + Sync> = match cli.log_format {
        LogFormat::Pretty => fmt::layer()
            .with_writer(std::io::stdout)
            .with_ansi(!cli.no_color)
            .pretty()
            .boxed(),
        LogFormat::Json => fmt::layer().with_writer(std::io::stdout).json().boxed(),
    };

    let file = match &cli.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, "quotebook.log");
            Some(fmt::layer().with_writer(appender).with_ansi(false))
        }
        None => None,
    };

    let log_level = cli
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .init();

    Ok(())
}

/// Serve command - start the Quote Book server
async fn serve_command(cli: &Cli, args: &ServeArgs) -> anyhow::Result<()> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(bind) = &args.bind {
        config.server.address = bind.clone();
    }
    if let Some(threshold) = args.gc_threshold {
        config.database.gc_threshold = threshold;
    }
    config.validate()?;

    info!(version = %quotebook::VERSION, "Quote Book starting");

    let storage = Arc::new(storage::open(&config.database)?);
    info!(
        backend = %config.database.kind,
        gc_threshold = config.database.gc_threshold,
        gc_interval_ms = config.database.gc_interval_ms,
        "Storage initialized"
    );

    start_server(config.server, storage).await
}
