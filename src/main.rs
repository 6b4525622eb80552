//! Weather Station - Ambient Weather collection service binary
//!
//! Runs the collection loop and the query / streaming API in one process.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn, Level};
use tracing_subscriber::{filter::LevelFilter, EnvFilter, FmtSubscriber};
use weather_station::{
    start_web_server, station::convert, web::AppState, AmbientClient, Collector, FetchOutcome,
    ReadingBroadcaster, Settings, SqliteStore, WeatherSource, WebConfig, DEFAULT_WEB_PORT,
};

#[derive(Parser)]
#[command(name = "weather_station")]
#[command(about = "Weather Station - Ambient Weather collector and live API")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = "Collects, aggregates and streams Ambient Weather station readings")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Web server bind address
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Web server port
    #[arg(short, long, default_value_t = DEFAULT_WEB_PORT)]
    port: u16,

    /// SQLite database file (overrides DATABASE_PATH)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Seconds between collections (overrides COLLECTION_INTERVAL_SECONDS)
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    interval: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect readings and serve the API (default)
    Serve(ServeArgs),

    /// Fetch and print one converted reading without storing it
    Fetch,
}

#[derive(Args, Default)]
struct ServeArgs {
    /// Disable CORS headers
    #[arg(long)]
    no_cors: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    let settings = load_settings(&cli)?;

    match &cli.command {
        Some(Commands::Serve(args)) => serve_command(&cli, args, settings).await?,
        Some(Commands::Fetch) => fetch_command(settings).await?,
        None => serve_command(&cli, &ServeArgs::default(), settings).await?,
    }

    Ok(())
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    let filter = EnvFilter::from_default_env().add_directive(LevelFilter::from_level(level).into());

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

/// Environment settings with CLI overrides applied.
fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let mut settings = Settings::from_env().context("Invalid environment configuration")?;

    if let Some(database) = &cli.database {
        settings.database_path = database.clone();
    }
    if let Some(interval) = cli.interval {
        settings.collection_interval_secs = interval;
    }

    Ok(settings)
}

fn print_banner() {
    println!("Weather Station - Ambient Weather collector");
    println!("   Version: {}", env!("CARGO_PKG_VERSION"));
    println!();
}

async fn serve_command(cli: &Cli, args: &ServeArgs, settings: Settings) -> anyhow::Result<()> {
    print_banner();

    let store = Arc::new(SqliteStore::open(&settings.database_path).with_context(|| {
        format!(
            "Failed to open database at {}",
            settings.database_path.display()
        )
    })?);
    info!("Database opened at {}", settings.database_path.display());

    let broadcaster = Arc::new(ReadingBroadcaster::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(());

    let collector_task = match (settings.collector_config(), settings.credentials()) {
        (Some(config), Some(credentials)) => {
            let source = Arc::new(AmbientClient::new(&settings.api_base, credentials)?);
            let collector = Collector::new(config, source, store.clone(), broadcaster.clone());
            Some(tokio::spawn(collector.run(shutdown_rx.clone())))
        }
        _ => {
            warn!("Weather API credentials not configured; collection loop not started");
            None
        }
    };

    let web_config = WebConfig::new(&cli.host, cli.port).with_cors(!args.no_cors);

    info!("Web server configuration:");
    info!("  - Bind address: {}", web_config.bind_address());
    info!("  - CORS enabled: {}", web_config.enable_cors);
    info!("  - Collection interval: {}s", settings.collection_interval_secs);
    info!("  - Retention: {} days", settings.retention_days);

    let state = AppState {
        store,
        broadcaster,
        mac_address: settings.mac_address.clone(),
        shutdown: shutdown_rx.clone(),
    };

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
        }
        let _ = shutdown_tx.send(());
    });

    if let Err(e) = start_web_server(web_config, state, shutdown_rx).await {
        if let Some(task) = collector_task {
            task.abort();
        }
        return Err(e.into());
    }

    if let Some(task) = collector_task {
        task.await.context("Collector task failed")?;
    }
    info!("Weather station stopped");
    Ok(())
}

async fn fetch_command(settings: Settings) -> anyhow::Result<()> {
    let credentials = settings.credentials().context(
        "AWN_API_KEY, AWN_APPLICATION_KEY and AWN_MAC_ADDRESS must be set to fetch a reading",
    )?;
    let client = AmbientClient::new(&settings.api_base, credentials)?;

    match client.fetch_latest().await? {
        FetchOutcome::Reading(raw) => {
            let converted = convert::convert(&raw);
            println!("{}", serde_json::to_string_pretty(&converted)?);
        }
        FetchOutcome::NoData => println!("No data returned from weather API"),
        FetchOutcome::RateLimited => anyhow::bail!("Weather API rate limited"),
        FetchOutcome::UpstreamError { status, body } => {
            anyhow::bail!("Weather API HTTP error {}: {}", status, body)
        }
        FetchOutcome::TransportError(e) => anyhow::bail!("Weather API request error: {}", e),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from([
            "weather_station",
            "--port",
            "9090",
            "--database",
            "/tmp/w.db",
            "--interval",
            "30",
        ])
        .unwrap();
        assert_eq!(cli.port, 9090);
        assert_eq!(cli.database, Some(PathBuf::from("/tmp/w.db")));
        assert_eq!(cli.interval, Some(30));
    }

    #[test]
    fn test_default_values() {
        let cli = Cli::try_parse_from(["weather_station"]).unwrap();
        assert_eq!(cli.port, DEFAULT_WEB_PORT);
        assert_eq!(cli.host, "0.0.0.0");
        assert!(cli.interval.is_none());
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(Cli::try_parse_from(["weather_station", "--interval", "0"]).is_err());
    }

    #[test]
    fn test_subcommands() {
        let cli = Cli::try_parse_from(["weather_station", "serve", "--no-cors"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Serve(ServeArgs { no_cors: true }))));

        let cli = Cli::try_parse_from(["weather_station", "fetch"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Fetch)));
    }
}
