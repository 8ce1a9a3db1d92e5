use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use highscore_monitor::{HighscoreParser, HttpFetcher, Monitor, MonitorConfig, SqliteStore};

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Poll the leaderboard forever (the default)
    Run,
    /// Run a single cycle right away, ignoring the poll interval
    Once,
    /// Parse a saved leaderboard page and print the players as JSON
    ParseFile {
        /// Path to the HTML file to parse
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Print every recorded snapshot of a player
    History {
        /// Exact player name
        #[arg(short, long)]
        name: String,
    },
}

async fn build_monitor(config: &MonitorConfig) -> Result<Monitor<HttpFetcher, SqliteStore>> {
    let store = SqliteStore::connect(&config.database.url)
        .await
        .with_context(|| format!("Failed to open database {}", config.database.url))?;
    let fetcher = HttpFetcher::new(config).context("Failed to create HTTP client")?;
    Ok(Monitor::new(fetcher, HighscoreParser::default(), store, config))
}

async fn run(config: &MonitorConfig) -> Result<()> {
    let monitor = build_monitor(config).await?;

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel()).context("Failed to install Ctrl-C handler")?;

    info!(
        "Monitoring {} every {} seconds",
        config.source.url, config.schedule.poll_interval_secs
    );
    monitor.run(cancel).await?;
    Ok(())
}

async fn once(config: &MonitorConfig) -> Result<()> {
    let monitor = build_monitor(config).await?;
    if let Some(report) = monitor.poll_once(&CancellationToken::new()).await? {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

fn parse_file(path: &Path) -> Result<()> {
    let html = fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    let players = HighscoreParser::default().parse(&html)?;
    info!("Parsed {} players from {:?}", players.len(), path);
    println!("{}", serde_json::to_string_pretty(&players)?);
    Ok(())
}

async fn history(config: &MonitorConfig, name: &str) -> Result<()> {
    let store = SqliteStore::connect(&config.database.url).await?;
    if store.find_player(name).await?.is_none() {
        anyhow::bail!("No player named {:?} has been recorded", name);
    }

    for row in store.history(name).await? {
        let when = DateTime::<Utc>::from_timestamp(row.timestamp, 0)
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| row.timestamp.to_string());
        println!(
            "{}\tlevel {}\trank {}\texp {}\t{}",
            when,
            row.level,
            row.level_rank,
            row.experience,
            if row.online { "online" } else { "offline" }
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = MonitorConfig::from_env();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&config).await?,
        Commands::Once => once(&config).await?,
        Commands::ParseFile { file } => parse_file(&file)?,
        Commands::History { name } => history(&config, &name).await?,
    }

    Ok(())
}
