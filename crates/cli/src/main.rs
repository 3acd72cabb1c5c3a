use anyhow::{Context, Result};
use clap::Parser;
use filemart_cli::{execute, CliConfig, Command};
use filemart_storage::SledMarketStore;
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "filemart")]
#[command(about = "FileMart file access marketplace", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory holding the market database
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Configuration file (defaults to <data-dir>/filemart.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

fn init_logging(config: &CliConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.as_deref(), cli.data_dir.as_deref())?;
    init_logging(&config);

    fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("failed to create {}", config.data_dir.display()))?;
    let store = SledMarketStore::open(config.data_dir.join("db"))
        .with_context(|| format!("failed to open store in {}", config.data_dir.display()))?;

    let output = execute(&store, &config, cli.command)?;
    println!("{output}");
    Ok(())
}
