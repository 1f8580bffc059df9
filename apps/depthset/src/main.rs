mod commands;
mod obs;

use clap::{Parser, Subcommand};
use depthset_application::config::{load_config, Config};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "depthset")]
#[command(about = "Builds order book data sets from stored market data.", version)]
struct Cli {
    /// Config file path (TOML). If omitted, uses env DEPTHSET_CONFIG.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Prometheus metrics listen addr (e.g. 127.0.0.1:9898). Optional.
    #[arg(long, global = true)]
    metrics_addr: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process every configured symbol on a fixed interval until interrupted.
    Run,
    /// Run a single processing cycle and print its summary as JSON.
    Once,
    /// Apply a SQL migration file.
    Migrate {
        #[arg(long, default_value = "migrations/0001_create_depthset_tables.sql")]
        file: PathBuf,
    },
    /// Write one stored data set, with derived feature columns, to CSV.
    Export {
        #[arg(long)]
        symbol: String,
        /// Data set index; the newest one when omitted.
        #[arg(long)]
        data_set_idx: Option<i32>,
        #[arg(long)]
        out: PathBuf,
    },
    /// Validate the config and print it normalized.
    CheckConfig,
}

fn main() {
    let cli = Cli::parse();

    let config = match resolve_config(cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    };
    if let Err(err) = obs::init_tracing(&config.logging()) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
    if let Err(err) = obs::init_metrics(cli.metrics_addr.as_deref()) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }

    let result = match cli.command {
        Command::Run => commands::run(config),
        Command::Once => commands::once(&config),
        Command::Migrate { file } => commands::migrate(&config, &file),
        Command::Export {
            symbol,
            data_set_idx,
            out,
        } => commands::export(&config, &symbol, data_set_idx, &out),
        Command::CheckConfig => commands::check_config(&config),
    };

    if let Err(err) = result {
        tracing::error!(error = %err, "depthset failed");
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn resolve_config(cli_path: Option<PathBuf>) -> Result<Config, String> {
    let path = cli_path
        .or_else(|| {
            std::env::var("DEPTHSET_CONFIG")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
        })
        .ok_or_else(|| "missing --config and env DEPTHSET_CONFIG is not set".to_string())?;
    load_config(&path)
}
