//! `installer-stats` - CLI and HTTP service for installer telemetry
//!
//! This binary runs the collection service and offers operator commands for
//! inspecting stored reports and configuration.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use installer_stats::cli::{Cli, Command, ConfigCommand, ListCommand, ServeCommand};
use installer_stats::distribution::FileStatus;
use installer_stats::logging::summarize;
use installer_stats::{init_logging, server, Architecture, Config, Distributor, ReportStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // `config` subcommands load the file themselves so a broken file can be inspected.
    match cli.command {
        Command::Serve(serve_cmd) => handle_serve(Config::load_from(cli.config)?, serve_cmd).await,
        Command::List(list_cmd) => handle_list(&Config::load_from(cli.config)?, &list_cmd),
        Command::Status(status_cmd) => {
            handle_status(&Config::load_from(cli.config)?, status_cmd.json).await
        }
        Command::Config(config_cmd) => handle_config(cli.config, config_cmd),
    }
}

async fn handle_serve(mut config: Config, cmd: ServeCommand) -> anyhow::Result<()> {
    if let Some(bind) = cmd.bind {
        config.server.bind = bind;
    }
    if let Some(dir) = cmd.installers {
        config.distribution.base_dir = Some(dir);
    }
    config.validate()?;

    server::serve(&config).await?;
    Ok(())
}

fn handle_list(config: &Config, cmd: &ListCommand) -> anyhow::Result<()> {
    let path = config.database_path();
    let store = ReportStore::open(&path)
        .with_context(|| format!("cannot open report store at {}", path.display()))?;
    let reports = store.list_all()?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    println!("Total reports: {}", reports.len());
    if reports.is_empty() {
        println!("The report store is empty.");
    }
    for report in &reports {
        println!("{}", summarize(report));
    }
    Ok(())
}

async fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let path = config.database_path();
    let store = ReportStore::open(&path)
        .with_context(|| format!("cannot open report store at {}", path.display()))?;
    let stats = store.stats()?;
    let availability = Distributor::new(config.distribution_dir())
        .list_available()
        .await;

    if json {
        let status = serde_json::json!({
            "database_path": path,
            "total_reports": stats.total_reports,
            "oldest_received": stats.oldest_received,
            "newest_received": stats.newest_received,
            "db_size_bytes": stats.db_size_bytes,
            "installers": availability,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let format_time = |t: Option<chrono::DateTime<chrono::Utc>>| {
        t.map_or_else(|| "-".to_string(), |t| t.to_rfc3339())
    };

    println!("installer-stats status");
    println!("----------------------");
    println!("Database:      {}", path.display());
    println!("Reports:       {}", stats.total_reports);
    println!("Oldest:        {}", format_time(stats.oldest_received));
    println!("Newest:        {}", format_time(stats.newest_received));
    println!("Size (bytes):  {}", stats.db_size_bytes);
    println!();
    println!("[Installers]");
    for arch in Architecture::ALL {
        let (status, searched) = match arch {
            Architecture::X32 => (availability.files.x32, &availability.paths.x32),
            Architecture::X64 => (availability.files.x64, &availability.paths.x64),
        };
        let label = match status {
            FileStatus::Available => "available",
            FileStatus::Unavailable => "unavailable",
        };
        println!("  {:<8} {:<12} {}", arch.to_string(), label, searched.display());
    }
    Ok(())
}

fn handle_config(config_path: Option<PathBuf>, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = Config::load_from(config_path)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Server]");
                println!("  Bind:               {}", config.server.bind);
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Distribution]");
                println!(
                    "  Installer dir:      {}",
                    config.distribution_dir().display()
                );
            }
        }
        ConfigCommand::Path => {
            let path = config_path.unwrap_or_else(Config::default_config_path);
            println!("{}", path.display());
        }
        ConfigCommand::Validate { file } => {
            let path = file
                .or(config_path)
                .unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            Config::check_file(&path)
                .with_context(|| format!("configuration {} is invalid", path.display()))?;
            println!("Configuration is valid.");
        }
    }
    Ok(())
}
