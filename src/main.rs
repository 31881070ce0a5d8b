// src/main.rs

//! The main entry point for the stratumd server application.

use anyhow::Result;
use std::env;
use std::path::Path;
use stratumd::config::Config;
use stratumd::server;
use tracing::{error, info};
use tracing_subscriber::filter::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    let args: Vec<String> = env::args().collect();

    if args.contains(&"--version".to_string()) {
        println!("stratumd version {VERSION}");
        return Ok(());
    }

    // An explicit --config must exist; the default path is optional.
    let explicit_config = args
        .iter()
        .position(|arg| arg == "--config")
        .map(|i| args.get(i + 1).map(|s| s.as_str()));
    let mut config = match explicit_config {
        Some(Some(path)) => load_config_or_exit(path),
        Some(None) => {
            eprintln!("--config flag requires a value");
            std::process::exit(1);
        }
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => load_config_or_exit(DEFAULT_CONFIG_PATH),
        None => Config::default(),
    };

    // Override port if provided as a command-line argument.
    if let Some(port_index) = args.iter().position(|arg| arg == "--port") {
        match args.get(port_index + 1).map(|s| s.parse::<u16>()) {
            Some(Ok(port)) if port != 0 => config.port = port,
            Some(_) => {
                eprintln!("Invalid port number: {}", args[port_index + 1]);
                std::process::exit(1);
            }
            None => {
                eprintln!("--port flag requires a value");
                std::process::exit(1);
            }
        }
    }

    // RUST_LOG wins over the configured level.
    let log_level = env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .compact()
        .with_ansi(true)
        .init();

    info!("Starting stratumd {} on {}:{}", VERSION, config.host, config.port);
    if let Err(e) = server::run(config).await {
        error!("Server runtime error: {:#}", e);
        return Err(e);
    }
    Ok(())
}

fn load_config_or_exit(path: &str) -> Config {
    match Config::from_file(path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration from \"{path}\": {e:#}");
            std::process::exit(1);
        }
    }
}
