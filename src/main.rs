//! ETH Minter launcher
//!
//! Run modes:
//!   eth-minter run [--port <port>] [--interval <secs>]  - Scanner, driver and REST API
//!   eth-minter tick                                      - One scan and driver cycle
//!   eth-minter state                                     - Print the replayed state
//!   eth-minter address                                   - Print the minter address
//!   eth-minter config                                    - Print the configuration

use eth_minter::api;
use eth_minter::common::{init_from_config, MinterConfig, Network};
use eth_minter::Minter;
use std::env;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    match args[1].as_str() {
        "run" => run_minter(&args[2..]).await,
        "tick" => run_tick().await,
        "state" => print_state().await,
        "address" => print_address().await,
        "config" => {
            if let Some(config) = load_config() {
                config.print_summary();
            }
        }
        "help" | "--help" | "-h" => print_usage(),
        _ => print_usage(),
    }
}

fn print_usage() {
    println!("ETH Minter - Deposit scanner, withdrawal driver and REST API");
    println!();
    println!("Usage:");
    println!("  eth-minter run [--port <port>] [--interval <secs>]  Start minter and API (default port: 8080)");
    println!("  eth-minter tick                                     Run one scan and driver cycle");
    println!("  eth-minter state                                    Print the replayed state as JSON");
    println!("  eth-minter address                                  Print the minter address");
    println!("  eth-minter config                                   Print the configuration");
    println!();
    println!("Environment Variables:");
    println!("  ETH_MINTER_NETWORK            mainnet | sepolia (default: sepolia)");
    println!("  ETH_MINTER_RPC_URL            Foreign-chain JSON-RPC endpoint");
    println!("  ETH_MINTER_SIGNER_URL         Remote threshold signing service");
    println!("  ETH_MINTER_SIGNING_KEY        Hex private key (sepolia only)");
    println!("  ETH_MINTER_HELPER_CONTRACT    Helper contract address");
    println!("  ETH_MINTER_LAST_SCRAPED_BLOCK Block before the first scanned block");
    println!("  ETH_MINTER_DB_PATH            SQLite event log (default: data/eth-minter.db)");
    println!("  ETH_MINTER_API_PORT           REST API port (default: 8080)");
    println!("  ETH_MINTER_LOG_LEVEL          trace | debug | info | warn | error");
}

/// Load and validate configuration, initializing logging
fn load_config() -> Option<MinterConfig> {
    let config = match MinterConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return None;
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        return None;
    }

    if let Err(e) = init_from_config(&config) {
        eprintln!("Warning: {}", e);
    }

    Some(config)
}

async fn create_minter(config: &MinterConfig) -> Option<Minter> {
    match Minter::from_config(config).await {
        Ok(minter) => Some(minter),
        Err(e) => {
            eprintln!("Failed to start minter: {}", e);
            None
        }
    }
}

/// Start the minter loops and the REST API
async fn run_minter(args: &[String]) {
    let mut config = match load_config() {
        Some(config) => config,
        None => return,
    };

    // Parse arguments
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--port" if i + 1 < args.len() => {
                config.api_port = args[i + 1].parse().unwrap_or(config.api_port);
                i += 2;
            }
            "--interval" if i + 1 < args.len() => {
                config.poll_interval_secs = args[i + 1].parse().unwrap_or(config.poll_interval_secs);
                i += 2;
            }
            _ => i += 1,
        }
    }

    if config.network == Network::Mainnet {
        if let Err(e) = config.validate_for_production() {
            eprintln!("Refusing to start: {}", e);
            return;
        }
    }
    config.print_summary();
    println!();

    let minter = match create_minter(&config).await {
        Some(minter) => Arc::new(minter),
        None => return,
    };

    let driver = minter.clone();
    let loops = tokio::spawn(async move { driver.run().await });

    println!("Press Ctrl+C to stop");
    println!();

    tokio::select! {
        result = api::start_server(minter.clone(), config.api_port) => {
            if let Err(e) = result {
                eprintln!("API server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("Shutting down...");
        }
    }

    minter.stop().await;
    // Loops exit after their current sleep
    let _ = tokio::time::timeout(
        Duration::from_secs(config.poll_interval_secs + 5),
        loops,
    )
    .await;
}

async fn run_tick() {
    let Some(config) = load_config() else { return };
    let Some(minter) = create_minter(&config).await else { return };

    let result = minter.tick().await;
    println!("{}", result);
}

async fn print_state() {
    let Some(config) = load_config() else { return };
    let Some(minter) = create_minter(&config).await else { return };

    let snapshot = minter.dump_state_for_debugging().await;
    match serde_json::to_string_pretty(&snapshot) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to encode state: {}", e),
    }
}

async fn print_address() {
    let Some(config) = load_config() else { return };
    let Some(minter) = create_minter(&config).await else { return };

    match minter.minter_address().await {
        Ok(address) => println!("{}", address),
        Err(e) => eprintln!("Failed to derive minter address: {}", e),
    }
}
