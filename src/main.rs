//! rental-fetch CLI
//!
//! Thin front-end over the fetch layer: loads config, builds an `ApiClient`,
//! runs one accessor and prints the result as JSON.
//!
//! ```text
//! rental-fetch [--config PATH] [--token TOKEN] <command>
//!
//!     vehicles [--include-removed] [--include-private]
//!     customers | companies | rentals | bulk | ownership | protocols
//!     get <PATH>
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;

use rental_fetch::api::{ApiClient, VehicleFilter};
use rental_fetch::config::{load_config, ClientConfig};
use rental_fetch::observability::{logging, metrics};
use rental_fetch::transport::StaticToken;

#[derive(Parser)]
#[command(name = "rental-fetch")]
#[command(about = "Query the rental backend through the resilient fetch layer", long_about = None)]
struct Cli {
    /// TOML config file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bearer token; overrides the token environment variable
    #[arg(short, long)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List vehicles
    Vehicles {
        #[arg(long)]
        include_removed: bool,
        #[arg(long)]
        include_private: bool,
    },
    /// List customers
    Customers,
    /// List companies
    Companies,
    /// List rentals
    Rentals,
    /// Load the bulk dashboard payload
    Bulk,
    /// Vehicle ownership history
    Ownership,
    /// Protocol status for every rental
    Protocols,
    /// GET an arbitrary path relative to the base URL
    Get { path: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => ClientConfig::default(),
    };

    if let Err(e) = logging::init_logging(&config.observability) {
        eprintln!("Error: failed to initialise logging: {}", e);
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let mut builder = ApiClient::builder(config);
    if let Some(token) = cli.token {
        builder = builder.credentials(Arc::new(StaticToken::new(token)));
    }
    let client = match builder.build() {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let printed = match cli.command {
        Commands::Vehicles {
            include_removed,
            include_private,
        } => {
            let filter = VehicleFilter {
                include_removed,
                include_private,
            };
            print_json(client.vehicles(filter).await)
        }
        Commands::Customers => print_json(client.customers().await),
        Commands::Companies => print_json(client.companies().await),
        Commands::Rentals => print_json(client.rentals().await),
        Commands::Bulk => print_json(client.bulk_data().await),
        Commands::Ownership => print_json(client.vehicle_ownership_history().await),
        Commands::Protocols => print_json(client.bulk_protocol_status().await),
        Commands::Get { path } => print_json(client.get_value(&path).await),
    };

    if printed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn print_json<T: Serialize>(result: Result<T, rental_fetch::ClassifiedError>) -> bool {
    match result {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(text) => {
                println!("{}", text);
                true
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                false
            }
        },
        Err(e) => {
            tracing::debug!(kind = %e.kind, status = ?e.status, cause = %e.cause, "Command failed");
            eprintln!("Error: {}", e);
            false
        }
    }
}
