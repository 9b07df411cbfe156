use clap::Parser;
use csms_api::{AuthGate, create_app};
use csms_core::{NetworkConfig, SessionStore};
use std::path::PathBuf;

/// Command line arguments for the csms-api server
#[derive(Parser, Debug)]
#[command(name = "csms-api")]
#[command(about = "Charging Station Management Service")]
struct Args {
    /// Path to the network configuration JSON file
    #[arg(short, long)]
    config: PathBuf,

    /// Port to bind the server to
    #[arg(short, long, default_value = "3000")]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::fmt().pretty().init();

    // Load network configuration from JSON file
    let config_content = tokio::fs::read_to_string(&args.config).await.map_err(|e| {
        format!(
            "Failed to read config file '{}': {}",
            args.config.display(),
            e
        )
    })?;

    let network_config: NetworkConfig = serde_json::from_str(&config_content).map_err(|e| {
        format!(
            "Failed to parse config file '{}': {}",
            args.config.display(),
            e
        )
    })?;

    tracing::info!(
        "Loaded network config from {}: {} ({} stations, {} users)",
        args.config.display(),
        network_config.network_id,
        network_config.stations.len(),
        network_config.auth.users.len()
    );

    // Create application state
    let auth = AuthGate::new(&network_config.auth);
    let store = SessionStore::new(network_config);

    // Build our application with routes
    let app = create_app(store, auth);

    // Run our app with hyper
    let bind_addr = format!("0.0.0.0:{}", args.port);
    tracing::info!("Starting server on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", bind_addr, e))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| format!("Server error: {}", e))?;

    Ok(())
}
