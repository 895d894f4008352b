// Microblog - Users Service
// GraphQL CRUD for users (no subscriptions)
// Run with: cargo run --bin users-service

use dotenv::dotenv;
use microblog::UsersServerBuilder;
use std::env;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file; missing file is fine
    if let Err(e) = dotenv() {
        eprintln!("Warning: Could not load .env file: {}", e);
    }

    // Initialize structured logging (RUST_LOG controls verbosity)
    tracing_subscriber::fmt::init();

    info!("🚀 Starting Microblog Users Service...");

    let port = env::var("USERS_PORT")
        .unwrap_or_else(|_| "4001".to_string())
        .parse::<u16>()
        .unwrap_or(4001);
    let cors_enabled = env::var("CORS_ENABLED")
        .map(|v| v != "false")
        .unwrap_or(true);

    info!("Port: {}", port);
    info!("CORS: {}", if cors_enabled { "enabled" } else { "disabled" });

    UsersServerBuilder::new()
        .with_port(port)
        .with_cors(cors_enabled)
        .build_and_run()
        .await?;

    Ok(())
}
