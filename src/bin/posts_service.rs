// Microblog - Posts Service
// GraphQL CRUD for posts plus real-time postAdded/postDeleted subscriptions
// Run with: cargo run --bin posts-service

use dotenv::dotenv;
use microblog::PostsServerBuilder;
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

    info!("🚀 Starting Microblog Posts Service...");

    let port = env::var("POSTS_PORT")
        .unwrap_or_else(|_| "4002".to_string())
        .parse::<u16>()
        .unwrap_or(4002);
    let cors_enabled = env::var("CORS_ENABLED")
        .map(|v| v != "false")
        .unwrap_or(true);

    info!("Port: {}", port);
    info!("CORS: {}", if cors_enabled { "enabled" } else { "disabled" });

    PostsServerBuilder::new()
        .with_port(port)
        .with_cors(cors_enabled)
        .build_and_run()
        .await?;

    Ok(())
}
