//! Feedlab - backend for a simulated social-media feed study

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feedlab::{config::Args, db::MongoClient, server, store::ParticipantStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("feedlab={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Print startup banner
    info!("======================================");
    info!("  Feedlab - Simulated Feed Study");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!(
        "Mode: {}",
        if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" }
    );
    info!("Engagement strategy: {}", args.engagement_strategy);
    info!("Section delay: {}ms", args.section_delay_ms);
    info!("MongoDB: {}", args.mongodb_uri);
    info!("======================================");

    // Connect to MongoDB; a failed connection degrades to the in-memory
    // store rather than turning participants away mid-study
    let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => {
            info!("MongoDB connected successfully");
            Some(client)
        }
        Err(e) => {
            if args.dev_mode {
                warn!("MongoDB connection failed (dev mode, continuing without): {}", e);
            } else {
                warn!(
                    "MongoDB connection failed, degrading to in-memory store: {}",
                    e
                );
            }
            None
        }
    };

    let store = match &mongo {
        Some(client) => match ParticipantStore::mongo(client).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                warn!(
                    "Participant collection setup failed, degrading to in-memory store: {}",
                    e
                );
                Arc::new(ParticipantStore::memory())
            }
        },
        None => Arc::new(ParticipantStore::memory()),
    };

    let state = Arc::new(server::AppState::new(args, mongo, store));

    // Run the server
    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
