//! HDB gateway - device and directory API for HDB applications

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hdb_gateway::{
    auth::{HdbSettings, JwtValidator, MemorySettings, MongoSettings},
    config::Args,
    db::MongoClient,
    server::{self, AppState},
    store::{DeviceStore, DirectoryStore, MemoryStore, MongoStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    init_tracing(&args);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  HDB Gateway");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {}/{}", args.mongodb_uri, args.mongodb_db);
    info!("UTC offset: {} minutes", args.utc_offset_minutes);
    info!("======================================");

    let jwt = match &args.jwt_secret {
        Some(secret) => Arc::new(JwtValidator::new(secret.clone(), args.jwt_expiry_seconds)?),
        None => {
            warn!("No JWT_SECRET set, using the dev-mode secret");
            Arc::new(JwtValidator::new_dev())
        }
    };

    // Connect to MongoDB (optional in dev mode)
    let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => Some(client),
        Err(e) => {
            if args.dev_mode {
                warn!("MongoDB connection failed (dev mode, using memory stores): {}", e);
                None
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    let state = match mongo {
        Some(mongo) => {
            let settings = MongoSettings::new(&mongo, args.authorization_code.clone()).await?;
            for (code, user) in args.on_behalf_pairs() {
                settings.grant(code, user).await?;
                info!("Granted delegation code for user {}", user);
            }
            let store = Arc::new(MongoStore::new(&mongo).await?);
            AppState::new(
                args.clone(),
                Arc::new(settings) as Arc<dyn HdbSettings>,
                Arc::clone(&store) as Arc<dyn DeviceStore>,
                store as Arc<dyn DirectoryStore>,
                jwt,
                "mongodb",
            )?
        }
        None => {
            let settings = MemorySettings::from_pairs(
                args.authorization_code.clone(),
                args.on_behalf.iter().map(String::as_str),
            );
            info!("Memory settings loaded with {} delegation code(s)", settings.len());
            let store = match &args.seed_file {
                Some(path) => MemoryStore::from_seed_file(path)?,
                None => MemoryStore::new(),
            };
            let store = Arc::new(store);
            AppState::new(
                args.clone(),
                Arc::new(settings) as Arc<dyn HdbSettings>,
                Arc::clone(&store) as Arc<dyn DeviceStore>,
                store as Arc<dyn DirectoryStore>,
                jwt,
                "memory",
            )?
        }
    };

    server::run(Arc::new(state)).await?;

    Ok(())
}

fn init_tracing(args: &Args) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("hdb_gateway={},info", args.log_level).into());

    if args.log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
