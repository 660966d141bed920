use std::net::SocketAddr;
use std::path::PathBuf;

use tracing::info;

use esignage_web::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let addr: SocketAddr = std::env::var("ESIGNAGE_WEB_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
        .parse()?;

    let db_path = std::env::var("ESIGNAGE_DB_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| esignage_common::default_db_path());
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db = esignage_common::Database::open(&db_path)?;
    let cfg = ServerConfig::from_env();

    info!("Starting ESignage server (db: {})", db_path.display());

    esignage_web::server::serve(addr, cfg, db).await
}
