//! Web server assembly

use crate::config::ServerConfig;
use crate::routes::{self, AppState};
use esignage_common::{Database, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Create the default operator when the operators table is still empty.
fn bootstrap(db: &Database, cfg: &ServerConfig) -> Result<()> {
    if let Some(username) = &cfg.bootstrap_operator {
        if db.count_operators()? == 0 {
            db.create_operator(username)?;
            info!("Created default operator: {}", username);
        }
    }
    Ok(())
}

/// Start the web server
pub async fn serve(addr: SocketAddr, cfg: ServerConfig, db: Database) -> anyhow::Result<()> {
    bootstrap(&db, &cfg)?;

    let state = Arc::new(AppState::new(db, &cfg));
    let app = routes::api_router(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any))
        .layer(TraceLayer::new_for_http());

    info!("ESignage web API starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
