use dotenv::dotenv;
use ridebook_core::api::{create_router, AppState};
use ridebook_core::auth::TokenKeys;
use ridebook_core::config::{init_tracing, Config};
use ridebook_core::db;
use ridebook_core::distance::GeodesicDistance;
use ridebook_core::store::PgStore;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    init_tracing(false);

    info!("Starting Ridebook Core Server...");

    let config = Config::from_env()?;

    let pool = db::create_pool(&config.database).await?;
    db::migrate(&pool).await?;

    let state = AppState::from_store(
        Arc::new(PgStore::new(pool)),
        TokenKeys::new(&config.auth.jwt_secret, config.auth.jwt_maxage_minutes),
        Arc::new(GeodesicDistance::new(config.default_distance_km)),
    );

    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;

    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
