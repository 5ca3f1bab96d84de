use std::net::SocketAddr;

use axum::Router;
use configs::AppConfig;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::errors::StartupError;
use crate::routes;
use crate::state::ServerState;
use service::{
    products::ProductStore,
    runtime,
    storage::StoreOptions,
    users::{CredentialHasher, UserStore},
};

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

fn store_options(cfg: &AppConfig) -> StoreOptions {
    StoreOptions {
        strict_load: cfg.storage.strict_load,
        atomic_writes: cfg.storage.atomic_writes,
        pretty_json: cfg.storage.pretty_json,
    }
}

/// Open both stores under `cfg.storage` and wrap them in the shared state.
pub async fn build_state(cfg: &AppConfig) -> Result<ServerState, StartupError> {
    runtime::ensure_env(&cfg.storage.data_dir).await?;

    let options = store_options(cfg);
    let creds = &cfg.credentials;
    let hasher = CredentialHasher::new(creds.memory_kib, creds.iterations, creds.parallelism)?;

    let products = ProductStore::open(cfg.storage.products_path(), options, cfg.storage.max_id_attempts).await?;
    if let Some(fault) = products.load_fault() {
        warn!(%fault, "products store started empty after a load fault");
    }
    let users = UserStore::open(cfg.storage.users_path(), options, cfg.storage.max_id_attempts, hasher).await?;
    if let Some(fault) = users.load_fault() {
        warn!(%fault, "users store started empty after a load fault");
    }

    Ok(ServerState { products, users })
}

pub async fn build_app(cfg: &AppConfig) -> Result<Router, StartupError> {
    let state = build_state(cfg).await?;
    Ok(routes::build_router(state, build_cors()))
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("received Ctrl+C, shutting down");
    }
}

/// Public entry: load config, open the stores and run the HTTP server until Ctrl+C.
pub async fn run(cfg: AppConfig) -> Result<(), StartupError> {
    let app = build_app(&cfg).await?;

    let addr: SocketAddr = cfg
        .server
        .bind_addr()
        .parse()
        .map_err(|e| StartupError::InvalidConfig(format!("bad bind address: {e}")))?;
    info!(%addr, data_dir = %cfg.storage.data_dir, "starting storefront server");
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(anyhow::Error::from)?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(anyhow::Error::from)?;
    Ok(())
}

/// Read config (file, then env fallback); a broken config is a startup error.
pub fn load_config() -> Result<AppConfig, StartupError> {
    AppConfig::load_or_env().map_err(|e| StartupError::InvalidConfig(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn strict_load_refuses_corrupt_file() -> anyhow::Result<()> {
        let dir = std::env::temp_dir().join(format!("server_startup_{}", uuid::Uuid::new_v4()));
        let mut cfg = AppConfig::default();
        cfg.storage.data_dir = dir.to_string_lossy().into_owned();
        cfg.credentials.memory_kib = 64;
        cfg.credentials.iterations = 1;

        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(cfg.storage.products_path(), b"[1, 2").await?;

        // lenient: starts empty
        let state = build_state(&cfg).await?;
        assert!(state.products.find_all().await.is_empty());

        cfg.storage.strict_load = true;
        assert!(matches!(build_state(&cfg).await, Err(StartupError::Store(_))));

        let _ = tokio::fs::remove_dir_all(&dir).await;
        Ok(())
    }
}
