// [[GATEKEEPER]]/apps/gatekeeper/src/main.rs
// Purpose: Entry point. Wires the gate's collaborators and starts the server.
// Architecture: Application Boot
// Dependencies: Axum, Tokio, Redis

use anyhow::Context;
use std::sync::Arc;

use gatekeeper::config::GatekeeperConfig;
use gatekeeper::directory::ResourceDirectory;
use gatekeeper::gate::Gatekeeper;
use gatekeeper::rate_limit::{LocalCounterStore, RateLimiter, SharedCounterStore};
use gatekeeper::redis_store::RedisCounterStore;
use gatekeeper::security::StaticTokenVerifier;
use gatekeeper::server::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gatekeeper=debug".parse()?)
                .add_directive("tower_http=trace".parse()?),
        )
        .init();

    tracing::info!("Initializing Gatekeeper...");

    let config = GatekeeperConfig::from_env().context("invalid configuration")?;

    // Shared counters are optional; without them every instance counts on its own.
    let shared: Option<Arc<dyn SharedCounterStore>> = match config.redis_url.as_deref() {
        Some(url) => RedisCounterStore::connect(url)
            .await
            .map(|store| Arc::new(store) as Arc<dyn SharedCounterStore>),
        None => {
            tracing::warn!("REDIS_URL not set. Rate limiting is per-process.");
            None
        }
    };

    let limiter = RateLimiter::new(
        shared,
        LocalCounterStore::with_cap(config.local_cap),
        config.backend_timeout,
    );
    let verifier = StaticTokenVerifier::load_from_disk(&config.sessions_file)?;
    let directory = ResourceDirectory::load_from_disk(&config.resources_file)?;

    let gate = Gatekeeper::new(limiter, Arc::new(verifier), config.budget.clone());
    let app = server::build_router(AppState {
        gate: Arc::new(gate),
        directory: Arc::new(directory),
    });

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!(
        "Gatekeeper listening on http://{} (read {}/{}ms, write {}/{}ms)",
        addr,
        config.budget.read_max,
        config.budget.window_ms,
        config.budget.write_max,
        config.budget.window_ms
    );

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
