//! Run the HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use shelf_api::{router, AppState};
use shelf_cache::{MemoryStore, Store};
use shelf_core::{SharedClock, SystemClock};
use shelf_observability::init_tracing;
use tracing::{debug, info};

use super::ServeArgs;
use crate::context::Context;

pub async fn run(args: ServeArgs, ctx: &Context) -> Result<()> {
    let config = &ctx.config;
    config.validate().context("Invalid configuration")?;
    init_tracing(config.logging.format, &config.logging.filter)?;

    if let Some(path) = &ctx.config_path {
        info!(path = %path.display(), "configuration loaded");
    }
    if !config.admin.enabled() {
        ctx.output.warn("admin.token not set: admin routes will reject every request");
    }

    let clock: SharedClock = SystemClock::shared();
    let kv = Arc::new(MemoryStore::with_clock(clock.clone()).named("kv"));
    let state = AppState::from_config(config, kv.clone(), clock).context("Failed to wire services")?;

    if config.cache.sweep_interval_secs > 0 {
        let mut stores = vec![kv];
        stores.extend(state.memory_stores().iter().cloned());
        spawn_sweeper(stores, Duration::from_secs(config.cache.sweep_interval_secs));
    }
    let app = router(state, &config.server);

    let bind = args.bind.as_deref().unwrap_or(&config.server.bind);
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    info!(addr = %listener.local_addr()?, "shelf listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("shelf stopped");
    Ok(())
}

fn spawn_sweeper(stores: Vec<Arc<MemoryStore>>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            for store in &stores {
                let removed = store.sweep();
                if removed > 0 {
                    debug!(store = store.name(), removed, "expired cache entries swept");
                }
            }
        }
    });
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}
