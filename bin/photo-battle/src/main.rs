//! # Photo Battle Binary
//!
//! The entry point that assembles the application based on compile-time features.

mod settings;

use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use pb_api::handlers::AppState;
use pb_api::middleware::{cors_policy, standard_middleware};
use settings::Settings;
use tracing::info;
use tracing_subscriber::EnvFilter;

// Feature-gated imports: This is the "Compiled-to-Order" magic
#[cfg(feature = "db-sqlite")]
use pb_db_sqlite::SqliteStore;

#[cfg(not(feature = "db-sqlite"))]
compile_error!("photo-battle needs a storage backend; enable the `db-sqlite` feature");

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::load()?;

    // 1. Initialize Database Implementation
    #[cfg(feature = "db-sqlite")]
    let store = Arc::new(
        SqliteStore::connect(&settings.database.url, settings.database.max_connections).await?,
    );

    if settings.database.rebuild_tallies_on_start {
        rebuild_all_tallies(&store).await?;
    }

    // 2. Wrap in AppState (dynamic dispatch over the storage ports)
    let state = web::Data::new(AppState::new(store.clone(), store, settings.battle.clone()));

    // 3. Evict sessions whose voters went away without closing them
    let sweeper = state.clone();
    actix_web::rt::spawn(async move {
        let mut ticker = actix_web::rt::time::interval(sweeper.arena.config().session_sweep_interval());
        loop {
            ticker.tick().await;
            sweeper.evict_idle_sessions().await;
        }
    });

    let bind = (settings.server.host.clone(), settings.server.port);
    info!(
        host = %bind.0,
        port = bind.1,
        pool_limit = settings.battle.pool_limit,
        "photo-battle starting"
    );

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(standard_middleware())
            .wrap(cors_policy())
            .configure(pb_api::configure_routes)
    })
    .bind(bind)?
    .run()
    .await?;

    Ok(())
}

#[cfg(feature = "db-sqlite")]
async fn rebuild_all_tallies(store: &SqliteStore) -> anyhow::Result<()> {
    use pb_core::GroupRepo;

    for group in store.list_groups().await? {
        store.rebuild_tallies(&group.id).await?;
    }
    Ok(())
}
