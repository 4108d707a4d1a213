use proctoring_backend::{
    config::{get_config, init_config},
    database::{
        memory_store::MemoryStore,
        pg_store::PgStore,
        pool::{create_pool, run_migrations},
        store::ProctorStore,
    },
    routes::{self, RouterLimits},
    AppState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    init_config()?;
    let config = get_config();

    let store: Arc<dyn ProctorStore> = match config.database_url.as_deref() {
        Some(url) => {
            let pool = create_pool(url).await?;
            run_migrations(&pool).await?;
            info!("Using Postgres store");
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, attempts are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let app_state = AppState::new(store)?;

    {
        let attempt_svc = app_state.attempt_service.clone();
        let interval = Duration::from_secs(config.sweep_interval_secs.max(1));
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if let Err(e) = attempt_svc.sweep_abandoned().await {
                    tracing::error!(error = ?e, "Abandoned attempt sweep failed");
                }
            }
        });
    }

    let app = routes::router(
        app_state,
        RouterLimits {
            frame_rps: config.frame_rps,
            public_rps: config.public_rps,
            admin_api_key: config.admin_api_key.clone(),
        },
    );

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
