use std::net::SocketAddr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shc_attend::{
    config::Config,
    routes,
    services::{auth as auth_service, sync as sync_service},
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    tracing::info!("✅ Configuration loaded successfully");

    let state = AppState::new(&config).await?;
    tracing::info!("✅ AppState initialized");

    let app = routes::app(state.clone())?;

    if config.sync_interval.is_zero() {
        tracing::info!("Background sync disabled");
    } else {
        let sync_state = state.clone();
        let interval = config.sync_interval;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                tracing::info!("🔄 Running scheduled sync...");
                match auth_service::restore_session(&sync_state).await {
                    Ok(Some(cookies)) => {
                        let report = sync_service::sync(&sync_state, Some(&cookies)).await;
                        tracing::info!("✅ Scheduled sync finished: {:?}", report.status);
                    }
                    Ok(None) => {
                        tracing::info!("No usable session, skipping scheduled sync");
                    }
                    Err(e) => {
                        tracing::error!("❌ Scheduled sync failed: {}", e);
                    }
                }
            }
        });
        tracing::info!(
            "✅ Background sync job started (every {}s)",
            config.sync_interval.as_secs()
        );
    }

    tracing::info!("🚀 Server listening on http://{}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
