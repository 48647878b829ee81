//! 主应用程序入口
//!
//! 加载配置、选择存储后端并启动 Axum Web API 服务。

use std::sync::Arc;

use anyhow::Context;
use application::{Clock, RealtimeSettings, SystemClock};
use config::{AppConfig, SeedUser};
use domain::{UserId, UserIdentity, UserRole};
use infrastructure::{InMemoryUserDirectory, InfrastructureConfig, Storage};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    tracing::info!(config = %config.sanitize(), "configuration loaded");

    let storage = build_storage(&config).await?;

    let settings = RealtimeSettings {
        typing_timeout: config.realtime.typing_timeout(),
        read_throttle_window: config.realtime.read_throttle(),
        notification_preview_chars: config.realtime.notification_preview_chars,
    };
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let state = AppState::new(storage, config.jwt.clone(), settings, clock);

    let app = router(state);
    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

    tracing::info!("realtime server listening on http://{address}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn build_storage(config: &AppConfig) -> anyhow::Result<Storage> {
    match config.database.url.as_deref().filter(|url| !url.trim().is_empty()) {
        Some(url) => {
            let storage = Storage::connect(&InfrastructureConfig {
                database_url: url.to_string(),
                max_connections: config.database.max_connections,
                run_migrations: config.database.run_migrations,
            })
            .await
            .context("failed to connect to database")?;
            tracing::info!("using postgres storage");
            Ok(storage)
        }
        None => {
            let users = InMemoryUserDirectory::new();
            for seed in &config.seed_users {
                users.insert(seed_identity(seed)?).await;
            }
            tracing::warn!(
                seeded_users = config.seed_users.len(),
                "no database configured, using in-memory storage"
            );
            Ok(Storage::in_memory(users))
        }
    }
}

fn seed_identity(seed: &SeedUser) -> anyhow::Result<UserIdentity> {
    let role = seed
        .role
        .parse::<UserRole>()
        .with_context(|| format!("invalid role for seed user {}", seed.id))?;
    Ok(UserIdentity::new(UserId::new(seed.id), seed.name.clone(), role))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
