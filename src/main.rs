use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::GovernorLayer;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ayika::{build_router, config::Config, db, mail::Mailer, storage, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if it exists
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "ayika=info,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Ayika backend...");

    tracing::info!("Initializing database connection pool...");
    let db_pool = db::init_pool(&config.database_path, config.db_pool_size).await?;
    db::migrate(&db_pool).await?;
    tracing::info!("Database ready at {}", config.database_path);

    let op = storage::build_operator(&config.storage)?;
    let mailer = Mailer::from_settings(&config.mail)?;

    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(config.rate_limit_per_second)
            .burst_size(config.rate_limit_burst)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("invalid rate limit settings"))?,
    );

    let cors = cors_layer(&config)?;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    let state = AppState {
        db: db_pool,
        storage: op,
        config: Arc::new(config),
        mailer,
    };

    let app = build_router(state).layer(cors).layer(GovernorLayer::new(governor_config));

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Credentialed CORS for the configured frontends; never permissive.
/// Production refuses to start without at least one usable origin.
fn cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .flatten()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid ALLOWED_ORIGINS entry: {}", origin);
                None
            }
        })
        .collect();
    if origins.is_empty() {
        if config.production {
            anyhow::bail!("ALLOWED_ORIGINS has no valid origin; refusing to start in production");
        }
        origins = vec![
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
            HeaderValue::from_static("http://localhost:5173"),
            HeaderValue::from_static("http://127.0.0.1:5173"),
        ];
    }

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .allow_credentials(true))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(origins: &[&str], production: bool) -> Config {
        let mut config = Config::local("ayika.db".to_string(), "test-secret");
        config.allowed_origins = Some(origins.iter().map(|o| o.to_string()).collect());
        config.production = production;
        config
    }

    #[test]
    fn production_rejects_unusable_origins() {
        assert!(cors_layer(&config_with(&["bad\norigin"], true)).is_err());
    }

    #[test]
    fn local_falls_back_to_dev_origins() {
        assert!(cors_layer(&config_with(&["bad\norigin"], false)).is_ok());
        assert!(cors_layer(&config_with(&["https://ayika.org"], true)).is_ok());
    }
}
