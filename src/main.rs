use anyhow::{Context, Result};
use axum::http::HeaderValue;
use eventdesk::{app, auth, config::Config, db, AppState};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    init_logger()?;
    bootstrap().await
}

fn init_logger() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let subscriber = tracing_subscriber::fmt::layer()
        .with_file(true)
        .with_line_number(true)
        .with_target(false);

    tracing_subscriber::registry()
        .with(subscriber)
        .with(env_filter)
        .try_init()?;

    Ok(())
}

fn cors(config: &Config) -> Result<CorsLayer> {
    let origin = match &config.cors_allow_origin {
        Some(origin) => AllowOrigin::exact(
            HeaderValue::from_str(origin).with_context(|| format!("invalid CORS_ALLOW_ORIGIN: {origin:?}"))?,
        ),
        None => AllowOrigin::from(Any),
    };

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any))
}

async fn bootstrap() -> Result<()> {
    let config = Config::from_env()?;

    let db_pool = db::connect(&config.database_url, config.max_connections).await?;
    db::migrate(&db_pool).await?;

    let app_state = AppState::new(db_pool.clone(), &config);
    if let Some(admin) = config.admin.clone() {
        auth::bootstrap_admin(&db_pool, app_state.credentials.as_ref(), admin).await?;
    }

    let app = app(app_state).layer(cors(&config)?);

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Listening on {}", config.bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Unexpected error happened in server")
        .inspect_err(|e| {
            tracing::error!(
                error.cause_chain = ?e, error.message = %e, "Unexpected error"
            )
        })
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error.message = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
