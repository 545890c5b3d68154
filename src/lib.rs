pub mod appresult;
pub mod auth;
pub mod config;
pub mod db;
pub mod events;
pub mod exhibitors;
pub mod extract;
pub mod model;
pub mod registrations;
pub mod reports;
pub mod sponsors;
pub mod users;
pub mod venues;

#[cfg(test)]
mod testutil;

use std::sync::Arc;

use axum::{debug_handler, extract::FromRef, routing::get, Router};
use serde::Serialize;
use sqlx::SqlitePool;
use tower_http::{
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
    LatencyUnit,
};
use tracing::Level;

pub use appresult::{AppError, AppResult, Conflict};

use auth::{Credentials, SqliteCredentials};
use config::{Config, SponsorApproval};
use extract::Json;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub credentials: Arc<dyn Credentials>,
    pub sponsor_approval: SponsorApproval,
}

impl AppState {
    pub fn new(db_pool: SqlitePool, config: &Config) -> Self {
        let credentials = SqliteCredentials::new(db_pool.clone(), config.token_ttl);
        Self {
            db_pool,
            credentials: Arc::new(credentials),
            sponsor_approval: config.sponsor_approval,
        }
    }
}

/// Plain acknowledgement body, `{ "message": ... }`.
#[derive(Debug, Serialize)]
pub struct Message {
    pub message: &'static str,
}

impl Message {
    pub fn new(message: &'static str) -> Self {
        Self { message }
    }
}

pub fn app(app_state: AppState) -> Router {
    let api = Router::new()
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/venues", venues::router())
        .nest("/events", events::router())
        .nest("/registrations", registrations::router())
        .nest("/reports", reports::router());

    Router::new()
        .route("/", get(index))
        .nest("/api", api)
        .with_state(app_state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(LatencyUnit::Millis),
                ),
        )
}

#[debug_handler]
async fn index() -> Json<Message> {
    Json(Message::new("eventdesk is running"))
}
