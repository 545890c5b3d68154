//! Admin dashboards. Everything is computed in SQL on request.

use axum::{debug_handler, extract::State, routing::get, Router};
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{auth::Actor, extract::Json, model::Role, AppResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/events", get(event_stats_handler))
        .route("/registrations", get(registration_stats_handler))
        .route("/revenue", get(revenue_stats_handler))
}

#[derive(Debug, Default, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EventStats {
    pub total_events: i64,
    pub draft_events: i64,
    pub published_events: i64,
    pub cancelled_events: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationStats {
    pub event_id: Uuid,
    pub event_title: String,
    pub registration_count: i64,
    pub active_count: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RevenueStats {
    pub total_revenue: f64,
}

pub async fn event_stats(db_pool: &SqlitePool, actor: &Actor) -> AppResult<EventStats> {
    actor.require_role(&[Role::Admin])?;
    let stats = sqlx::query_as(
        "SELECT COUNT(*) AS total_events,
                COALESCE(SUM(status = 'draft'), 0) AS draft_events,
                COALESCE(SUM(status = 'published'), 0) AS published_events,
                COALESCE(SUM(status = 'cancelled'), 0) AS cancelled_events
         FROM events",
    )
    .fetch_one(db_pool)
    .await?;
    Ok(stats)
}

/// Events without any registration are left out.
pub async fn registration_stats(db_pool: &SqlitePool, actor: &Actor) -> AppResult<Vec<RegistrationStats>> {
    actor.require_role(&[Role::Admin])?;
    let stats = sqlx::query_as(
        "SELECT e.id AS event_id,
                e.title AS event_title,
                COUNT(r.id) AS registration_count,
                COALESCE(SUM(r.status = 'active'), 0) AS active_count
         FROM registrations r JOIN events e ON e.id = r.event_id
         GROUP BY e.id, e.title
         ORDER BY registration_count DESC, e.title",
    )
    .fetch_all(db_pool)
    .await?;
    Ok(stats)
}

pub async fn revenue_stats(db_pool: &SqlitePool, actor: &Actor) -> AppResult<RevenueStats> {
    actor.require_role(&[Role::Admin])?;
    let stats = sqlx::query_as(
        "SELECT CAST(COALESCE(SUM(amount_paid), 0) AS REAL) AS total_revenue
         FROM registrations WHERE status = 'active'",
    )
    .fetch_one(db_pool)
    .await?;
    Ok(stats)
}

#[debug_handler(state = AppState)]
async fn event_stats_handler(State(db_pool): State<SqlitePool>, actor: Actor) -> AppResult<Json<EventStats>> {
    Ok(Json(event_stats(&db_pool, &actor).await?))
}

#[debug_handler(state = AppState)]
async fn registration_stats_handler(
    State(db_pool): State<SqlitePool>,
    actor: Actor,
) -> AppResult<Json<Vec<RegistrationStats>>> {
    Ok(Json(registration_stats(&db_pool, &actor).await?))
}

#[debug_handler(state = AppState)]
async fn revenue_stats_handler(State(db_pool): State<SqlitePool>, actor: Actor) -> AppResult<Json<RevenueStats>> {
    Ok(Json(revenue_stats(&db_pool, &actor).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        events::{self, EventPatch},
        model::EventStatus,
        registrations::{self, NewRegistration},
        testutil, AppError,
    };

    #[tokio::test]
    async fn reports_are_admin_only() {
        let db_pool = testutil::pool().await;
        let organizer = testutil::user(&db_pool, Role::Organizer).await;
        assert!(matches!(event_stats(&db_pool, &organizer).await, Err(AppError::Forbidden)));
        assert!(matches!(revenue_stats(&db_pool, &organizer).await, Err(AppError::Forbidden)));
    }

    #[tokio::test]
    async fn empty_database_reports_zeroes() {
        let db_pool = testutil::pool().await;
        let admin = testutil::user(&db_pool, Role::Admin).await;

        let events = event_stats(&db_pool, &admin).await.unwrap();
        assert_eq!(events.total_events, 0);
        assert_eq!(revenue_stats(&db_pool, &admin).await.unwrap().total_revenue, 0.0);
        assert!(registration_stats(&db_pool, &admin).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn revenue_counts_only_active_tickets() {
        let db_pool = testutil::pool().await;
        let admin = testutil::user(&db_pool, Role::Admin).await;
        let organizer = testutil::user(&db_pool, Role::Organizer).await;
        let event = testutil::event(&db_pool, &organizer, 10, 25.0).await;
        testutil::event(&db_pool, &organizer, 10, 0.0).await;
        events::update(
            &db_pool,
            &organizer,
            event.id,
            EventPatch { status: Some(EventStatus::Published), ..EventPatch::default() },
        )
        .await
        .unwrap();

        let a = testutil::user(&db_pool, Role::Attendee).await;
        let b = testutil::user(&db_pool, Role::Attendee).await;
        let ticket = registrations::register(&db_pool, &a, event.id, NewRegistration::default())
            .await
            .unwrap();
        registrations::register(&db_pool, &b, event.id, NewRegistration::default())
            .await
            .unwrap();
        registrations::cancel(&db_pool, &a, ticket.id).await.unwrap();

        let events = event_stats(&db_pool, &admin).await.unwrap();
        assert_eq!((events.total_events, events.published_events, events.draft_events), (2, 1, 1));

        let per_event = registration_stats(&db_pool, &admin).await.unwrap();
        assert_eq!(per_event.len(), 1);
        assert_eq!(per_event[0].event_id, event.id);
        assert_eq!((per_event[0].registration_count, per_event[0].active_count), (2, 1));

        assert_eq!(revenue_stats(&db_pool, &admin).await.unwrap().total_revenue, 25.0);
    }
}
