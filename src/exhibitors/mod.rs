mod workflow;

use axum::{debug_handler, extract::State, http::StatusCode, routing::{get, put}, Router};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    auth::Actor,
    events::WithEvent,
    extract::{Json, Path},
    AppResult, AppState, Message,
};

pub use workflow::{
    apply, by_event_with_status, by_user, find, list, remove, update_details, update_status, Exhibitor,
    ExhibitorApplication, ExhibitorDetails, ExhibitorStatusUpdate, PENDING_BOOTH,
};

/// Mounted under `/events`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/exhibitors", get(list_exhibitors).post(apply_exhibitor))
        .route(
            "/{id}/exhibitors/{eid}",
            put(update_exhibitor_status)
                .patch(update_exhibitor_details)
                .delete(remove_exhibitor),
        )
}

#[debug_handler(state = AppState)]
async fn list_exhibitors(
    State(db_pool): State<SqlitePool>,
    actor: Option<Actor>,
    Path(event_id): Path<Uuid>,
) -> AppResult<Json<Vec<Exhibitor>>> {
    Ok(Json(list(&db_pool, actor.as_ref(), event_id).await?))
}

#[debug_handler(state = AppState)]
async fn apply_exhibitor(
    State(db_pool): State<SqlitePool>,
    actor: Actor,
    Path(event_id): Path<Uuid>,
    Json(application): Json<ExhibitorApplication>,
) -> AppResult<(StatusCode, Json<Exhibitor>)> {
    let exhibitor = apply(&db_pool, &actor, event_id, application).await?;
    Ok((StatusCode::CREATED, Json(exhibitor)))
}

#[debug_handler(state = AppState)]
async fn update_exhibitor_status(
    State(db_pool): State<SqlitePool>,
    actor: Actor,
    Path((event_id, exhibitor_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<ExhibitorStatusUpdate>,
) -> AppResult<Json<Exhibitor>> {
    Ok(Json(update_status(&db_pool, &actor, event_id, exhibitor_id, request).await?))
}

#[debug_handler(state = AppState)]
async fn update_exhibitor_details(
    State(db_pool): State<SqlitePool>,
    actor: Actor,
    Path((event_id, exhibitor_id)): Path<(Uuid, Uuid)>,
    Json(details): Json<ExhibitorDetails>,
) -> AppResult<Json<Exhibitor>> {
    Ok(Json(update_details(&db_pool, &actor, event_id, exhibitor_id, details).await?))
}

#[debug_handler(state = AppState)]
async fn remove_exhibitor(
    State(db_pool): State<SqlitePool>,
    actor: Actor,
    Path((event_id, exhibitor_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<Message>> {
    remove(&db_pool, &actor, event_id, exhibitor_id).await?;
    Ok(Json(Message::new("Exhibitor removed successfully")))
}

#[debug_handler(state = AppState)]
pub(crate) async fn user_booths(
    State(db_pool): State<SqlitePool>,
    actor: Actor,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Vec<WithEvent<Exhibitor>>>> {
    Ok(Json(by_user(&db_pool, &actor, user_id).await?))
}
