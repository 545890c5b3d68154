mod ledger;

use axum::{body::Bytes, debug_handler, extract::State, http::StatusCode, routing, Router};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    auth::Actor,
    events::WithEvent,
    extract::{Json, Path},
    AppError, AppResult, AppState,
};

pub use ledger::{attendees, by_user, cancel, find, get, register, Attendee, NewRegistration, Registration};

pub fn router() -> Router<AppState> {
    Router::new().route("/{id}", routing::get(get_registration).delete(cancel_registration))
}

#[debug_handler(state = AppState)]
async fn get_registration(
    State(db_pool): State<SqlitePool>,
    actor: Actor,
    Path(registration_id): Path<Uuid>,
) -> AppResult<Json<Registration>> {
    Ok(Json(get(&db_pool, &actor, registration_id).await?))
}

#[debug_handler(state = AppState)]
async fn cancel_registration(
    State(db_pool): State<SqlitePool>,
    actor: Actor,
    Path(registration_id): Path<Uuid>,
) -> AppResult<Json<Registration>> {
    Ok(Json(cancel(&db_pool, &actor, registration_id).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn register_for_event(
    State(db_pool): State<SqlitePool>,
    actor: Actor,
    Path(event_id): Path<Uuid>,
    body: Bytes,
) -> AppResult<(StatusCode, Json<Registration>)> {
    // an empty body means a general ticket
    let request = if body.is_empty() {
        NewRegistration::default()
    } else {
        serde_json::from_slice(&body).map_err(|err| AppError::validation(err.to_string()))?
    };
    let registration = register(&db_pool, &actor, event_id, request).await?;
    Ok((StatusCode::CREATED, Json(registration)))
}

#[debug_handler(state = AppState)]
pub(crate) async fn event_attendees(
    State(db_pool): State<SqlitePool>,
    actor: Actor,
    Path(event_id): Path<Uuid>,
) -> AppResult<Json<Vec<Attendee>>> {
    Ok(Json(attendees(&db_pool, &actor, event_id).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn user_tickets(
    State(db_pool): State<SqlitePool>,
    actor: Actor,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Vec<WithEvent<Registration>>>> {
    Ok(Json(by_user(&db_pool, &actor, user_id).await?))
}
