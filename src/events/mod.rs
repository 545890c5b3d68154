mod aggregate;
mod filter;
mod sessions;

use axum::{debug_handler, extract::State, http::StatusCode, routing::{get, post, put}, Router};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    auth::Actor,
    exhibitors,
    extract::{Json, Path, Query},
    registrations, sponsors, AppResult, AppState, Message,
};

pub use aggregate::{
    attach_events, create, delete, find, find_many, get_details, list, update, Event, EventDetails,
    EventListing, EventPatch, NewEvent, WithEvent,
};
pub use filter::EventFilter;
pub use sessions::{NewSession, Session, SessionPatch};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_events).post(create_event))
        .route("/{id}", get(get_event).put(update_event).delete(delete_event))
        .route("/{id}/register", post(registrations::register_for_event))
        .route("/{id}/attendees", get(registrations::event_attendees))
        .route("/{id}/sessions", get(list_sessions).post(add_session))
        .route("/{id}/sessions/{sid}", put(update_session).delete(remove_session))
        .merge(sponsors::router())
        .merge(exhibitors::router())
}

#[debug_handler(state = AppState)]
async fn list_events(
    State(db_pool): State<SqlitePool>,
    Query(filter): Query<EventFilter>,
) -> AppResult<Json<Vec<EventListing>>> {
    Ok(Json(list(&db_pool, &filter).await?))
}

#[debug_handler(state = AppState)]
async fn get_event(
    State(db_pool): State<SqlitePool>,
    Path(event_id): Path<Uuid>,
) -> AppResult<Json<EventDetails>> {
    Ok(Json(get_details(&db_pool, event_id).await?))
}

#[debug_handler(state = AppState)]
async fn create_event(
    State(db_pool): State<SqlitePool>,
    actor: Actor,
    Json(new_event): Json<NewEvent>,
) -> AppResult<(StatusCode, Json<Event>)> {
    let event = create(&db_pool, &actor, new_event).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

#[debug_handler(state = AppState)]
async fn update_event(
    State(db_pool): State<SqlitePool>,
    actor: Actor,
    Path(event_id): Path<Uuid>,
    Json(patch): Json<EventPatch>,
) -> AppResult<Json<Event>> {
    Ok(Json(update(&db_pool, &actor, event_id, patch).await?))
}

#[debug_handler(state = AppState)]
async fn delete_event(
    State(db_pool): State<SqlitePool>,
    actor: Actor,
    Path(event_id): Path<Uuid>,
) -> AppResult<Json<Message>> {
    delete(&db_pool, &actor, event_id).await?;
    Ok(Json(Message::new("Event deleted successfully")))
}

#[debug_handler(state = AppState)]
async fn list_sessions(
    State(db_pool): State<SqlitePool>,
    Path(event_id): Path<Uuid>,
) -> AppResult<Json<Vec<Session>>> {
    Ok(Json(sessions::list(&db_pool, event_id).await?))
}

#[debug_handler(state = AppState)]
async fn add_session(
    State(db_pool): State<SqlitePool>,
    actor: Actor,
    Path(event_id): Path<Uuid>,
    Json(new_session): Json<NewSession>,
) -> AppResult<(StatusCode, Json<Session>)> {
    let session = sessions::add(&db_pool, &actor, event_id, new_session).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

#[debug_handler(state = AppState)]
async fn update_session(
    State(db_pool): State<SqlitePool>,
    actor: Actor,
    Path((event_id, session_id)): Path<(Uuid, Uuid)>,
    Json(patch): Json<SessionPatch>,
) -> AppResult<Json<Session>> {
    Ok(Json(sessions::update(&db_pool, &actor, event_id, session_id, patch).await?))
}

#[debug_handler(state = AppState)]
async fn remove_session(
    State(db_pool): State<SqlitePool>,
    actor: Actor,
    Path((event_id, session_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<Message>> {
    sessions::remove(&db_pool, &actor, event_id, session_id).await?;
    Ok(Json(Message::new("Session deleted successfully")))
}
