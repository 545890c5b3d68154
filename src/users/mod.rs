mod store;

use axum::{debug_handler, extract::State, routing, Router};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    auth::Actor,
    exhibitors, registrations, sponsors,
    extract::{Json, Path},
    AppResult, AppState, Message,
};

pub use store::{create, delete, find, find_by_email, get, list, update, NewUser, User, UserBrief, UserPatch};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", routing::get(list_users))
        .route("/{id}", routing::get(get_user).put(update_user).delete(delete_user))
        .route("/{id}/tickets", routing::get(registrations::user_tickets))
        .route("/{id}/sponsorships", routing::get(sponsors::user_sponsorships))
        .route("/{id}/exhibitor-booths", routing::get(exhibitors::user_booths))
}

#[debug_handler(state = AppState)]
async fn list_users(
    State(db_pool): State<SqlitePool>,
    actor: Actor,
) -> AppResult<Json<Vec<User>>> {
    Ok(Json(list(&db_pool, &actor).await?))
}

#[debug_handler(state = AppState)]
async fn get_user(
    State(db_pool): State<SqlitePool>,
    actor: Actor,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<User>> {
    Ok(Json(get(&db_pool, &actor, user_id).await?))
}

#[debug_handler(state = AppState)]
async fn update_user(
    State(db_pool): State<SqlitePool>,
    actor: Actor,
    Path(user_id): Path<Uuid>,
    Json(patch): Json<UserPatch>,
) -> AppResult<Json<User>> {
    Ok(Json(update(&db_pool, &actor, user_id, patch).await?))
}

#[debug_handler(state = AppState)]
async fn delete_user(
    State(db_pool): State<SqlitePool>,
    actor: Actor,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Message>> {
    delete(&db_pool, &actor, user_id).await?;
    Ok(Json(Message::new("User deleted successfully")))
}
