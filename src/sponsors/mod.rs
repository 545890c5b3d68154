mod workflow;

use axum::{debug_handler, extract::State, http::StatusCode, routing::{get, post, put}, Router};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    auth::Actor,
    config::SponsorApproval,
    events::WithEvent,
    extract::{Json, Path},
    AppResult, AppState, Message,
};

pub use workflow::{
    apply, by_event_with_status, by_user, find, list, remove, update, upload_assets, Sponsor,
    SponsorApplication, SponsorAssets, SponsorUpdate,
};

/// Mounted under `/events`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/sponsors", get(list_sponsors).post(apply_sponsor))
        .route("/{id}/sponsors/{sid}", put(update_sponsor).delete(remove_sponsor))
        .route("/{id}/sponsors/{sid}/assets", post(upload_sponsor_assets))
}

#[debug_handler(state = AppState)]
async fn list_sponsors(
    State(db_pool): State<SqlitePool>,
    actor: Option<Actor>,
    Path(event_id): Path<Uuid>,
) -> AppResult<Json<Vec<Sponsor>>> {
    Ok(Json(list(&db_pool, actor.as_ref(), event_id).await?))
}

#[debug_handler(state = AppState)]
async fn apply_sponsor(
    State(db_pool): State<SqlitePool>,
    State(approval): State<SponsorApproval>,
    actor: Actor,
    Path(event_id): Path<Uuid>,
    Json(application): Json<SponsorApplication>,
) -> AppResult<(StatusCode, Json<Sponsor>)> {
    let sponsor = apply(&db_pool, &actor, approval, event_id, application).await?;
    Ok((StatusCode::CREATED, Json(sponsor)))
}

#[debug_handler(state = AppState)]
async fn update_sponsor(
    State(db_pool): State<SqlitePool>,
    actor: Actor,
    Path((event_id, sponsor_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<SponsorUpdate>,
) -> AppResult<Json<Sponsor>> {
    Ok(Json(update(&db_pool, &actor, event_id, sponsor_id, request).await?))
}

#[debug_handler(state = AppState)]
async fn remove_sponsor(
    State(db_pool): State<SqlitePool>,
    actor: Actor,
    Path((event_id, sponsor_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<Message>> {
    remove(&db_pool, &actor, event_id, sponsor_id).await?;
    Ok(Json(Message::new("Sponsor removed successfully")))
}

#[debug_handler(state = AppState)]
async fn upload_sponsor_assets(
    State(db_pool): State<SqlitePool>,
    actor: Actor,
    Path((event_id, sponsor_id)): Path<(Uuid, Uuid)>,
    Json(assets): Json<SponsorAssets>,
) -> AppResult<Json<Sponsor>> {
    Ok(Json(upload_assets(&db_pool, &actor, event_id, sponsor_id, assets).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn user_sponsorships(
    State(db_pool): State<SqlitePool>,
    actor: Actor,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Vec<WithEvent<Sponsor>>>> {
    Ok(Json(by_user(&db_pool, &actor, user_id).await?))
}
