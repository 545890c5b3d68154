use axum::{debug_handler, extract::State, http::StatusCode, routing::get, Router};
use serde::{Deserialize, Serialize};
use sqlx::{error::ErrorKind, types::Json as JsonText, SqlitePool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::Actor,
    db,
    extract::{Json, Path},
    model::{non_blank, Role},
    AppError, AppResult, AppState, Conflict, Message,
};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Venue {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub city: String,
    pub capacity: i64,
    pub amenities: JsonText<Vec<String>>,
    pub created_by: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVenue {
    pub name: String,
    pub address: String,
    pub city: String,
    pub capacity: i64,
    #[serde(default)]
    pub amenities: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VenuePatch {
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub capacity: Option<i64>,
    pub amenities: Option<Vec<String>>,
}

const VENUE_COLUMNS: &str = "id,name,address,city,capacity,amenities,created_by,created_at";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_venues).post(create_venue))
        .route("/{id}", get(get_venue).put(update_venue).delete(delete_venue))
}

fn required(value: String, field: &str) -> AppResult<String> {
    non_blank(Some(value)).ok_or_else(|| AppError::validation(format!("{field} is required")))
}

/// Amenities behave as a set: trimmed, blank-free, first occurrence wins.
fn amenity_set(amenities: Vec<String>) -> Vec<String> {
    let mut set: Vec<String> = Vec::with_capacity(amenities.len());
    for amenity in amenities.into_iter().filter_map(|a| non_blank(Some(a))) {
        if !set.contains(&amenity) {
            set.push(amenity);
        }
    }
    set
}

pub async fn find(db_pool: &SqlitePool, venue_id: Uuid) -> AppResult<Venue> {
    sqlx::query_as(&format!("SELECT {VENUE_COLUMNS} FROM venues WHERE id=?"))
        .bind(venue_id)
        .fetch_optional(db_pool)
        .await?
        .ok_or(AppError::NotFound("venue"))
}

pub async fn list(db_pool: &SqlitePool) -> AppResult<Vec<Venue>> {
    let venues = sqlx::query_as(&format!("SELECT {VENUE_COLUMNS} FROM venues ORDER BY name"))
        .fetch_all(db_pool)
        .await?;
    Ok(venues)
}

pub async fn create(db_pool: &SqlitePool, actor: &Actor, new_venue: NewVenue) -> AppResult<Venue> {
    actor.require_role(&[Role::Organizer, Role::Admin])?;
    if new_venue.capacity <= 0 {
        return Err(AppError::validation("capacity must be greater than zero"));
    }

    let venue = Venue {
        id: Uuid::now_v7(),
        name: required(new_venue.name, "name")?,
        address: required(new_venue.address, "address")?,
        city: required(new_venue.city, "city")?,
        capacity: new_venue.capacity,
        amenities: JsonText(amenity_set(new_venue.amenities)),
        created_by: actor.id,
        created_at: db::now(),
    };

    sqlx::query("INSERT INTO venues (id,name,address,city,capacity,amenities,created_by,created_at) VALUES (?,?,?,?,?,?,?,?)")
        .bind(venue.id)
        .bind(&venue.name)
        .bind(&venue.address)
        .bind(&venue.city)
        .bind(venue.capacity)
        .bind(&venue.amenities)
        .bind(venue.created_by)
        .bind(venue.created_at)
        .execute(db_pool)
        .await?;

    tracing::info!(venue.id = %venue.id, actor.id = %actor.id, "venue created");
    Ok(venue)
}

pub async fn update(
    db_pool: &SqlitePool,
    actor: &Actor,
    venue_id: Uuid,
    patch: VenuePatch,
) -> AppResult<Venue> {
    actor.require_role(&[Role::Organizer, Role::Admin])?;
    let mut venue = find(db_pool, venue_id).await?;

    if let Some(name) = non_blank(patch.name) {
        venue.name = name;
    }
    if let Some(address) = non_blank(patch.address) {
        venue.address = address;
    }
    if let Some(city) = non_blank(patch.city) {
        venue.city = city;
    }
    if let Some(capacity) = patch.capacity {
        if capacity <= 0 {
            return Err(AppError::validation("capacity must be greater than zero"));
        }
        venue.capacity = capacity;
    }
    if let Some(amenities) = patch.amenities {
        venue.amenities = JsonText(amenity_set(amenities));
    }

    sqlx::query("UPDATE venues SET name=?,address=?,city=?,capacity=?,amenities=? WHERE id=?")
        .bind(&venue.name)
        .bind(&venue.address)
        .bind(&venue.city)
        .bind(venue.capacity)
        .bind(&venue.amenities)
        .bind(venue.id)
        .execute(db_pool)
        .await?;

    tracing::info!(venue.id = %venue.id, actor.id = %actor.id, "venue updated");
    Ok(venue)
}

/// Venues still hosting events stay put.
pub async fn delete(db_pool: &SqlitePool, actor: &Actor, venue_id: Uuid) -> AppResult<()> {
    actor.require_role(&[Role::Organizer, Role::Admin])?;

    let result = sqlx::query("DELETE FROM venues WHERE id=?")
        .bind(venue_id)
        .execute(db_pool)
        .await
        .map_err(|err| match db::violation(&err) {
            Some(ErrorKind::ForeignKeyViolation) => Conflict::VenueInUse.into(),
            _ => AppError::from(err),
        })?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("venue"));
    }

    tracing::info!(venue.id = %venue_id, actor.id = %actor.id, "venue deleted");
    Ok(())
}

#[debug_handler(state = AppState)]
async fn list_venues(State(db_pool): State<SqlitePool>) -> AppResult<Json<Vec<Venue>>> {
    Ok(Json(list(&db_pool).await?))
}

#[debug_handler(state = AppState)]
async fn get_venue(
    State(db_pool): State<SqlitePool>,
    Path(venue_id): Path<Uuid>,
) -> AppResult<Json<Venue>> {
    Ok(Json(find(&db_pool, venue_id).await?))
}

#[debug_handler(state = AppState)]
async fn create_venue(
    State(db_pool): State<SqlitePool>,
    actor: Actor,
    Json(new_venue): Json<NewVenue>,
) -> AppResult<(StatusCode, Json<Venue>)> {
    let venue = create(&db_pool, &actor, new_venue).await?;
    Ok((StatusCode::CREATED, Json(venue)))
}

#[debug_handler(state = AppState)]
async fn update_venue(
    State(db_pool): State<SqlitePool>,
    actor: Actor,
    Path(venue_id): Path<Uuid>,
    Json(patch): Json<VenuePatch>,
) -> AppResult<Json<Venue>> {
    Ok(Json(update(&db_pool, &actor, venue_id, patch).await?))
}

#[debug_handler(state = AppState)]
async fn delete_venue(
    State(db_pool): State<SqlitePool>,
    actor: Actor,
    Path(venue_id): Path<Uuid>,
) -> AppResult<Json<Message>> {
    delete(&db_pool, &actor, venue_id).await?;
    Ok(Json(Message::new("Venue deleted successfully")))
}
