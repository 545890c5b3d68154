use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::{error::ErrorKind, QueryBuilder, Sqlite, SqlitePool};
use time::{OffsetDateTime, UtcOffset};
use uuid::Uuid;

use crate::{
    appresult::OptionalExt,
    auth::Actor,
    db,
    exhibitors::{self, Exhibitor},
    model::{non_blank, stale_status, EventStatus, EventType, ExhibitorStatus, Lifecycle, Role, SponsorStatus},
    sponsors::{self, Sponsor},
    users::UserBrief,
    venues::{self, Venue},
    AppError, AppResult, Conflict,
};

use super::{sessions::{self, Session}, EventFilter};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub organizer_id: Uuid,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(with = "time::serde::rfc3339")]
    pub start_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_date: OffsetDateTime,
    pub venue_id: Uuid,
    pub max_capacity: i64,
    pub ticket_price: f64,
    pub status: EventStatus,
    /// Active registrations, maintained alongside every register/cancel.
    pub seats_taken: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(with = "time::serde::rfc3339")]
    pub start_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_date: OffsetDateTime,
    pub venue_id: Uuid,
    pub max_capacity: i64,
    #[serde(default)]
    pub ticket_price: f64,
}

/// The fields an organizer may change. Ownership and the seat counter are
/// not in here.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    #[serde(rename = "type")]
    pub event_type: Option<EventType>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub start_date: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_date: Option<OffsetDateTime>,
    pub venue_id: Option<Uuid>,
    pub max_capacity: Option<i64>,
    pub ticket_price: Option<f64>,
    pub status: Option<EventStatus>,
}

#[derive(Debug, Serialize)]
pub struct EventListing {
    #[serde(flatten)]
    pub event: Event,
    pub venue: Option<Venue>,
}

/// Read-time projection: the event with its venue and organizer, plus the
/// sponsors and exhibitors currently shown publicly.
#[derive(Debug, Serialize)]
pub struct EventDetails {
    #[serde(flatten)]
    pub event: Event,
    pub venue: Option<Venue>,
    pub organizer: Option<UserBrief>,
    pub sponsors: Vec<Sponsor>,
    pub exhibitors: Vec<Exhibitor>,
    pub sessions: Vec<Session>,
}

/// A per-user record paired with the event it belongs to.
#[derive(Debug, Serialize)]
pub struct WithEvent<T> {
    #[serde(flatten)]
    pub record: T,
    pub event: Option<Event>,
}

pub(crate) const EVENT_COLUMNS: &str = "id,organizer_id,title,description,image,event_type,start_date,end_date,venue_id,max_capacity,ticket_price,status,seats_taken,created_at";

fn validate(event: &Event) -> AppResult<()> {
    if event.title.is_empty() {
        return Err(AppError::validation("title is required"));
    }
    if event.description.is_empty() {
        return Err(AppError::validation("description is required"));
    }
    if event.max_capacity <= 0 {
        return Err(AppError::validation("maxCapacity must be greater than zero"));
    }
    if !event.ticket_price.is_finite() || event.ticket_price < 0.0 {
        return Err(AppError::validation("ticketPrice must be zero or more"));
    }
    if event.end_date < event.start_date {
        return Err(AppError::validation("endDate must not be before startDate"));
    }
    Ok(())
}

async fn ensure_venue(db_pool: &SqlitePool, venue_id: Uuid) -> AppResult<()> {
    match venues::find(db_pool, venue_id).await {
        Ok(_) => Ok(()),
        Err(AppError::NotFound(_)) => Err(AppError::validation(format!("venue {venue_id} does not exist"))),
        Err(err) => Err(err),
    }
}

pub(super) fn utc(at: OffsetDateTime) -> OffsetDateTime {
    at.to_offset(UtcOffset::UTC)
}

pub async fn find(db_pool: &SqlitePool, event_id: Uuid) -> AppResult<Event> {
    sqlx::query_as(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id=?"))
        .bind(event_id)
        .fetch_optional(db_pool)
        .await?
        .ok_or(AppError::NotFound("event"))
}

pub async fn find_many(db_pool: &SqlitePool, event_ids: &[Uuid]) -> AppResult<Vec<Event>> {
    if event_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {EVENT_COLUMNS} FROM events WHERE id IN ("));
    let mut ids = query.separated(",");
    for event_id in event_ids {
        ids.push_bind(*event_id);
    }
    ids.push_unseparated(")");

    let events = query.build_query_as::<Event>().fetch_all(db_pool).await?;
    Ok(events)
}

/// Pairs each record with its event in two queries instead of one per row.
pub async fn attach_events<T>(
    db_pool: &SqlitePool,
    records: Vec<T>,
    event_id: impl Fn(&T) -> Uuid,
) -> AppResult<Vec<WithEvent<T>>> {
    let mut ids: Vec<Uuid> = records.iter().map(&event_id).collect();
    ids.sort_unstable();
    ids.dedup();

    let events: HashMap<Uuid, Event> = find_many(db_pool, &ids)
        .await?
        .into_iter()
        .map(|event| (event.id, event))
        .collect();

    Ok(records
        .into_iter()
        .map(|record| {
            let event = events.get(&event_id(&record)).cloned();
            WithEvent { record, event }
        })
        .collect())
}

pub async fn create(db_pool: &SqlitePool, actor: &Actor, new_event: NewEvent) -> AppResult<Event> {
    actor.require_role(&[Role::Organizer, Role::Admin])?;

    let event = Event {
        id: Uuid::now_v7(),
        organizer_id: actor.id,
        title: new_event.title.trim().to_owned(),
        description: new_event.description.trim().to_owned(),
        image: non_blank(new_event.image),
        event_type: new_event.event_type,
        start_date: utc(new_event.start_date),
        end_date: utc(new_event.end_date),
        venue_id: new_event.venue_id,
        max_capacity: new_event.max_capacity,
        ticket_price: new_event.ticket_price,
        status: EventStatus::Draft,
        seats_taken: 0,
        created_at: db::now(),
    };
    validate(&event)?;
    ensure_venue(db_pool, event.venue_id).await?;

    sqlx::query(
        "INSERT INTO events (id,organizer_id,title,description,image,event_type,start_date,end_date,venue_id,max_capacity,ticket_price,status,seats_taken,created_at)
         VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?,?)",
    )
    .bind(event.id)
    .bind(event.organizer_id)
    .bind(&event.title)
    .bind(&event.description)
    .bind(&event.image)
    .bind(event.event_type)
    .bind(event.start_date)
    .bind(event.end_date)
    .bind(event.venue_id)
    .bind(event.max_capacity)
    .bind(event.ticket_price)
    .bind(event.status)
    .bind(event.seats_taken)
    .bind(event.created_at)
    .execute(db_pool)
    .await?;

    tracing::info!(event.id = %event.id, organizer.id = %actor.id, "event created");
    Ok(event)
}

pub async fn update(
    db_pool: &SqlitePool,
    actor: &Actor,
    event_id: Uuid,
    patch: EventPatch,
) -> AppResult<Event> {
    let current = find(db_pool, event_id).await?;
    actor.require_manager(current.organizer_id)?;

    let mut event = current.clone();
    if let Some(title) = patch.title {
        event.title = title.trim().to_owned();
    }
    if let Some(description) = patch.description {
        event.description = description.trim().to_owned();
    }
    if let Some(image) = patch.image {
        event.image = non_blank(Some(image));
    }
    if let Some(event_type) = patch.event_type {
        event.event_type = event_type;
    }
    if let Some(start_date) = patch.start_date {
        event.start_date = utc(start_date);
    }
    if let Some(end_date) = patch.end_date {
        event.end_date = utc(end_date);
    }
    if let Some(max_capacity) = patch.max_capacity {
        event.max_capacity = max_capacity;
    }
    if let Some(ticket_price) = patch.ticket_price {
        event.ticket_price = ticket_price;
    }
    if let Some(status) = patch.status {
        event.status = current.status.transition(status)?;
    }
    validate(&event)?;

    if let Some(venue_id) = patch.venue_id {
        if venue_id != current.venue_id {
            ensure_venue(db_pool, venue_id).await?;
        }
        event.venue_id = venue_id;
    }
    // the seats CHECK rejects a capacity below the seats already claimed
    let updated: Result<Option<(i64,)>, sqlx::Error> = sqlx::query_as(
        "UPDATE events SET title=?,description=?,image=?,event_type=?,start_date=?,end_date=?,venue_id=?,max_capacity=?,ticket_price=?,status=?
         WHERE id=? AND status=? RETURNING seats_taken",
    )
    .bind(&event.title)
    .bind(&event.description)
    .bind(&event.image)
    .bind(event.event_type)
    .bind(event.start_date)
    .bind(event.end_date)
    .bind(event.venue_id)
    .bind(event.max_capacity)
    .bind(event.ticket_price)
    .bind(event.status)
    .bind(event.id)
    .bind(current.status)
    .fetch_optional(db_pool)
    .await;

    let seats_taken = match updated {
        Ok(Some((seats_taken,))) => seats_taken,
        Ok(None) => {
            let now = find(db_pool, event_id).await.optional()?;
            return Err(stale_status(now.map(|e| e.status), event.status, "event"));
        }
        Err(err) if matches!(db::violation(&err), Some(ErrorKind::CheckViolation)) => {
            let now = find(db_pool, event_id).await?;
            return Err(Conflict::CapacityBelowSeatsTaken(now.seats_taken).into());
        }
        Err(err) => return Err(err.into()),
    };
    event.seats_taken = seats_taken;

    if event.status != current.status {
        tracing::info!(event.id = %event.id, from = %current.status, to = %event.status, actor.id = %actor.id, "event status changed");
    }
    tracing::info!(event.id = %event.id, actor.id = %actor.id, "event updated");
    Ok(event)
}

/// Removes the event together with its registrations, sponsorships,
/// exhibitor applications and agenda.
pub async fn delete(db_pool: &SqlitePool, actor: &Actor, event_id: Uuid) -> AppResult<()> {
    let event = find(db_pool, event_id).await?;
    actor.require_manager(event.organizer_id)?;

    let mut tx = db_pool.begin().await?;
    let mut removed = Vec::with_capacity(4);
    for table in ["registrations", "sponsors", "exhibitors", "sessions"] {
        let result = sqlx::query(&format!("DELETE FROM {table} WHERE event_id=?"))
            .bind(event_id)
            .execute(&mut *tx)
            .await?;
        removed.push(result.rows_affected());
    }

    let result = sqlx::query("DELETE FROM events WHERE id=?")
        .bind(event_id)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("event"));
    }
    tx.commit().await?;

    tracing::info!(
        event.id = %event_id,
        actor.id = %actor.id,
        registrations = removed[0],
        sponsors = removed[1],
        exhibitors = removed[2],
        sessions = removed[3],
        "event deleted"
    );
    Ok(())
}

pub async fn get_details(db_pool: &SqlitePool, event_id: Uuid) -> AppResult<EventDetails> {
    let event = find(db_pool, event_id).await?;
    let venue = venues::find(db_pool, event.venue_id).await.optional()?;
    let organizer: Option<UserBrief> = sqlx::query_as("SELECT id,name,email FROM users WHERE id=?")
        .bind(event.organizer_id)
        .fetch_optional(db_pool)
        .await?;
    let sponsors = sponsors::by_event_with_status(db_pool, event_id, SponsorStatus::Active).await?;
    let exhibitors = exhibitors::by_event_with_status(db_pool, event_id, ExhibitorStatus::Confirmed).await?;
    let sessions = sessions::by_event(db_pool, event_id).await?;

    Ok(EventDetails {
        event,
        venue,
        organizer,
        sponsors,
        exhibitors,
        sessions,
    })
}

pub async fn list(db_pool: &SqlitePool, filter: &EventFilter) -> AppResult<Vec<EventListing>> {
    let events: Vec<Event> = sqlx::query_as(&format!("SELECT {EVENT_COLUMNS} FROM events"))
        .fetch_all(db_pool)
        .await?;
    let venues: HashMap<Uuid, Venue> = venues::list(db_pool)
        .await?
        .into_iter()
        .map(|venue| (venue.id, venue))
        .collect();

    let now = db::now();
    let mut listings: Vec<EventListing> = events
        .into_iter()
        .filter(|event| filter.matches(event, now))
        .map(|event| {
            let venue = venues.get(&event.venue_id).cloned();
            EventListing { event, venue }
        })
        .collect();

    listings.sort_by_key(|listing| listing.event.start_date);
    Ok(listings)
}
