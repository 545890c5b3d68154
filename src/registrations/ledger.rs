use serde::{Deserialize, Serialize};
use sqlx::{error::ErrorKind, SqlitePool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::Actor,
    db,
    events::{self, WithEvent},
    model::{EventStatus, RegistrationStatus, Role, TicketType},
    AppError, AppResult, Conflict,
};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub ticket_type: TicketType,
    /// Ticket price at the moment of registering.
    pub amount_paid: f64,
    pub status: RegistrationStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub registered_at: OffsetDateTime,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRegistration {
    #[serde(default)]
    pub ticket_type: TicketType,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub registration: Registration,
    pub attendee_name: String,
    pub attendee_email: String,
}

const REGISTRATION_COLUMNS: &str = "id,user_id,event_id,ticket_type,amount_paid,status,registered_at";

pub async fn find(db_pool: &SqlitePool, registration_id: Uuid) -> AppResult<Registration> {
    sqlx::query_as(&format!("SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE id=?"))
        .bind(registration_id)
        .fetch_optional(db_pool)
        .await?
        .ok_or(AppError::NotFound("registration"))
}

/// Claims a seat and records the ticket in one transaction. The seat claim is
/// a conditional increment, so concurrent callers can never overbook.
pub async fn register(
    db_pool: &SqlitePool,
    actor: &Actor,
    event_id: Uuid,
    NewRegistration { ticket_type }: NewRegistration,
) -> AppResult<Registration> {
    actor.require_role(&[Role::Attendee])?;

    let mut tx = db_pool.begin().await?;
    let claimed: Option<(f64,)> = sqlx::query_as(
        "UPDATE events SET seats_taken = seats_taken + 1
         WHERE id=? AND status != 'cancelled' AND seats_taken < max_capacity
         RETURNING ticket_price",
    )
    .bind(event_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some((ticket_price,)) = claimed else {
        let status: Option<(EventStatus,)> = sqlx::query_as("SELECT status FROM events WHERE id=?")
            .bind(event_id)
            .fetch_optional(&mut *tx)
            .await?;
        return Err(match status {
            None => AppError::NotFound("event"),
            Some((EventStatus::Cancelled,)) => Conflict::EventClosed.into(),
            Some(_) => Conflict::CapacityExceeded.into(),
        });
    };

    let registration = Registration {
        id: Uuid::now_v7(),
        user_id: actor.id,
        event_id,
        ticket_type,
        amount_paid: ticket_price,
        status: RegistrationStatus::Active,
        registered_at: db::now(),
    };

    sqlx::query(
        "INSERT INTO registrations (id,user_id,event_id,ticket_type,amount_paid,status,registered_at)
         VALUES (?,?,?,?,?,?,?)",
    )
    .bind(registration.id)
    .bind(registration.user_id)
    .bind(registration.event_id)
    .bind(registration.ticket_type)
    .bind(registration.amount_paid)
    .bind(registration.status)
    .bind(registration.registered_at)
    .execute(&mut *tx)
    .await
    .map_err(|err| match db::violation(&err) {
        Some(ErrorKind::UniqueViolation) => Conflict::AlreadyRegistered.into(),
        _ => AppError::from(err),
    })?;
    tx.commit().await?;

    tracing::info!(
        registration.id = %registration.id,
        event.id = %event_id,
        user.id = %actor.id,
        ticket_type = %ticket_type,
        "seat registered"
    );
    Ok(registration)
}

async fn require_visible(db_pool: &SqlitePool, actor: &Actor, registration: &Registration) -> AppResult<()> {
    if actor.id == registration.user_id || actor.is_admin() {
        return Ok(());
    }
    let event = events::find(db_pool, registration.event_id).await?;
    actor.require_manager(event.organizer_id)
}

pub async fn get(db_pool: &SqlitePool, actor: &Actor, registration_id: Uuid) -> AppResult<Registration> {
    let registration = find(db_pool, registration_id).await?;
    require_visible(db_pool, actor, &registration).await?;
    Ok(registration)
}

/// Marks the registration cancelled and frees its seat. Cancelling twice
/// changes nothing.
pub async fn cancel(db_pool: &SqlitePool, actor: &Actor, registration_id: Uuid) -> AppResult<Registration> {
    let mut registration = find(db_pool, registration_id).await?;
    require_visible(db_pool, actor, &registration).await?;
    if registration.status == RegistrationStatus::Cancelled {
        return Ok(registration);
    }

    let mut tx = db_pool.begin().await?;
    let flipped: Option<(Uuid,)> = sqlx::query_as(
        "UPDATE registrations SET status='cancelled' WHERE id=? AND status='active' RETURNING event_id",
    )
    .bind(registration_id)
    .fetch_optional(&mut *tx)
    .await?;

    if let Some((event_id,)) = flipped {
        sqlx::query("UPDATE events SET seats_taken = seats_taken - 1 WHERE id=?")
            .bind(event_id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    registration.status = RegistrationStatus::Cancelled;
    tracing::info!(
        registration.id = %registration.id,
        event.id = %registration.event_id,
        actor.id = %actor.id,
        "registration cancelled"
    );
    Ok(registration)
}

pub async fn attendees(db_pool: &SqlitePool, actor: &Actor, event_id: Uuid) -> AppResult<Vec<Attendee>> {
    let event = events::find(db_pool, event_id).await?;
    actor.require_manager(event.organizer_id)?;

    let attendees = sqlx::query_as(
        "SELECT r.id, r.user_id, r.event_id, r.ticket_type, r.amount_paid, r.status, r.registered_at,
                u.name AS attendee_name, u.email AS attendee_email
         FROM registrations r JOIN users u ON u.id = r.user_id
         WHERE r.event_id=?
         ORDER BY r.registered_at",
    )
    .bind(event_id)
    .fetch_all(db_pool)
    .await?;
    Ok(attendees)
}

pub async fn by_user(
    db_pool: &SqlitePool,
    actor: &Actor,
    user_id: Uuid,
) -> AppResult<Vec<WithEvent<Registration>>> {
    actor.require_self_or_admin(user_id)?;

    let registrations: Vec<Registration> = sqlx::query_as(&format!(
        "SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE user_id=? ORDER BY registered_at DESC"
    ))
    .bind(user_id)
    .fetch_all(db_pool)
    .await?;

    events::attach_events(db_pool, registrations, |r| r.event_id).await
}
