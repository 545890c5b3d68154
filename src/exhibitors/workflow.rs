use serde::{Deserialize, Serialize};
use sqlx::{error::ErrorKind, SqlitePool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::Actor,
    db,
    events::{self, WithEvent},
    model::{non_blank, stale_status, EventStatus, ExhibitorStatus, Lifecycle},
    users, AppError, AppResult, Conflict,
};

/// Booth placeholder until an organizer confirms the application.
pub const PENDING_BOOTH: &str = "Pending";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Exhibitor {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub company_name: String,
    pub booth_number: String,
    pub booth_size: String,
    pub description: Option<String>,
    pub logo_url: Option<String>,
    pub status: ExhibitorStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExhibitorApplication {
    pub company_name: Option<String>,
    pub booth_size: String,
    pub description: Option<String>,
    pub logo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExhibitorStatusUpdate {
    pub status: ExhibitorStatus,
    pub booth_number: Option<String>,
}

/// What the applicant may still edit after applying.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExhibitorDetails {
    pub company_name: Option<String>,
    pub booth_size: Option<String>,
    pub description: Option<String>,
    pub logo_url: Option<String>,
}

const EXHIBITOR_COLUMNS: &str =
    "id,event_id,user_id,company_name,booth_number,booth_size,description,logo_url,status,created_at";

pub async fn find(db_pool: &SqlitePool, event_id: Uuid, exhibitor_id: Uuid) -> AppResult<Exhibitor> {
    sqlx::query_as(&format!("SELECT {EXHIBITOR_COLUMNS} FROM exhibitors WHERE id=? AND event_id=?"))
        .bind(exhibitor_id)
        .bind(event_id)
        .fetch_optional(db_pool)
        .await?
        .ok_or(AppError::NotFound("exhibitor"))
}

/// Open to any signed-in user. The booth stays `Pending` until confirmation.
pub async fn apply(
    db_pool: &SqlitePool,
    actor: &Actor,
    event_id: Uuid,
    application: ExhibitorApplication,
) -> AppResult<Exhibitor> {
    let event = events::find(db_pool, event_id).await?;
    if event.status == EventStatus::Cancelled {
        return Err(Conflict::EventClosed.into());
    }
    let booth_size = non_blank(Some(application.booth_size))
        .ok_or_else(|| AppError::validation("boothSize is required"))?;

    let company_name = match non_blank(application.company_name) {
        Some(company_name) => company_name,
        None => users::find(db_pool, actor.id)
            .await?
            .company_name
            .ok_or_else(|| AppError::validation("companyName is required"))?,
    };

    let exhibitor = Exhibitor {
        id: Uuid::now_v7(),
        event_id,
        user_id: actor.id,
        company_name,
        booth_number: PENDING_BOOTH.to_owned(),
        booth_size,
        description: non_blank(application.description),
        logo_url: non_blank(application.logo_url),
        status: ExhibitorStatus::Registered,
        created_at: db::now(),
    };

    sqlx::query(
        "INSERT INTO exhibitors (id,event_id,user_id,company_name,booth_number,booth_size,description,logo_url,status,created_at)
         VALUES (?,?,?,?,?,?,?,?,?,?)",
    )
    .bind(exhibitor.id)
    .bind(exhibitor.event_id)
    .bind(exhibitor.user_id)
    .bind(&exhibitor.company_name)
    .bind(&exhibitor.booth_number)
    .bind(&exhibitor.booth_size)
    .bind(&exhibitor.description)
    .bind(&exhibitor.logo_url)
    .bind(exhibitor.status)
    .bind(exhibitor.created_at)
    .execute(db_pool)
    .await
    .map_err(|err| match db::violation(&err) {
        Some(ErrorKind::UniqueViolation) => Conflict::AlreadyApplied.into(),
        Some(ErrorKind::ForeignKeyViolation) => AppError::NotFound("event"),
        _ => AppError::from(err),
    })?;

    tracing::info!(exhibitor.id = %exhibitor.id, event.id = %event_id, user.id = %actor.id, "exhibitor applied");
    Ok(exhibitor)
}

/// Managers see every application; everyone else only confirmed booths.
pub async fn list(db_pool: &SqlitePool, actor: Option<&Actor>, event_id: Uuid) -> AppResult<Vec<Exhibitor>> {
    let event = events::find(db_pool, event_id).await?;
    if actor.is_some_and(|actor| actor.manages(event.organizer_id)) {
        let exhibitors = sqlx::query_as(&format!(
            "SELECT {EXHIBITOR_COLUMNS} FROM exhibitors WHERE event_id=? ORDER BY created_at"
        ))
        .bind(event_id)
        .fetch_all(db_pool)
        .await?;
        return Ok(exhibitors);
    }
    by_event_with_status(db_pool, event_id, ExhibitorStatus::Confirmed).await
}

pub async fn by_event_with_status(
    db_pool: &SqlitePool,
    event_id: Uuid,
    status: ExhibitorStatus,
) -> AppResult<Vec<Exhibitor>> {
    let exhibitors = sqlx::query_as(&format!(
        "SELECT {EXHIBITOR_COLUMNS} FROM exhibitors WHERE event_id=? AND status=? ORDER BY booth_number"
    ))
    .bind(event_id)
    .bind(status)
    .fetch_all(db_pool)
    .await?;
    Ok(exhibitors)
}

/// Confirming needs a real booth number; one confirmed exhibitor per booth.
pub async fn update_status(
    db_pool: &SqlitePool,
    actor: &Actor,
    event_id: Uuid,
    exhibitor_id: Uuid,
    ExhibitorStatusUpdate { status, booth_number }: ExhibitorStatusUpdate,
) -> AppResult<Exhibitor> {
    let event = events::find(db_pool, event_id).await?;
    actor.require_manager(event.organizer_id)?;
    let mut exhibitor = find(db_pool, event_id, exhibitor_id).await?;
    let previous = exhibitor.status;
    exhibitor.status = previous.transition(status)?;

    match exhibitor.status {
        ExhibitorStatus::Confirmed => {
            let booth = non_blank(booth_number)
                .or_else(|| Some(exhibitor.booth_number.clone()))
                .filter(|booth| booth != PENDING_BOOTH)
                .ok_or_else(|| AppError::validation("boothNumber is required to confirm an exhibitor"))?;
            exhibitor.booth_number = booth;
        }
        ExhibitorStatus::Registered => exhibitor.booth_number = PENDING_BOOTH.to_owned(),
        ExhibitorStatus::Cancelled => {}
    }

    let result = sqlx::query("UPDATE exhibitors SET status=?,booth_number=? WHERE id=? AND status=?")
        .bind(exhibitor.status)
        .bind(&exhibitor.booth_number)
        .bind(exhibitor.id)
        .bind(previous)
        .execute(db_pool)
        .await
        .map_err(|err| match db::violation(&err) {
            Some(ErrorKind::UniqueViolation) => Conflict::BoothTaken(exhibitor.booth_number.clone()).into(),
            _ => AppError::from(err),
        })?;
    if result.rows_affected() == 0 {
        let current: Option<ExhibitorStatus> = sqlx::query_scalar("SELECT status FROM exhibitors WHERE id=?")
            .bind(exhibitor.id)
            .fetch_optional(db_pool)
            .await?;
        return Err(stale_status(current, exhibitor.status, "exhibitor"));
    }

    tracing::info!(
        exhibitor.id = %exhibitor.id,
        from = %previous,
        to = %exhibitor.status,
        booth = %exhibitor.booth_number,
        actor.id = %actor.id,
        "exhibitor status changed"
    );
    Ok(exhibitor)
}

pub async fn update_details(
    db_pool: &SqlitePool,
    actor: &Actor,
    event_id: Uuid,
    exhibitor_id: Uuid,
    details: ExhibitorDetails,
) -> AppResult<Exhibitor> {
    let mut exhibitor = find(db_pool, event_id, exhibitor_id).await?;
    actor.require_self_or_admin(exhibitor.user_id)?;

    if let Some(company_name) = non_blank(details.company_name) {
        exhibitor.company_name = company_name;
    }
    if let Some(booth_size) = non_blank(details.booth_size) {
        exhibitor.booth_size = booth_size;
    }
    if let Some(description) = details.description {
        exhibitor.description = non_blank(Some(description));
    }
    if let Some(logo_url) = details.logo_url {
        exhibitor.logo_url = non_blank(Some(logo_url));
    }

    sqlx::query("UPDATE exhibitors SET company_name=?,booth_size=?,description=?,logo_url=? WHERE id=?")
        .bind(&exhibitor.company_name)
        .bind(&exhibitor.booth_size)
        .bind(&exhibitor.description)
        .bind(&exhibitor.logo_url)
        .bind(exhibitor.id)
        .execute(db_pool)
        .await?;

    tracing::info!(exhibitor.id = %exhibitor.id, actor.id = %actor.id, "exhibitor details updated");
    Ok(exhibitor)
}

pub async fn remove(db_pool: &SqlitePool, actor: &Actor, event_id: Uuid, exhibitor_id: Uuid) -> AppResult<()> {
    let event = events::find(db_pool, event_id).await?;
    actor.require_manager(event.organizer_id)?;

    let result = sqlx::query("DELETE FROM exhibitors WHERE id=? AND event_id=?")
        .bind(exhibitor_id)
        .bind(event_id)
        .execute(db_pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("exhibitor"));
    }

    tracing::info!(exhibitor.id = %exhibitor_id, event.id = %event_id, actor.id = %actor.id, "exhibitor removed");
    Ok(())
}

pub async fn by_user(db_pool: &SqlitePool, actor: &Actor, user_id: Uuid) -> AppResult<Vec<WithEvent<Exhibitor>>> {
    actor.require_self_or_admin(user_id)?;

    let exhibitors: Vec<Exhibitor> = sqlx::query_as(&format!(
        "SELECT {EXHIBITOR_COLUMNS} FROM exhibitors WHERE user_id=? ORDER BY created_at DESC"
    ))
    .bind(user_id)
    .fetch_all(db_pool)
    .await?;

    events::attach_events(db_pool, exhibitors, |e| e.event_id).await
}
