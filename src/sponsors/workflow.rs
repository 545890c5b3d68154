use serde::{Deserialize, Serialize};
use sqlx::{error::ErrorKind, types::Json as JsonText, SqlitePool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::Actor,
    config::SponsorApproval,
    db,
    events::{self, WithEvent},
    model::{non_blank, stale_status, EventStatus, Lifecycle, Role, SponsorStatus},
    users, AppError, AppResult, Conflict,
};

const DEFAULT_TIER: &str = "Partner";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Sponsor {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub company_name: String,
    pub tier_name: String,
    pub benefits: JsonText<Vec<String>>,
    pub logo_url: Option<String>,
    pub website_url: Option<String>,
    pub status: SponsorStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Blank company, website and logo fall back to the applicant's profile.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsorApplication {
    pub company_name: Option<String>,
    pub website_url: Option<String>,
    pub logo_url: Option<String>,
    #[serde(default)]
    pub benefits: Vec<String>,
    pub tier_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsorUpdate {
    pub status: Option<SponsorStatus>,
    pub tier_name: Option<String>,
    pub benefits: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsorAssets {
    pub logo_url: String,
}

const SPONSOR_COLUMNS: &str =
    "id,event_id,user_id,company_name,tier_name,benefits,logo_url,website_url,status,created_at";

fn benefit_list(benefits: Vec<String>) -> Vec<String> {
    benefits.into_iter().filter_map(|b| non_blank(Some(b))).collect()
}

pub async fn find(db_pool: &SqlitePool, event_id: Uuid, sponsor_id: Uuid) -> AppResult<Sponsor> {
    sqlx::query_as(&format!("SELECT {SPONSOR_COLUMNS} FROM sponsors WHERE id=? AND event_id=?"))
        .bind(sponsor_id)
        .bind(event_id)
        .fetch_optional(db_pool)
        .await?
        .ok_or(AppError::NotFound("sponsor"))
}

pub async fn apply(
    db_pool: &SqlitePool,
    actor: &Actor,
    approval: SponsorApproval,
    event_id: Uuid,
    application: SponsorApplication,
) -> AppResult<Sponsor> {
    actor.require_role(&[Role::Sponsor, Role::Admin])?;

    let event = events::find(db_pool, event_id).await?;
    if event.status == EventStatus::Cancelled {
        return Err(Conflict::EventClosed.into());
    }
    let profile = users::find(db_pool, actor.id).await?;

    let company_name = non_blank(application.company_name)
        .or(profile.company_name)
        .ok_or_else(|| AppError::validation("companyName is required"))?;

    let sponsor = Sponsor {
        id: Uuid::now_v7(),
        event_id,
        user_id: actor.id,
        company_name,
        tier_name: non_blank(application.tier_name).unwrap_or_else(|| DEFAULT_TIER.to_owned()),
        benefits: JsonText(benefit_list(application.benefits)),
        logo_url: non_blank(application.logo_url).or(profile.logo_url),
        website_url: non_blank(application.website_url).or(profile.website_url),
        status: match approval {
            SponsorApproval::ReviewFirst => SponsorStatus::Pending,
            SponsorApproval::AutoApprove => SponsorStatus::Active,
        },
        created_at: db::now(),
    };

    sqlx::query(
        "INSERT INTO sponsors (id,event_id,user_id,company_name,tier_name,benefits,logo_url,website_url,status,created_at)
         VALUES (?,?,?,?,?,?,?,?,?,?)",
    )
    .bind(sponsor.id)
    .bind(sponsor.event_id)
    .bind(sponsor.user_id)
    .bind(&sponsor.company_name)
    .bind(&sponsor.tier_name)
    .bind(&sponsor.benefits)
    .bind(&sponsor.logo_url)
    .bind(&sponsor.website_url)
    .bind(sponsor.status)
    .bind(sponsor.created_at)
    .execute(db_pool)
    .await
    .map_err(|err| match db::violation(&err) {
        Some(ErrorKind::UniqueViolation) => Conflict::AlreadyApplied.into(),
        Some(ErrorKind::ForeignKeyViolation) => AppError::NotFound("event"),
        _ => AppError::from(err),
    })?;

    tracing::info!(
        sponsor.id = %sponsor.id,
        event.id = %event_id,
        user.id = %actor.id,
        status = %sponsor.status,
        "sponsorship requested"
    );
    Ok(sponsor)
}

/// Managers see every application; everyone else only active sponsors.
pub async fn list(db_pool: &SqlitePool, actor: Option<&Actor>, event_id: Uuid) -> AppResult<Vec<Sponsor>> {
    let event = events::find(db_pool, event_id).await?;
    if actor.is_some_and(|actor| actor.manages(event.organizer_id)) {
        let sponsors = sqlx::query_as(&format!(
            "SELECT {SPONSOR_COLUMNS} FROM sponsors WHERE event_id=? ORDER BY created_at"
        ))
        .bind(event_id)
        .fetch_all(db_pool)
        .await?;
        return Ok(sponsors);
    }
    by_event_with_status(db_pool, event_id, SponsorStatus::Active).await
}

pub async fn by_event_with_status(
    db_pool: &SqlitePool,
    event_id: Uuid,
    status: SponsorStatus,
) -> AppResult<Vec<Sponsor>> {
    let sponsors = sqlx::query_as(&format!(
        "SELECT {SPONSOR_COLUMNS} FROM sponsors WHERE event_id=? AND status=? ORDER BY created_at"
    ))
    .bind(event_id)
    .bind(status)
    .fetch_all(db_pool)
    .await?;
    Ok(sponsors)
}

pub async fn update(
    db_pool: &SqlitePool,
    actor: &Actor,
    event_id: Uuid,
    sponsor_id: Uuid,
    update: SponsorUpdate,
) -> AppResult<Sponsor> {
    let event = events::find(db_pool, event_id).await?;
    actor.require_manager(event.organizer_id)?;
    let mut sponsor = find(db_pool, event_id, sponsor_id).await?;
    let previous = sponsor.status;

    if let Some(status) = update.status {
        sponsor.status = previous.transition(status)?;
    }
    if let Some(tier_name) = non_blank(update.tier_name) {
        sponsor.tier_name = tier_name;
    }
    if let Some(benefits) = update.benefits {
        sponsor.benefits = JsonText(benefit_list(benefits));
    }

    let result = sqlx::query("UPDATE sponsors SET status=?,tier_name=?,benefits=? WHERE id=? AND status=?")
        .bind(sponsor.status)
        .bind(&sponsor.tier_name)
        .bind(&sponsor.benefits)
        .bind(sponsor.id)
        .bind(previous)
        .execute(db_pool)
        .await?;
    if result.rows_affected() == 0 {
        let current: Option<SponsorStatus> = sqlx::query_scalar("SELECT status FROM sponsors WHERE id=?")
            .bind(sponsor.id)
            .fetch_optional(db_pool)
            .await?;
        return Err(stale_status(current, sponsor.status, "sponsor"));
    }

    if previous != sponsor.status {
        tracing::info!(sponsor.id = %sponsor.id, from = %previous, to = %sponsor.status, actor.id = %actor.id, "sponsor status changed");
    }
    Ok(sponsor)
}

pub async fn remove(db_pool: &SqlitePool, actor: &Actor, event_id: Uuid, sponsor_id: Uuid) -> AppResult<()> {
    let event = events::find(db_pool, event_id).await?;
    actor.require_manager(event.organizer_id)?;

    let result = sqlx::query("DELETE FROM sponsors WHERE id=? AND event_id=?")
        .bind(sponsor_id)
        .bind(event_id)
        .execute(db_pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("sponsor"));
    }

    tracing::info!(sponsor.id = %sponsor_id, event.id = %event_id, actor.id = %actor.id, "sponsor removed");
    Ok(())
}

/// Only the sponsoring user (or an admin) may swap the logo.
pub async fn upload_assets(
    db_pool: &SqlitePool,
    actor: &Actor,
    event_id: Uuid,
    sponsor_id: Uuid,
    SponsorAssets { logo_url }: SponsorAssets,
) -> AppResult<Sponsor> {
    let mut sponsor = find(db_pool, event_id, sponsor_id).await?;
    actor.require_self_or_admin(sponsor.user_id)?;
    let logo_url = non_blank(Some(logo_url)).ok_or_else(|| AppError::validation("logoUrl is required"))?;

    sqlx::query("UPDATE sponsors SET logo_url=? WHERE id=?")
        .bind(&logo_url)
        .bind(sponsor.id)
        .execute(db_pool)
        .await?;
    sponsor.logo_url = Some(logo_url);

    tracing::info!(sponsor.id = %sponsor.id, actor.id = %actor.id, "sponsor assets updated");
    Ok(sponsor)
}

pub async fn by_user(db_pool: &SqlitePool, actor: &Actor, user_id: Uuid) -> AppResult<Vec<WithEvent<Sponsor>>> {
    actor.require_self_or_admin(user_id)?;

    let sponsors: Vec<Sponsor> = sqlx::query_as(&format!(
        "SELECT {SPONSOR_COLUMNS} FROM sponsors WHERE user_id=? ORDER BY created_at DESC"
    ))
    .bind(user_id)
    .fetch_all(db_pool)
    .await?;

    events::attach_events(db_pool, sponsors, |s| s.event_id).await
}
