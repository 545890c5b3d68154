use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{auth::Actor, model::non_blank, AppError, AppResult};

use super::aggregate::{self, utc};

/// One slot on an event's agenda.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub event_id: Uuid,
    pub title: String,
    pub speaker_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_time: OffsetDateTime,
    pub room: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    pub title: String,
    pub speaker_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_time: OffsetDateTime,
    pub room: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPatch {
    pub title: Option<String>,
    pub speaker_name: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub start_time: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_time: Option<OffsetDateTime>,
    pub room: Option<String>,
}

const SESSION_COLUMNS: &str = "id,event_id,title,speaker_name,start_time,end_time,room";

fn required(value: String, field: &str) -> AppResult<String> {
    non_blank(Some(value)).ok_or_else(|| AppError::validation(format!("{field} is required")))
}

fn validate(session: &Session) -> AppResult<()> {
    if session.end_time < session.start_time {
        return Err(AppError::validation("endTime must not be before startTime"));
    }
    Ok(())
}

pub async fn find(db_pool: &SqlitePool, event_id: Uuid, session_id: Uuid) -> AppResult<Session> {
    sqlx::query_as(&format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id=? AND event_id=?"))
        .bind(session_id)
        .bind(event_id)
        .fetch_optional(db_pool)
        .await?
        .ok_or(AppError::NotFound("session"))
}

pub(crate) async fn by_event(db_pool: &SqlitePool, event_id: Uuid) -> AppResult<Vec<Session>> {
    let sessions = sqlx::query_as(&format!(
        "SELECT {SESSION_COLUMNS} FROM sessions WHERE event_id=? ORDER BY start_time, title"
    ))
    .bind(event_id)
    .fetch_all(db_pool)
    .await?;
    Ok(sessions)
}

/// The public agenda, earliest slot first.
pub async fn list(db_pool: &SqlitePool, event_id: Uuid) -> AppResult<Vec<Session>> {
    aggregate::find(db_pool, event_id).await?;
    by_event(db_pool, event_id).await
}

pub async fn add(db_pool: &SqlitePool, actor: &Actor, event_id: Uuid, new_session: NewSession) -> AppResult<Session> {
    let event = aggregate::find(db_pool, event_id).await?;
    actor.require_manager(event.organizer_id)?;

    let session = Session {
        id: Uuid::now_v7(),
        event_id,
        title: required(new_session.title, "title")?,
        speaker_name: required(new_session.speaker_name, "speakerName")?,
        start_time: utc(new_session.start_time),
        end_time: utc(new_session.end_time),
        room: required(new_session.room, "room")?,
    };
    validate(&session)?;

    sqlx::query(&format!("INSERT INTO sessions ({SESSION_COLUMNS}) VALUES (?,?,?,?,?,?,?)"))
        .bind(session.id)
        .bind(session.event_id)
        .bind(&session.title)
        .bind(&session.speaker_name)
        .bind(session.start_time)
        .bind(session.end_time)
        .bind(&session.room)
        .execute(db_pool)
        .await?;

    tracing::info!(session.id = %session.id, event.id = %event_id, actor.id = %actor.id, "session added");
    Ok(session)
}

pub async fn update(
    db_pool: &SqlitePool,
    actor: &Actor,
    event_id: Uuid,
    session_id: Uuid,
    patch: SessionPatch,
) -> AppResult<Session> {
    let event = aggregate::find(db_pool, event_id).await?;
    actor.require_manager(event.organizer_id)?;
    let mut session = find(db_pool, event_id, session_id).await?;

    if let Some(title) = patch.title {
        session.title = required(title, "title")?;
    }
    if let Some(speaker_name) = patch.speaker_name {
        session.speaker_name = required(speaker_name, "speakerName")?;
    }
    if let Some(start_time) = patch.start_time {
        session.start_time = utc(start_time);
    }
    if let Some(end_time) = patch.end_time {
        session.end_time = utc(end_time);
    }
    if let Some(room) = patch.room {
        session.room = required(room, "room")?;
    }
    validate(&session)?;

    let result = sqlx::query(
        "UPDATE sessions SET title=?,speaker_name=?,start_time=?,end_time=?,room=? WHERE id=? AND event_id=?",
    )
    .bind(&session.title)
    .bind(&session.speaker_name)
    .bind(session.start_time)
    .bind(session.end_time)
    .bind(&session.room)
    .bind(session.id)
    .bind(event_id)
    .execute(db_pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("session"));
    }

    tracing::info!(session.id = %session.id, actor.id = %actor.id, "session updated");
    Ok(session)
}

pub async fn remove(db_pool: &SqlitePool, actor: &Actor, event_id: Uuid, session_id: Uuid) -> AppResult<()> {
    let event = aggregate::find(db_pool, event_id).await?;
    actor.require_manager(event.organizer_id)?;

    let result = sqlx::query("DELETE FROM sessions WHERE id=? AND event_id=?")
        .bind(session_id)
        .bind(event_id)
        .execute(db_pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("session"));
    }

    tracing::info!(session.id = %session_id, event.id = %event_id, actor.id = %actor.id, "session removed");
    Ok(())
}
