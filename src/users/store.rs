use serde::{Deserialize, Serialize};
use sqlx::{error::ErrorKind, SqlitePool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::{Actor, Credentials},
    db,
    model::{non_blank, Role},
    AppError, AppResult, Conflict,
};

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub role: Role,
    pub company_name: Option<String>,
    pub website_url: Option<String>,
    pub logo_url: Option<String>,
    pub bio: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Public identity shown next to events and attendee lists.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserBrief {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub company_name: Option<String>,
    pub website_url: Option<String>,
    pub logo_url: Option<String>,
    pub bio: Option<String>,
}

const USER_COLUMNS: &str =
    "id,name,email,password_hash,role,company_name,website_url,logo_url,bio,created_at";

fn normalize_email(email: &str) -> AppResult<String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::validation("a valid email is required"));
    }
    Ok(email)
}

fn email_conflict(err: sqlx::Error) -> AppError {
    match db::violation(&err) {
        Some(ErrorKind::UniqueViolation) => Conflict::EmailTaken.into(),
        _ => err.into(),
    }
}

/// Signup and admin bootstrap both land here; role policy is the caller's.
pub async fn create(
    db_pool: &SqlitePool,
    credentials: &dyn Credentials,
    NewUser { name, email, password, role }: NewUser,
) -> AppResult<User> {
    let name = name.trim().to_owned();
    if name.is_empty() {
        return Err(AppError::validation("name is required"));
    }
    let email = normalize_email(&email)?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let user = User {
        id: Uuid::now_v7(),
        name,
        email,
        password_hash: credentials.hash_password(&password)?,
        role,
        company_name: None,
        website_url: None,
        logo_url: None,
        bio: None,
        created_at: db::now(),
    };

    sqlx::query("INSERT INTO users (id,name,email,password_hash,role,created_at) VALUES (?,?,?,?,?,?)")
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(user.created_at)
        .execute(db_pool)
        .await
        .map_err(email_conflict)?;

    tracing::info!(user.id = %user.id, user.role = %user.role, "user created");
    Ok(user)
}

pub async fn find(db_pool: &SqlitePool, user_id: Uuid) -> AppResult<User> {
    sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id=?"))
        .bind(user_id)
        .fetch_optional(db_pool)
        .await?
        .ok_or(AppError::NotFound("user"))
}

pub async fn find_by_email(db_pool: &SqlitePool, email: &str) -> AppResult<Option<User>> {
    let user = sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email=?"))
        .bind(email.trim().to_lowercase())
        .fetch_optional(db_pool)
        .await?;
    Ok(user)
}

pub async fn list(db_pool: &SqlitePool, actor: &Actor) -> AppResult<Vec<User>> {
    actor.require_role(&[Role::Admin])?;
    let users = sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at"))
        .fetch_all(db_pool)
        .await?;
    Ok(users)
}

pub async fn get(db_pool: &SqlitePool, actor: &Actor, user_id: Uuid) -> AppResult<User> {
    actor.require_self_or_admin(user_id)?;
    find(db_pool, user_id).await
}

pub async fn update(
    db_pool: &SqlitePool,
    actor: &Actor,
    user_id: Uuid,
    patch: UserPatch,
) -> AppResult<User> {
    actor.require_self_or_admin(user_id)?;
    let mut user = find(db_pool, user_id).await?;

    if let Some(role) = patch.role {
        if role != user.role {
            actor.require_role(&[Role::Admin])?;
            user.role = role;
        }
    }
    if let Some(name) = non_blank(patch.name) {
        user.name = name;
    }
    if let Some(email) = non_blank(patch.email) {
        user.email = normalize_email(&email)?;
    }
    // present-but-blank clears a profile field
    if let Some(company_name) = patch.company_name {
        user.company_name = non_blank(Some(company_name));
    }
    if let Some(website_url) = patch.website_url {
        user.website_url = non_blank(Some(website_url));
    }
    if let Some(logo_url) = patch.logo_url {
        user.logo_url = non_blank(Some(logo_url));
    }
    if let Some(bio) = patch.bio {
        user.bio = non_blank(Some(bio));
    }

    sqlx::query(
        "UPDATE users SET name=?,email=?,role=?,company_name=?,website_url=?,logo_url=?,bio=? WHERE id=?",
    )
    .bind(&user.name)
    .bind(&user.email)
    .bind(user.role)
    .bind(&user.company_name)
    .bind(&user.website_url)
    .bind(&user.logo_url)
    .bind(&user.bio)
    .bind(user.id)
    .execute(db_pool)
    .await
    .map_err(email_conflict)?;

    tracing::info!(user.id = %user.id, actor.id = %actor.id, "user updated");
    Ok(user)
}

/// Admin only. Refused while the user still organizes events; otherwise the
/// user's tickets and applications go with them and held seats are released.
pub async fn delete(db_pool: &SqlitePool, actor: &Actor, user_id: Uuid) -> AppResult<()> {
    actor.require_role(&[Role::Admin])?;
    find(db_pool, user_id).await?;

    let (organized,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM events WHERE organizer_id=?")
        .bind(user_id)
        .fetch_one(db_pool)
        .await?;
    if organized > 0 {
        return Err(Conflict::OrganizerHasEvents.into());
    }

    let mut tx = db_pool.begin().await?;
    sqlx::query(
        "UPDATE events SET seats_taken = seats_taken - (
            SELECT COUNT(*) FROM registrations r
            WHERE r.event_id = events.id AND r.user_id = ? AND r.status = 'active'
        )
        WHERE id IN (SELECT event_id FROM registrations WHERE user_id = ? AND status = 'active')",
    )
    .bind(user_id)
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    for table in ["registrations", "sponsors", "exhibitors", "tokens"] {
        sqlx::query(&format!("DELETE FROM {table} WHERE user_id=?"))
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
    }

    sqlx::query("DELETE FROM users WHERE id=?")
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|err| match db::violation(&err) {
            Some(ErrorKind::ForeignKeyViolation) => Conflict::OrganizerHasEvents.into(),
            _ => AppError::from(err),
        })?;
    tx.commit().await?;

    tracing::info!(user.id = %user_id, actor.id = %actor.id, "user deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{events, model::RegistrationStatus, registrations, testutil};

    #[tokio::test]
    async fn emails_are_unique_case_insensitively() {
        let db_pool = testutil::pool().await;
        let credentials = testutil::credentials(&db_pool);
        let new_user = |email: &str| NewUser {
            name: "Ada".into(),
            email: email.into(),
            password: "long enough".into(),
            role: Role::Attendee,
        };

        create(&db_pool, &credentials, new_user("ada@example.com")).await.unwrap();
        let err = create(&db_pool, &credentials, new_user("ADA@example.com ")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(Conflict::EmailTaken)));
    }

    #[tokio::test]
    async fn short_passwords_are_rejected() {
        let db_pool = testutil::pool().await;
        let credentials = testutil::credentials(&db_pool);
        let err = create(
            &db_pool,
            &credentials,
            NewUser {
                name: "Ada".into(),
                email: "ada@example.com".into(),
                password: "short".into(),
                role: Role::Attendee,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn only_admins_change_roles() {
        let db_pool = testutil::pool().await;
        let attendee = testutil::user(&db_pool, Role::Attendee).await;
        let admin = testutil::user(&db_pool, Role::Admin).await;

        let promote = || UserPatch {
            role: Some(Role::Organizer),
            ..UserPatch::default()
        };

        let err = update(&db_pool, &attendee, attendee.id, promote()).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden));

        let user = update(&db_pool, &admin, attendee.id, promote()).await.unwrap();
        assert_eq!(user.role, Role::Organizer);
    }

    #[tokio::test]
    async fn profile_fields_can_be_set_and_cleared() {
        let db_pool = testutil::pool().await;
        let sponsor = testutil::user(&db_pool, Role::Sponsor).await;

        let user = update(
            &db_pool,
            &sponsor,
            sponsor.id,
            UserPatch {
                company_name: Some("Acme".into()),
                bio: Some("We make anvils".into()),
                ..UserPatch::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(user.company_name.as_deref(), Some("Acme"));

        let user = update(
            &db_pool,
            &sponsor,
            sponsor.id,
            UserPatch {
                bio: Some("".into()),
                ..UserPatch::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(user.bio, None);
        assert_eq!(user.company_name.as_deref(), Some("Acme"));
    }

    #[tokio::test]
    async fn users_cannot_read_each_other() {
        let db_pool = testutil::pool().await;
        let a = testutil::user(&db_pool, Role::Attendee).await;
        let b = testutil::user(&db_pool, Role::Attendee).await;
        assert!(matches!(get(&db_pool, &a, b.id).await, Err(AppError::Forbidden)));
        assert_eq!(get(&db_pool, &a, a.id).await.unwrap().id, a.id);
    }

    #[tokio::test]
    async fn deleting_an_attendee_releases_their_seat() {
        let db_pool = testutil::pool().await;
        let admin = testutil::user(&db_pool, Role::Admin).await;
        let organizer = testutil::user(&db_pool, Role::Organizer).await;
        let attendee = testutil::user(&db_pool, Role::Attendee).await;
        let event = testutil::event(&db_pool, &organizer, 1, 10.0).await;

        let registration = registrations::register(&db_pool, &attendee, event.id, Default::default())
            .await
            .unwrap();
        assert_eq!(registration.status, RegistrationStatus::Active);

        delete(&db_pool, &admin, attendee.id).await.unwrap();

        assert_eq!(events::find(&db_pool, event.id).await.unwrap().seats_taken, 0);
        assert!(matches!(find(&db_pool, attendee.id).await, Err(AppError::NotFound("user"))));
    }

    #[tokio::test]
    async fn organizers_with_events_cannot_be_deleted() {
        let db_pool = testutil::pool().await;
        let admin = testutil::user(&db_pool, Role::Admin).await;
        let organizer = testutil::user(&db_pool, Role::Organizer).await;
        testutil::event(&db_pool, &organizer, 5, 0.0).await;

        let err = delete(&db_pool, &admin, organizer.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(Conflict::OrganizerHasEvents)));
    }
}
