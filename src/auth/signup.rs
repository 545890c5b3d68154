use std::sync::Arc;

use axum::{debug_handler, extract::State, http::StatusCode};
use sqlx::SqlitePool;

use crate::{
    config::AdminBootstrap,
    extract::Json,
    model::Role,
    users::{self, NewUser},
    AppError, AppResult, AppState,
};

use super::{Credentials, Session};

/// Self-service signup. Admins are never minted here.
pub async fn signup(
    db_pool: &SqlitePool,
    credentials: &dyn Credentials,
    new_user: NewUser,
) -> AppResult<Session> {
    if new_user.role == Role::Admin {
        return Err(AppError::validation("cannot sign up as admin"));
    }

    let user = users::create(db_pool, credentials, new_user).await?;
    let token = credentials.issue(user.id).await?;
    Ok(Session { token, user })
}

#[debug_handler(state = AppState)]
pub(crate) async fn signup_handler(
    State(db_pool): State<SqlitePool>,
    State(credentials): State<Arc<dyn Credentials>>,
    Json(new_user): Json<NewUser>,
) -> AppResult<(StatusCode, Json<Session>)> {
    let session = signup(&db_pool, credentials.as_ref(), new_user).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// Creates the configured admin unless that email is already taken.
pub async fn bootstrap_admin(
    db_pool: &SqlitePool,
    credentials: &dyn Credentials,
    AdminBootstrap { email, password }: AdminBootstrap,
) -> AppResult<()> {
    if users::find_by_email(db_pool, &email).await?.is_some() {
        tracing::debug!(%email, "admin already present");
        return Ok(());
    }

    users::create(
        db_pool,
        credentials,
        NewUser {
            name: "Administrator".to_owned(),
            email,
            password,
            role: Role::Admin,
        },
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    fn new_user(role: Role) -> NewUser {
        NewUser {
            name: "Grace".into(),
            email: "grace@example.com".into(),
            password: "compilers!".into(),
            role,
        }
    }

    #[tokio::test]
    async fn signup_issues_a_working_token() {
        let db_pool = testutil::pool().await;
        let credentials = testutil::credentials(&db_pool);

        let session = signup(&db_pool, &credentials, new_user(Role::Organizer)).await.unwrap();
        assert_eq!(session.user.role, Role::Organizer);
        assert_eq!(
            credentials.resolve(&session.token).await.unwrap(),
            Some(session.user.id)
        );
    }

    #[tokio::test]
    async fn admins_cannot_self_register() {
        let db_pool = testutil::pool().await;
        let credentials = testutil::credentials(&db_pool);

        let err = signup(&db_pool, &credentials, new_user(Role::Admin)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn admin_bootstrap_is_idempotent() {
        let db_pool = testutil::pool().await;
        let credentials = testutil::credentials(&db_pool);
        let admin = || AdminBootstrap {
            email: "root@example.com".into(),
            password: "rootroot".into(),
        };

        bootstrap_admin(&db_pool, &credentials, admin()).await.unwrap();
        bootstrap_admin(&db_pool, &credentials, admin()).await.unwrap();

        let user = users::find_by_email(&db_pool, "root@example.com").await.unwrap().unwrap();
        assert_eq!(user.role, Role::Admin);
    }
}
