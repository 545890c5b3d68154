use std::sync::Arc;

use axum::{debug_handler, extract::State};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::{
    extract::Json,
    users::{self, User},
    AppError, AppResult, AppState,
};

use super::{Actor, Credentials, Session};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    db_pool: &SqlitePool,
    credentials: &dyn Credentials,
    LoginRequest { email, password }: LoginRequest,
) -> AppResult<Session> {
    let invalid = AppError::Unauthorized("invalid credentials");

    let Some(user) = users::find_by_email(db_pool, &email).await? else {
        return Err(invalid);
    };
    if !credentials.verify_password(&password, &user.password_hash) {
        return Err(invalid);
    }

    let token = credentials.issue(user.id).await?;
    tracing::info!(user.id = %user.id, "user logged in");
    Ok(Session { token, user })
}

#[debug_handler(state = AppState)]
pub(crate) async fn login_handler(
    State(db_pool): State<SqlitePool>,
    State(credentials): State<Arc<dyn Credentials>>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<Session>> {
    Ok(Json(login(&db_pool, credentials.as_ref(), request).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn me(
    State(db_pool): State<SqlitePool>,
    actor: Actor,
) -> AppResult<Json<User>> {
    Ok(Json(users::find(&db_pool, actor.id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::signup, model::Role, testutil, users::NewUser};

    #[tokio::test]
    async fn login_checks_the_password() {
        let db_pool = testutil::pool().await;
        let credentials = testutil::credentials(&db_pool);
        signup(
            &db_pool,
            &credentials,
            NewUser {
                name: "Linus".into(),
                email: "linus@example.com".into(),
                password: "penguins!".into(),
                role: Role::Attendee,
            },
        )
        .await
        .unwrap();

        let session = login(
            &db_pool,
            &credentials,
            LoginRequest {
                email: "Linus@Example.com".into(),
                password: "penguins!".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(session.user.email, "linus@example.com");

        let err = login(
            &db_pool,
            &credentials,
            LoginRequest {
                email: "linus@example.com".into(),
                password: "walruses".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }
}
