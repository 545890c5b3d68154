use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{model::Role, AppError, AppResult};

use super::Credentials;

/// The authenticated caller, resolved from `Authorization: Bearer <token>`.
/// Every workflow takes one explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_role(&self, roles: &[Role]) -> AppResult<()> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    pub fn require_self_or_admin(&self, user_id: Uuid) -> AppResult<()> {
        if self.id == user_id || self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    /// Owning organizer or any admin.
    pub fn manages(&self, organizer_id: Uuid) -> bool {
        self.id == organizer_id || self.is_admin()
    }

    pub fn require_manager(&self, organizer_id: Uuid) -> AppResult<()> {
        if self.manages(organizer_id) {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

/// The raw token, for routes that act on the credential itself (logout).
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

fn bearer(parts: &Parts) -> AppResult<Option<String>> {
    let Some(header) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let token = header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AppError::Unauthorized("expected 'Bearer <token>'"))?;

    Ok(Some(token.to_owned()))
}

async fn resolve<S>(state: &S, token: &str) -> AppResult<Actor>
where
    S: Send + Sync,
    SqlitePool: FromRef<S>,
    Arc<dyn Credentials>: FromRef<S>,
{
    let credentials = <Arc<dyn Credentials> as FromRef<S>>::from_ref(state);
    let Some(user_id) = credentials.resolve(token).await? else {
        return Err(AppError::Unauthorized("invalid or expired token"));
    };

    let db_pool = <SqlitePool as FromRef<S>>::from_ref(state);
    let role: Option<(Role,)> = sqlx::query_as("SELECT role FROM users WHERE id=?")
        .bind(user_id)
        .fetch_optional(&db_pool)
        .await?;

    match role {
        Some((role,)) => Ok(Actor { id: user_id, role }),
        None => Err(AppError::Unauthorized("invalid or expired token")),
    }
}

impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        bearer(parts)?
            .map(BearerToken)
            .ok_or(AppError::Unauthorized("missing bearer token"))
    }
}

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
    SqlitePool: FromRef<S>,
    Arc<dyn Credentials>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer(parts)? else {
            return Err(AppError::Unauthorized("missing bearer token"));
        };
        resolve(state, &token).await
    }
}

/// Anonymous callers are fine, bad tokens are not.
impl<S> OptionalFromRequestParts<S> for Actor
where
    S: Send + Sync,
    SqlitePool: FromRef<S>,
    Arc<dyn Credentials>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        match bearer(parts)? {
            Some(token) => resolve(state, &token).await.map(Some),
            None => Ok(None),
        }
    }
}
