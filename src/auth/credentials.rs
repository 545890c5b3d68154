use anyhow::anyhow;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use rand::{distr::Alphanumeric, Rng};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{db, AppResult};

const SALT_LEN: usize = 16;
const TOKEN_LEN: usize = 48;

/// Password hashing and bearer-token bookkeeping. Workflows only ever see the
/// user id a token resolves to.
#[async_trait]
pub trait Credentials: Send + Sync {
    fn hash_password(&self, password: &str) -> AppResult<String>;
    fn verify_password(&self, password: &str, password_hash: &str) -> bool;

    async fn issue(&self, user_id: Uuid) -> AppResult<String>;
    async fn resolve(&self, token: &str) -> AppResult<Option<Uuid>>;
    async fn revoke(&self, token: &str) -> AppResult<()>;
}

#[derive(Clone)]
pub struct SqliteCredentials {
    db_pool: SqlitePool,
    ttl: time::Duration,
}

impl SqliteCredentials {
    pub fn new(db_pool: SqlitePool, ttl: time::Duration) -> Self {
        Self { db_pool, ttl }
    }
}

fn random_string(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[async_trait]
impl Credentials for SqliteCredentials {
    /// Argon2id with default parameters, stored as a PHC string.
    fn hash_password(&self, password: &str) -> AppResult<String> {
        let mut salt = [0u8; SALT_LEN];
        rand::rng().fill(&mut salt);
        let salt = SaltString::encode_b64(&salt).map_err(|err| anyhow!("salt encoding: {err}"))?;

        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|err| anyhow!("password hashing: {err}"))?;
        Ok(hash.to_string())
    }

    fn verify_password(&self, password: &str, password_hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(password_hash) else {
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    async fn issue(&self, user_id: Uuid) -> AppResult<String> {
        let expires_at = db::now()
            .checked_add(self.ttl)
            .ok_or_else(|| anyhow!("token ttl {} overflows the clock", self.ttl))?;

        let token = random_string(TOKEN_LEN);
        sqlx::query("INSERT INTO tokens (token,user_id,expires_at) VALUES (?,?,?)")
            .bind(&token)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.db_pool)
            .await?;
        Ok(token)
    }

    async fn resolve(&self, token: &str) -> AppResult<Option<Uuid>> {
        let row: Option<(Uuid, time::OffsetDateTime)> =
            sqlx::query_as("SELECT user_id,expires_at FROM tokens WHERE token=?")
                .bind(token)
                .fetch_optional(&self.db_pool)
                .await?;

        match row {
            Some((user_id, expires_at)) if expires_at > db::now() => Ok(Some(user_id)),
            Some(_) => {
                self.revoke(token).await?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn revoke(&self, token: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM tokens WHERE token=?")
            .bind(token)
            .execute(&self.db_pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::Role, testutil};

    #[tokio::test]
    async fn passwords_verify_only_against_their_own_hash() {
        let db_pool = testutil::pool().await;
        let credentials = SqliteCredentials::new(db_pool, time::Duration::hours(1));

        let hash = credentials.hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(credentials.verify_password("correct horse", &hash));
        assert!(!credentials.verify_password("wrong horse", &hash));
        assert!(!credentials.verify_password("correct horse", "garbage"));
        assert_ne!(hash, credentials.hash_password("correct horse").unwrap(), "salts differ");
    }

    #[tokio::test]
    async fn non_phc_hashes_are_rejected() {
        let db_pool = testutil::pool().await;
        let credentials = SqliteCredentials::new(db_pool, time::Duration::hours(1));

        let salted_sha = "abcdefghijklmnop$5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8";
        assert!(!credentials.verify_password("password", salted_sha));
    }

    #[tokio::test]
    async fn oversized_ttl_fails_instead_of_panicking() {
        let db_pool = testutil::pool().await;
        let user = testutil::user(&db_pool, Role::Attendee).await;
        let credentials = SqliteCredentials::new(db_pool, time::Duration::hours(100_000_000));

        let err = credentials.issue(user.id).await.unwrap_err();
        assert!(matches!(err, crate::AppError::Unexpected(_)));
    }

    #[tokio::test]
    async fn tokens_resolve_until_revoked() {
        let db_pool = testutil::pool().await;
        let user = testutil::user(&db_pool, Role::Attendee).await;
        let credentials = SqliteCredentials::new(db_pool, time::Duration::hours(1));

        let token = credentials.issue(user.id).await.unwrap();
        assert_eq!(token.len(), TOKEN_LEN);
        assert_eq!(credentials.resolve(&token).await.unwrap(), Some(user.id));

        credentials.revoke(&token).await.unwrap();
        assert_eq!(credentials.resolve(&token).await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_tokens_do_not_resolve() {
        let db_pool = testutil::pool().await;
        let user = testutil::user(&db_pool, Role::Attendee).await;
        let credentials = SqliteCredentials::new(db_pool, time::Duration::seconds(-1));

        let token = credentials.issue(user.id).await.unwrap();
        assert_eq!(credentials.resolve(&token).await.unwrap(), None);
    }
}
