use std::str::FromStr;

use sqlx::{
    error::ErrorKind,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};

use crate::AppResult;

pub async fn connect(database_url: &str, max_connections: u32) -> AppResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    let db_pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;
    Ok(db_pool)
}

pub async fn migrate(db_pool: &SqlitePool) -> AppResult<()> {
    sqlx::migrate!("./migrations").run(db_pool).await?;
    Ok(())
}

/// Which constraint, if any, a failed statement tripped over.
pub(crate) fn violation(err: &sqlx::Error) -> Option<ErrorKind> {
    err.as_database_error()
        .map(|db_err| db_err.kind())
        .filter(|kind| !matches!(kind, ErrorKind::Other))
}

pub(crate) fn now() -> time::OffsetDateTime {
    time::OffsetDateTime::now_utc()
}
