//! Postgres pool wiring and embedded migrations shared by every
//! storage-backed engine crate. Domain queries live beside the domain logic
//! that owns them (`fxt-candles`, `fxt-execution`, `fxt-accounting`, ...);
//! this crate only owns the connection, the migration series, and the
//! handful of helpers (unique-violation detection) every one of them needs.

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;

pub use sqlx::{PgPool, Postgres, Row, Transaction};

pub const ENV_DB_URL: &str = "DATABASE_URL";

/// Connect to Postgres using `DATABASE_URL`.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url).await
}

pub async fn connect(url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("failed to connect to Postgres")
}

/// Run the embedded migration series. Safe to call repeatedly; sqlx tracks
/// applied versions in its own bookkeeping table.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

/// Connect + migrate in one call, the shape every test harness and the
/// daemon entrypoint actually wants.
pub async fn connect_and_migrate_from_env() -> Result<PgPool> {
    let pool = connect_from_env().await?;
    migrate(&pool).await?;
    Ok(pool)
}

/// Detect a Postgres unique-violation (`23505`), optionally narrowed to a
/// named constraint. Used to turn a race on an idempotent insert into the
/// "someone else already wrote this row" branch instead of a hard error.
pub fn is_unique_violation(err: &sqlx::Error, constraint: Option<&str>) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some("23505")
                && constraint.map(|c| db_err.constraint() == Some(c)).unwrap_or(true)
        }
        _ => false,
    }
}

/// Basic connectivity probe, used by the control surface's health endpoint.
pub async fn ping(pool: &PgPool) -> Result<()> {
    sqlx::query("select 1").execute(pool).await.context("db ping failed")?;
    Ok(())
}
