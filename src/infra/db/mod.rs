//! Postgres-backed repository implementations.

mod api_keys;
mod audit;
mod incidents;
mod util;
mod vehicles;

pub use util::map_sqlx_error;
pub(crate) use util::escape_like;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{
    Postgres, Transaction,
    postgres::{PgPool, PgPoolOptions},
    query,
};

use crate::application::repos::{HealthRepo, RepoError};

/// Advances `updated_at` strictly, even when two writes share a clock tick.
pub(crate) const BUMP_UPDATED_AT: &str =
    "GREATEST(now(), updated_at + interval '1 microsecond')";

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn begin(&self) -> Result<Transaction<'_, Postgres>, sqlx::Error> {
        self.pool.begin().await
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    /// Advance the fleet-wide version inside a write's transaction. Call it as
    /// the last statement before commit: the row lock then orders increments
    /// the same way as commits and is always taken after any vehicle lock.
    pub(crate) async fn bump_fleet_version(
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<(), RepoError> {
        query("UPDATE fleet_version SET version = version + 1")
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    fn convert_count(value: i64) -> Result<u64, RepoError> {
        value
            .try_into()
            .map_err(|_| RepoError::from_persistence("count exceeds supported range"))
    }
}

#[async_trait]
impl HealthRepo for PostgresRepositories {
    async fn ping(&self) -> Result<(), RepoError> {
        self.health_check().await.map_err(map_sqlx_error)
    }
}
