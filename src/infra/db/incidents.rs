use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::application::repos::{
    CreateIncidentParams, IncidentsRepo, RepoError, UpdateIncidentParams,
};
use crate::domain::entities::IncidentRecord;

use super::{BUMP_UPDATED_AT, PostgresRepositories, map_sqlx_error};

const INCIDENT_COLUMNS: &str = "id, vehicle_id, start_date, end_date, estimated_return, \
    description, comments, created_at, updated_at";

const RECENT_FIRST: &str = "ORDER BY start_date DESC, created_at DESC, id DESC";

#[derive(sqlx::FromRow)]
struct IncidentRow {
    id: Uuid,
    vehicle_id: Uuid,
    start_date: Date,
    end_date: Option<Date>,
    estimated_return: Option<Date>,
    description: String,
    comments: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<IncidentRow> for IncidentRecord {
    fn from(row: IncidentRow) -> Self {
        Self {
            id: row.id,
            vehicle_id: row.vehicle_id,
            start_date: row.start_date,
            end_date: row.end_date,
            estimated_return: row.estimated_return,
            description: row.description,
            comments: row.comments,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl PostgresRepositories {
    /// Advance the owning vehicle's version inside the incident write's
    /// transaction. A soft-deleted vehicle yields `NotFound`; the caller drops
    /// the transaction, which rolls the incident write back.
    async fn bump_vehicle(
        tx: &mut Transaction<'_, Postgres>,
        vehicle_id: Uuid,
    ) -> Result<(), RepoError> {
        let sql = format!(
            "UPDATE vehicles SET updated_at = {BUMP_UPDATED_AT} \
             WHERE id = $1 AND deleted_at IS NULL"
        );
        let result = sqlx::query(&sql)
            .bind(vehicle_id)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl IncidentsRepo for PostgresRepositories {
    async fn list_for_vehicle(&self, vehicle_id: Uuid) -> Result<Vec<IncidentRecord>, RepoError> {
        let sql =
            format!("SELECT {INCIDENT_COLUMNS} FROM incidents WHERE vehicle_id = $1 {RECENT_FIRST}");
        let rows = sqlx::query_as::<_, IncidentRow>(&sql)
            .bind(vehicle_id)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(IncidentRecord::from).collect())
    }

    async fn latest_for_vehicle(
        &self,
        vehicle_id: Uuid,
    ) -> Result<Option<IncidentRecord>, RepoError> {
        let sql = format!(
            "SELECT {INCIDENT_COLUMNS} FROM incidents WHERE vehicle_id = $1 {RECENT_FIRST} LIMIT 1"
        );
        let row = sqlx::query_as::<_, IncidentRow>(&sql)
            .bind(vehicle_id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(IncidentRecord::from))
    }

    async fn find_incident(&self, id: Uuid) -> Result<Option<IncidentRecord>, RepoError> {
        let sql = format!("SELECT {INCIDENT_COLUMNS} FROM incidents WHERE id = $1");
        let row = sqlx::query_as::<_, IncidentRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(IncidentRecord::from))
    }

    async fn create_incident(
        &self,
        params: CreateIncidentParams,
    ) -> Result<IncidentRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        Self::bump_vehicle(&mut tx, params.vehicle_id).await?;

        let sql = format!(
            "INSERT INTO incidents (id, vehicle_id, start_date, end_date, estimated_return, \
             description, comments) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {INCIDENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, IncidentRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(params.vehicle_id)
            .bind(params.start_date)
            .bind(params.end_date)
            .bind(params.estimated_return)
            .bind(params.description)
            .bind(params.comments)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        Self::bump_fleet_version(&mut tx).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn update_incident(
        &self,
        params: UpdateIncidentParams,
    ) -> Result<IncidentRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let sql = format!(
            "UPDATE incidents SET start_date = $2, end_date = $3, estimated_return = $4, \
             description = $5, comments = $6, updated_at = {BUMP_UPDATED_AT} \
             WHERE id = $1 \
             RETURNING {INCIDENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, IncidentRow>(&sql)
            .bind(params.id)
            .bind(params.start_date)
            .bind(params.end_date)
            .bind(params.estimated_return)
            .bind(params.description)
            .bind(params.comments)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .ok_or(RepoError::NotFound)?;

        Self::bump_vehicle(&mut tx, row.vehicle_id).await?;
        Self::bump_fleet_version(&mut tx).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn delete_incident(&self, id: Uuid) -> Result<IncidentRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let sql = format!("DELETE FROM incidents WHERE id = $1 RETURNING {INCIDENT_COLUMNS}");
        let row = sqlx::query_as::<_, IncidentRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .ok_or(RepoError::NotFound)?;

        Self::bump_vehicle(&mut tx, row.vehicle_id).await?;
        Self::bump_fleet_version(&mut tx).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(row.into())
    }
}
