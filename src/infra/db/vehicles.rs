use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::application::pagination::{CursorPage, PageRequest, VehicleCursor};
use crate::application::repos::{
    CollectionVersion, CreateVehicleParams, RegionCounts, RepoError, UpdateVehicleParams,
    VehicleListRow, VehicleQueryFilter, VehiclesRepo,
};
use crate::domain::entities::{IncidentRecord, VehicleRecord};
use crate::domain::{Region, VorState};

use super::{BUMP_UPDATED_AT, PostgresRepositories, escape_like, map_sqlx_error};

const VEHICLE_COLUMNS: &str = "id, registration, call_sign, make, model, body_type, \
    fleet_number, region, district, hub, created_at, updated_at, deleted_at";

const LATEST_INCIDENT_JOIN: &str = " LEFT JOIN LATERAL ( \
        SELECT i.id, i.vehicle_id, i.start_date, i.end_date, i.estimated_return, \
               i.description, i.comments, i.created_at, i.updated_at \
        FROM incidents i \
        WHERE i.vehicle_id = v.id \
        ORDER BY i.start_date DESC, i.created_at DESC, i.id DESC \
        LIMIT 1 \
    ) li ON TRUE ";

const OFF_ROAD_EXPR: &str = "(li.id IS NOT NULL AND li.end_date IS NULL)";

#[derive(sqlx::FromRow)]
struct VehicleRow {
    id: Uuid,
    registration: String,
    call_sign: Option<String>,
    make: String,
    model: String,
    body_type: Option<String>,
    fleet_number: Option<String>,
    region: Region,
    district: Option<String>,
    hub: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
    deleted_at: Option<OffsetDateTime>,
}

impl From<VehicleRow> for VehicleRecord {
    fn from(row: VehicleRow) -> Self {
        Self {
            id: row.id,
            registration: row.registration,
            call_sign: row.call_sign,
            make: row.make,
            model: row.model,
            body_type: row.body_type,
            fleet_number: row.fleet_number,
            region: row.region,
            district: row.district,
            hub: row.hub,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct VehicleListSqlRow {
    #[sqlx(flatten)]
    vehicle: VehicleRow,
    incident_id: Option<Uuid>,
    incident_start_date: Option<Date>,
    incident_end_date: Option<Date>,
    incident_estimated_return: Option<Date>,
    incident_description: Option<String>,
    incident_comments: Option<String>,
    incident_created_at: Option<OffsetDateTime>,
    incident_updated_at: Option<OffsetDateTime>,
}

impl From<VehicleListSqlRow> for VehicleListRow {
    fn from(row: VehicleListSqlRow) -> Self {
        let vehicle = VehicleRecord::from(row.vehicle);
        let latest_incident = match (
            row.incident_id,
            row.incident_start_date,
            row.incident_description,
            row.incident_created_at,
            row.incident_updated_at,
        ) {
            (Some(id), Some(start_date), Some(description), Some(created_at), Some(updated_at)) => {
                Some(IncidentRecord {
                    id,
                    vehicle_id: vehicle.id,
                    start_date,
                    end_date: row.incident_end_date,
                    estimated_return: row.incident_estimated_return,
                    description,
                    comments: row.incident_comments,
                    created_at,
                    updated_at,
                })
            }
            _ => None,
        };
        Self {
            vehicle,
            latest_incident,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RegionCountRow {
    region: Region,
    total: i64,
    off_road: i64,
}

impl PostgresRepositories {
    fn push_vehicle_filter<'q>(qb: &mut QueryBuilder<'q, Postgres>, filter: &'q VehicleQueryFilter) {
        if let Some(region) = filter.region {
            qb.push(" AND v.region = ");
            qb.push_bind(region);
        }

        match filter.state {
            Some(VorState::OffRoad) => {
                qb.push(" AND ");
                qb.push(OFF_ROAD_EXPR);
            }
            Some(VorState::Available) => {
                qb.push(" AND NOT ");
                qb.push(OFF_ROAD_EXPR);
            }
            None => {}
        }

        if let Some(search) = filter.search.as_ref().filter(|s| !s.trim().is_empty()) {
            let pattern = format!("%{}%", escape_like(search.trim()));
            qb.push(" AND (v.registration ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR COALESCE(v.call_sign, '') ILIKE ");
            qb.push_bind(pattern);
            qb.push(")");
        }
    }
}

#[async_trait]
impl VehiclesRepo for PostgresRepositories {
    async fn list_vehicles(
        &self,
        filter: &VehicleQueryFilter,
        page: PageRequest<VehicleCursor>,
    ) -> Result<CursorPage<VehicleListRow>, RepoError> {
        let limit = page.limit;
        let mut qb = QueryBuilder::new(
            "SELECT v.id, v.registration, v.call_sign, v.make, v.model, v.body_type, \
             v.fleet_number, v.region, v.district, v.hub, v.created_at, v.updated_at, v.deleted_at, \
             li.id AS incident_id, li.start_date AS incident_start_date, \
             li.end_date AS incident_end_date, li.estimated_return AS incident_estimated_return, \
             li.description AS incident_description, li.comments AS incident_comments, \
             li.created_at AS incident_created_at, li.updated_at AS incident_updated_at \
             FROM vehicles v",
        );
        qb.push(LATEST_INCIDENT_JOIN);
        qb.push(" WHERE v.deleted_at IS NULL ");
        Self::push_vehicle_filter(&mut qb, filter);

        if let Some(cursor) = page.cursor.as_ref() {
            qb.push(" AND (v.registration, v.id) > (");
            qb.push_bind(cursor.registration().to_string());
            qb.push(", ");
            qb.push_bind(cursor.id());
            qb.push(")");
        }

        qb.push(" ORDER BY v.registration ASC, v.id ASC LIMIT ");
        qb.push_bind(i64::from(limit));

        let rows = qb
            .build_query_as::<VehicleListSqlRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let items: Vec<VehicleListRow> = rows.into_iter().map(VehicleListRow::from).collect();
        let next_cursor = if items.len() as u32 == limit {
            items
                .last()
                .map(|row| VehicleCursor::new(&row.vehicle.registration, row.vehicle.id).encode())
        } else {
            None
        };

        Ok(CursorPage::new(items, next_cursor))
    }

    async fn find_vehicle(&self, id: Uuid) -> Result<Option<VehicleRecord>, RepoError> {
        let sql =
            format!("SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE id = $1 AND deleted_at IS NULL");
        let row = sqlx::query_as::<_, VehicleRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(VehicleRecord::from))
    }

    async fn find_by_registration(
        &self,
        registration: &str,
    ) -> Result<Option<VehicleRecord>, RepoError> {
        let sql = format!(
            "SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE registration = $1 AND deleted_at IS NULL"
        );
        let row = sqlx::query_as::<_, VehicleRow>(&sql)
            .bind(registration)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(VehicleRecord::from))
    }

    async fn vehicle_version(&self, id: Uuid) -> Result<Option<OffsetDateTime>, RepoError> {
        sqlx::query_scalar::<_, OffsetDateTime>(
            "SELECT updated_at FROM vehicles WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn collection_version(&self) -> Result<CollectionVersion, RepoError> {
        let version = sqlx::query_scalar::<_, i64>("SELECT version FROM fleet_version")
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(CollectionVersion(Self::convert_count(version)?))
    }

    async fn region_counts(&self, region: Option<Region>) -> Result<Vec<RegionCounts>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT v.region, COUNT(*) AS total, ");
        qb.push("COUNT(*) FILTER (WHERE ");
        qb.push(OFF_ROAD_EXPR);
        qb.push(") AS off_road FROM vehicles v");
        qb.push(LATEST_INCIDENT_JOIN);
        qb.push(" WHERE v.deleted_at IS NULL ");
        if let Some(region) = region {
            qb.push(" AND v.region = ");
            qb.push_bind(region);
        }
        qb.push(" GROUP BY v.region");

        let rows = qb
            .build_query_as::<RegionCountRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| {
                Ok(RegionCounts {
                    region: row.region,
                    total: Self::convert_count(row.total)?,
                    off_road: Self::convert_count(row.off_road)?,
                })
            })
            .collect()
    }

    async fn create_vehicle(
        &self,
        params: CreateVehicleParams,
    ) -> Result<VehicleRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        let sql = format!(
            "INSERT INTO vehicles (id, registration, call_sign, make, model, body_type, \
             fleet_number, region, district, hub) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {VEHICLE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, VehicleRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(params.registration)
            .bind(params.call_sign)
            .bind(params.make)
            .bind(params.model)
            .bind(params.body_type)
            .bind(params.fleet_number)
            .bind(params.region)
            .bind(params.district)
            .bind(params.hub)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        Self::bump_fleet_version(&mut tx).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn update_vehicle(
        &self,
        params: UpdateVehicleParams,
    ) -> Result<VehicleRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        let sql = format!(
            "UPDATE vehicles SET registration = $2, call_sign = $3, make = $4, model = $5, \
             body_type = $6, fleet_number = $7, region = $8, district = $9, hub = $10, \
             updated_at = {BUMP_UPDATED_AT} \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING {VEHICLE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, VehicleRow>(&sql)
            .bind(params.id)
            .bind(params.registration)
            .bind(params.call_sign)
            .bind(params.make)
            .bind(params.model)
            .bind(params.body_type)
            .bind(params.fleet_number)
            .bind(params.region)
            .bind(params.district)
            .bind(params.hub)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .ok_or(RepoError::NotFound)?;

        Self::bump_fleet_version(&mut tx).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn soft_delete_vehicle(&self, id: Uuid) -> Result<VehicleRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        let sql = format!(
            "UPDATE vehicles SET deleted_at = now(), updated_at = {BUMP_UPDATED_AT} \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING {VEHICLE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, VehicleRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .ok_or(RepoError::NotFound)?;

        Self::bump_fleet_version(&mut tx).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(row.into())
    }
}
