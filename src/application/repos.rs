//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::application::pagination::{
    AuditCursor, CursorPage, PageRequest, PaginationError, VehicleCursor,
};
use crate::domain::api_keys::ApiKeyRecord;
use crate::domain::entities::{AuditLogRecord, IncidentRecord, VehicleRecord};
use crate::domain::{Region, Role, VorState};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
    #[error(transparent)]
    Pagination(#[from] PaginationError),
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VehicleQueryFilter {
    pub region: Option<Region>,
    pub state: Option<VorState>,
    pub search: Option<String>,
}

/// A vehicle row joined with its most recent incident, enough to derive status.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleListRow {
    pub vehicle: VehicleRecord,
    pub latest_incident: Option<IncidentRecord>,
}

/// Fleet-wide write counter. Every vehicle or incident write advances it
/// inside its own transaction, so it moves in commit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionVersion(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionCounts {
    pub region: Region,
    pub total: u64,
    pub off_road: u64,
}

#[derive(Debug, Clone)]
pub struct CreateVehicleParams {
    pub registration: String,
    pub call_sign: Option<String>,
    pub make: String,
    pub model: String,
    pub body_type: Option<String>,
    pub fleet_number: Option<String>,
    pub region: Region,
    pub district: Option<String>,
    pub hub: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpdateVehicleParams {
    pub id: Uuid,
    pub registration: String,
    pub call_sign: Option<String>,
    pub make: String,
    pub model: String,
    pub body_type: Option<String>,
    pub fleet_number: Option<String>,
    pub region: Region,
    pub district: Option<String>,
    pub hub: Option<String>,
}

#[async_trait]
pub trait VehiclesRepo: Send + Sync {
    async fn list_vehicles(
        &self,
        filter: &VehicleQueryFilter,
        page: PageRequest<VehicleCursor>,
    ) -> Result<CursorPage<VehicleListRow>, RepoError>;

    /// Live (non-deleted) vehicle by id.
    async fn find_vehicle(&self, id: Uuid) -> Result<Option<VehicleRecord>, RepoError>;

    async fn find_by_registration(
        &self,
        registration: &str,
    ) -> Result<Option<VehicleRecord>, RepoError>;

    /// `updated_at` of a live vehicle, without loading the row.
    async fn vehicle_version(&self, id: Uuid) -> Result<Option<OffsetDateTime>, RepoError>;

    async fn collection_version(&self) -> Result<CollectionVersion, RepoError>;

    async fn region_counts(&self, region: Option<Region>) -> Result<Vec<RegionCounts>, RepoError>;

    async fn create_vehicle(&self, params: CreateVehicleParams)
    -> Result<VehicleRecord, RepoError>;

    async fn update_vehicle(&self, params: UpdateVehicleParams)
    -> Result<VehicleRecord, RepoError>;

    async fn soft_delete_vehicle(&self, id: Uuid) -> Result<VehicleRecord, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateIncidentParams {
    pub vehicle_id: Uuid,
    pub start_date: Date,
    pub end_date: Option<Date>,
    pub estimated_return: Option<Date>,
    pub description: String,
    pub comments: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpdateIncidentParams {
    pub id: Uuid,
    pub start_date: Date,
    pub end_date: Option<Date>,
    pub estimated_return: Option<Date>,
    pub description: String,
    pub comments: Option<String>,
}

/// Every write here also advances the owning vehicle's `updated_at` in the
/// same transaction.
#[async_trait]
pub trait IncidentsRepo: Send + Sync {
    /// Most recent first.
    async fn list_for_vehicle(&self, vehicle_id: Uuid) -> Result<Vec<IncidentRecord>, RepoError>;

    async fn latest_for_vehicle(
        &self,
        vehicle_id: Uuid,
    ) -> Result<Option<IncidentRecord>, RepoError>;

    async fn find_incident(&self, id: Uuid) -> Result<Option<IncidentRecord>, RepoError>;

    async fn create_incident(
        &self,
        params: CreateIncidentParams,
    ) -> Result<IncidentRecord, RepoError>;

    async fn update_incident(
        &self,
        params: UpdateIncidentParams,
    ) -> Result<IncidentRecord, RepoError>;

    async fn delete_incident(&self, id: Uuid) -> Result<IncidentRecord, RepoError>;
}

#[derive(Debug, Clone, Default)]
pub struct AuditQueryFilter {
    pub actor: Option<String>,
    pub action: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
}

#[async_trait]
pub trait AuditRepo: Send + Sync {
    async fn append_log(&self, record: AuditLogRecord) -> Result<(), RepoError>;

    async fn list_filtered(
        &self,
        page: PageRequest<AuditCursor>,
        filter: &AuditQueryFilter,
    ) -> Result<CursorPage<AuditLogRecord>, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateApiKeyParams {
    pub name: String,
    pub description: Option<String>,
    pub prefix: String,
    pub hashed_secret: Vec<u8>,
    pub roles: Vec<Role>,
    pub expires_at: Option<OffsetDateTime>,
    pub created_by: String,
}

#[async_trait]
pub trait ApiKeysRepo: Send + Sync {
    async fn create_key(&self, params: CreateApiKeyParams) -> Result<ApiKeyRecord, RepoError>;

    async fn list_keys(&self) -> Result<Vec<ApiKeyRecord>, RepoError>;

    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<ApiKeyRecord>, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ApiKeyRecord>, RepoError>;

    async fn revoke_key(&self, id: Uuid, revoked_at: OffsetDateTime) -> Result<(), RepoError>;

    async fn update_last_used(
        &self,
        id: Uuid,
        last_used_at: OffsetDateTime,
    ) -> Result<(), RepoError>;
}

#[async_trait]
pub trait HealthRepo: Send + Sync {
    async fn ping(&self) -> Result<(), RepoError>;
}
