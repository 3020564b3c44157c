//! In-memory store implementing every repository trait, plus router helpers.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, Response};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tower::ServiceExt;
use uuid::Uuid;

use vor::application::api_keys::IssueApiKeyCommand;
use vor::application::pagination::{AuditCursor, CursorPage, PageRequest, VehicleCursor};
use vor::application::repos::{
    ApiKeysRepo, AuditQueryFilter, AuditRepo, CollectionVersion, CreateApiKeyParams,
    CreateIncidentParams, CreateVehicleParams, HealthRepo, IncidentsRepo, RegionCounts,
    RepoError, UpdateIncidentParams, UpdateVehicleParams, VehicleListRow, VehicleQueryFilter,
    VehiclesRepo,
};
use vor::domain::api_keys::ApiKeyRecord;
use vor::domain::claims::ClaimNames;
use vor::domain::entities::{AuditLogRecord, IncidentRecord, VehicleRecord};
use vor::domain::status::{current_status, most_recent};
use vor::domain::{Region, Role};
use vor::infra::http::{self, ApiRateLimiter, ApiState};

#[derive(Default)]
struct Tables {
    vehicles: Vec<VehicleRecord>,
    incidents: Vec<IncidentRecord>,
    audit: Vec<AuditLogRecord>,
    keys: Vec<ApiKeyRecord>,
    last_write: Option<OffsetDateTime>,
    fleet_version: u64,
}

impl Tables {
    /// Strictly increasing write timestamp, mirroring the SQL bump.
    fn tick(&mut self) -> OffsetDateTime {
        let now = OffsetDateTime::now_utc();
        let next = match self.last_write {
            Some(last) if now <= last => last + Duration::from_micros(1),
            _ => now,
        };
        self.last_write = Some(next);
        next
    }

    fn is_active(&self, vehicle_id: Uuid) -> bool {
        self.vehicles
            .iter()
            .any(|vehicle| vehicle.id == vehicle_id && vehicle.deleted_at.is_none())
    }

    fn active_vehicle_mut(&mut self, id: Uuid) -> Option<&mut VehicleRecord> {
        self.vehicles
            .iter_mut()
            .find(|vehicle| vehicle.id == id && vehicle.deleted_at.is_none())
    }

    fn bump_vehicle(&mut self, id: Uuid) {
        let at = self.tick();
        if let Some(vehicle) = self.active_vehicle_mut(id) {
            vehicle.updated_at = at;
        }
        self.fleet_version += 1;
    }

    fn incidents_of(&self, vehicle_id: Uuid) -> impl Iterator<Item = &IncidentRecord> {
        self.incidents
            .iter()
            .filter(move |incident| incident.vehicle_id == vehicle_id)
    }

    fn registration_taken(&self, registration: &str, except: Option<Uuid>) -> bool {
        self.vehicles.iter().any(|vehicle| {
            vehicle.deleted_at.is_none()
                && vehicle.registration == registration
                && Some(vehicle.id) != except
        })
    }
}

/// Shared in-memory backend. Payload-side reads are counted so tests can
/// assert that a 304 never materialised the body.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    payload_reads: AtomicUsize,
}

impl MemoryStore {
    pub fn payload_reads(&self) -> usize {
        self.payload_reads.load(Ordering::SeqCst)
    }

    fn note_payload_read(&self) {
        self.payload_reads.fetch_add(1, Ordering::SeqCst);
    }

    pub async fn audit_actions(&self) -> Vec<String> {
        self.tables
            .lock()
            .await
            .audit
            .iter()
            .map(|entry| entry.action.clone())
            .collect()
    }
}

fn duplicate() -> RepoError {
    RepoError::Duplicate {
        constraint: "vehicles_registration_active_key".to_string(),
    }
}

#[async_trait]
impl VehiclesRepo for MemoryStore {
    async fn list_vehicles(
        &self,
        filter: &VehicleQueryFilter,
        page: PageRequest<VehicleCursor>,
    ) -> Result<CursorPage<VehicleListRow>, RepoError> {
        self.note_payload_read();
        let tables = self.tables.lock().await;
        let search = filter
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let mut rows: Vec<VehicleListRow> = tables
            .vehicles
            .iter()
            .filter(|vehicle| vehicle.deleted_at.is_none())
            .filter(|vehicle| filter.region.is_none_or(|region| vehicle.region == region))
            .filter(|vehicle| {
                search.as_deref().is_none_or(|needle| {
                    vehicle.registration.to_lowercase().contains(needle)
                        || vehicle
                            .call_sign
                            .as_deref()
                            .is_some_and(|call_sign| call_sign.to_lowercase().contains(needle))
                })
            })
            .map(|vehicle| VehicleListRow {
                vehicle: vehicle.clone(),
                latest_incident: most_recent(tables.incidents_of(vehicle.id)).cloned(),
            })
            .filter(|row| {
                filter.state.is_none_or(|state| {
                    current_status(row.latest_incident.as_ref()).state == state
                })
            })
            .filter(|row| {
                page.cursor.as_ref().is_none_or(|cursor| {
                    (row.vehicle.registration.as_str(), row.vehicle.id)
                        > (cursor.registration(), cursor.id())
                })
            })
            .collect();

        rows.sort_by(|a, b| {
            (a.vehicle.registration.as_str(), a.vehicle.id)
                .cmp(&(b.vehicle.registration.as_str(), b.vehicle.id))
        });
        rows.truncate(page.limit as usize);

        let next_cursor = if rows.len() == page.limit as usize {
            rows.last()
                .map(|row| VehicleCursor::new(&row.vehicle.registration, row.vehicle.id).encode())
        } else {
            None
        };
        Ok(CursorPage::new(rows, next_cursor))
    }

    async fn find_vehicle(&self, id: Uuid) -> Result<Option<VehicleRecord>, RepoError> {
        self.note_payload_read();
        let tables = self.tables.lock().await;
        Ok(tables
            .vehicles
            .iter()
            .find(|vehicle| vehicle.id == id && vehicle.deleted_at.is_none())
            .cloned())
    }

    async fn find_by_registration(
        &self,
        registration: &str,
    ) -> Result<Option<VehicleRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .vehicles
            .iter()
            .find(|vehicle| vehicle.registration == registration && vehicle.deleted_at.is_none())
            .cloned())
    }

    async fn vehicle_version(&self, id: Uuid) -> Result<Option<OffsetDateTime>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .vehicles
            .iter()
            .find(|vehicle| vehicle.id == id && vehicle.deleted_at.is_none())
            .map(|vehicle| vehicle.updated_at))
    }

    async fn collection_version(&self) -> Result<CollectionVersion, RepoError> {
        let tables = self.tables.lock().await;
        Ok(CollectionVersion(tables.fleet_version))
    }

    async fn region_counts(&self, region: Option<Region>) -> Result<Vec<RegionCounts>, RepoError> {
        self.note_payload_read();
        let tables = self.tables.lock().await;
        let mut counts: Vec<RegionCounts> = Vec::new();
        for vehicle in tables.vehicles.iter().filter(|vehicle| {
            vehicle.deleted_at.is_none() && region.is_none_or(|wanted| vehicle.region == wanted)
        }) {
            let off_road = current_status(tables.incidents_of(vehicle.id)).is_off_road();
            match counts.iter_mut().find(|row| row.region == vehicle.region) {
                Some(row) => {
                    row.total += 1;
                    row.off_road += u64::from(off_road);
                }
                None => counts.push(RegionCounts {
                    region: vehicle.region,
                    total: 1,
                    off_road: u64::from(off_road),
                }),
            }
        }
        Ok(counts)
    }

    async fn create_vehicle(
        &self,
        params: CreateVehicleParams,
    ) -> Result<VehicleRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        if tables.registration_taken(&params.registration, None) {
            return Err(duplicate());
        }
        let now = tables.tick();
        let record = VehicleRecord {
            id: Uuid::new_v4(),
            registration: params.registration,
            call_sign: params.call_sign,
            make: params.make,
            model: params.model,
            body_type: params.body_type,
            fleet_number: params.fleet_number,
            region: params.region,
            district: params.district,
            hub: params.hub,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        tables.vehicles.push(record.clone());
        tables.fleet_version += 1;
        Ok(record)
    }

    async fn update_vehicle(
        &self,
        params: UpdateVehicleParams,
    ) -> Result<VehicleRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        if tables.active_vehicle_mut(params.id).is_none() {
            return Err(RepoError::NotFound);
        }
        if tables.registration_taken(&params.registration, Some(params.id)) {
            return Err(duplicate());
        }
        let now = tables.tick();
        let vehicle = tables
            .active_vehicle_mut(params.id)
            .ok_or(RepoError::NotFound)?;
        vehicle.registration = params.registration;
        vehicle.call_sign = params.call_sign;
        vehicle.make = params.make;
        vehicle.model = params.model;
        vehicle.body_type = params.body_type;
        vehicle.fleet_number = params.fleet_number;
        vehicle.region = params.region;
        vehicle.district = params.district;
        vehicle.hub = params.hub;
        vehicle.updated_at = now;
        let updated = vehicle.clone();
        tables.fleet_version += 1;
        Ok(updated)
    }

    async fn soft_delete_vehicle(&self, id: Uuid) -> Result<VehicleRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        let now = tables.tick();
        let vehicle = tables.active_vehicle_mut(id).ok_or(RepoError::NotFound)?;
        vehicle.deleted_at = Some(now);
        vehicle.updated_at = now;
        let deleted = vehicle.clone();
        tables.fleet_version += 1;
        Ok(deleted)
    }
}

#[async_trait]
impl IncidentsRepo for MemoryStore {
    async fn list_for_vehicle(&self, vehicle_id: Uuid) -> Result<Vec<IncidentRecord>, RepoError> {
        self.note_payload_read();
        let tables = self.tables.lock().await;
        let mut incidents: Vec<IncidentRecord> = tables.incidents_of(vehicle_id).cloned().collect();
        incidents.sort_by(|a, b| {
            (b.start_date, b.created_at, b.id).cmp(&(a.start_date, a.created_at, a.id))
        });
        Ok(incidents)
    }

    async fn latest_for_vehicle(
        &self,
        vehicle_id: Uuid,
    ) -> Result<Option<IncidentRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(most_recent(tables.incidents_of(vehicle_id)).cloned())
    }

    async fn find_incident(&self, id: Uuid) -> Result<Option<IncidentRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .incidents
            .iter()
            .find(|incident| incident.id == id)
            .cloned())
    }

    async fn create_incident(
        &self,
        params: CreateIncidentParams,
    ) -> Result<IncidentRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        if !tables.is_active(params.vehicle_id) {
            return Err(RepoError::NotFound);
        }
        tables.bump_vehicle(params.vehicle_id);
        let now = tables.tick();
        let record = IncidentRecord {
            id: Uuid::new_v4(),
            vehicle_id: params.vehicle_id,
            start_date: params.start_date,
            end_date: params.end_date,
            estimated_return: params.estimated_return,
            description: params.description,
            comments: params.comments,
            created_at: now,
            updated_at: now,
        };
        tables.incidents.push(record.clone());
        Ok(record)
    }

    async fn update_incident(
        &self,
        params: UpdateIncidentParams,
    ) -> Result<IncidentRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        let vehicle_id = tables
            .incidents
            .iter()
            .find(|incident| incident.id == params.id)
            .map(|incident| incident.vehicle_id)
            .ok_or(RepoError::NotFound)?;
        if !tables.is_active(vehicle_id) {
            return Err(RepoError::NotFound);
        }
        let now = tables.tick();
        let incident = tables
            .incidents
            .iter_mut()
            .find(|incident| incident.id == params.id)
            .ok_or(RepoError::NotFound)?;
        incident.start_date = params.start_date;
        incident.end_date = params.end_date;
        incident.estimated_return = params.estimated_return;
        incident.description = params.description;
        incident.comments = params.comments;
        incident.updated_at = now;
        let updated = incident.clone();
        tables.bump_vehicle(updated.vehicle_id);
        Ok(updated)
    }

    async fn delete_incident(&self, id: Uuid) -> Result<IncidentRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        let position = tables
            .incidents
            .iter()
            .position(|incident| incident.id == id)
            .ok_or(RepoError::NotFound)?;
        if !tables.is_active(tables.incidents[position].vehicle_id) {
            return Err(RepoError::NotFound);
        }
        let removed = tables.incidents.remove(position);
        tables.bump_vehicle(removed.vehicle_id);
        Ok(removed)
    }
}

#[async_trait]
impl AuditRepo for MemoryStore {
    async fn append_log(&self, record: AuditLogRecord) -> Result<(), RepoError> {
        self.tables.lock().await.audit.push(record);
        Ok(())
    }

    async fn list_filtered(
        &self,
        page: PageRequest<AuditCursor>,
        filter: &AuditQueryFilter,
    ) -> Result<CursorPage<AuditLogRecord>, RepoError> {
        let tables = self.tables.lock().await;
        let mut entries: Vec<AuditLogRecord> = tables
            .audit
            .iter()
            .filter(|entry| filter.action.as_ref().is_none_or(|a| &entry.action == a))
            .filter(|entry| {
                filter
                    .entity_type
                    .as_ref()
                    .is_none_or(|t| &entry.entity_type == t)
            })
            .filter(|entry| {
                filter
                    .entity_id
                    .as_ref()
                    .is_none_or(|id| entry.entity_id.as_ref() == Some(id))
            })
            .filter(|entry| {
                filter
                    .actor
                    .as_ref()
                    .is_none_or(|actor| entry.actor.contains(actor.as_str()))
            })
            .filter(|entry| {
                page.cursor.as_ref().is_none_or(|cursor| {
                    (entry.created_at, entry.id) < (cursor.created_at(), cursor.id())
                })
            })
            .cloned()
            .collect();
        entries.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        entries.truncate(page.limit as usize);

        let next_cursor = if entries.len() == page.limit as usize {
            entries
                .last()
                .map(|entry| AuditCursor::new(entry.created_at, entry.id).encode())
        } else {
            None
        };
        Ok(CursorPage::new(entries, next_cursor))
    }
}

#[async_trait]
impl ApiKeysRepo for MemoryStore {
    async fn create_key(&self, params: CreateApiKeyParams) -> Result<ApiKeyRecord, RepoError> {
        let record = ApiKeyRecord {
            id: Uuid::new_v4(),
            name: params.name,
            description: params.description,
            prefix: params.prefix,
            hashed_secret: params.hashed_secret,
            roles: params.roles,
            expires_at: params.expires_at,
            revoked_at: None,
            last_used_at: None,
            created_by: params.created_by,
            created_at: OffsetDateTime::now_utc(),
        };
        self.tables.lock().await.keys.push(record.clone());
        Ok(record)
    }

    async fn list_keys(&self) -> Result<Vec<ApiKeyRecord>, RepoError> {
        Ok(self.tables.lock().await.keys.clone())
    }

    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<ApiKeyRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables.keys.iter().find(|key| key.prefix == prefix).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ApiKeyRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables.keys.iter().find(|key| key.id == id).cloned())
    }

    async fn revoke_key(&self, id: Uuid, revoked_at: OffsetDateTime) -> Result<(), RepoError> {
        let mut tables = self.tables.lock().await;
        let key = tables
            .keys
            .iter_mut()
            .find(|key| key.id == id)
            .ok_or(RepoError::NotFound)?;
        key.revoked_at.get_or_insert(revoked_at);
        Ok(())
    }

    async fn update_last_used(
        &self,
        id: Uuid,
        last_used_at: OffsetDateTime,
    ) -> Result<(), RepoError> {
        let mut tables = self.tables.lock().await;
        if let Some(key) = tables.keys.iter_mut().find(|key| key.id == id) {
            key.last_used_at = Some(last_used_at);
        }
        Ok(())
    }
}

#[async_trait]
impl HealthRepo for MemoryStore {
    async fn ping(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

/// Router, state and backing store for one test.
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub state: ApiState,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_limit(1_000)
    }

    pub fn with_limit(max_requests: u32) -> Self {
        let store = Arc::new(MemoryStore::default());
        let limiter = ApiRateLimiter::new(Duration::from_secs(60), max_requests);
        let state = ApiState::new(store.clone(), ClaimNames::default(), limiter);
        let router = http::build_router(state.clone());
        Self {
            store,
            state,
            router,
        }
    }

    /// Issue a key through the real service and return its bearer token.
    pub async fn token(&self, roles: &[Role]) -> String {
        self.state
            .api_keys
            .issue(IssueApiKeyCommand {
                name: format!("test {roles:?}"),
                description: None,
                roles: roles.to_vec(),
                expires_at: None,
                created_by: "tests".to_string(),
            })
            .await
            .expect("issue key")
            .token
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body")
        .to_vec()
}
