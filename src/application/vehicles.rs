//! Vehicle reads and writes, including the conditional views served to dashboards.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::application::audit::AuditService;
use crate::application::conditional::{self, ConditionalError, Decision, Fingerprint};
use crate::application::pagination::{CursorPage, PageRequest, VehicleCursor};
use crate::application::repos::{
    CreateVehicleParams, IncidentsRepo, RepoError, UpdateVehicleParams, VehicleListRow,
    VehicleQueryFilter, VehiclesRepo,
};
use crate::domain::Region;
use crate::domain::entities::VehicleRecord;
use crate::domain::error::DomainError;
use crate::domain::status::{VorStatus, current_status};
use crate::domain::vehicles::{VehicleAggregate, normalize_registration, optional_text, require_text};

pub const KIND_VEHICLE: &str = "vehicle";
pub const KIND_VEHICLE_STATUS: &str = "vehicle-status";
pub const KIND_VEHICLES: &str = "vehicles";

#[derive(Debug, Error)]
pub enum VehicleError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("vehicle not found")]
    NotFound,
    #[error("registration `{0}` is already in use")]
    DuplicateRegistration(String),
}

/// A vehicle with the status derived from its incidents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleView {
    pub vehicle: VehicleRecord,
    pub status: VorStatus,
}

impl From<VehicleListRow> for VehicleView {
    fn from(row: VehicleListRow) -> Self {
        let status = current_status(row.latest_incident.as_ref());
        Self {
            vehicle: row.vehicle,
            status,
        }
    }
}

/// Raw vehicle fields as submitted; normalised before reaching storage.
#[derive(Debug, Clone, Serialize)]
pub struct VehicleCommand {
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

struct NormalizedVehicle {
    registration: String,
    call_sign: Option<String>,
    make: String,
    model: String,
    body_type: Option<String>,
    fleet_number: Option<String>,
    region: Region,
    district: Option<String>,
    hub: Option<String>,
}

impl VehicleCommand {
    fn normalize(&self) -> Result<NormalizedVehicle, DomainError> {
        Ok(NormalizedVehicle {
            registration: normalize_registration(&self.registration)?,
            call_sign: optional_text(self.call_sign.as_deref()),
            make: require_text("make", &self.make)?,
            model: require_text("model", &self.model)?,
            body_type: optional_text(self.body_type.as_deref()),
            fleet_number: optional_text(self.fleet_number.as_deref()),
            region: self.region,
            district: optional_text(self.district.as_deref()),
            hub: optional_text(self.hub.as_deref()),
        })
    }
}

#[derive(Clone)]
pub struct VehicleService {
    vehicles: Arc<dyn VehiclesRepo>,
    incidents: Arc<dyn IncidentsRepo>,
    audit: AuditService,
}

impl VehicleService {
    pub fn new(
        vehicles: Arc<dyn VehiclesRepo>,
        incidents: Arc<dyn IncidentsRepo>,
        audit: AuditService,
    ) -> Self {
        Self {
            vehicles,
            incidents,
            audit,
        }
    }

    pub async fn list(
        &self,
        filter: &VehicleQueryFilter,
        page: PageRequest<VehicleCursor>,
    ) -> Result<CursorPage<VehicleView>, RepoError> {
        let rows = self.vehicles.list_vehicles(filter, page).await?;
        Ok(rows.map(VehicleView::from))
    }

    pub async fn list_conditional(
        &self,
        validator: Option<&str>,
        filter: &VehicleQueryFilter,
        page: PageRequest<VehicleCursor>,
    ) -> Result<Decision<CursorPage<VehicleView>>, ConditionalError<RepoError>> {
        let key = list_key(filter, &page);
        conditional::resolve(
            validator,
            self.collection_fingerprint(&key),
            || async { self.list(filter, page.clone()).await.map(Some) },
        )
        .await
    }

    pub async fn get_conditional(
        &self,
        validator: Option<&str>,
        id: Uuid,
    ) -> Result<Decision<VehicleView>, ConditionalError<RepoError>> {
        conditional::resolve(
            validator,
            self.fingerprint(KIND_VEHICLE, id),
            || self.find_view(id),
        )
        .await
    }

    pub async fn status_conditional(
        &self,
        validator: Option<&str>,
        id: Uuid,
    ) -> Result<Decision<VorStatus>, ConditionalError<RepoError>> {
        conditional::resolve(
            validator,
            self.fingerprint(KIND_VEHICLE_STATUS, id),
            || async {
                let view = self.find_view(id).await;
                view.map(|found| found.map(|view| view.status))
            },
        )
        .await
    }

    /// Fingerprint of a vehicle-derived view. Incident writes advance the
    /// vehicle's `updated_at`, so every kind moves with them.
    pub(crate) async fn fingerprint(
        &self,
        kind: &str,
        id: Uuid,
    ) -> Result<Option<Fingerprint>, RepoError> {
        let version = self.vehicles.vehicle_version(id).await?;
        Ok(version.map(|updated_at| Fingerprint::of_instant(kind, &id.to_string(), updated_at)))
    }

    async fn collection_fingerprint(&self, key: &str) -> Result<Option<Fingerprint>, RepoError> {
        let version = self.vehicles.collection_version().await?;
        Ok(Some(Fingerprint::of_collection(KIND_VEHICLES, key, version)))
    }

    pub async fn find_view(&self, id: Uuid) -> Result<Option<VehicleView>, RepoError> {
        let Some(vehicle) = self.vehicles.find_vehicle(id).await? else {
            return Ok(None);
        };
        let latest = self.incidents.latest_for_vehicle(id).await?;
        Ok(Some(VehicleView {
            status: current_status(latest.as_ref()),
            vehicle,
        }))
    }

    pub async fn find_by_registration(
        &self,
        registration: &str,
    ) -> Result<Option<VehicleRecord>, RepoError> {
        self.vehicles.find_by_registration(registration).await
    }

    pub async fn load_aggregate(&self, id: Uuid) -> Result<Option<VehicleAggregate>, RepoError> {
        let Some(vehicle) = self.vehicles.find_vehicle(id).await? else {
            return Ok(None);
        };
        let incidents = self.incidents.list_for_vehicle(id).await?;
        Ok(Some(VehicleAggregate::new(vehicle, incidents)))
    }

    pub async fn create(
        &self,
        actor: &str,
        command: VehicleCommand,
    ) -> Result<VehicleView, VehicleError> {
        let normalized = command.normalize()?;
        let registration = normalized.registration.clone();

        let vehicle = self
            .vehicles
            .create_vehicle(CreateVehicleParams {
                registration: normalized.registration,
                call_sign: normalized.call_sign,
                make: normalized.make,
                model: normalized.model,
                body_type: normalized.body_type,
                fleet_number: normalized.fleet_number,
                region: normalized.region,
                district: normalized.district,
                hub: normalized.hub,
            })
            .await
            .map_err(|err| duplicate_registration(err, &registration))?;

        self.audit
            .record(
                actor,
                "vehicle.create",
                "vehicle",
                Some(&vehicle.id.to_string()),
                Some(&vehicle),
            )
            .await?;

        Ok(VehicleView {
            vehicle,
            status: VorStatus::available(),
        })
    }

    pub async fn update(
        &self,
        actor: &str,
        id: Uuid,
        command: VehicleCommand,
    ) -> Result<VehicleView, VehicleError> {
        let normalized = command.normalize()?;
        let registration = normalized.registration.clone();

        let vehicle = self
            .vehicles
            .update_vehicle(UpdateVehicleParams {
                id,
                registration: normalized.registration,
                call_sign: normalized.call_sign,
                make: normalized.make,
                model: normalized.model,
                body_type: normalized.body_type,
                fleet_number: normalized.fleet_number,
                region: normalized.region,
                district: normalized.district,
                hub: normalized.hub,
            })
            .await
            .map_err(|err| match err {
                RepoError::NotFound => VehicleError::NotFound,
                other => duplicate_registration(other, &registration),
            })?;

        self.audit
            .record(
                actor,
                "vehicle.update",
                "vehicle",
                Some(&id.to_string()),
                Some(&vehicle),
            )
            .await?;

        let latest = self.incidents.latest_for_vehicle(id).await?;
        Ok(VehicleView {
            status: current_status(latest.as_ref()),
            vehicle,
        })
    }

    pub async fn delete(&self, actor: &str, id: Uuid) -> Result<(), VehicleError> {
        let vehicle = self
            .vehicles
            .soft_delete_vehicle(id)
            .await
            .map_err(|err| match err {
                RepoError::NotFound => VehicleError::NotFound,
                other => VehicleError::Repo(other),
            })?;

        self.audit
            .record(
                actor,
                "vehicle.delete",
                "vehicle",
                Some(&id.to_string()),
                Some(&serde_json::json!({ "registration": vehicle.registration })),
            )
            .await?;

        Ok(())
    }
}

fn duplicate_registration(err: RepoError, registration: &str) -> VehicleError {
    match err {
        RepoError::Duplicate { .. } => VehicleError::DuplicateRegistration(registration.to_string()),
        other => VehicleError::Repo(other),
    }
}

fn list_key(filter: &VehicleQueryFilter, page: &PageRequest<VehicleCursor>) -> String {
    format!(
        "region={};state={};search={};limit={};cursor={}",
        filter.region.map(Region::as_str).unwrap_or(""),
        filter.state.map(|state| state.as_str()).unwrap_or(""),
        filter.search.as_deref().unwrap_or(""),
        page.limit,
        page.cursor
            .as_ref()
            .map(VehicleCursor::encode)
            .unwrap_or_default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VorState;

    #[test]
    fn list_key_distinguishes_filters_and_pages() {
        let all = VehicleQueryFilter::default();
        let off_road = VehicleQueryFilter {
            state: Some(VorState::OffRoad),
            ..VehicleQueryFilter::default()
        };
        let first = PageRequest::new(20, None);
        let second = PageRequest::new(20, Some(VehicleCursor::new("YX21ABC", Uuid::nil())));

        assert_ne!(list_key(&all, &first), list_key(&off_road, &first));
        assert_ne!(list_key(&all, &first), list_key(&all, &second));
        assert_eq!(list_key(&all, &first), list_key(&all, &PageRequest::new(20, None)));
    }

    #[test]
    fn command_normalisation_rejects_blank_make() {
        let command = VehicleCommand {
            registration: "yx21 abc".into(),
            call_sign: Some(" ".into()),
            make: "  ".into(),
            model: "Sprinter".into(),
            body_type: None,
            fleet_number: None,
            region: Region::NorthEast,
            district: None,
            hub: None,
        };
        assert!(matches!(
            command.normalize(),
            Err(DomainError::Validation { field: "make", .. })
        ));
    }
}
