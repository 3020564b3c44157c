//! Mapping between application types and the wire types in `vor-api-types`.

use vor_api_types::{
    ApiKeyResponse, AuditEntryResponse, IncidentCreateRequest,
    IncidentImportRequest, IncidentResponse, IncidentUpdateRequest, PageResponse,
    RegionSummary as RegionSummaryResponse, SummaryResponse, VehicleCreateRequest,
    VehicleResponse, VehicleUpdateRequest, VorStatusResponse,
};

use crate::application::dashboard::FleetSummary;
use crate::application::incidents::{ImportIncidentCommand, IncidentCommand};
use crate::application::pagination::CursorPage;
use crate::application::vehicles::{VehicleCommand, VehicleView};
use crate::domain::api_keys::ApiKeyRecord;
use crate::domain::entities::{AuditLogRecord, IncidentRecord};
use crate::domain::status::VorStatus;

impl From<VorStatus> for VorStatusResponse {
    fn from(status: VorStatus) -> Self {
        Self {
            state: status.state,
            since: status.since,
            description: status.description,
            estimated_return: status.estimated_return,
            incident_id: status.incident_id,
        }
    }
}

impl From<VehicleView> for VehicleResponse {
    fn from(view: VehicleView) -> Self {
        let vehicle = view.vehicle;
        Self {
            id: vehicle.id,
            registration: vehicle.registration,
            call_sign: vehicle.call_sign,
            make: vehicle.make,
            model: vehicle.model,
            body_type: vehicle.body_type,
            fleet_number: vehicle.fleet_number,
            region: vehicle.region,
            district: vehicle.district,
            hub: vehicle.hub,
            status: view.status.into(),
            created_at: vehicle.created_at,
            updated_at: vehicle.updated_at,
        }
    }
}

impl From<IncidentRecord> for IncidentResponse {
    fn from(incident: IncidentRecord) -> Self {
        Self {
            id: incident.id,
            vehicle_id: incident.vehicle_id,
            start_date: incident.start_date,
            end_date: incident.end_date,
            estimated_return: incident.estimated_return,
            description: incident.description,
            comments: incident.comments,
            created_at: incident.created_at,
            updated_at: incident.updated_at,
        }
    }
}

impl From<FleetSummary> for SummaryResponse {
    fn from(summary: FleetSummary) -> Self {
        Self {
            total: summary.total,
            available: summary.available,
            off_road: summary.off_road,
            regions: summary
                .regions
                .into_iter()
                .map(|region| RegionSummaryResponse {
                    region: region.region,
                    total: region.total,
                    available: region.available,
                    off_road: region.off_road,
                })
                .collect(),
        }
    }
}

impl From<AuditLogRecord> for AuditEntryResponse {
    fn from(record: AuditLogRecord) -> Self {
        // Payloads are written by this service as JSON; anything unreadable is dropped.
        let payload = record
            .payload_text
            .as_deref()
            .and_then(|text| serde_json::from_str(text).ok());
        Self {
            id: record.id,
            actor: record.actor,
            action: record.action,
            entity_type: record.entity_type,
            entity_id: record.entity_id,
            payload,
            created_at: record.created_at,
        }
    }
}

impl From<ApiKeyRecord> for ApiKeyResponse {
    fn from(record: ApiKeyRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            description: record.description,
            prefix: record.prefix,
            roles: record.roles,
            expires_at: record.expires_at,
            revoked_at: record.revoked_at,
            last_used_at: record.last_used_at,
            created_by: record.created_by,
            created_at: record.created_at,
        }
    }
}

pub fn page_response<T, U>(page: CursorPage<T>) -> PageResponse<U>
where
    U: From<T>,
{
    PageResponse {
        items: page.items.into_iter().map(U::from).collect(),
        next_cursor: page.next_cursor,
    }
}

impl From<VehicleCreateRequest> for VehicleCommand {
    fn from(request: VehicleCreateRequest) -> Self {
        Self {
            registration: request.registration,
            call_sign: request.call_sign,
            make: request.make,
            model: request.model,
            body_type: request.body_type,
            fleet_number: request.fleet_number,
            region: request.region,
            district: request.district,
            hub: request.hub,
        }
    }
}

impl From<VehicleUpdateRequest> for VehicleCommand {
    fn from(request: VehicleUpdateRequest) -> Self {
        Self {
            registration: request.registration,
            call_sign: request.call_sign,
            make: request.make,
            model: request.model,
            body_type: request.body_type,
            fleet_number: request.fleet_number,
            region: request.region,
            district: request.district,
            hub: request.hub,
        }
    }
}

impl From<IncidentCreateRequest> for IncidentCommand {
    fn from(request: IncidentCreateRequest) -> Self {
        Self {
            start_date: request.start_date,
            description: request.description,
            comments: request.comments,
            estimated_return: request.estimated_return,
            end_date: request.end_date,
        }
    }
}

impl From<IncidentUpdateRequest> for IncidentCommand {
    fn from(request: IncidentUpdateRequest) -> Self {
        Self {
            start_date: request.start_date,
            description: request.description,
            comments: request.comments,
            estimated_return: request.estimated_return,
            end_date: request.end_date,
        }
    }
}

impl From<IncidentImportRequest> for ImportIncidentCommand {
    fn from(request: IncidentImportRequest) -> Self {
        Self {
            registration: request.registration,
            incident: IncidentCommand {
                start_date: request.start_date,
                description: request.description,
                comments: request.comments,
                estimated_return: request.estimated_return,
                end_date: request.end_date,
            },
        }
    }
}
