//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::domain::Region;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleRecord {
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
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub deleted_at: Option<OffsetDateTime>,
}

/// An off-road episode for one vehicle. `vehicle_id` is a key back to the
/// owning vehicle, never a loaded reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncidentRecord {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub start_date: Date,
    pub end_date: Option<Date>,
    pub estimated_return: Option<Date>,
    pub description: String,
    pub comments: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditLogRecord {
    pub id: Uuid,
    pub actor: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub payload_text: Option<String>,
    pub created_at: OffsetDateTime,
}
