//! Current availability derived from a vehicle's incident history.

use serde::Serialize;
use time::Date;
use uuid::Uuid;

use crate::domain::VorState;
use crate::domain::entities::IncidentRecord;
use crate::domain::error::DomainError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VorStatus {
    pub state: VorState,
    pub since: Option<Date>,
    pub description: Option<String>,
    pub estimated_return: Option<Date>,
    pub incident_id: Option<Uuid>,
}

impl VorStatus {
    pub fn available() -> Self {
        Self {
            state: VorState::Available,
            since: None,
            description: None,
            estimated_return: None,
            incident_id: None,
        }
    }

    pub fn is_off_road(&self) -> bool {
        self.state == VorState::OffRoad
    }
}

/// Picks the most recent incident: latest `start_date`, then latest `created_at`, then highest id.
pub fn most_recent<'a, I>(incidents: I) -> Option<&'a IncidentRecord>
where
    I: IntoIterator<Item = &'a IncidentRecord>,
{
    incidents
        .into_iter()
        .max_by_key(|incident| (incident.start_date, incident.created_at, incident.id))
}

/// Status depends only on stored incident data, never on the wall clock, so
/// it stays stable for as long as the incidents are unchanged.
pub fn current_status<'a, I>(incidents: I) -> VorStatus
where
    I: IntoIterator<Item = &'a IncidentRecord>,
{
    match most_recent(incidents) {
        Some(incident) => status_from_latest(incident),
        None => VorStatus::available(),
    }
}

pub fn status_from_latest(incident: &IncidentRecord) -> VorStatus {
    if incident.end_date.is_some() {
        return VorStatus::available();
    }

    VorStatus {
        state: VorState::OffRoad,
        since: Some(incident.start_date),
        description: Some(incident.description.clone()),
        estimated_return: incident.estimated_return,
        incident_id: Some(incident.id),
    }
}

pub fn validate_incident_dates(
    start_date: Date,
    end_date: Option<Date>,
    estimated_return: Option<Date>,
) -> Result<(), DomainError> {
    if let Some(end) = end_date
        && end < start_date
    {
        return Err(DomainError::validation(
            "end_date",
            "must not be before start_date",
        ));
    }
    if let Some(eta) = estimated_return
        && eta < start_date
    {
        return Err(DomainError::validation(
            "estimated_return",
            "must not be before start_date",
        ));
    }
    Ok(())
}
