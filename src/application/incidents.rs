//! Incident writes and the per-vehicle incident history view.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use time::Date;
use uuid::Uuid;

use crate::application::audit::AuditService;
use crate::application::conditional::{self, ConditionalError, Decision};
use crate::application::repos::{
    CreateIncidentParams, IncidentsRepo, RepoError, UpdateIncidentParams,
};
use crate::application::vehicles::VehicleService;
use crate::domain::entities::IncidentRecord;
use crate::domain::error::DomainError;
use crate::domain::status::validate_incident_dates;
use crate::domain::vehicles::{normalize_registration, optional_text, require_text};

pub const KIND_VEHICLE_INCIDENTS: &str = "vehicle-incidents";

#[derive(Debug, Error)]
pub enum IncidentError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("vehicle not found")]
    VehicleNotFound,
    #[error("no vehicle registered as `{0}`")]
    UnknownRegistration(String),
    #[error("incident not found")]
    NotFound,
    #[error("incident is already closed")]
    AlreadyClosed,
}

#[derive(Debug, Clone, Serialize)]
pub struct IncidentCommand {
    pub start_date: Date,
    pub description: String,
    pub comments: Option<String>,
    pub estimated_return: Option<Date>,
    pub end_date: Option<Date>,
}

impl IncidentCommand {
    fn validate(&self) -> Result<(String, Option<String>), DomainError> {
        let description = require_text("description", &self.description)?;
        validate_incident_dates(self.start_date, self.end_date, self.estimated_return)?;
        Ok((description, optional_text(self.comments.as_deref())))
    }
}

/// Incident addressed by the vehicle's registration, as produced by spreadsheet imports.
#[derive(Debug, Clone, Serialize)]
pub struct ImportIncidentCommand {
    pub registration: String,
    pub incident: IncidentCommand,
}

#[derive(Clone)]
pub struct IncidentService {
    incidents: Arc<dyn IncidentsRepo>,
    vehicles: VehicleService,
    audit: AuditService,
}

impl IncidentService {
    pub fn new(
        incidents: Arc<dyn IncidentsRepo>,
        vehicles: VehicleService,
        audit: AuditService,
    ) -> Self {
        Self {
            incidents,
            vehicles,
            audit,
        }
    }

    pub async fn list_for_vehicle_conditional(
        &self,
        validator: Option<&str>,
        vehicle_id: Uuid,
    ) -> Result<Decision<Vec<IncidentRecord>>, ConditionalError<RepoError>> {
        conditional::resolve(
            validator,
            self.vehicles.fingerprint(KIND_VEHICLE_INCIDENTS, vehicle_id),
            || async {
                let aggregate = self.vehicles.load_aggregate(vehicle_id).await;
                aggregate.map(|found| found.map(|aggregate| aggregate.incidents))
            },
        )
        .await
    }

    pub async fn create(
        &self,
        actor: &str,
        vehicle_id: Uuid,
        command: IncidentCommand,
    ) -> Result<IncidentRecord, IncidentError> {
        let (description, comments) = command.validate()?;

        let incident = self
            .incidents
            .create_incident(CreateIncidentParams {
                vehicle_id,
                start_date: command.start_date,
                end_date: command.end_date,
                estimated_return: command.estimated_return,
                description,
                comments,
            })
            .await
            .map_err(|err| match err {
                RepoError::NotFound => IncidentError::VehicleNotFound,
                other => IncidentError::Repo(other),
            })?;

        self.record(actor, "incident.create", &incident).await?;
        Ok(incident)
    }

    pub async fn import(
        &self,
        actor: &str,
        command: ImportIncidentCommand,
    ) -> Result<IncidentRecord, IncidentError> {
        let registration = normalize_registration(&command.registration)?;
        let vehicle = self
            .vehicles
            .find_by_registration(&registration)
            .await?
            .ok_or(IncidentError::UnknownRegistration(registration))?;

        let incident = self.create(actor, vehicle.id, command.incident).await?;
        tracing::debug!(
            vehicle_id = %vehicle.id,
            incident_id = %incident.id,
            "imported incident"
        );
        Ok(incident)
    }

    pub async fn update(
        &self,
        actor: &str,
        id: Uuid,
        command: IncidentCommand,
    ) -> Result<IncidentRecord, IncidentError> {
        let (description, comments) = command.validate()?;

        let incident = self
            .incidents
            .update_incident(UpdateIncidentParams {
                id,
                start_date: command.start_date,
                end_date: command.end_date,
                estimated_return: command.estimated_return,
                description,
                comments,
            })
            .await
            .map_err(not_found_as_incident)?;

        self.record(actor, "incident.update", &incident).await?;
        Ok(incident)
    }

    pub async fn close(
        &self,
        actor: &str,
        id: Uuid,
        end_date: Date,
    ) -> Result<IncidentRecord, IncidentError> {
        let existing = self
            .incidents
            .find_incident(id)
            .await?
            .ok_or(IncidentError::NotFound)?;
        if existing.end_date.is_some() {
            return Err(IncidentError::AlreadyClosed);
        }
        validate_incident_dates(existing.start_date, Some(end_date), existing.estimated_return)?;

        let incident = self
            .incidents
            .update_incident(UpdateIncidentParams {
                id,
                start_date: existing.start_date,
                end_date: Some(end_date),
                estimated_return: existing.estimated_return,
                description: existing.description,
                comments: existing.comments,
            })
            .await
            .map_err(not_found_as_incident)?;

        self.record(actor, "incident.close", &incident).await?;
        Ok(incident)
    }

    pub async fn delete(&self, actor: &str, id: Uuid) -> Result<(), IncidentError> {
        let incident = self
            .incidents
            .delete_incident(id)
            .await
            .map_err(not_found_as_incident)?;

        self.record(actor, "incident.delete", &incident).await?;
        Ok(())
    }

    async fn record(
        &self,
        actor: &str,
        action: &str,
        incident: &IncidentRecord,
    ) -> Result<(), RepoError> {
        self.audit
            .record(
                actor,
                action,
                "incident",
                Some(&incident.id.to_string()),
                Some(incident),
            )
            .await
    }
}

fn not_found_as_incident(err: RepoError) -> IncidentError {
    match err {
        RepoError::NotFound => IncidentError::NotFound,
        other => IncidentError::Repo(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn command(description: &str, end_date: Option<Date>) -> IncidentCommand {
        IncidentCommand {
            start_date: date!(2026 - 03 - 01),
            description: description.to_string(),
            comments: Some("  ".to_string()),
            estimated_return: None,
            end_date,
        }
    }

    #[test]
    fn validate_trims_text_and_drops_blank_comments() {
        let (description, comments) = command("  Tail lift  ", None)
            .validate()
            .expect("valid command");
        assert_eq!(description, "Tail lift");
        assert_eq!(comments, None);
    }

    #[test]
    fn validate_rejects_blank_description() {
        assert!(matches!(
            command(" ", None).validate(),
            Err(DomainError::Validation {
                field: "description",
                ..
            })
        ));
    }

    #[test]
    fn validate_rejects_end_before_start() {
        assert!(matches!(
            command("Brakes", Some(date!(2026 - 02 - 28))).validate(),
            Err(DomainError::Validation {
                field: "end_date",
                ..
            })
        ));
    }
}
