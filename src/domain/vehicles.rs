//! Vehicle invariants and the vehicle/incident aggregate.

use crate::domain::entities::{IncidentRecord, VehicleRecord};
use crate::domain::error::DomainError;
use crate::domain::status::{VorStatus, current_status};

const MAX_REGISTRATION_LEN: usize = 16;

/// Normalise a registration plate: uppercase, whitespace removed.
pub fn normalize_registration(raw: &str) -> Result<String, DomainError> {
    let normalized: String = raw
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .map(|ch| ch.to_ascii_uppercase())
        .collect();

    if normalized.is_empty() {
        return Err(DomainError::validation("registration", "must not be empty"));
    }
    if !normalized.chars().all(|ch| ch.is_ascii_alphanumeric()) {
        return Err(DomainError::validation(
            "registration",
            "must contain only letters and digits",
        ));
    }
    if normalized.len() > MAX_REGISTRATION_LEN {
        return Err(DomainError::validation(
            "registration",
            format!("must be at most {MAX_REGISTRATION_LEN} characters"),
        ));
    }

    Ok(normalized)
}

/// Trim a required free-text field, rejecting blank input.
pub fn require_text(field: &'static str, raw: &str) -> Result<String, DomainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(field, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

/// Trim an optional text field; blank collapses to `None`.
pub fn optional_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// A vehicle together with the incidents it exclusively owns.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleAggregate {
    pub vehicle: VehicleRecord,
    pub incidents: Vec<IncidentRecord>,
}

impl VehicleAggregate {
    pub fn new(vehicle: VehicleRecord, incidents: Vec<IncidentRecord>) -> Self {
        Self { vehicle, incidents }
    }

    pub fn status(&self) -> VorStatus {
        current_status(&self.incidents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Region, VorState};
    use time::macros::{date, datetime};
    use uuid::Uuid;

    #[test]
    fn registration_is_uppercased_and_compacted() {
        assert_eq!(normalize_registration(" yx21 abc ").unwrap(), "YX21ABC");
        assert_eq!(normalize_registration("wa\t70 xyz").unwrap(), "WA70XYZ");
    }

    #[test]
    fn registration_rejects_blank_and_punctuation() {
        assert!(matches!(
            normalize_registration("   "),
            Err(DomainError::Validation {
                field: "registration",
                ..
            })
        ));
        assert!(normalize_registration("YX21-ABC").is_err());
        assert!(normalize_registration("ABCDEFGHIJKLMNOPQ").is_err());
    }

    #[test]
    fn optional_text_collapses_blank() {
        assert_eq!(optional_text(Some("  ")), None);
        assert_eq!(optional_text(Some(" Leeds ")), Some("Leeds".to_string()));
        assert_eq!(optional_text(None), None);
    }

    #[test]
    fn aggregate_status_follows_owned_incidents() {
        let vehicle_id = Uuid::new_v4();
        let stamp = datetime!(2024-04-01 10:00 UTC);
        let vehicle = VehicleRecord {
            id: vehicle_id,
            registration: "YX21ABC".into(),
            call_sign: Some("A101".into()),
            make: "Fiat".into(),
            model: "Ducato".into(),
            body_type: None,
            fleet_number: None,
            region: Region::Central,
            district: None,
            hub: None,
            created_at: stamp,
            updated_at: stamp,
            deleted_at: None,
        };
        let incident = IncidentRecord {
            id: Uuid::new_v4(),
            vehicle_id,
            start_date: date!(2024 - 04 - 01),
            end_date: None,
            estimated_return: Some(date!(2024 - 04 - 05)),
            description: "Brake warning".into(),
            comments: None,
            created_at: stamp,
            updated_at: stamp,
        };

        let mut aggregate = VehicleAggregate::new(vehicle, vec![incident]);
        let status = aggregate.status();
        assert_eq!(status.state, VorState::OffRoad);
        assert_eq!(status.estimated_return, Some(date!(2024 - 04 - 05)));

        aggregate.incidents[0].end_date = Some(date!(2024 - 04 - 03));
        assert_eq!(aggregate.status().state, VorState::Available);
    }
}
