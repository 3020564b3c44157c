//! Request and response shapes shared by the VOR board server and its clients.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// Operational region a vehicle is based in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(
    feature = "sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "vor_region", rename_all = "snake_case")
)]
pub enum Region {
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
    Central,
}

impl Region {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NorthEast => "north_east",
            Self::NorthWest => "north_west",
            Self::SouthEast => "south_east",
            Self::SouthWest => "south_west",
            Self::Central => "central",
        }
    }

    pub fn all() -> &'static [Region] {
        &[
            Self::NorthEast,
            Self::NorthWest,
            Self::SouthEast,
            Self::SouthWest,
            Self::Central,
        ]
    }
}

impl Display for Region {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Region::all()
            .iter()
            .copied()
            .find(|region| region.as_str() == s)
            .ok_or(())
    }
}

/// Availability of a vehicle derived from its incidents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VorState {
    Available,
    OffRoad,
}

impl VorState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::OffRoad => "off_road",
        }
    }
}

/// Role granted to an API key. Roles are expanded into permission claims server-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Viewer,
    Editor,
    Importer,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Editor => "editor",
            Self::Importer => "importer",
            Self::Admin => "admin",
        }
    }

    pub fn all() -> &'static [Role] {
        &[Self::Viewer, Self::Editor, Self::Importer, Self::Admin]
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::all()
            .iter()
            .copied()
            .find(|role| role.as_str() == s)
            .ok_or(())
    }
}

/// Calendar dates travel as `YYYY-MM-DD`.
pub mod iso_date {
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _, ser::Error as _};
    use time::Date;
    use time::format_description::BorrowedFormatItem;
    use time::macros::format_description;

    pub const FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

    pub fn parse(raw: &str) -> Result<Date, time::error::Parse> {
        Date::parse(raw.trim(), FORMAT)
    }

    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        let text = date.format(FORMAT).map_err(S::Error::custom)?;
        serializer.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(D::Error::custom)
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use time::Date;

        pub fn serialize<S: Serializer>(
            date: &Option<Date>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match date {
                Some(date) => super::serialize(date, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Date>, D::Error> {
            let raw = Option::<String>::deserialize(deserializer)?;
            match raw.as_deref().map(str::trim) {
                None | Some("") => Ok(None),
                Some(value) => super::parse(value)
                    .map(Some)
                    .map_err(serde::de::Error::custom),
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VehicleCreateRequest {
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

/// Full replacement of a vehicle's descriptive fields.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VehicleUpdateRequest {
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

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VorStatusResponse {
    pub state: VorState,
    #[serde(default, with = "iso_date::option")]
    pub since: Option<Date>,
    pub description: Option<String>,
    #[serde(default, with = "iso_date::option")]
    pub estimated_return: Option<Date>,
    pub incident_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VehicleResponse {
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
    pub status: VorStatusResponse,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IncidentCreateRequest {
    #[serde(with = "iso_date")]
    pub start_date: Date,
    pub description: String,
    pub comments: Option<String>,
    #[serde(default, with = "iso_date::option")]
    pub estimated_return: Option<Date>,
    #[serde(default, with = "iso_date::option")]
    pub end_date: Option<Date>,
}

/// Incident addressed by vehicle registration, as posted by the batch importer.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IncidentImportRequest {
    pub registration: String,
    #[serde(with = "iso_date")]
    pub start_date: Date,
    pub description: String,
    pub comments: Option<String>,
    #[serde(default, with = "iso_date::option")]
    pub estimated_return: Option<Date>,
    #[serde(default, with = "iso_date::option")]
    pub end_date: Option<Date>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IncidentUpdateRequest {
    #[serde(with = "iso_date")]
    pub start_date: Date,
    pub description: String,
    pub comments: Option<String>,
    #[serde(default, with = "iso_date::option")]
    pub estimated_return: Option<Date>,
    #[serde(default, with = "iso_date::option")]
    pub end_date: Option<Date>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IncidentCloseRequest {
    #[serde(with = "iso_date")]
    pub end_date: Date,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IncidentResponse {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    #[serde(with = "iso_date")]
    pub start_date: Date,
    #[serde(default, with = "iso_date::option")]
    pub end_date: Option<Date>,
    #[serde(default, with = "iso_date::option")]
    pub estimated_return: Option<Date>,
    pub description: String,
    pub comments: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RegionSummary {
    pub region: Region,
    pub total: u64,
    pub available: u64,
    pub off_road: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SummaryResponse {
    pub total: u64,
    pub available: u64,
    pub off_road: u64,
    pub regions: Vec<RegionSummary>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuditEntryResponse {
    pub id: Uuid,
    pub actor: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub payload: Option<serde_json::Value>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiKeyResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub prefix: String,
    pub roles: Vec<Role>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub revoked_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_used_at: Option<OffsetDateTime>,
    pub created_by: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn import_request_reads_plain_dates_and_blank_optionals() {
        let raw = r#"{
            "registration": "YX21ABC",
            "start_date": "2024-03-04",
            "description": "Tail lift fault",
            "comments": null,
            "estimated_return": ""
        }"#;

        let parsed: IncidentImportRequest = serde_json::from_str(raw).expect("valid request");
        assert_eq!(parsed.start_date, date!(2024 - 03 - 04));
        assert_eq!(parsed.estimated_return, None);
        assert_eq!(parsed.end_date, None);
    }

    #[test]
    fn status_serializes_dates_as_iso_strings() {
        let status = VorStatusResponse {
            state: VorState::OffRoad,
            since: Some(date!(2024 - 01 - 09)),
            description: Some("Windscreen".into()),
            estimated_return: None,
            incident_id: None,
        };

        let value = serde_json::to_value(&status).expect("serializes");
        assert_eq!(value["state"], "off_road");
        assert_eq!(value["since"], "2024-01-09");
        assert!(value["estimated_return"].is_null());
    }

    #[test]
    fn region_round_trips_through_str() {
        for region in Region::all() {
            assert_eq!(region.as_str().parse::<Region>(), Ok(*region));
        }
        assert!("atlantis".parse::<Region>().is_err());
    }
}
