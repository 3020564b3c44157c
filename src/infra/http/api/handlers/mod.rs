//! API handlers organized by resource.
//!
//! Each submodule holds the handlers for one resource. Query structs and the
//! error conversions they share live here.

mod api_keys;
mod audit;
mod incidents;
mod summary;
mod vehicles;

pub use api_keys::*;
pub use audit::*;
pub use incidents::*;
pub use summary::*;
pub use vehicles::*;

// ----- Shared query structs -----

use serde::Deserialize;

use crate::domain::{Region, VorState};

#[derive(Debug, Default, Deserialize)]
pub struct VehicleListQuery {
    pub region: Option<Region>,
    pub state: Option<VorState>,
    pub search: Option<String>,
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    pub region: Option<Region>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditListQuery {
    pub actor: Option<String>,
    pub action: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

// ----- Shared error conversions -----

use axum::http::StatusCode;

use crate::application::api_keys::ApiKeyError;
use crate::application::conditional::ConditionalError;
use crate::application::incidents::IncidentError;
use crate::application::pagination::PaginationError;
use crate::application::repos::RepoError;
use crate::application::vehicles::VehicleError;
use crate::domain::claims::AuthzError;
use crate::domain::error::DomainError;

use super::error::{ApiError, codes};

pub(crate) fn repo_to_api(err: RepoError) -> ApiError {
    match err {
        RepoError::Duplicate { constraint } => ApiError::new(
            StatusCode::CONFLICT,
            codes::DUPLICATE,
            "Duplicate record",
            Some(constraint),
        ),
        RepoError::Pagination(p) => cursor_to_api(p),
        RepoError::NotFound => ApiError::not_found("resource not found"),
        RepoError::InvalidInput { message } => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid input",
            Some(message),
        ),
        RepoError::Integrity { message } => ApiError::new(
            StatusCode::CONFLICT,
            codes::INTEGRITY,
            "Integrity constraint violated",
            Some(message),
        ),
        RepoError::Timeout => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::DB_TIMEOUT,
            "Database timeout",
            None,
        ),
        RepoError::Persistence(msg) => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::REPO,
            "Persistence error",
            Some(msg),
        ),
    }
}

pub(crate) fn cursor_to_api(err: PaginationError) -> ApiError {
    ApiError::new(
        StatusCode::BAD_REQUEST,
        codes::INVALID_CURSOR,
        "Invalid cursor",
        Some(err.to_string()),
    )
}

pub(crate) fn conditional_to_api(
    not_found: &'static str,
) -> impl FnOnce(ConditionalError<RepoError>) -> ApiError {
    move |err| match err {
        ConditionalError::NotFound => ApiError::not_found(not_found),
        ConditionalError::Upstream(repo) => repo_to_api(repo),
    }
}

fn domain_to_api(err: DomainError) -> ApiError {
    match err {
        DomainError::NotFound { entity } => ApiError::new(
            StatusCode::NOT_FOUND,
            codes::NOT_FOUND,
            "Resource not found",
            Some(entity.to_string()),
        ),
        DomainError::Validation { .. } => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid input",
            Some(err.to_string()),
        ),
    }
}

pub(crate) fn vehicle_to_api(err: VehicleError) -> ApiError {
    match err {
        VehicleError::Domain(domain) => domain_to_api(domain),
        VehicleError::Repo(repo) => repo_to_api(repo),
        VehicleError::NotFound => ApiError::not_found("vehicle not found"),
        VehicleError::DuplicateRegistration(registration) => ApiError::new(
            StatusCode::CONFLICT,
            codes::DUPLICATE,
            "Registration already in use",
            Some(registration),
        ),
    }
}

pub(crate) fn incident_to_api(err: IncidentError) -> ApiError {
    match err {
        IncidentError::Domain(domain) => domain_to_api(domain),
        IncidentError::Repo(repo) => repo_to_api(repo),
        IncidentError::VehicleNotFound => ApiError::not_found("vehicle not found"),
        IncidentError::UnknownRegistration(registration) => ApiError::new(
            StatusCode::NOT_FOUND,
            codes::NOT_FOUND,
            "vehicle not found",
            Some(format!("no vehicle registered as {registration}")),
        ),
        IncidentError::NotFound => ApiError::not_found("incident not found"),
        IncidentError::AlreadyClosed => ApiError::new(
            StatusCode::CONFLICT,
            codes::CONFLICT,
            "Incident is already closed",
            None,
        ),
    }
}

pub(crate) fn api_key_to_api(err: ApiKeyError) -> ApiError {
    match err {
        ApiKeyError::InvalidRoles | ApiKeyError::InvalidName => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid API key",
            Some(err.to_string()),
        ),
        ApiKeyError::NotFound => ApiError::not_found("api key not found"),
        ApiKeyError::Repo(repo) => repo_to_api(repo),
    }
}

pub(crate) fn authz_to_api(err: AuthzError) -> ApiError {
    match err {
        AuthzError::MissingClaim { .. } => ApiError::forbidden(Some(err.to_string())),
        AuthzError::Unconfigured { .. } => ApiError::internal(Some(err.to_string())),
    }
}
