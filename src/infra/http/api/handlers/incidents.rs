//! Incident handlers

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;
use vor_api_types::{
    IncidentCloseRequest, IncidentCreateRequest, IncidentImportRequest, IncidentResponse,
    IncidentUpdateRequest,
};

use crate::application::api_keys::ApiPrincipal;
use crate::application::conditional::Decision;
use crate::domain::claims::{ClaimSet, Policy};

use super::{conditional_to_api, incident_to_api};
use crate::infra::http::api::conditional::IfNoneMatch;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::state::ApiState;

pub async fn list_vehicle_incidents(
    State(state): State<ApiState>,
    Extension(claims): Extension<ClaimSet>,
    validator: IfNoneMatch,
    Path(vehicle_id): Path<Uuid>,
) -> Result<Decision<Vec<IncidentResponse>>, ApiError> {
    state.authorize(&claims, Policy::ViewFleet)?;

    let decision = state
        .incidents
        .list_for_vehicle_conditional(validator.as_deref(), vehicle_id)
        .await
        .map_err(conditional_to_api("vehicle not found"))?;

    Ok(decision.map(|incidents| incidents.into_iter().map(IncidentResponse::from).collect()))
}

pub async fn create_incident(
    State(state): State<ApiState>,
    Extension(principal): Extension<ApiPrincipal>,
    Extension(claims): Extension<ClaimSet>,
    Path(vehicle_id): Path<Uuid>,
    Json(payload): Json<IncidentCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.authorize(&claims, Policy::EditFleet)?;

    let incident = state
        .incidents
        .create(&principal.actor(), vehicle_id, payload.into())
        .await
        .map_err(incident_to_api)?;

    Ok((StatusCode::CREATED, Json(IncidentResponse::from(incident))))
}

pub async fn import_incident(
    State(state): State<ApiState>,
    Extension(principal): Extension<ApiPrincipal>,
    Extension(claims): Extension<ClaimSet>,
    Json(payload): Json<IncidentImportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.authorize(&claims, Policy::ImportIncidents)?;

    let incident = state
        .incidents
        .import(&principal.actor(), payload.into())
        .await
        .map_err(incident_to_api)?;

    Ok((StatusCode::CREATED, Json(IncidentResponse::from(incident))))
}

pub async fn update_incident(
    State(state): State<ApiState>,
    Extension(principal): Extension<ApiPrincipal>,
    Extension(claims): Extension<ClaimSet>,
    Path(id): Path<Uuid>,
    Json(payload): Json<IncidentUpdateRequest>,
) -> Result<Json<IncidentResponse>, ApiError> {
    state.authorize(&claims, Policy::EditFleet)?;

    let incident = state
        .incidents
        .update(&principal.actor(), id, payload.into())
        .await
        .map_err(incident_to_api)?;

    Ok(Json(incident.into()))
}

pub async fn close_incident(
    State(state): State<ApiState>,
    Extension(principal): Extension<ApiPrincipal>,
    Extension(claims): Extension<ClaimSet>,
    Path(id): Path<Uuid>,
    Json(payload): Json<IncidentCloseRequest>,
) -> Result<Json<IncidentResponse>, ApiError> {
    state.authorize(&claims, Policy::EditFleet)?;

    let incident = state
        .incidents
        .close(&principal.actor(), id, payload.end_date)
        .await
        .map_err(incident_to_api)?;

    Ok(Json(incident.into()))
}

pub async fn delete_incident(
    State(state): State<ApiState>,
    Extension(principal): Extension<ApiPrincipal>,
    Extension(claims): Extension<ClaimSet>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.authorize(&claims, Policy::EditFleet)?;

    state
        .incidents
        .delete(&principal.actor(), id)
        .await
        .map_err(incident_to_api)?;

    Ok(StatusCode::NO_CONTENT)
}
