//! Vehicle handlers

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;
use vor_api_types::{
    PageResponse, VehicleCreateRequest, VehicleResponse, VehicleUpdateRequest, VorStatusResponse,
};

use crate::application::api_keys::ApiPrincipal;
use crate::application::conditional::Decision;
use crate::application::pagination::{DEFAULT_PAGE_LIMIT, PageRequest, VehicleCursor};
use crate::application::repos::VehicleQueryFilter;
use crate::domain::claims::{ClaimSet, Policy};

use super::{VehicleListQuery, conditional_to_api, cursor_to_api, vehicle_to_api};
use crate::infra::http::api::conditional::IfNoneMatch;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::page_response;
use crate::infra::http::api::state::ApiState;

pub async fn list_vehicles(
    State(state): State<ApiState>,
    Extension(claims): Extension<ClaimSet>,
    validator: IfNoneMatch,
    Query(query): Query<VehicleListQuery>,
) -> Result<Decision<PageResponse<VehicleResponse>>, ApiError> {
    state.authorize(&claims, Policy::ViewFleet)?;

    let cursor = query
        .cursor
        .as_deref()
        .map(VehicleCursor::decode)
        .transpose()
        .map_err(cursor_to_api)?;
    let page = PageRequest::new(query.limit.unwrap_or(DEFAULT_PAGE_LIMIT), cursor);
    let filter = VehicleQueryFilter {
        region: query.region,
        state: query.state,
        search: query.search,
    };

    let decision = state
        .vehicles
        .list_conditional(validator.as_deref(), &filter, page)
        .await
        .map_err(conditional_to_api("vehicles not found"))?;

    Ok(decision.map(page_response))
}

pub async fn get_vehicle(
    State(state): State<ApiState>,
    Extension(claims): Extension<ClaimSet>,
    validator: IfNoneMatch,
    Path(id): Path<Uuid>,
) -> Result<Decision<VehicleResponse>, ApiError> {
    state.authorize(&claims, Policy::ViewFleet)?;

    let decision = state
        .vehicles
        .get_conditional(validator.as_deref(), id)
        .await
        .map_err(conditional_to_api("vehicle not found"))?;

    Ok(decision.map(VehicleResponse::from))
}

pub async fn get_vehicle_status(
    State(state): State<ApiState>,
    Extension(claims): Extension<ClaimSet>,
    validator: IfNoneMatch,
    Path(id): Path<Uuid>,
) -> Result<Decision<VorStatusResponse>, ApiError> {
    state.authorize(&claims, Policy::ViewFleet)?;

    let decision = state
        .vehicles
        .status_conditional(validator.as_deref(), id)
        .await
        .map_err(conditional_to_api("vehicle not found"))?;

    Ok(decision.map(VorStatusResponse::from))
}

pub async fn create_vehicle(
    State(state): State<ApiState>,
    Extension(principal): Extension<ApiPrincipal>,
    Extension(claims): Extension<ClaimSet>,
    Json(payload): Json<VehicleCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.authorize(&claims, Policy::EditFleet)?;

    let view = state
        .vehicles
        .create(&principal.actor(), payload.into())
        .await
        .map_err(vehicle_to_api)?;

    Ok((StatusCode::CREATED, Json(VehicleResponse::from(view))))
}

pub async fn update_vehicle(
    State(state): State<ApiState>,
    Extension(principal): Extension<ApiPrincipal>,
    Extension(claims): Extension<ClaimSet>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VehicleUpdateRequest>,
) -> Result<Json<VehicleResponse>, ApiError> {
    state.authorize(&claims, Policy::EditFleet)?;

    let view = state
        .vehicles
        .update(&principal.actor(), id, payload.into())
        .await
        .map_err(vehicle_to_api)?;

    Ok(Json(view.into()))
}

pub async fn delete_vehicle(
    State(state): State<ApiState>,
    Extension(principal): Extension<ApiPrincipal>,
    Extension(claims): Extension<ClaimSet>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.authorize(&claims, Policy::EditFleet)?;

    state
        .vehicles
        .delete(&principal.actor(), id)
        .await
        .map_err(vehicle_to_api)?;

    Ok(StatusCode::NO_CONTENT)
}
