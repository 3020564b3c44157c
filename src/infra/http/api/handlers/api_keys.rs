//! API Key handlers

use axum::Json;
use axum::extract::{Extension, Path, State};
use uuid::Uuid;
use vor_api_types::ApiKeyResponse;

use crate::domain::claims::{ClaimSet, Policy};

use super::api_key_to_api;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::state::ApiState;

pub async fn list_api_keys(
    State(state): State<ApiState>,
    Extension(claims): Extension<ClaimSet>,
) -> Result<Json<Vec<ApiKeyResponse>>, ApiError> {
    state.authorize(&claims, Policy::ManageKeys)?;

    let keys = state.api_keys.list().await.map_err(api_key_to_api)?;
    Ok(Json(keys.into_iter().map(ApiKeyResponse::from).collect()))
}

pub async fn revoke_api_key(
    State(state): State<ApiState>,
    Extension(principal): Extension<crate::application::api_keys::ApiPrincipal>,
    Extension(claims): Extension<ClaimSet>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiKeyResponse>, ApiError> {
    state.authorize(&claims, Policy::ManageKeys)?;

    let record = state.api_keys.revoke(id).await.map_err(api_key_to_api)?;
    state
        .audit
        .record(
            &principal.actor(),
            "api_key.revoke",
            "api_key",
            Some(&id.to_string()),
            Some(&ApiKeyResponse::from(record.clone())),
        )
        .await
        .map_err(super::repo_to_api)?;

    Ok(Json(record.into()))
}
