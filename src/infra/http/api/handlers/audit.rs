//! Audit handlers

use axum::Json;
use axum::extract::{Extension, Query, State};
use vor_api_types::{AuditEntryResponse, PageResponse};

use crate::application::pagination::{AuditCursor, DEFAULT_PAGE_LIMIT, PageRequest};
use crate::application::repos::AuditQueryFilter;
use crate::domain::claims::{ClaimSet, Policy};

use super::{AuditListQuery, cursor_to_api, repo_to_api};
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::page_response;
use crate::infra::http::api::state::ApiState;

pub async fn list_audit_logs(
    State(state): State<ApiState>,
    Extension(claims): Extension<ClaimSet>,
    Query(query): Query<AuditListQuery>,
) -> Result<Json<PageResponse<AuditEntryResponse>>, ApiError> {
    state.authorize(&claims, Policy::ReadAudit)?;

    let cursor = query
        .cursor
        .as_deref()
        .map(AuditCursor::decode)
        .transpose()
        .map_err(cursor_to_api)?;

    let filter = AuditQueryFilter {
        actor: query.actor,
        action: query.action,
        entity_type: query.entity_type,
        entity_id: query.entity_id,
    };

    let page = state
        .audit
        .list_filtered(
            PageRequest::new(query.limit.unwrap_or(DEFAULT_PAGE_LIMIT), cursor),
            &filter,
        )
        .await
        .map_err(repo_to_api)?;

    Ok(Json(page_response(page)))
}
