use axum::extract::{Extension, Query, State};
use vor_api_types::SummaryResponse;

use crate::application::conditional::Decision;
use crate::domain::claims::{ClaimSet, Policy};

use super::{SummaryQuery, conditional_to_api};
use crate::infra::http::api::conditional::IfNoneMatch;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::state::ApiState;

pub async fn get_summary(
    State(state): State<ApiState>,
    Extension(claims): Extension<ClaimSet>,
    validator: IfNoneMatch,
    Query(query): Query<SummaryQuery>,
) -> Result<Decision<SummaryResponse>, ApiError> {
    state.authorize(&claims, Policy::ViewFleet)?;

    let decision = state
        .dashboard
        .summary_conditional(validator.as_deref(), query.region)
        .await
        .map_err(conditional_to_api("summary not available"))?;

    Ok(decision.map(SummaryResponse::from))
}
