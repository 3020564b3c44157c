use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderName, HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use metrics::counter;
use tracing::warn;

use crate::application::api_keys::{ApiAuthError, ApiPrincipal};

use super::error::{ApiError, codes};
use super::rate_limit::METRIC_RATE_LIMITED;
use super::state::ApiState;

const API_KEY_HEADER: &str = "x-api-key";
const RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

pub async fn api_auth(
    State(state): State<ApiState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = extract_token(request.headers().get(axum::http::header::AUTHORIZATION))
        .or_else(|| {
            request
                .headers()
                .get(API_KEY_HEADER)
                .and_then(|v| v.to_str().ok().map(|s| s.trim().to_string()))
        })
        .filter(|token| !token.is_empty());

    let Some(token) = token else {
        return ApiError::unauthorized().into_response();
    };

    let principal = match state.api_keys.authenticate(&token).await {
        Ok(principal) => principal,
        Err(ApiAuthError::Missing) | Err(ApiAuthError::Invalid) => {
            return ApiError::unauthorized().into_response();
        }
        Err(ApiAuthError::Expired) => {
            return ApiError::new(
                StatusCode::UNAUTHORIZED,
                codes::EXPIRED,
                "API key expired",
                None,
            )
            .into_response();
        }
        Err(ApiAuthError::Revoked) => {
            return ApiError::new(
                StatusCode::UNAUTHORIZED,
                codes::REVOKED,
                "API key revoked",
                None,
            )
            .into_response();
        }
    };

    let claims = state
        .claims
        .transform(&principal.key_id.to_string(), &principal.roles);
    request.extensions_mut().insert(principal.clone());
    request.extensions_mut().insert(claims);

    let mut response = next.run(request).await;
    response.extensions_mut().insert(principal);
    response
}

pub async fn api_rate_limit(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(principal) = request.extensions().get::<ApiPrincipal>() else {
        warn!(
            target = "vor::api::ratelimit",
            "missing principal in rate limit middleware"
        );
        return ApiError::unauthorized().into_response();
    };

    let key = principal.key_id.to_string();
    let (allowed, remaining) = state.rate_limiter.allow(&key);
    if !allowed {
        counter!(METRIC_RATE_LIMITED).increment(1);
        return ApiError::rate_limited(state.rate_limiter.retry_after_secs());
    }

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(RATE_LIMIT_REMAINING, HeaderValue::from(remaining));
    response
}

fn extract_token(header: Option<&HeaderValue>) -> Option<String> {
    let raw = header?.to_str().ok()?;
    let bearer = raw.strip_prefix("Bearer ")?;
    Some(bearer.trim().to_string())
}
