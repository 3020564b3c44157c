//! HTTP transport for conditional reads: `If-None-Match` in, `ETag`/304 out.

use std::convert::Infallible;

use axum::Json;
use axum::extract::FromRequestParts;
use axum::http::header::{CACHE_CONTROL, ETAG, IF_NONE_MATCH};
use axum::http::request::Parts;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::conditional::Decision;

/// Validator presented by the client, with the surrounding quotes removed.
///
/// Weak validators, `*` and lists of several tags are never matched; they
/// read as an absent header so the client receives a full payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IfNoneMatch(pub Option<String>);

impl IfNoneMatch {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl<S> FromRequestParts<S> for IfNoneMatch
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parse_validator(parts.headers.get(IF_NONE_MATCH))))
    }
}

pub(crate) fn parse_validator(header: Option<&HeaderValue>) -> Option<String> {
    let raw = header?.to_str().ok()?.trim();
    if raw.is_empty() || raw == "*" || raw.starts_with("W/") || raw.contains(',') {
        return None;
    }

    let token = match raw.strip_prefix('"') {
        Some(rest) => rest.strip_suffix('"')?,
        None => raw,
    };

    let well_formed = !token.is_empty()
        && token
            .bytes()
            .all(|byte| byte.is_ascii_graphic() && byte != b'"');
    well_formed.then(|| token.to_string())
}

fn quoted(fingerprint: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!("\"{fingerprint}\"")).ok()
}

impl<T> IntoResponse for Decision<T>
where
    T: Serialize,
{
    fn into_response(self) -> Response {
        let mut response = match self {
            Decision::NotModified => StatusCode::NOT_MODIFIED.into_response(),
            Decision::Payload { body, fingerprint } => {
                let mut response = Json(body).into_response();
                if let Some(value) = quoted(fingerprint.as_str()) {
                    response.headers_mut().insert(ETAG, value);
                }
                response
            }
        };
        response
            .headers_mut()
            .insert(CACHE_CONTROL, HeaderValue::from_static("private, no-cache"));
        response
    }
}
