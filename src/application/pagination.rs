//! Shared cursor pagination helpers.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

pub const DEFAULT_PAGE_LIMIT: u32 = 50;
pub const MAX_PAGE_LIMIT: u32 = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VehicleCursorPayload {
    registration: String,
    id: Uuid,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct AuditCursorPayload {
    created_at: OffsetDateTime,
    id: Uuid,
}

/// Cursor for paginating vehicles ordered by registration then id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VehicleCursor {
    registration: String,
    id: Uuid,
}

/// Cursor for paginating audit log entries in reverse chronological order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditCursor {
    created_at: OffsetDateTime,
    id: Uuid,
}

impl VehicleCursor {
    pub fn new(registration: impl Into<String>, id: Uuid) -> Self {
        Self {
            registration: registration.into(),
            id,
        }
    }

    pub fn registration(&self) -> &str {
        &self.registration
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn encode(&self) -> String {
        encode_payload(&VehicleCursorPayload {
            registration: self.registration.clone(),
            id: self.id,
        })
    }

    pub fn decode(cursor: &str) -> Result<Self, PaginationError> {
        let payload: VehicleCursorPayload = decode_payload(cursor)?;
        Ok(Self {
            registration: payload.registration,
            id: payload.id,
        })
    }
}

impl AuditCursor {
    pub fn new(created_at: OffsetDateTime, id: Uuid) -> Self {
        Self { created_at, id }
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn encode(&self) -> String {
        encode_payload(&AuditCursorPayload {
            created_at: self.created_at,
            id: self.id,
        })
    }

    pub fn decode(cursor: &str) -> Result<Self, PaginationError> {
        let payload: AuditCursorPayload = decode_payload(cursor)?;
        Ok(Self {
            created_at: payload.created_at,
            id: payload.id,
        })
    }
}

// Payloads are plain structs of strings, uuids and timestamps, so JSON
// serialization cannot fail in practice.
fn encode_payload<T: Serialize>(payload: &T) -> String {
    let serialized = serde_json::to_vec(payload).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(serialized)
}

fn decode_payload<T: DeserializeOwned>(cursor: &str) -> Result<T, PaginationError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(cursor)
        .map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|err| PaginationError::InvalidCursor(err.to_string()))
}

/// Cursor-aware pagination request.
#[derive(Debug, Clone)]
pub struct PageRequest<C> {
    pub limit: u32,
    pub cursor: Option<C>,
}

impl<C> PageRequest<C> {
    pub fn new(limit: u32, cursor: Option<C>) -> Self {
        Self {
            limit: limit.clamp(1, MAX_PAGE_LIMIT),
            cursor,
        }
    }
}

/// Cursor-aware page result.
#[derive(Debug, Clone, Serialize)]
pub struct CursorPage<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> CursorPage<T> {
    pub fn new(items: Vec<T>, next_cursor: Option<String>) -> Self {
        Self { items, next_cursor }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> CursorPage<U> {
        CursorPage {
            items: self.items.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
        }
    }
}

#[derive(Debug, Error)]
pub enum PaginationError {
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
}
