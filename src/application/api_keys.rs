use std::sync::Arc;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{ApiKeysRepo, CreateApiKeyParams, RepoError};
use crate::domain::Role;
use crate::domain::api_keys::ApiKeyRecord;

const TOKEN_PREFIX: &str = "vor";
const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum ApiKeyError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("an api key needs at least one role")]
    InvalidRoles,
    #[error("api key name must not be empty")]
    InvalidName,
    #[error("key not found")]
    NotFound,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApiAuthError {
    #[error("missing api key")]
    Missing,
    #[error("invalid api key")]
    Invalid,
    #[error("expired api key")]
    Expired,
    #[error("revoked api key")]
    Revoked,
}

#[derive(Debug, Clone)]
pub struct IssueApiKeyCommand {
    pub name: String,
    pub description: Option<String>,
    pub roles: Vec<Role>,
    pub expires_at: Option<OffsetDateTime>,
    pub created_by: String,
}

#[derive(Debug, Clone)]
pub struct ApiKeyIssued {
    pub record: ApiKeyRecord,
    pub token: String,
}

/// Authenticated caller. Roles are expanded into claims at the HTTP edge.
#[derive(Debug, Clone)]
pub struct ApiPrincipal {
    pub key_id: Uuid,
    pub name: String,
    pub prefix: String,
    pub roles: Vec<Role>,
}

impl ApiPrincipal {
    /// Audit actor label for writes made with this key.
    pub fn actor(&self) -> String {
        format!("api_key:{}", self.prefix)
    }
}

#[derive(Clone)]
pub struct ApiKeyService {
    repo: Arc<dyn ApiKeysRepo>,
}

impl ApiKeyService {
    pub fn new(repo: Arc<dyn ApiKeysRepo>) -> Self {
        Self { repo }
    }

    pub async fn issue(&self, cmd: IssueApiKeyCommand) -> Result<ApiKeyIssued, ApiKeyError> {
        if cmd.roles.is_empty() {
            return Err(ApiKeyError::InvalidRoles);
        }
        let name = cmd.name.trim();
        if name.is_empty() {
            return Err(ApiKeyError::InvalidName);
        }

        let mut roles: Vec<Role> = Vec::with_capacity(cmd.roles.len());
        for role in cmd.roles {
            if !roles.contains(&role) {
                roles.push(role);
            }
        }

        let prefix = Self::generate_prefix();
        let secret = Self::generate_secret();
        let token = format!("{TOKEN_PREFIX}_{prefix}_{secret}");
        let hashed_secret = Self::hash_secret(&secret);

        let record = self
            .repo
            .create_key(CreateApiKeyParams {
                name: name.to_string(),
                description: cmd.description,
                prefix,
                hashed_secret,
                roles,
                expires_at: cmd.expires_at,
                created_by: cmd.created_by,
            })
            .await?;

        Ok(ApiKeyIssued { record, token })
    }

    pub async fn revoke(&self, id: Uuid) -> Result<ApiKeyRecord, ApiKeyError> {
        let now = OffsetDateTime::now_utc();
        match self.repo.revoke_key(id, now).await {
            Ok(()) => {}
            Err(RepoError::NotFound) => return Err(ApiKeyError::NotFound),
            Err(err) => return Err(err.into()),
        }
        self.repo
            .find_by_id(id)
            .await?
            .ok_or(ApiKeyError::NotFound)
    }

    pub async fn list(&self) -> Result<Vec<ApiKeyRecord>, ApiKeyError> {
        self.repo.list_keys().await.map_err(ApiKeyError::from)
    }

    pub async fn authenticate(&self, token: &str) -> Result<ApiPrincipal, ApiAuthError> {
        let parsed = Self::parse_token(token).ok_or(ApiAuthError::Invalid)?;
        let record = self
            .repo
            .find_by_prefix(&parsed.prefix)
            .await
            .map_err(|_| ApiAuthError::Invalid)?
            .ok_or(ApiAuthError::Invalid)?;

        let hashed_input = Self::hash_secret(&parsed.secret);
        if record.hashed_secret.ct_eq(&hashed_input).unwrap_u8() == 0 {
            return Err(ApiAuthError::Invalid);
        }

        let now = OffsetDateTime::now_utc();
        if let Some(revoked_at) = record.revoked_at
            && revoked_at <= now
        {
            return Err(ApiAuthError::Revoked);
        }
        if let Some(expires_at) = record.expires_at
            && expires_at <= now
        {
            return Err(ApiAuthError::Expired);
        }

        // best-effort last_used update; do not block auth
        let repo = self.repo.clone();
        let key_id = record.id;
        tokio::spawn(async move {
            if let Err(err) = repo.update_last_used(key_id, now).await {
                tracing::debug!(key_id = %key_id, error = %err, "failed to record api key usage");
            }
        });

        Ok(ApiPrincipal {
            key_id: record.id,
            name: record.name,
            prefix: record.prefix,
            roles: record.roles,
        })
    }

    fn hash_secret(secret: &str) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        hasher.finalize().to_vec()
    }

    fn generate_prefix() -> String {
        Uuid::new_v4().simple().to_string()[..12].to_string()
    }

    fn generate_secret() -> String {
        format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
    }

    fn parse_token(token: &str) -> Option<ParsedToken> {
        let mut parts = token.trim().splitn(3, '_');
        let prefix_tag = parts.next()?;
        if prefix_tag != TOKEN_PREFIX {
            return None;
        }
        let prefix = parts.next()?;
        let secret = parts.next()?;
        if secret.len() < MIN_SECRET_LEN || prefix.is_empty() {
            return None;
        }
        Some(ParsedToken {
            prefix: prefix.to_string(),
            secret: secret.to_string(),
        })
    }
}

struct ParsedToken {
    prefix: String,
    secret: String,
}
