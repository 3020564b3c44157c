use std::str::FromStr;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{ApiKeysRepo, CreateApiKeyParams, RepoError};
use crate::domain::Role;
use crate::domain::api_keys::ApiKeyRecord;

use super::{PostgresRepositories, map_sqlx_error};

const API_KEY_COLUMNS: &str = "id, name, description, prefix, hashed_secret, roles, expires_at, \
    revoked_at, last_used_at, created_by, created_at";

#[derive(Debug, sqlx::FromRow)]
struct ApiKeyRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    prefix: String,
    hashed_secret: Vec<u8>,
    roles: Vec<String>,
    expires_at: Option<OffsetDateTime>,
    revoked_at: Option<OffsetDateTime>,
    last_used_at: Option<OffsetDateTime>,
    created_by: String,
    created_at: OffsetDateTime,
}

impl TryFrom<ApiKeyRow> for ApiKeyRecord {
    type Error = RepoError;

    fn try_from(row: ApiKeyRow) -> Result<Self, Self::Error> {
        let roles = row
            .roles
            .iter()
            .map(|raw| {
                Role::from_str(raw).map_err(|_| RepoError::Integrity {
                    message: format!("api key {} carries unknown role `{raw}`", row.id),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ApiKeyRecord {
            id: row.id,
            name: row.name,
            description: row.description,
            prefix: row.prefix,
            hashed_secret: row.hashed_secret,
            roles,
            expires_at: row.expires_at,
            revoked_at: row.revoked_at,
            last_used_at: row.last_used_at,
            created_by: row.created_by,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl ApiKeysRepo for PostgresRepositories {
    async fn create_key(&self, params: CreateApiKeyParams) -> Result<ApiKeyRecord, RepoError> {
        let roles: Vec<String> = params
            .roles
            .iter()
            .map(|role| role.as_str().to_string())
            .collect();
        let sql = format!(
            "INSERT INTO api_keys (id, name, description, prefix, hashed_secret, roles, \
             expires_at, created_by, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {API_KEY_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ApiKeyRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(params.name)
            .bind(params.description)
            .bind(params.prefix)
            .bind(params.hashed_secret)
            .bind(roles)
            .bind(params.expires_at)
            .bind(params.created_by)
            .bind(OffsetDateTime::now_utc())
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        ApiKeyRecord::try_from(row)
    }

    async fn list_keys(&self) -> Result<Vec<ApiKeyRecord>, RepoError> {
        let sql = format!("SELECT {API_KEY_COLUMNS} FROM api_keys ORDER BY created_at DESC, id DESC");
        let rows = sqlx::query_as::<_, ApiKeyRow>(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        rows.into_iter().map(ApiKeyRecord::try_from).collect()
    }

    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<ApiKeyRecord>, RepoError> {
        let sql = format!("SELECT {API_KEY_COLUMNS} FROM api_keys WHERE prefix = $1");
        let row = sqlx::query_as::<_, ApiKeyRow>(&sql)
            .bind(prefix)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        row.map(ApiKeyRecord::try_from).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ApiKeyRecord>, RepoError> {
        let sql = format!("SELECT {API_KEY_COLUMNS} FROM api_keys WHERE id = $1");
        let row = sqlx::query_as::<_, ApiKeyRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        row.map(ApiKeyRecord::try_from).transpose()
    }

    async fn revoke_key(&self, id: Uuid, revoked_at: OffsetDateTime) -> Result<(), RepoError> {
        let result = sqlx::query(
            "UPDATE api_keys SET revoked_at = COALESCE(revoked_at, $2) WHERE id = $1",
        )
        .bind(id)
        .bind(revoked_at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn update_last_used(
        &self,
        id: Uuid,
        last_used_at: OffsetDateTime,
    ) -> Result<(), RepoError> {
        sqlx::query("UPDATE api_keys SET last_used_at = $2 WHERE id = $1")
            .bind(id)
            .bind(last_used_at)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}
