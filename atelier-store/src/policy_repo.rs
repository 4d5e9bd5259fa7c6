use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use atelier_core::{CoreError, CoreResult};
use atelier_policy::{CancellationPolicy, PolicyRepository};

use crate::database::map_db_error;

const POLICY_COLUMNS: &str = "id, is_active, version, document, created_at, updated_at";

/// The active cancellation policy as a versioned JSONB document.
///
/// A partial unique index on `is_active` keeps a single active row, which makes
/// seeding an `ON CONFLICT DO NOTHING` insert followed by a re-read.
pub struct PgPolicyRepository {
    pool: PgPool,
}

impl PgPolicyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_active(&self) -> CoreResult<Option<CancellationPolicy>> {
        let row: Option<PolicyRow> = sqlx::query_as(&format!(
            "SELECT {} FROM cancellation_policies WHERE is_active",
            POLICY_COLUMNS
        ))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(row.map(CancellationPolicy::from))
    }
}

#[derive(sqlx::FromRow)]
struct PolicyRow {
    id: Uuid,
    is_active: bool,
    version: i64,
    document: Json<CancellationPolicy>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Columns win over whatever the document says about identity and versioning.
impl From<PolicyRow> for CancellationPolicy {
    fn from(row: PolicyRow) -> Self {
        let mut policy = row.document.0;
        policy.id = row.id;
        policy.is_active = row.is_active;
        policy.version = row.version;
        policy.created_at = row.created_at;
        policy.updated_at = row.updated_at;
        policy
    }
}

#[async_trait]
impl PolicyRepository for PgPolicyRepository {
    async fn get_active(&self) -> CoreResult<Option<CancellationPolicy>> {
        self.fetch_active().await
    }

    async fn seed_active(&self, policy: &CancellationPolicy) -> CoreResult<CancellationPolicy> {
        sqlx::query(
            r#"
            INSERT INTO cancellation_policies (id, is_active, version, document, created_at, updated_at)
            VALUES ($1, TRUE, $2, $3, $4, $4)
            ON CONFLICT (is_active) WHERE is_active DO NOTHING
            "#,
        )
        .bind(policy.id)
        .bind(policy.version)
        .bind(Json(policy))
        .bind(policy.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        self.fetch_active()
            .await?
            .ok_or_else(|| CoreError::InternalError("active policy missing after seeding".to_string()))
    }

    async fn replace_active(&self, policy: &CancellationPolicy) -> CoreResult<CancellationPolicy> {
        let row: Option<PolicyRow> = sqlx::query_as(&format!(
            "UPDATE cancellation_policies SET document = $1, version = version + 1, updated_at = NOW() \
             WHERE is_active RETURNING {}",
            POLICY_COLUMNS
        ))
        .bind(Json(policy))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        row.map(CancellationPolicy::from)
            .ok_or_else(|| CoreError::NotFoundError("active cancellation policy".to_string()))
    }
}
