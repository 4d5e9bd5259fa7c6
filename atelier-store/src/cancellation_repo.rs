use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use atelier_core::{CoreError, CoreResult, PageRequest};
use atelier_order::{AdminResponse, CancellationRepository, CancellationRequest, CancellationStatus, RefundDetails};

use crate::database::{enum_from_text, enum_to_text, map_db_error};

const REQUEST_COLUMNS: &str = "id, order_id, owner_id, reason, details, status, proposed_refund_percentage, \
     rule_source, expected_refund_amt, admin_response, refund_details, created_at, updated_at";

/// Cancellation requests in PostgreSQL.
///
/// A partial unique index on `order_id` for PENDING/APPROVED rows enforces one active
/// request per order, so concurrent inserts lose with a unique violation.
pub struct PgCancellationRepository {
    pool: PgPool,
}

impl PgCancellationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct RequestRow {
    id: Uuid,
    order_id: Uuid,
    owner_id: String,
    reason: String,
    details: Option<String>,
    status: String,
    proposed_refund_percentage: i16,
    rule_source: String,
    expected_refund_amt: i64,
    admin_response: Option<Json<AdminResponse>>,
    refund_details: Option<Json<RefundDetails>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RequestRow> for CancellationRequest {
    type Error = CoreError;

    fn try_from(row: RequestRow) -> Result<Self, Self::Error> {
        Ok(CancellationRequest {
            id: row.id,
            order_id: row.order_id,
            owner_id: row.owner_id,
            reason: enum_from_text("reason", &row.reason)?,
            details: row.details,
            status: row.status.parse().map_err(CoreError::internal)?,
            proposed_refund_percentage: u8::try_from(row.proposed_refund_percentage)
                .map_err(CoreError::internal)?,
            rule_source: enum_from_text("rule_source", &row.rule_source)?,
            expected_refund_amt: row.expected_refund_amt,
            admin_response: row.admin_response.map(|r| r.0),
            refund_details: row.refund_details.map(|r| r.0),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_requests(rows: Vec<RequestRow>) -> CoreResult<Vec<CancellationRequest>> {
    rows.into_iter().map(CancellationRequest::try_from).collect()
}

#[async_trait]
impl CancellationRepository for PgCancellationRepository {
    async fn insert_active(&self, request: &CancellationRequest) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO cancellation_requests (id, order_id, owner_id, reason, details, status,
                                               proposed_refund_percentage, rule_source, expected_refund_amt,
                                               admin_response, refund_details, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(request.id)
        .bind(request.order_id)
        .bind(&request.owner_id)
        .bind(enum_to_text(&request.reason)?)
        .bind(&request.details)
        .bind(request.status.as_str())
        .bind(request.proposed_refund_percentage as i16)
        .bind(request.rule_source.as_str())
        .bind(request.expected_refund_amt)
        .bind(request.admin_response.as_ref().map(Json))
        .bind(request.refund_details.as_ref().map(Json))
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match map_db_error(e) {
            CoreError::ConflictError(_) => CoreError::ConflictError(format!(
                "order {} already has an active cancellation request",
                request.order_id
            )),
            other => other,
        })?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<CancellationRequest>> {
        let row: Option<RequestRow> = sqlx::query_as(&format!(
            "SELECT {} FROM cancellation_requests WHERE id = $1",
            REQUEST_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;
        row.map(CancellationRequest::try_from).transpose()
    }

    async fn replace_if_status(
        &self,
        request: &CancellationRequest,
        expected: CancellationStatus,
    ) -> CoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE cancellation_requests
            SET status = $2, admin_response = $3, refund_details = $4, updated_at = $5
            WHERE id = $1 AND status = $6
            "#,
        )
        .bind(request.id)
        .bind(request.status.as_str())
        .bind(request.admin_response.as_ref().map(Json))
        .bind(request.refund_details.as_ref().map(Json))
        .bind(request.updated_at)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_for_owner(&self, owner_id: &str) -> CoreResult<Vec<CancellationRequest>> {
        let rows: Vec<RequestRow> = sqlx::query_as(&format!(
            "SELECT {} FROM cancellation_requests WHERE owner_id = $1 ORDER BY created_at DESC",
            REQUEST_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;
        into_requests(rows)
    }

    async fn list(
        &self,
        status: Option<CancellationStatus>,
        page: PageRequest,
    ) -> CoreResult<(Vec<CancellationRequest>, u64)> {
        let page = page.normalized();
        let status = status.map(|s| s.as_str());

        let rows: Vec<RequestRow> = sqlx::query_as(&format!(
            "SELECT {} FROM cancellation_requests WHERE ($1::TEXT IS NULL OR status = $1) \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            REQUEST_COLUMNS
        ))
        .bind(status)
        .bind(i64::from(page.limit))
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM cancellation_requests WHERE ($1::TEXT IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok((into_requests(rows)?, total.max(0) as u64))
    }
}
