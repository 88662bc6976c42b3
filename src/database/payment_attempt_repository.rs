use crate::database::error::{DatabaseError, DbResult};
use crate::payments::types::{
    NewPaymentAttempt, PaymentAttempt, PaymentAttemptStatus, ProviderName,
};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

const ATTEMPT_COLUMNS: &str = "id, booking_id, payer_id, payee_id, amount, currency, method, status, \
     provider_order_id, provider_request_id, provider_transaction_id, provider_payload, \
     refunded_amount, refunded_at, created_at, updated_at";

/// Raw `payment_attempts` row
#[derive(Debug, Clone, FromRow)]
pub struct PaymentAttemptRow {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub payer_id: Uuid,
    pub payee_id: Uuid,
    pub amount: BigDecimal,
    pub currency: String,
    pub method: String,
    pub status: String,
    pub provider_order_id: String,
    pub provider_request_id: String,
    pub provider_transaction_id: Option<String>,
    pub provider_payload: JsonValue,
    pub refunded_amount: Option<BigDecimal>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentAttemptRow> for PaymentAttempt {
    type Error = DatabaseError;

    fn try_from(row: PaymentAttemptRow) -> Result<Self, Self::Error> {
        let status = PaymentAttemptStatus::from_db_status(&row.status).ok_or_else(|| {
            DatabaseError::corrupt_row(format!(
                "payment attempt {} has unknown status '{}'",
                row.id, row.status
            ))
        })?;
        let method = row
            .method
            .parse::<ProviderName>()
            .map_err(|e| DatabaseError::corrupt_row(e.to_string()))?;

        Ok(PaymentAttempt {
            id: row.id,
            booking_id: row.booking_id,
            payer_id: row.payer_id,
            payee_id: row.payee_id,
            amount: row.amount,
            currency: row.currency,
            method,
            status,
            provider_order_id: row.provider_order_id,
            provider_request_id: row.provider_request_id,
            provider_transaction_id: row.provider_transaction_id,
            provider_payload: row.provider_payload,
            refunded_amount: row.refunded_amount,
            refunded_at: row.refunded_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_attempt(row: Option<PaymentAttemptRow>) -> DbResult<Option<PaymentAttempt>> {
    row.map(PaymentAttempt::try_from).transpose()
}

/// Repository for `payment_attempts`
#[derive(Clone)]
pub struct PaymentAttemptRepository {
    pool: PgPool,
}

impl PaymentAttemptRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, attempt: NewPaymentAttempt) -> DbResult<PaymentAttempt> {
        let payload = match attempt.provider_payload {
            JsonValue::Array(entries) => JsonValue::Array(entries),
            JsonValue::Null => JsonValue::Array(Vec::new()),
            single => JsonValue::Array(vec![single]),
        };

        let row = sqlx::query_as::<_, PaymentAttemptRow>(&format!(
            "INSERT INTO payment_attempts (
                id, booking_id, payer_id, payee_id, amount, currency, method, status,
                provider_order_id, provider_request_id, provider_payload
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING {}",
            ATTEMPT_COLUMNS
        ))
        .bind(attempt.id)
        .bind(attempt.booking_id)
        .bind(attempt.payer_id)
        .bind(attempt.payee_id)
        .bind(attempt.amount)
        .bind(attempt.currency)
        .bind(attempt.method.as_str())
        .bind(attempt.status.to_db_status())
        .bind(attempt.provider_order_id)
        .bind(attempt.provider_request_id)
        .bind(payload)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        row.try_into()
    }

    pub async fn find_by_id(&self, id: Uuid) -> DbResult<Option<PaymentAttempt>> {
        let row = sqlx::query_as::<_, PaymentAttemptRow>(&format!(
            "SELECT {} FROM payment_attempts WHERE id = $1",
            ATTEMPT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        into_attempt(row)
    }

    pub async fn find_by_order_id(&self, order_id: &str) -> DbResult<Option<PaymentAttempt>> {
        let row = sqlx::query_as::<_, PaymentAttemptRow>(&format!(
            "SELECT {} FROM payment_attempts WHERE provider_order_id = $1",
            ATTEMPT_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        into_attempt(row)
    }

    pub async fn find_latest_by_booking(
        &self,
        booking_id: Uuid,
    ) -> DbResult<Option<PaymentAttempt>> {
        let row = sqlx::query_as::<_, PaymentAttemptRow>(&format!(
            "SELECT {} FROM payment_attempts
             WHERE booking_id = $1
             ORDER BY created_at DESC
             LIMIT 1",
            ATTEMPT_COLUMNS
        ))
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        into_attempt(row)
    }

    pub async fn find_latest_captured(
        &self,
        booking_id: Uuid,
    ) -> DbResult<Option<PaymentAttempt>> {
        let row = sqlx::query_as::<_, PaymentAttemptRow>(&format!(
            "SELECT {} FROM payment_attempts
             WHERE booking_id = $1 AND status = 'captured'
             ORDER BY created_at DESC
             LIMIT 1",
            ATTEMPT_COLUMNS
        ))
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        into_attempt(row)
    }

    pub async fn list_by_booking(&self, booking_id: Uuid) -> DbResult<Vec<PaymentAttempt>> {
        let rows = sqlx::query_as::<_, PaymentAttemptRow>(&format!(
            "SELECT {} FROM payment_attempts
             WHERE booking_id = $1
             ORDER BY created_at DESC",
            ATTEMPT_COLUMNS
        ))
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        rows.into_iter().map(PaymentAttempt::try_from).collect()
    }

    pub async fn append_payload(&self, id: Uuid, entry: JsonValue) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE payment_attempts
             SET provider_payload = COALESCE(provider_payload, '[]'::jsonb) || jsonb_build_array($2::jsonb),
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(entry)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("PaymentAttempt", id));
        }
        Ok(())
    }

    /// `SELECT ... FOR UPDATE` by provider order id inside an open transaction.
    pub async fn lock_by_order_id_tx(
        tx: &mut Transaction<'_, Postgres>,
        order_id: &str,
    ) -> DbResult<Option<PaymentAttempt>> {
        let row = sqlx::query_as::<_, PaymentAttemptRow>(&format!(
            "SELECT {} FROM payment_attempts WHERE provider_order_id = $1 FOR UPDATE",
            ATTEMPT_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        into_attempt(row)
    }

    pub async fn lock_by_id_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> DbResult<Option<PaymentAttempt>> {
        let row = sqlx::query_as::<_, PaymentAttemptRow>(&format!(
            "SELECT {} FROM payment_attempts WHERE id = $1 FOR UPDATE",
            ATTEMPT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        into_attempt(row)
    }

    /// Whether another attempt of the booking is `captured` or `refunded`.
    pub async fn other_capture_exists_tx(
        tx: &mut Transaction<'_, Postgres>,
        booking_id: Uuid,
        excluding_id: Uuid,
    ) -> DbResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                SELECT 1 FROM payment_attempts
                WHERE booking_id = $1 AND id <> $2 AND status IN ('captured', 'refunded')
             )",
        )
        .bind(booking_id)
        .bind(excluding_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(exists)
    }

    pub async fn update_status_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        status: PaymentAttemptStatus,
        provider_transaction_id: Option<&str>,
    ) -> DbResult<()> {
        sqlx::query(
            "UPDATE payment_attempts
             SET status = $2,
                 provider_transaction_id = COALESCE($3, provider_transaction_id),
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(status.to_db_status())
        .bind(provider_transaction_id)
        .execute(&mut **tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(())
    }

    pub async fn mark_refunded_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        amount: &BigDecimal,
    ) -> DbResult<PaymentAttempt> {
        let row = sqlx::query_as::<_, PaymentAttemptRow>(&format!(
            "UPDATE payment_attempts
             SET status = 'refunded',
                 refunded_amount = $2,
                 refunded_at = NOW(),
                 updated_at = NOW()
             WHERE id = $1 AND status = 'captured'
             RETURNING {}",
            ATTEMPT_COLUMNS
        ))
        .bind(id)
        .bind(amount)
        .fetch_one(&mut **tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        row.try_into()
    }

    pub async fn append_payload_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        entry: JsonValue,
    ) -> DbResult<()> {
        sqlx::query(
            "UPDATE payment_attempts
             SET provider_payload = COALESCE(provider_payload, '[]'::jsonb) || jsonb_build_array($2::jsonb)
             WHERE id = $1",
        )
        .bind(id)
        .bind(entry)
        .execute(&mut **tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str) -> PaymentAttemptRow {
        PaymentAttemptRow {
            id: Uuid::new_v4(),
            booking_id: Uuid::new_v4(),
            payer_id: Uuid::new_v4(),
            payee_id: Uuid::new_v4(),
            amount: BigDecimal::from(200),
            currency: "VND".to_string(),
            method: "momo".to_string(),
            status: status.to_string(),
            provider_order_id: "ORDER-1".to_string(),
            provider_request_id: "REQ-1".to_string(),
            provider_transaction_id: None,
            provider_payload: serde_json::json!([]),
            refunded_amount: None,
            refunded_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn row_maps_into_domain_attempt() {
        let attempt = PaymentAttempt::try_from(row("captured")).unwrap();
        assert_eq!(attempt.status, PaymentAttemptStatus::Captured);
        assert_eq!(attempt.method, ProviderName::Momo);
    }

    #[test]
    fn unknown_status_is_a_corrupt_row() {
        let err = PaymentAttempt::try_from(row("paid")).unwrap_err();
        assert!(err.to_string().contains("unknown status 'paid'"));
    }
}
