use crate::database::error::{DatabaseError, DbResult};
use crate::payments::types::{Booking, BookingPaymentStatus, BookingStatus};
use bigdecimal::BigDecimal;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

/// The slice of a `bookings` row the settlement core reads
#[derive(Debug, Clone, FromRow)]
pub struct BookingRow {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub guide_id: Uuid,
    pub status: String,
    pub payment_status: String,
    pub total_price: BigDecimal,
}

impl TryFrom<BookingRow> for Booking {
    type Error = DatabaseError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let status = BookingStatus::from_db_status(&row.status).ok_or_else(|| {
            DatabaseError::corrupt_row(format!(
                "booking {} has unknown status '{}'",
                row.id, row.status
            ))
        })?;
        let payment_status =
            BookingPaymentStatus::from_db_status(&row.payment_status).ok_or_else(|| {
                DatabaseError::corrupt_row(format!(
                    "booking {} has unknown payment_status '{}'",
                    row.id, row.payment_status
                ))
            })?;

        Ok(Booking {
            id: row.id,
            customer_id: row.customer_id,
            guide_id: row.guide_id,
            status,
            payment_status,
            total_price: row.total_price,
        })
    }
}

/// Narrow access to `bookings`: reads, plus the two status columns inside a transaction
#[derive(Clone)]
pub struct BookingRepository {
    pool: PgPool,
}

impl BookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> DbResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(
            "SELECT id, customer_id, guide_id, status, payment_status, total_price
             FROM bookings WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        row.map(Booking::try_from).transpose()
    }

    pub async fn lock_by_id_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> DbResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(
            "SELECT id, customer_id, guide_id, status, payment_status, total_price
             FROM bookings WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        row.map(Booking::try_from).transpose()
    }

    pub async fn set_status_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        status: BookingStatus,
        payment_status: BookingPaymentStatus,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE bookings SET status = $2, payment_status = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status.to_db_status())
        .bind(payment_status.to_db_status())
        .execute(&mut **tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Booking", id));
        }
        Ok(())
    }

    pub async fn set_payment_status_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        payment_status: BookingPaymentStatus,
    ) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE bookings SET payment_status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(payment_status.to_db_status())
        .execute(&mut **tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Booking", id));
        }
        Ok(())
    }
}
