use sqlx::{sqlite::SqliteRow, Row};

use celebra_core::domain::booking::{Booking, BookingId, PackageDetails, PaymentStatus, UserId};
use celebra_core::domain::payment::{OrderId, PaymentId};

use super::{encode_json, parse_json, parse_timestamp, BookingInsert, BookingRepository, RepositoryError};
use crate::DbPool;

const BOOKING_COLUMNS: &str = "id,
    user_id,
    order_id,
    payment_id,
    package_details_json,
    total_amount,
    advance_amount,
    remaining_amount,
    payment_status,
    created_at";

pub struct SqlBookingRepository {
    pool: DbPool,
}

impl SqlBookingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl BookingRepository for SqlBookingRepository {
    async fn find_by_payment_id(
        &self,
        payment_id: &PaymentId,
    ) -> Result<Option<Booking>, RepositoryError> {
        let row =
            sqlx::query(&format!("SELECT {BOOKING_COLUMNS} FROM booking WHERE payment_id = ?"))
                .bind(&payment_id.0)
                .fetch_optional(&self.pool)
                .await?;

        row.map(booking_from_row).transpose()
    }

    async fn insert(&self, booking: Booking) -> Result<BookingInsert, RepositoryError> {
        let package_details_json = encode_json("package_details_json", &booking.package_details)?;

        let result = sqlx::query(
            "INSERT INTO booking (
                id,
                user_id,
                order_id,
                payment_id,
                package_details_json,
                total_amount,
                advance_amount,
                remaining_amount,
                payment_status,
                created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(payment_id) DO NOTHING",
        )
        .bind(&booking.id.0)
        .bind(&booking.user_id.0)
        .bind(&booking.order_id.0)
        .bind(&booking.payment_id.0)
        .bind(package_details_json)
        .bind(booking.total_amount)
        .bind(booking.advance_amount)
        .bind(booking.remaining_amount)
        .bind(booking.payment_status.as_str())
        .bind(booking.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(BookingInsert::Created(booking));
        }

        let existing = self.find_by_payment_id(&booking.payment_id).await?.ok_or_else(|| {
            RepositoryError::Conflict(format!(
                "booking for payment `{}` was neither inserted nor found",
                booking.payment_id
            ))
        })?;
        Ok(BookingInsert::Existing(existing))
    }
}

fn booking_from_row(row: SqliteRow) -> Result<Booking, RepositoryError> {
    let status_raw = row.try_get::<String, _>("payment_status")?;
    let payment_status = PaymentStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown payment status `{status_raw}`")))?;
    let package_details: PackageDetails = parse_json(
        "package_details_json",
        &row.try_get::<String, _>("package_details_json")?,
    )?;

    Ok(Booking {
        id: BookingId(row.try_get("id")?),
        user_id: UserId(row.try_get("user_id")?),
        order_id: OrderId(row.try_get("order_id")?),
        payment_id: PaymentId(row.try_get("payment_id")?),
        package_details,
        total_amount: row.try_get("total_amount")?,
        advance_amount: row.try_get("advance_amount")?,
        remaining_amount: row.try_get("remaining_amount")?,
        payment_status,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}
