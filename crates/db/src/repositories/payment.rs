use sqlx::{sqlite::SqliteRow, Row};

use celebra_core::domain::booking::{PackageDetails, UserId};
use celebra_core::domain::payment::{
    OrderId, PaymentId, PaymentOrder, PaymentOrderStatus, VerificationOutcome, VerificationRecord,
};

use super::{
    encode_json, parse_json, parse_timestamp, parse_u32, PaymentOrderRepository, RepositoryError,
    VerificationRepository,
};
use crate::DbPool;

pub struct SqlPaymentOrderRepository {
    pool: DbPool,
}

impl SqlPaymentOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl PaymentOrderRepository for SqlPaymentOrderRepository {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<PaymentOrder>, RepositoryError> {
        let row = sqlx::query(
            "SELECT
                id,
                user_id,
                amount,
                currency,
                package_details_json,
                status,
                created_at,
                updated_at
             FROM payment_order
             WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(order_from_row).transpose()
    }

    async fn save(&self, order: PaymentOrder) -> Result<(), RepositoryError> {
        let package_details_json = encode_json("package_details_json", &order.package_details)?;

        sqlx::query(
            "INSERT INTO payment_order (
                id,
                user_id,
                amount,
                currency,
                package_details_json,
                status,
                created_at,
                updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                updated_at = excluded.updated_at",
        )
        .bind(&order.id.0)
        .bind(&order.user_id.0)
        .bind(order.amount)
        .bind(&order.currency)
        .bind(package_details_json)
        .bind(order.status.as_str())
        .bind(order.created_at.to_rfc3339())
        .bind(order.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

pub struct SqlVerificationRepository {
    pool: DbPool,
}

impl SqlVerificationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl VerificationRepository for SqlVerificationRepository {
    async fn find(
        &self,
        order_id: &OrderId,
        payment_id: &PaymentId,
    ) -> Result<Option<VerificationRecord>, RepositoryError> {
        let row = sqlx::query(
            "SELECT
                order_id,
                payment_id,
                signature_hash,
                outcome,
                attempt_count,
                first_seen_at,
                last_seen_at
             FROM payment_verification
             WHERE order_id = ? AND payment_id = ?",
        )
        .bind(&order_id.0)
        .bind(&payment_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(verification_from_row).transpose()
    }

    async fn find_verified_by_payment_id(
        &self,
        payment_id: &PaymentId,
    ) -> Result<Option<VerificationRecord>, RepositoryError> {
        let row = sqlx::query(
            "SELECT
                order_id,
                payment_id,
                signature_hash,
                outcome,
                attempt_count,
                first_seen_at,
                last_seen_at
             FROM payment_verification
             WHERE payment_id = ? AND outcome = 'verified'
             ORDER BY first_seen_at ASC
             LIMIT 1",
        )
        .bind(&payment_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(verification_from_row).transpose()
    }

    async fn save(&self, record: VerificationRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO payment_verification (
                order_id,
                payment_id,
                signature_hash,
                outcome,
                attempt_count,
                first_seen_at,
                last_seen_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(order_id, payment_id) DO UPDATE SET
                signature_hash = excluded.signature_hash,
                outcome = excluded.outcome,
                attempt_count = excluded.attempt_count,
                last_seen_at = excluded.last_seen_at",
        )
        .bind(&record.order_id.0)
        .bind(&record.payment_id.0)
        .bind(&record.signature_hash)
        .bind(record.outcome.as_str())
        .bind(i64::from(record.attempt_count))
        .bind(record.first_seen_at.to_rfc3339())
        .bind(record.last_seen_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn order_from_row(row: SqliteRow) -> Result<PaymentOrder, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = PaymentOrderStatus::parse(&status_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown payment order status `{status_raw}`"))
    })?;
    let package_details: PackageDetails = parse_json(
        "package_details_json",
        &row.try_get::<String, _>("package_details_json")?,
    )?;

    Ok(PaymentOrder {
        id: OrderId(row.try_get("id")?),
        user_id: UserId(row.try_get("user_id")?),
        amount: row.try_get("amount")?,
        currency: row.try_get("currency")?,
        package_details,
        status,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

fn verification_from_row(row: SqliteRow) -> Result<VerificationRecord, RepositoryError> {
    let outcome_raw = row.try_get::<String, _>("outcome")?;
    let outcome = VerificationOutcome::parse(&outcome_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown verification outcome `{outcome_raw}`"))
    })?;

    Ok(VerificationRecord {
        order_id: OrderId(row.try_get("order_id")?),
        payment_id: PaymentId(row.try_get("payment_id")?),
        signature_hash: row.try_get("signature_hash")?,
        outcome,
        attempt_count: parse_u32("attempt_count", row.try_get("attempt_count")?)?,
        first_seen_at: parse_timestamp("first_seen_at", row.try_get("first_seen_at")?)?,
        last_seen_at: parse_timestamp("last_seen_at", row.try_get("last_seen_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Utc};

    use celebra_core::cpq::pricing::PriceQuote;
    use celebra_core::domain::booking::{PackageDetails, UserId};
    use celebra_core::domain::payment::{
        OrderId, PaymentId, PaymentOrder, PaymentOrderStatus, VerificationOutcome,
        VerificationRecord,
    };
    use celebra_core::domain::selection::SelectionState;

    use super::{SqlPaymentOrderRepository, SqlVerificationRepository};
    use crate::migrations;
    use crate::repositories::{PaymentOrderRepository, VerificationRepository};
    use crate::{connect_with_settings, DbPool};

    #[tokio::test]
    async fn order_round_trips_and_status_updates_in_place() {
        let pool = setup_pool().await;
        let repo = SqlPaymentOrderRepository::new(pool);
        let mut order = sample_order("order_A");

        repo.save(order.clone()).await.expect("save order");
        assert_eq!(repo.find_by_id(&order.id).await.expect("find order"), Some(order.clone()));

        order.status = PaymentOrderStatus::Verified;
        order.updated_at = order.updated_at + Duration::minutes(2);
        repo.save(order.clone()).await.expect("update order");

        let found = repo.find_by_id(&order.id).await.expect("find updated").expect("present");
        assert_eq!(found.status, PaymentOrderStatus::Verified);
        assert_eq!(found.updated_at, order.updated_at);
        assert_eq!(found.amount, 8_400);
    }

    #[tokio::test]
    async fn missing_order_is_none() {
        let pool = setup_pool().await;
        let repo = SqlPaymentOrderRepository::new(pool);

        let found = repo.find_by_id(&OrderId("order_missing".to_owned())).await.expect("query");
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn verification_upsert_keeps_first_seen_and_bumps_attempts() {
        let pool = setup_pool().await;
        let orders = SqlPaymentOrderRepository::new(pool.clone());
        orders.save(sample_order("order_B")).await.expect("save order");
        let repo = SqlVerificationRepository::new(pool);

        let mut record = sample_verification("order_B", "pay_B");
        repo.save(record.clone()).await.expect("first verification");

        record.attempt_count = 2;
        record.last_seen_at = record.last_seen_at + Duration::seconds(30);
        repo.save(record.clone()).await.expect("replayed verification");

        let found = repo
            .find(&record.order_id, &record.payment_id)
            .await
            .expect("find verification")
            .expect("present");
        assert_eq!(found.attempt_count, 2);
        assert_eq!(found.first_seen_at, fixed_time());
        assert_eq!(found.last_seen_at, record.last_seen_at);

        let by_payment = repo
            .find_verified_by_payment_id(&PaymentId("pay_B".to_owned()))
            .await
            .expect("find by payment");
        assert_eq!(by_payment, Some(found));
    }

    #[tokio::test]
    async fn rejected_verification_is_not_returned_as_verified() {
        let pool = setup_pool().await;
        SqlPaymentOrderRepository::new(pool.clone())
            .save(sample_order("order_C"))
            .await
            .expect("save order");
        let repo = SqlVerificationRepository::new(pool);

        let mut record = sample_verification("order_C", "pay_C");
        record.outcome = VerificationOutcome::Rejected;
        repo.save(record).await.expect("save rejected");

        let found = repo
            .find_verified_by_payment_id(&PaymentId("pay_C".to_owned()))
            .await
            .expect("query");
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn verification_for_unknown_order_violates_foreign_key() {
        let pool = setup_pool().await;
        let repo = SqlVerificationRepository::new(pool);

        let error = repo
            .save(sample_verification("order_ghost", "pay_ghost"))
            .await
            .expect_err("foreign key enforced");
        assert!(error.to_string().contains("database error"));
    }

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    fn fixed_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-10-01T09:30:00Z")
            .expect("valid timestamp")
            .with_timezone(&Utc)
    }

    fn sample_order(id: &str) -> PaymentOrder {
        PaymentOrder {
            id: OrderId(id.to_owned()),
            user_id: UserId("user_42".to_owned()),
            amount: 8_400,
            currency: "INR".to_owned(),
            package_details: PackageDetails::capture(
                &SelectionState::default(),
                &PriceQuote::default(),
            ),
            status: PaymentOrderStatus::Created,
            created_at: fixed_time(),
            updated_at: fixed_time(),
        }
    }

    fn sample_verification(order_id: &str, payment_id: &str) -> VerificationRecord {
        VerificationRecord {
            order_id: OrderId(order_id.to_owned()),
            payment_id: PaymentId(payment_id.to_owned()),
            signature_hash: "ab".repeat(32),
            outcome: VerificationOutcome::Verified,
            attempt_count: 1,
            first_seen_at: fixed_time(),
            last_seen_at: fixed_time(),
        }
    }
}
