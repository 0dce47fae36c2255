use std::collections::HashMap;

use tokio::sync::RwLock;

use celebra_core::domain::booking::Booking;
use celebra_core::domain::payment::{OrderId, PaymentId, PaymentOrder, VerificationOutcome, VerificationRecord};

use super::{
    BookingInsert, BookingRepository, PaymentOrderRepository, RepositoryError,
    VerificationRepository,
};

#[derive(Default)]
pub struct InMemoryPaymentOrderRepository {
    orders: RwLock<HashMap<String, PaymentOrder>>,
}

#[async_trait::async_trait]
impl PaymentOrderRepository for InMemoryPaymentOrderRepository {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<PaymentOrder>, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(orders.get(&id.0).cloned())
    }

    async fn save(&self, order: PaymentOrder) -> Result<(), RepositoryError> {
        let mut orders = self.orders.write().await;
        orders.insert(order.id.0.clone(), order);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryVerificationRepository {
    records: RwLock<HashMap<(String, String), VerificationRecord>>,
}

#[async_trait::async_trait]
impl VerificationRepository for InMemoryVerificationRepository {
    async fn find(
        &self,
        order_id: &OrderId,
        payment_id: &PaymentId,
    ) -> Result<Option<VerificationRecord>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.get(&(order_id.0.clone(), payment_id.0.clone())).cloned())
    }

    async fn find_verified_by_payment_id(
        &self,
        payment_id: &PaymentId,
    ) -> Result<Option<VerificationRecord>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|record| {
                record.payment_id == *payment_id
                    && record.outcome == VerificationOutcome::Verified
            })
            .min_by_key(|record| record.first_seen_at)
            .cloned())
    }

    async fn save(&self, record: VerificationRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        let key = (record.order_id.0.clone(), record.payment_id.0.clone());
        match records.get_mut(&key) {
            Some(existing) => {
                existing.signature_hash = record.signature_hash;
                existing.outcome = record.outcome;
                existing.attempt_count = record.attempt_count;
                existing.last_seen_at = record.last_seen_at;
            }
            None => {
                records.insert(key, record);
            }
        }
        Ok(())
    }
}

/// Keyed by payment id, which is what makes `insert` idempotent.
#[derive(Default)]
pub struct InMemoryBookingRepository {
    bookings: RwLock<HashMap<String, Booking>>,
}

#[async_trait::async_trait]
impl BookingRepository for InMemoryBookingRepository {
    async fn find_by_payment_id(
        &self,
        payment_id: &PaymentId,
    ) -> Result<Option<Booking>, RepositoryError> {
        let bookings = self.bookings.read().await;
        Ok(bookings.get(&payment_id.0).cloned())
    }

    async fn insert(&self, booking: Booking) -> Result<BookingInsert, RepositoryError> {
        let mut bookings = self.bookings.write().await;
        if let Some(existing) = bookings.get(&booking.payment_id.0) {
            return Ok(BookingInsert::Existing(existing.clone()));
        }
        if bookings.values().any(|stored| stored.id == booking.id) {
            return Err(RepositoryError::Conflict(format!(
                "booking id `{}` is already taken",
                booking.id
            )));
        }
        bookings.insert(booking.payment_id.0.clone(), booking.clone());
        Ok(BookingInsert::Created(booking))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use celebra_core::cpq::pricing::PriceQuote;
    use celebra_core::domain::booking::{Booking, BookingId, PackageDetails, PaymentStatus, UserId};
    use celebra_core::domain::payment::{
        OrderId, PaymentId, VerificationOutcome, VerificationRecord,
    };
    use celebra_core::domain::selection::SelectionState;

    use crate::repositories::{
        BookingInsert, BookingRepository, InMemoryBookingRepository,
        InMemoryVerificationRepository, RepositoryError, VerificationRepository,
    };

    fn booking(id: &str, payment_id: &str) -> Booking {
        Booking {
            id: BookingId(id.to_owned()),
            user_id: UserId("user_42".to_owned()),
            order_id: OrderId("order_1".to_owned()),
            payment_id: PaymentId(payment_id.to_owned()),
            package_details: PackageDetails::capture(
                &SelectionState::default(),
                &PriceQuote::default(),
            ),
            total_amount: 42_000,
            advance_amount: 8_400,
            remaining_amount: 33_600,
            payment_status: PaymentStatus::AdvancePaid,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn in_memory_booking_insert_is_idempotent_per_payment() {
        let repo = InMemoryBookingRepository::default();
        let first = booking("booking_1", "pay_1");

        assert_eq!(
            repo.insert(first.clone()).await.expect("insert"),
            BookingInsert::Created(first.clone())
        );
        assert_eq!(
            repo.insert(booking("booking_2", "pay_1")).await.expect("replay"),
            BookingInsert::Existing(first.clone())
        );
        assert_eq!(repo.find_by_payment_id(&first.payment_id).await.expect("find"), Some(first));
    }

    #[tokio::test]
    async fn in_memory_booking_rejects_reused_booking_id() {
        let repo = InMemoryBookingRepository::default();
        repo.insert(booking("booking_1", "pay_1")).await.expect("insert");

        let error = repo.insert(booking("booking_1", "pay_2")).await.expect_err("id taken");
        assert!(matches!(error, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn in_memory_verification_upsert_preserves_first_seen() {
        let repo = InMemoryVerificationRepository::default();
        let first_seen = Utc::now();
        let mut record = VerificationRecord {
            order_id: OrderId("order_1".to_owned()),
            payment_id: PaymentId("pay_1".to_owned()),
            signature_hash: "hash".to_owned(),
            outcome: VerificationOutcome::Verified,
            attempt_count: 1,
            first_seen_at: first_seen,
            last_seen_at: first_seen,
        };
        repo.save(record.clone()).await.expect("save");

        record.attempt_count = 3;
        record.first_seen_at = first_seen + Duration::minutes(5);
        record.last_seen_at = first_seen + Duration::minutes(5);
        repo.save(record.clone()).await.expect("resave");

        let stored = repo
            .find_verified_by_payment_id(&record.payment_id)
            .await
            .expect("find")
            .expect("present");
        assert_eq!(stored.attempt_count, 3);
        assert_eq!(stored.first_seen_at, first_seen);
        assert_eq!(stored.last_seen_at, record.last_seen_at);
    }
}
