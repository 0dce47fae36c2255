use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use celebra_core::domain::booking::Booking;
use celebra_core::domain::payment::{OrderId, PaymentId, PaymentOrder, VerificationRecord};

pub mod booking;
pub mod memory;
pub mod payment;

pub use booking::SqlBookingRepository;
pub use memory::{
    InMemoryBookingRepository, InMemoryPaymentOrderRepository, InMemoryVerificationRepository,
};
pub use payment::{SqlPaymentOrderRepository, SqlVerificationRepository};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("conflicting record: {0}")]
    Conflict(String),
}

/// Result of an idempotent booking insert keyed on the payment id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BookingInsert {
    Created(Booking),
    Existing(Booking),
}

impl BookingInsert {
    pub fn booking(&self) -> &Booking {
        match self {
            Self::Created(booking) | Self::Existing(booking) => booking,
        }
    }

    pub fn into_booking(self) -> Booking {
        match self {
            Self::Created(booking) | Self::Existing(booking) => booking,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn find_by_payment_id(
        &self,
        payment_id: &PaymentId,
    ) -> Result<Option<Booking>, RepositoryError>;
    /// Stores the booking unless one already exists for its payment id, in which
    /// case the stored booking is returned untouched.
    async fn insert(&self, booking: Booking) -> Result<BookingInsert, RepositoryError>;
}

#[async_trait]
pub trait PaymentOrderRepository: Send + Sync {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<PaymentOrder>, RepositoryError>;
    async fn save(&self, order: PaymentOrder) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait VerificationRepository: Send + Sync {
    async fn find(
        &self,
        order_id: &OrderId,
        payment_id: &PaymentId,
    ) -> Result<Option<VerificationRecord>, RepositoryError>;
    async fn find_verified_by_payment_id(
        &self,
        payment_id: &PaymentId,
    ) -> Result<Option<VerificationRecord>, RepositoryError>;
    async fn save(&self, record: VerificationRecord) -> Result<(), RepositoryError>;
}

pub(crate) fn parse_u32(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!(
            "invalid value for `{column}` (expected non-negative u32): {value}"
        ))
    })
}

pub(crate) fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

pub(crate) fn parse_json<T>(column: &str, value: &str) -> Result<T, RepositoryError>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_str(value)
        .map_err(|error| RepositoryError::Decode(format!("invalid json in `{column}`: {error}")))
}

pub(crate) fn encode_json<T>(column: &str, value: &T) -> Result<String, RepositoryError>
where
    T: serde::Serialize,
{
    serde_json::to_string(value)
        .map_err(|error| RepositoryError::Decode(format!("cannot encode `{column}`: {error}")))
}
