pub mod connection;
pub mod migrations;
pub mod repositories;

pub use connection::{connect_with_settings, ping, DbPool};
pub use repositories::{
    BookingInsert, BookingRepository, InMemoryBookingRepository, InMemoryPaymentOrderRepository,
    InMemoryVerificationRepository, PaymentOrderRepository, RepositoryError, SqlBookingRepository,
    SqlPaymentOrderRepository, SqlVerificationRepository, VerificationRepository,
};
