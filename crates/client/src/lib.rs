//! HTTP implementation of the checkout backend: order creation, payment
//! verification and booking persistence over JSON.

pub mod error;
pub mod http;

pub use error::ClientError;
pub use http::{HttpPaymentBackend, IDEMPOTENCY_KEY_HEADER};
