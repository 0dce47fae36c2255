pub mod gateway;
pub mod orchestrator;
pub mod signature;

use thiserror::Error;

use crate::domain::payment::{OrderId, PaymentId};

pub use gateway::{
    BackendError, ChannelPaymentCollector, CreateOrderRequest, GatewayCheckout, GatewayOutcome,
    OrderTicket, PaymentBackend, PaymentCollector, PendingCollection, PersistBookingRequest,
    Prefill, VerifyPaymentRequest, VerifyPaymentResponse,
};
pub use orchestrator::{
    CheckoutOrder, CheckoutPhase, CheckoutSettings, PaymentOrchestrator, UnsavedPayment,
};
pub use signature::{gateway_signature, signature_hash, verify_gateway_signature};

/// Failure of one checkout attempt. Nothing here is retried automatically.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CheckoutError {
    #[error("checkout precondition failed: {0}")]
    Precondition(String),
    #[error("a payment request is already in flight")]
    InFlight,
    #[error("order creation failed: {0}")]
    OrderCreation(String),
    #[error("payment was not completed: {0}")]
    Gateway(String),
    #[error("payment verification failed: {0}")]
    Verification(String),
    #[error("payment {payment_id} on order {order_id} succeeded but the booking was not saved: {message}")]
    Persistence { order_id: OrderId, payment_id: PaymentId, message: String },
}
