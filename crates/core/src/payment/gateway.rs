use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::domain::booking::{Booking, PackageDetails, PaymentStatus, UserId};
use crate::domain::payment::{OrderId, PaymentId};
use crate::domain::selection::ContactInfo;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub amount: i64,
    pub user_id: UserId,
    pub package_details: PackageDetails,
}

/// The backend's answer to order creation; `key` is the gateway publishable key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTicket {
    pub order_id: OrderId,
    pub key: String,
    pub amount: i64,
    pub currency: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
    pub order_id: OrderId,
    pub payment_id: PaymentId,
    pub signature: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyPaymentResponse {
    pub success: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistBookingRequest {
    pub user_id: UserId,
    pub package_details: PackageDetails,
    pub payment_id: PaymentId,
    pub total_amount: i64,
    pub advance_amount: i64,
    pub remaining_amount: i64,
    pub payment_status: PaymentStatus,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("backend responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response payload: {0}")]
    MalformedPayload(String),
}

/// The payment and booking API the checkout flow talks to.
#[async_trait]
pub trait PaymentBackend: Send + Sync {
    async fn create_order(&self, request: &CreateOrderRequest)
        -> Result<OrderTicket, BackendError>;
    async fn verify_payment(
        &self,
        request: &VerifyPaymentRequest,
    ) -> Result<VerifyPaymentResponse, BackendError>;
    async fn persist_booking(
        &self,
        request: &PersistBookingRequest,
    ) -> Result<Booking, BackendError>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prefill {
    pub name: String,
    pub email: String,
    pub contact: String,
}

impl From<&ContactInfo> for Prefill {
    fn from(contact: &ContactInfo) -> Self {
        Self {
            name: contact.name.clone(),
            email: contact.email.clone(),
            contact: contact.phone.clone(),
        }
    }
}

/// Everything the external payment UI needs to collect the advance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayCheckout {
    pub key: String,
    pub amount: i64,
    pub currency: String,
    pub order_id: OrderId,
    pub prefill: Prefill,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayOutcome {
    Paid { payment_id: PaymentId, signature: String },
    Dismissed,
    Failed { reason: String },
}

#[async_trait]
pub trait PaymentCollector: Send + Sync {
    async fn collect(&self, checkout: GatewayCheckout) -> GatewayOutcome;
}

/// A checkout waiting for the payment UI to report back.
#[derive(Debug)]
pub struct PendingCollection {
    pub checkout: GatewayCheckout,
    responder: oneshot::Sender<GatewayOutcome>,
}

impl PendingCollection {
    /// Returns false when the checkout that asked for this payment is gone.
    pub fn resolve(self, outcome: GatewayOutcome) -> bool {
        self.responder.send(outcome).is_ok()
    }
}

/// Hands each checkout to whoever drains the receiver and waits for the
/// gateway callback on a oneshot channel.
#[derive(Clone, Debug)]
pub struct ChannelPaymentCollector {
    requests: mpsc::Sender<PendingCollection>,
}

impl ChannelPaymentCollector {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<PendingCollection>) {
        let (requests, receiver) = mpsc::channel(buffer.max(1));
        (Self { requests }, receiver)
    }
}

#[async_trait]
impl PaymentCollector for ChannelPaymentCollector {
    async fn collect(&self, checkout: GatewayCheckout) -> GatewayOutcome {
        let (responder, outcome) = oneshot::channel();
        if self.requests.send(PendingCollection { checkout, responder }).await.is_err() {
            return GatewayOutcome::Failed { reason: "payment collector is closed".to_owned() };
        }
        outcome.await.unwrap_or(GatewayOutcome::Dismissed)
    }
}
