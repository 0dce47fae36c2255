use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use celebra_core::config::BackendConfig;
use celebra_core::domain::booking::Booking;
use celebra_core::payment::{
    BackendError, CreateOrderRequest, OrderTicket, PaymentBackend, PersistBookingRequest,
    VerifyPaymentRequest, VerifyPaymentResponse,
};

use crate::error::ClientError;

pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

const CREATE_ORDER_PATH: &str = "/payment/create-order";
const VERIFY_PAYMENT_PATH: &str = "/payment/verify";
const CUSTOM_PACKAGES_PATH: &str = "/custom-packages";

#[derive(Clone, Debug)]
pub struct HttpPaymentBackend {
    client: Client,
    base_url: String,
}

impl HttpPaymentBackend {
    /// Builds a client whose every request is bounded by `timeout_secs`.
    pub fn new(config: &BackendConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| ClientError::Configuration(error.to_string()))?;
        Ok(Self::with_client(client, &config.base_url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self { client, base_url: base_url.trim_end_matches('/').to_owned() }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<OrderTicket, ClientError> {
        self.post_json(CREATE_ORDER_PATH, request, None).await
    }

    pub async fn verify_payment(
        &self,
        request: &VerifyPaymentRequest,
    ) -> Result<VerifyPaymentResponse, ClientError> {
        self.post_json(VERIFY_PAYMENT_PATH, request, None).await
    }

    /// The payment id doubles as the idempotency key so a retried save lands
    /// on the booking that already exists.
    pub async fn persist_booking(
        &self,
        request: &PersistBookingRequest,
    ) -> Result<Booking, ClientError> {
        self.post_json(CUSTOM_PACKAGES_PATH, request, Some(&request.payment_id.0)).await
    }

    async fn post_json<Req, Resp>(
        &self,
        path: &str,
        body: &Req,
        idempotency_key: Option<&str>,
    ) -> Result<Resp, ClientError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{path}", self.base_url);
        let mut request = self.client.post(&url).json(body);
        if let Some(key) = idempotency_key {
            request = request.header(IDEMPOTENCY_KEY_HEADER, key);
        }

        let response = request.send().await.map_err(ClientError::from_reqwest)?;
        let status = response.status();
        debug!(event_name = "client.response", path, status = status.as_u16(), "backend responded");

        match status {
            StatusCode::OK | StatusCode::CREATED => {
                response.json::<Resp>().await.map_err(ClientError::from_reqwest)
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(ClientError::Status { status: status.as_u16(), body })
            }
        }
    }
}

#[async_trait]
impl PaymentBackend for HttpPaymentBackend {
    async fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<OrderTicket, BackendError> {
        HttpPaymentBackend::create_order(self, request).await.map_err(BackendError::from)
    }

    async fn verify_payment(
        &self,
        request: &VerifyPaymentRequest,
    ) -> Result<VerifyPaymentResponse, BackendError> {
        HttpPaymentBackend::verify_payment(self, request).await.map_err(BackendError::from)
    }

    async fn persist_booking(
        &self,
        request: &PersistBookingRequest,
    ) -> Result<Booking, BackendError> {
        HttpPaymentBackend::persist_booking(self, request).await.map_err(BackendError::from)
    }
}
