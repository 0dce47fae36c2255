use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use celebra_core::config::{ConfigError, GatewayConfig};
use celebra_core::domain::booking::{Booking, BookingId, PaymentStatus};
use celebra_core::domain::payment::{
    OrderId, PaymentOrder, PaymentOrderStatus, VerificationOutcome, VerificationRecord,
};
use celebra_core::payment::{
    signature_hash, verify_gateway_signature, CreateOrderRequest, OrderTicket,
    PersistBookingRequest, VerifyPaymentRequest, VerifyPaymentResponse,
};
use celebra_db::{
    BookingInsert, BookingRepository, DbPool, PaymentOrderRepository, RepositoryError,
    SqlBookingRepository, SqlPaymentOrderRepository, SqlVerificationRepository,
    VerificationRepository,
};

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Gateway keys the server signs with. Only `key_id` ever leaves the process.
#[derive(Clone)]
pub struct GatewayCredentials {
    pub key_id: String,
    pub key_secret: SecretString,
    pub currency: String,
}

impl TryFrom<&GatewayConfig> for GatewayCredentials {
    type Error = ConfigError;

    fn try_from(config: &GatewayConfig) -> Result<Self, Self::Error> {
        let (key_id, key_secret) = config.require_credentials()?;
        Ok(Self {
            key_id: key_id.to_string(),
            key_secret: key_secret.clone(),
            currency: config.currency.clone(),
        })
    }
}

#[derive(Clone)]
pub struct PaymentState {
    orders: Arc<dyn PaymentOrderRepository>,
    verifications: Arc<dyn VerificationRepository>,
    bookings: Arc<dyn BookingRepository>,
    gateway: GatewayCredentials,
}

impl PaymentState {
    pub fn new(
        orders: Arc<dyn PaymentOrderRepository>,
        verifications: Arc<dyn VerificationRepository>,
        bookings: Arc<dyn BookingRepository>,
        gateway: GatewayCredentials,
    ) -> Self {
        Self { orders, verifications, bookings, gateway }
    }

    pub fn sqlite(db_pool: DbPool, gateway: GatewayCredentials) -> Self {
        Self::new(
            Arc::new(SqlPaymentOrderRepository::new(db_pool.clone())),
            Arc::new(SqlVerificationRepository::new(db_pool.clone())),
            Arc::new(SqlBookingRepository::new(db_pool)),
            gateway,
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
}

#[derive(Debug, Error)]
pub enum PaymentApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("payment {0} has not been verified")]
    NotVerified(String),
    #[error("payment {0} belongs to a different user")]
    Forbidden(String),
    #[error("{0}")]
    ChargeMismatch(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl IntoResponse for PaymentApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotVerified(_) | Self::ChargeMismatch(_) => StatusCode::CONFLICT,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match &self {
            Self::Repository(error) => {
                error!(event_name = "payment.api.storage_error", error = %error, "storage failure");
                "storage is temporarily unavailable".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ApiErrorBody { error: message })).into_response()
    }
}

pub fn router(state: PaymentState) -> Router {
    Router::new()
        .route("/payment/create-order", post(create_order))
        .route("/payment/verify", post(verify_payment))
        .route("/custom-packages", post(create_custom_package))
        .with_state(state)
}

pub async fn create_order(
    State(state): State<PaymentState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<Json<OrderTicket>, PaymentApiError> {
    if request.amount < 0 {
        return Err(PaymentApiError::BadRequest("amount must not be negative".to_string()));
    }
    if request.user_id.0.trim().is_empty() {
        return Err(PaymentApiError::BadRequest("userId is required".to_string()));
    }

    let now = Utc::now();
    let order = PaymentOrder {
        id: OrderId(format!("order_{}", Uuid::new_v4().simple())),
        user_id: request.user_id,
        amount: request.amount,
        currency: state.gateway.currency.clone(),
        package_details: request.package_details,
        status: PaymentOrderStatus::Created,
        created_at: now,
        updated_at: now,
    };
    state.orders.save(order.clone()).await?;

    info!(
        event_name = "payment.order.created",
        correlation_id = %order.id,
        order_id = %order.id,
        user_id = %order.user_id,
        amount = order.amount,
        "payment order issued"
    );

    Ok(Json(OrderTicket {
        order_id: order.id,
        key: state.gateway.key_id.clone(),
        amount: order.amount,
        currency: order.currency,
    }))
}

/// Checks the gateway signature and records the outcome. A replay of an
/// already verified triple answers `success: true` and only bumps the attempt
/// counter; a bad signature never downgrades a verified record.
pub async fn verify_payment(
    State(state): State<PaymentState>,
    Json(request): Json<VerifyPaymentRequest>,
) -> Result<Json<VerifyPaymentResponse>, PaymentApiError> {
    let Some(mut order) = state.orders.find_by_id(&request.order_id).await? else {
        warn!(
            event_name = "payment.verify.unknown_order",
            correlation_id = %request.order_id,
            order_id = %request.order_id,
            "verification requested for an order that was never issued"
        );
        return Ok(Json(VerifyPaymentResponse { success: false }));
    };

    let now = Utc::now();
    let presented_hash = signature_hash(&request.signature);
    let existing = state.verifications.find(&request.order_id, &request.payment_id).await?;

    if let Some(mut record) = existing.clone() {
        if record.outcome == VerificationOutcome::Verified {
            let replay = record.signature_hash == presented_hash;
            record.attempt_count = record.attempt_count.saturating_add(1);
            record.last_seen_at = now;
            state.verifications.save(record).await?;
            info!(
                event_name = "payment.verify.replayed",
                correlation_id = %request.order_id,
                order_id = %request.order_id,
                payment_id = %request.payment_id,
                matched = replay,
                "verification replayed"
            );
            return Ok(Json(VerifyPaymentResponse { success: replay }));
        }
    }

    let valid = verify_gateway_signature(
        state.gateway.key_secret.expose_secret().as_bytes(),
        &request.order_id,
        &request.payment_id,
        &request.signature,
    );
    let outcome = if valid { VerificationOutcome::Verified } else { VerificationOutcome::Rejected };
    let record = match existing {
        Some(previous) => VerificationRecord {
            signature_hash: presented_hash,
            outcome,
            attempt_count: previous.attempt_count.saturating_add(1),
            last_seen_at: now,
            ..previous
        },
        None => VerificationRecord {
            order_id: request.order_id.clone(),
            payment_id: request.payment_id.clone(),
            signature_hash: presented_hash,
            outcome,
            attempt_count: 1,
            first_seen_at: now,
            last_seen_at: now,
        },
    };
    state.verifications.save(record).await?;

    if valid {
        order.status = PaymentOrderStatus::Verified;
        order.updated_at = now;
        state.orders.save(order).await?;
        info!(
            event_name = "payment.verify.accepted",
            correlation_id = %request.order_id,
            order_id = %request.order_id,
            payment_id = %request.payment_id,
            "payment signature verified"
        );
    } else {
        warn!(
            event_name = "payment.verify.rejected",
            correlation_id = %request.order_id,
            order_id = %request.order_id,
            payment_id = %request.payment_id,
            "payment signature mismatch"
        );
    }

    Ok(Json(VerifyPaymentResponse { success: valid }))
}

/// Stores the booking for a verified payment. The payment id is the
/// idempotency key: a repeat returns the stored booking with `200`.
pub async fn create_custom_package(
    State(state): State<PaymentState>,
    headers: HeaderMap,
    Json(request): Json<PersistBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), PaymentApiError> {
    if let Some(key) = headers.get(IDEMPOTENCY_KEY_HEADER) {
        let key = key.to_str().map_err(|_| {
            PaymentApiError::BadRequest("Idempotency-Key must be visible ASCII".to_string())
        })?;
        if key != request.payment_id.0 {
            return Err(PaymentApiError::BadRequest(
                "Idempotency-Key must equal paymentId".to_string(),
            ));
        }
    }
    validate_amounts(&request)?;

    if let Some(existing) = state.bookings.find_by_payment_id(&request.payment_id).await? {
        if existing.user_id != request.user_id {
            return Err(PaymentApiError::Forbidden(request.payment_id.0.clone()));
        }
        return Ok((StatusCode::OK, Json(existing)));
    }
    if request.payment_status != PaymentStatus::AdvancePaid {
        return Err(PaymentApiError::BadRequest(
            "a new booking must be recorded as advance_paid".to_string(),
        ));
    }

    let verification = state
        .verifications
        .find_verified_by_payment_id(&request.payment_id)
        .await?
        .ok_or_else(|| PaymentApiError::NotVerified(request.payment_id.0.clone()))?;
    let order = state
        .orders
        .find_by_id(&verification.order_id)
        .await?
        .ok_or_else(|| PaymentApiError::NotVerified(request.payment_id.0.clone()))?;
    if order.user_id != request.user_id {
        return Err(PaymentApiError::Forbidden(request.payment_id.0.clone()));
    }
    if request.advance_amount != order.amount {
        warn!(
            event_name = "booking.charge_mismatch",
            correlation_id = %order.id,
            order_id = %order.id,
            payment_id = %request.payment_id,
            charged = order.amount,
            claimed = request.advance_amount,
            "booking advance differs from the verified charge"
        );
        return Err(PaymentApiError::ChargeMismatch(format!(
            "advanceAmount {} does not match the {} charged on order {}",
            request.advance_amount, order.amount, order.id
        )));
    }

    let booking = Booking {
        id: BookingId(format!("booking_{}", Uuid::new_v4().simple())),
        user_id: request.user_id,
        order_id: order.id,
        payment_id: request.payment_id,
        package_details: request.package_details,
        total_amount: request.total_amount,
        advance_amount: request.advance_amount,
        remaining_amount: request.remaining_amount,
        payment_status: request.payment_status,
        created_at: Utc::now(),
    };

    match state.bookings.insert(booking).await? {
        BookingInsert::Created(booking) => {
            info!(
                event_name = "booking.created",
                correlation_id = %booking.order_id,
                order_id = %booking.order_id,
                payment_id = %booking.payment_id,
                booking_id = %booking.id,
                "booking stored"
            );
            Ok((StatusCode::CREATED, Json(booking)))
        }
        BookingInsert::Existing(booking) => Ok((StatusCode::OK, Json(booking))),
    }
}

fn validate_amounts(request: &PersistBookingRequest) -> Result<(), PaymentApiError> {
    if request.total_amount < 0 || request.advance_amount < 0 || request.remaining_amount < 0 {
        return Err(PaymentApiError::BadRequest("amounts must not be negative".to_string()));
    }
    if request.advance_amount.checked_add(request.remaining_amount) != Some(request.total_amount) {
        return Err(PaymentApiError::BadRequest(
            "advanceAmount + remainingAmount must equal totalAmount".to_string(),
        ));
    }
    Ok(())
}
