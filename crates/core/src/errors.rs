use thiserror::Error;

use crate::cpq::CatalogError;
use crate::flows::FlowTransitionError;
use crate::payment::CheckoutError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    FlowTransition(#[from] FlowTransitionError),
    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),
}

impl From<CatalogError> for DomainError {
    fn from(error: CatalogError) -> Self {
        Self::InvalidCatalog(error.to_string())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Checkout(#[from] CheckoutError),
}

/// What a user-facing surface shows. Every variant carries the correlation id
/// support needs to find the matching audit trail.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("payment failed: {message}")]
    PaymentFailed { message: String, correlation_id: String },
    #[error("booking not saved for payment {payment_id} (order {order_id}): {message}")]
    BookingNotSaved {
        message: String,
        order_id: String,
        payment_id: String,
        correlation_id: String,
    },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "Some details are missing or invalid. Review them and try again."
            }
            Self::PaymentFailed { .. } => {
                "The payment could not be completed. No booking was made; you can retry safely."
            }
            Self::BookingNotSaved { .. } => {
                "Your payment was received but the booking could not be saved. \
                 Support will reconcile it using your payment reference."
            }
            Self::Internal { .. } => "Something went wrong on our side.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::PaymentFailed { correlation_id, .. }
            | Self::BookingNotSaved { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        match self {
            Self::Domain(DomainError::FlowTransition(error)) => {
                InterfaceError::BadRequest { message: error.to_string(), correlation_id }
            }
            Self::Domain(DomainError::InvalidCatalog(message)) => {
                InterfaceError::Internal { message, correlation_id }
            }
            Self::Checkout(CheckoutError::Precondition(message)) => {
                InterfaceError::BadRequest { message, correlation_id }
            }
            Self::Checkout(CheckoutError::InFlight) => InterfaceError::BadRequest {
                message: CheckoutError::InFlight.to_string(),
                correlation_id,
            },
            Self::Checkout(
                CheckoutError::OrderCreation(message)
                | CheckoutError::Gateway(message)
                | CheckoutError::Verification(message),
            ) => InterfaceError::PaymentFailed { message, correlation_id },
            Self::Checkout(CheckoutError::Persistence { order_id, payment_id, message }) => {
                InterfaceError::BookingNotSaved {
                    message,
                    order_id: order_id.0,
                    payment_id: payment_id.0,
                    correlation_id,
                }
            }
        }
    }
}
