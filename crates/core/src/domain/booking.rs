use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cpq::pricing::PriceQuote;
use crate::domain::payment::{OrderId, PaymentId};
use crate::domain::selection::SelectionState;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookingId(pub String);

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Authenticated identity the booking belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    AdvancePaid,
    FullyPaid,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AdvancePaid => "advance_paid",
            Self::FullyPaid => "fully_paid",
            Self::Refunded => "refunded",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "advance_paid" => Some(Self::AdvancePaid),
            "fully_paid" => Some(Self::FullyPaid),
            "refunded" => Some(Self::Refunded),
            _ => None,
        }
    }
}

/// Snapshot of the configuration and its quote at the time of payment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDetails {
    pub selection: SelectionState,
    pub quote: PriceQuote,
}

impl PackageDetails {
    pub fn capture(selection: &SelectionState, quote: &PriceQuote) -> Self {
        Self { selection: selection.clone(), quote: quote.clone() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: BookingId,
    pub user_id: UserId,
    pub order_id: OrderId,
    pub payment_id: PaymentId,
    pub package_details: PackageDetails,
    pub total_amount: i64,
    pub advance_amount: i64,
    pub remaining_amount: i64,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}
