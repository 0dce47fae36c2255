use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

macro_rules! catalog_id {
    ($name:ident) => {
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

catalog_id!(EventTypeId);
catalog_id!(VenueTypeId);
catalog_id!(AmenityId);
catalog_id!(CateringOptionId);
catalog_id!(DecorThemeId);
catalog_id!(PhotographyPackageId);
catalog_id!(EntertainmentId);
catalog_id!(OtherServiceId);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceTier {
    Basic,
    Standard,
    Premium,
}

impl PriceTier {
    pub const ALL: [PriceTier; 3] = [PriceTier::Basic, PriceTier::Standard, PriceTier::Premium];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Standard => "standard",
            Self::Premium => "premium",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "basic" => Some(Self::Basic),
            "standard" => Some(Self::Standard),
            "premium" => Some(Self::Premium),
            _ => None,
        }
    }
}

/// Event category; its fee percent is applied to the service subtotal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventType {
    pub id: EventTypeId,
    pub name: String,
    pub icon: String,
    pub service_fee_percent: Decimal,
}

/// Venue category. `base_price` is informational and never enters the quote.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueType {
    pub id: VenueTypeId,
    pub name: String,
    pub base_price: i64,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amenity {
    pub id: AmenityId,
    pub description: String,
}

/// Per-plate prices in minor units, one per tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPrices {
    pub basic: i64,
    pub standard: i64,
    pub premium: i64,
}

impl TierPrices {
    pub fn get(&self, tier: PriceTier) -> i64 {
        match tier {
            PriceTier::Basic => self.basic,
            PriceTier::Standard => self.standard,
            PriceTier::Premium => self.premium,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CateringOption {
    pub id: CateringOptionId,
    pub name: String,
    pub description: String,
    pub price_per_plate: TierPrices,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecorTheme {
    pub id: DecorThemeId,
    pub name: String,
    pub price: i64,
    pub description: String,
    #[serde(default)]
    pub features: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotographyPackage {
    pub id: PhotographyPackageId,
    pub name: String,
    pub price: i64,
    pub description: String,
    #[serde(default)]
    pub features: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntertainmentOption {
    pub id: EntertainmentId,
    pub name: String,
    pub price: i64,
    pub description: String,
    #[serde(default)]
    pub features: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtherService {
    pub id: OtherServiceId,
    pub name: String,
    pub price: i64,
    pub description: String,
    #[serde(default)]
    pub features: Vec<String>,
}
