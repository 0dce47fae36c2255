use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::service::{
    Amenity, AmenityId, CateringOption, CateringOptionId, DecorTheme, DecorThemeId,
    EntertainmentId, EntertainmentOption, EventType, EventTypeId, OtherService, OtherServiceId,
    PhotographyPackage, PhotographyPackageId, TierPrices, VenueType, VenueTypeId,
};

/// Fee applied when the selected event type is not in the catalog.
pub const DEFAULT_SERVICE_FEE_PERCENT: Decimal = Decimal::from_parts(5, 0, 0, false, 0);

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("catalog validation failed: {0}")]
    Validation(String),
}

/// Read-only reference data for one planner session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub version: String,
    #[serde(default)]
    pub event_types: Vec<EventType>,
    #[serde(default)]
    pub venue_types: Vec<VenueType>,
    #[serde(default)]
    pub amenities: Vec<Amenity>,
    #[serde(default)]
    pub catering_options: Vec<CateringOption>,
    #[serde(default)]
    pub decor_themes: Vec<DecorTheme>,
    #[serde(default)]
    pub photography_packages: Vec<PhotographyPackage>,
    #[serde(default)]
    pub entertainment_options: Vec<EntertainmentOption>,
    #[serde(default)]
    pub other_services: Vec<OtherService>,
}

impl Catalog {
    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog = serde_json::from_str(raw)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.version.trim().is_empty() {
            return Err(CatalogError::Validation("catalog.version must not be empty".to_string()));
        }

        ensure_unique("event_types", self.event_types.iter().map(|item| item.id.as_str()))?;
        ensure_unique("venue_types", self.venue_types.iter().map(|item| item.id.as_str()))?;
        ensure_unique("amenities", self.amenities.iter().map(|item| item.id.as_str()))?;
        ensure_unique("catering_options", self.catering_options.iter().map(|item| item.id.as_str()))?;
        ensure_unique("decor_themes", self.decor_themes.iter().map(|item| item.id.as_str()))?;
        ensure_unique(
            "photography_packages",
            self.photography_packages.iter().map(|item| item.id.as_str()),
        )?;
        ensure_unique(
            "entertainment_options",
            self.entertainment_options.iter().map(|item| item.id.as_str()),
        )?;
        ensure_unique("other_services", self.other_services.iter().map(|item| item.id.as_str()))?;

        for event_type in &self.event_types {
            if event_type.service_fee_percent.is_sign_negative()
                || event_type.service_fee_percent > Decimal::ONE_HUNDRED
            {
                return Err(CatalogError::Validation(format!(
                    "event type `{}` has service_fee_percent outside 0..=100",
                    event_type.id
                )));
            }
        }

        let flat_prices = self
            .decor_themes
            .iter()
            .map(|item| (item.id.as_str(), item.price))
            .chain(self.photography_packages.iter().map(|item| (item.id.as_str(), item.price)))
            .chain(self.entertainment_options.iter().map(|item| (item.id.as_str(), item.price)))
            .chain(self.other_services.iter().map(|item| (item.id.as_str(), item.price)))
            .chain(self.catering_options.iter().flat_map(|item| {
                let prices = item.price_per_plate;
                [
                    (item.id.as_str(), prices.basic),
                    (item.id.as_str(), prices.standard),
                    (item.id.as_str(), prices.premium),
                ]
            }));
        for (id, price) in flat_prices {
            if price < 0 {
                return Err(CatalogError::Validation(format!("`{id}` has a negative price")));
            }
        }

        Ok(())
    }

    pub fn event_type(&self, id: &EventTypeId) -> Option<&EventType> {
        self.event_types.iter().find(|item| &item.id == id)
    }

    pub fn venue_type(&self, id: &VenueTypeId) -> Option<&VenueType> {
        self.venue_types.iter().find(|item| &item.id == id)
    }

    pub fn amenity(&self, id: &AmenityId) -> Option<&Amenity> {
        self.amenities.iter().find(|item| &item.id == id)
    }

    pub fn catering_option(&self, id: &CateringOptionId) -> Option<&CateringOption> {
        self.catering_options.iter().find(|item| &item.id == id)
    }

    pub fn decor_theme(&self, id: &DecorThemeId) -> Option<&DecorTheme> {
        self.decor_themes.iter().find(|item| &item.id == id)
    }

    pub fn photography_package(&self, id: &PhotographyPackageId) -> Option<&PhotographyPackage> {
        self.photography_packages.iter().find(|item| &item.id == id)
    }

    pub fn entertainment(&self, id: &EntertainmentId) -> Option<&EntertainmentOption> {
        self.entertainment_options.iter().find(|item| &item.id == id)
    }

    pub fn other_service(&self, id: &OtherServiceId) -> Option<&OtherService> {
        self.other_services.iter().find(|item| &item.id == id)
    }

    pub fn service_fee_percent(&self, id: Option<&EventTypeId>) -> Decimal {
        id.and_then(|id| self.event_type(id))
            .map(|event_type| event_type.service_fee_percent)
            .unwrap_or(DEFAULT_SERVICE_FEE_PERCENT)
    }

    /// Built-in reference data shipped with the planner.
    pub fn standard() -> Self {
        Self {
            version: "2026.1".to_string(),
            event_types: vec![
                event_type("wedding", "Wedding", "rings", 5),
                event_type("engagement", "Engagement", "heart", 5),
                event_type("birthday", "Birthday", "cake", 5),
                event_type("anniversary", "Anniversary", "champagne", 5),
                event_type("corporate", "Corporate Event", "briefcase", 8),
            ],
            venue_types: vec![
                venue_type("banquet-hall", "Banquet Hall", 50_000, "Indoor hall with AC"),
                venue_type("lawn", "Garden Lawn", 75_000, "Open-air lawn for large gatherings"),
                venue_type("resort", "Resort", 150_000, "Destination resort with stay"),
                venue_type("heritage", "Heritage Property", 250_000, "Palace or fort venue"),
            ],
            amenities: vec![
                amenity("parking", "Valet parking"),
                amenity("rooms", "Guest rooms"),
                amenity("power-backup", "Power backup"),
                amenity("bridal-suite", "Bridal suite"),
            ],
            catering_options: vec![
                CateringOption {
                    id: CateringOptionId::new("veg"),
                    name: "Vegetarian".to_string(),
                    description: "Multi-cuisine vegetarian spread".to_string(),
                    price_per_plate: TierPrices { basic: 400, standard: 600, premium: 900 },
                },
                CateringOption {
                    id: CateringOptionId::new("non-veg"),
                    name: "Non-Vegetarian".to_string(),
                    description: "Vegetarian plus non-vegetarian mains".to_string(),
                    price_per_plate: TierPrices { basic: 550, standard: 800, premium: 1_200 },
                },
            ],
            decor_themes: vec![
                DecorTheme {
                    id: DecorThemeId::new("floral"),
                    name: "Floral Elegance".to_string(),
                    price: 15_000,
                    description: "Fresh flower arrangements and drapes".to_string(),
                    features: vec!["Stage backdrop".to_string(), "Entrance arch".to_string()],
                },
                DecorTheme {
                    id: DecorThemeId::new("royal"),
                    name: "Royal Heritage".to_string(),
                    price: 45_000,
                    description: "Traditional royal setup".to_string(),
                    features: vec!["Mandap".to_string(), "Chandeliers".to_string()],
                },
            ],
            photography_packages: vec![
                PhotographyPackage {
                    id: PhotographyPackageId::new("classic"),
                    name: "Classic".to_string(),
                    price: 25_000,
                    description: "One photographer, edited album".to_string(),
                    features: vec!["300 edited photos".to_string()],
                },
                PhotographyPackage {
                    id: PhotographyPackageId::new("cinematic"),
                    name: "Cinematic".to_string(),
                    price: 60_000,
                    description: "Photo and film crew".to_string(),
                    features: vec!["Highlight film".to_string(), "Drone coverage".to_string()],
                },
            ],
            entertainment_options: vec![
                EntertainmentOption {
                    id: EntertainmentId::new("dj"),
                    name: "DJ".to_string(),
                    price: 20_000,
                    description: "DJ with sound system".to_string(),
                    features: Vec::new(),
                },
                EntertainmentOption {
                    id: EntertainmentId::new("live-band"),
                    name: "Live Band".to_string(),
                    price: 40_000,
                    description: "Four-piece live band".to_string(),
                    features: Vec::new(),
                },
            ],
            other_services: vec![
                OtherService {
                    id: OtherServiceId::new("invitations"),
                    name: "Invitation Cards".to_string(),
                    price: 8_000,
                    description: "Designed and printed invitations".to_string(),
                    features: Vec::new(),
                },
                OtherService {
                    id: OtherServiceId::new("makeup"),
                    name: "Makeup Artist".to_string(),
                    price: 12_000,
                    description: "Bridal and family makeup".to_string(),
                    features: Vec::new(),
                },
            ],
        }
    }
}

fn ensure_unique<'a>(
    section: &str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<(), CatalogError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(CatalogError::Validation(format!("duplicate id `{id}` in {section}")));
        }
    }
    Ok(())
}

fn event_type(id: &str, name: &str, icon: &str, fee_percent: i64) -> EventType {
    EventType {
        id: EventTypeId::new(id),
        name: name.to_string(),
        icon: icon.to_string(),
        service_fee_percent: Decimal::from(fee_percent),
    }
}

fn venue_type(id: &str, name: &str, base_price: i64, description: &str) -> VenueType {
    VenueType {
        id: VenueTypeId::new(id),
        name: name.to_string(),
        base_price,
        description: description.to_string(),
    }
}

fn amenity(id: &str, description: &str) -> Amenity {
    Amenity { id: AmenityId::new(id), description: description.to_string() }
}
