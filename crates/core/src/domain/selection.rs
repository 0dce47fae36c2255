use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::service::{
    AmenityId, CateringOptionId, DecorThemeId, EntertainmentId, EventTypeId, OtherServiceId,
    PhotographyPackageId, PriceTier, VenueTypeId,
};

pub const MIN_GUEST_COUNT: u32 = 10;
pub const GUEST_COUNT_STEP: u32 = 10;

/// Identifies one planner session; never persisted on its own.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

/// Guest head count, never below [`MIN_GUEST_COUNT`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct GuestCount(u32);

impl GuestCount {
    pub fn new(value: u32) -> Self {
        Self(value.max(MIN_GUEST_COUNT))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn increment(self) -> Self {
        Self::new(self.0.saturating_add(GUEST_COUNT_STEP))
    }

    pub fn decrement(self) -> Self {
        Self::new(self.0.saturating_sub(GUEST_COUNT_STEP))
    }
}

impl Default for GuestCount {
    fn default() -> Self {
        Self(MIN_GUEST_COUNT)
    }
}

impl From<u32> for GuestCount {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl From<GuestCount> for u32 {
    fn from(value: GuestCount) -> Self {
        value.0
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VenueDetails {
    #[serde(rename = "type")]
    pub venue_type: Option<VenueTypeId>,
    #[serde(default)]
    pub amenities: Vec<AmenityId>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CateringSelection {
    #[serde(rename = "type")]
    pub option: Option<CateringOptionId>,
    pub tier: Option<PriceTier>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecorSelection {
    pub theme: Option<DecorThemeId>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotographySelection {
    pub package: Option<PhotographyPackageId>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedServices {
    #[serde(default)]
    pub catering: CateringSelection,
    #[serde(default)]
    pub decor: DecorSelection,
    #[serde(default)]
    pub photography: PhotographySelection,
    #[serde(default)]
    pub entertainment: Vec<EntertainmentId>,
    #[serde(default)]
    pub other: Vec<OtherServiceId>,
}

impl SelectedServices {
    pub fn is_empty(&self) -> bool {
        self.catering.option.is_none()
            && self.decor.theme.is_none()
            && self.photography.package.is_none()
            && self.entertainment.is_empty()
            && self.other.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl ContactInfo {
    pub fn is_empty(&self) -> bool {
        self.name.trim().is_empty() && self.email.trim().is_empty() && self.phone.trim().is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShippingDetails {
    pub address_line1: String,
    pub address_line2: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

/// The in-progress event configuration for one planner session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionState {
    pub event_type: Option<EventTypeId>,
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub guest_count: GuestCount,
    pub needs_venue: Option<bool>,
    #[serde(default)]
    pub venue_details: VenueDetails,
    #[serde(default)]
    pub selected_services: SelectedServices,
    #[serde(default)]
    pub contact_info: ContactInfo,
    #[serde(default)]
    pub shipping_details: ShippingDetails,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub terms_accepted: bool,
}

impl SelectionState {
    pub fn set_guest_count(&mut self, value: u32) {
        self.guest_count = GuestCount::new(value);
    }

    pub fn increment_guests(&mut self) {
        self.guest_count = self.guest_count.increment();
    }

    pub fn decrement_guests(&mut self) {
        self.guest_count = self.guest_count.decrement();
    }

    pub fn toggle_amenity(&mut self, id: AmenityId) {
        toggle(&mut self.venue_details.amenities, id);
    }

    pub fn toggle_entertainment(&mut self, id: EntertainmentId) {
        toggle(&mut self.selected_services.entertainment, id);
    }

    pub fn toggle_other_service(&mut self, id: OtherServiceId) {
        toggle(&mut self.selected_services.other, id);
    }

    pub fn select_catering(&mut self, option: CateringOptionId, tier: PriceTier) {
        self.selected_services.catering =
            CateringSelection { option: Some(option), tier: Some(tier) };
    }

    pub fn clear_catering(&mut self) {
        self.selected_services.catering = CateringSelection::default();
    }

    /// Field names still blocking the event-basics step, in display order.
    pub fn missing_event_basics(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.event_type.is_none() {
            missing.push("event_type".to_string());
        }
        if self.location.trim().is_empty() {
            missing.push("location".to_string());
        }
        if self.date.is_none() {
            missing.push("date".to_string());
        }
        if self.start_time.trim().is_empty() {
            missing.push("start_time".to_string());
        }
        if self.end_time.trim().is_empty() {
            missing.push("end_time".to_string());
        }
        missing
    }

    /// Back to defaults, keeping only the contact details the user already entered.
    pub fn reset_preserving_contact(&mut self) {
        let contact_info = std::mem::take(&mut self.contact_info);
        *self = Self { contact_info, ..Self::default() };
    }
}

fn toggle<T: PartialEq>(items: &mut Vec<T>, id: T) {
    if let Some(position) = items.iter().position(|item| item == &id) {
        items.remove(position);
    } else {
        items.push(id);
    }
}
