use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::cpq::catalog::Catalog;
use crate::domain::selection::SelectionState;

/// Share of the total collected upfront to confirm a booking.
pub const ADVANCE_PERCENT: Decimal = Decimal::from_parts(20, 0, 0, false, 0);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceCategory {
    Catering,
    Decor,
    Photography,
    Entertainment,
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteLineItem {
    pub category: ServiceCategory,
    pub item_id: String,
    pub label: String,
    pub quantity: u32,
    pub unit_price: i64,
    pub amount: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTraceStep {
    pub stage: String,
    pub detail: String,
    pub amount: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTrace {
    pub catalog_version: String,
    pub steps: Vec<PricingTraceStep>,
}

/// Derived amounts shown to the user and handed to checkout, in minor units.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub line_items: Vec<QuoteLineItem>,
    pub subtotal: i64,
    pub service_fee_percent: Decimal,
    pub service_fee: i64,
    pub total: i64,
    pub advance_amount: i64,
    pub remaining_amount: i64,
    pub trace: PricingTrace,
}

pub trait PricingEngine: Send + Sync {
    fn price(&self, selection: &SelectionState, catalog: &Catalog) -> PriceQuote;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DeterministicPricingEngine;

impl PricingEngine for DeterministicPricingEngine {
    fn price(&self, selection: &SelectionState, catalog: &Catalog) -> PriceQuote {
        price_selection(selection, catalog)
    }
}

/// Prices a selection against the catalog. Venue base prices are quoted out of
/// band and never enter the subtotal; unknown ids contribute nothing.
pub fn price_selection(selection: &SelectionState, catalog: &Catalog) -> PriceQuote {
    let services = &selection.selected_services;
    let guests = selection.guest_count.get();
    let mut line_items = Vec::new();

    if let (Some(option_id), Some(tier)) = (&services.catering.option, services.catering.tier) {
        if let Some(option) = catalog.catering_option(option_id) {
            let unit_price = option.price_per_plate.get(tier);
            line_items.push(QuoteLineItem {
                category: ServiceCategory::Catering,
                item_id: option.id.to_string(),
                label: format!("{} ({})", option.name, tier.as_str()),
                quantity: guests,
                unit_price,
                amount: unit_price.saturating_mul(i64::from(guests)),
            });
        }
    }

    if let Some(theme) = services.decor.theme.as_ref().and_then(|id| catalog.decor_theme(id)) {
        line_items.push(flat_item(
            ServiceCategory::Decor,
            theme.id.as_str(),
            &theme.name,
            theme.price,
        ));
    }

    if let Some(package) =
        services.photography.package.as_ref().and_then(|id| catalog.photography_package(id))
    {
        line_items.push(flat_item(
            ServiceCategory::Photography,
            package.id.as_str(),
            &package.name,
            package.price,
        ));
    }

    for option in services.entertainment.iter().filter_map(|id| catalog.entertainment(id)) {
        line_items.push(flat_item(
            ServiceCategory::Entertainment,
            option.id.as_str(),
            &option.name,
            option.price,
        ));
    }

    for service in services.other.iter().filter_map(|id| catalog.other_service(id)) {
        line_items.push(flat_item(
            ServiceCategory::Other,
            service.id.as_str(),
            &service.name,
            service.price,
        ));
    }

    let subtotal = line_items.iter().fold(0_i64, |sum, item| sum.saturating_add(item.amount));
    let service_fee_percent = catalog.service_fee_percent(selection.event_type.as_ref());
    let service_fee = percent_of(subtotal, service_fee_percent);
    let total = subtotal.saturating_add(service_fee);
    let advance_amount = percent_of(total, ADVANCE_PERCENT);
    let remaining_amount = total - advance_amount;

    let steps = vec![
        trace_step("subtotal", "sum(line item amounts), venue excluded", subtotal),
        trace_step(
            "service_fee",
            format!("round(subtotal * {service_fee_percent}%)"),
            service_fee,
        ),
        trace_step("total", "subtotal + service_fee", total),
        trace_step("advance", format!("round(total * {ADVANCE_PERCENT}%)"), advance_amount),
        trace_step("remaining", "total - advance", remaining_amount),
    ];

    PriceQuote {
        line_items,
        subtotal,
        service_fee_percent,
        service_fee,
        total,
        advance_amount,
        remaining_amount,
        trace: PricingTrace { catalog_version: catalog.version.clone(), steps },
    }
}

/// `round(amount * percent / 100)` with halves rounded up.
pub fn percent_of(amount: i64, percent: Decimal) -> i64 {
    let scaled = (Decimal::from(amount) * percent / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    i64::try_from(scaled).unwrap_or(i64::MAX)
}

fn flat_item(category: ServiceCategory, id: &str, label: &str, price: i64) -> QuoteLineItem {
    QuoteLineItem {
        category,
        item_id: id.to_string(),
        label: label.to_string(),
        quantity: 1,
        unit_price: price,
        amount: price,
    }
}

fn trace_step(stage: &str, detail: impl Into<String>, amount: i64) -> PricingTraceStep {
    PricingTraceStep { stage: stage.to_string(), detail: detail.into(), amount }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{percent_of, price_selection, DeterministicPricingEngine, PricingEngine};
    use crate::cpq::catalog::Catalog;
    use crate::domain::selection::SelectionState;
    use crate::domain::service::{
        CateringOptionId, DecorThemeId, EntertainmentId, EventTypeId, OtherServiceId,
        PhotographyPackageId, PriceTier, VenueTypeId,
    };

    fn wedding() -> SelectionState {
        SelectionState {
            event_type: Some(EventTypeId::new("wedding")),
            ..SelectionState::default()
        }
    }

    #[test]
    fn catering_only_quote_matches_reference_amounts() {
        let mut selection = wedding();
        selection.set_guest_count(50);
        selection.select_catering(CateringOptionId::new("veg"), PriceTier::Standard);

        let quote = price_selection(&selection, &Catalog::standard());

        assert_eq!(quote.subtotal, 30_000);
        assert_eq!(quote.service_fee, 1_500);
        assert_eq!(quote.total, 31_500);
        assert_eq!(quote.advance_amount, 6_300);
        assert_eq!(quote.remaining_amount, 25_200);
        assert_eq!(quote.line_items.len(), 1);
        assert_eq!(quote.line_items[0].quantity, 50);
    }

    #[test]
    fn decor_and_photography_quote_matches_reference_amounts() {
        let mut selection = wedding();
        selection.selected_services.decor.theme = Some(DecorThemeId::new("floral"));
        selection.selected_services.photography.package =
            Some(PhotographyPackageId::new("classic"));

        let quote = DeterministicPricingEngine.price(&selection, &Catalog::standard());

        assert_eq!(quote.subtotal, 40_000);
        assert_eq!(quote.service_fee, 2_000);
        assert_eq!(quote.total, 42_000);
        assert_eq!(quote.advance_amount, 8_400);
    }

    #[test]
    fn empty_selection_prices_to_zero() {
        let quote = price_selection(&wedding(), &Catalog::standard());

        assert_eq!(quote.subtotal, 0);
        assert_eq!(quote.service_fee, 0);
        assert_eq!(quote.total, 0);
        assert_eq!(quote.advance_amount, 0);
        assert_eq!(quote.remaining_amount, 0);
        assert!(quote.line_items.is_empty());
    }

    #[test]
    fn catering_requires_both_option_and_tier() {
        let mut selection = wedding();
        selection.selected_services.catering.option = Some(CateringOptionId::new("veg"));

        assert_eq!(price_selection(&selection, &Catalog::standard()).subtotal, 0);
    }

    #[test]
    fn venue_choice_never_changes_the_total() {
        let catalog = Catalog::standard();
        let mut selection = wedding();
        selection.selected_services.decor.theme = Some(DecorThemeId::new("royal"));
        let baseline = price_selection(&selection, &catalog).total;

        for venue in &catalog.venue_types {
            selection.needs_venue = Some(true);
            selection.venue_details.venue_type = Some(venue.id.clone());
            assert_eq!(price_selection(&selection, &catalog).total, baseline);

            selection.needs_venue = Some(false);
            assert_eq!(price_selection(&selection, &catalog).total, baseline);
        }

        selection.venue_details.venue_type = Some(VenueTypeId::new("heritage"));
        selection.needs_venue = Some(true);
        assert_eq!(price_selection(&selection, &catalog).total, baseline);
    }

    #[test]
    fn multi_select_categories_sum_each_item() {
        let mut selection = wedding();
        selection.toggle_entertainment(EntertainmentId::new("dj"));
        selection.toggle_entertainment(EntertainmentId::new("live-band"));
        selection.toggle_other_service(OtherServiceId::new("makeup"));
        selection.toggle_other_service(OtherServiceId::new("not-in-catalog"));

        let quote = price_selection(&selection, &Catalog::standard());

        assert_eq!(quote.subtotal, 20_000 + 40_000 + 12_000);
        assert_eq!(quote.line_items.len(), 3);
    }

    #[test]
    fn unknown_event_type_uses_default_fee() {
        let mut selection = SelectionState {
            event_type: Some(EventTypeId::new("gala")),
            ..SelectionState::default()
        };
        selection.selected_services.decor.theme = Some(DecorThemeId::new("floral"));

        let quote = price_selection(&selection, &Catalog::standard());

        assert_eq!(quote.service_fee_percent, Decimal::from(5));
        assert_eq!(quote.service_fee, 750);
    }

    #[test]
    fn rounding_is_half_up_at_each_step() {
        assert_eq!(percent_of(10, Decimal::from(5)), 1);
        assert_eq!(percent_of(9, Decimal::from(5)), 0);
        assert_eq!(percent_of(30, Decimal::from(5)), 2);
        assert_eq!(percent_of(1_575, Decimal::from(20)), 315);
        assert_eq!(percent_of(1_577, Decimal::from(20)), 315);
        assert_eq!(percent_of(1_578, Decimal::from(20)), 316);
    }

    #[test]
    fn pricing_is_deterministic_and_traced() {
        let mut selection = wedding();
        selection.set_guest_count(80);
        selection.select_catering(CateringOptionId::new("non-veg"), PriceTier::Premium);

        let catalog = Catalog::standard();
        let first = price_selection(&selection, &catalog);
        let second = price_selection(&selection, &catalog);

        assert_eq!(first, second);
        assert_eq!(first.trace.catalog_version, catalog.version);
        let stages: Vec<_> = first.trace.steps.iter().map(|step| step.stage.as_str()).collect();
        assert_eq!(stages, vec!["subtotal", "service_fee", "total", "advance", "remaining"]);
    }
}
