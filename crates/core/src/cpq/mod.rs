pub mod catalog;
pub mod pricing;

pub use catalog::{Catalog, CatalogError, DEFAULT_SERVICE_FEE_PERCENT};
pub use pricing::{
    price_selection, DeterministicPricingEngine, PriceQuote, PricingEngine, PricingTrace,
    PricingTraceStep, QuoteLineItem, ServiceCategory, ADVANCE_PERCENT,
};
