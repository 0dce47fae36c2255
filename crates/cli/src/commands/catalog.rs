use std::path::Path;

use serde::Serialize;

use crate::commands::{load_catalog, CommandResult};

#[derive(Debug, Serialize)]
struct CatalogSummary {
    version: String,
    event_types: Vec<EventTypeSummary>,
    venue_types: usize,
    amenities: usize,
    catering_options: usize,
    decor_themes: usize,
    photography_packages: usize,
    entertainment_options: usize,
    other_services: usize,
}

#[derive(Debug, Serialize)]
struct EventTypeSummary {
    id: String,
    name: String,
    service_fee_percent: String,
}

pub fn run(path: Option<&Path>) -> CommandResult {
    let catalog = match load_catalog("catalog", path) {
        Ok(catalog) => catalog,
        Err(result) => return result,
    };

    CommandResult::data(
        "catalog",
        CatalogSummary {
            version: catalog.version.clone(),
            event_types: catalog
                .event_types
                .iter()
                .map(|event_type| EventTypeSummary {
                    id: event_type.id.to_string(),
                    name: event_type.name.clone(),
                    service_fee_percent: event_type.service_fee_percent.to_string(),
                })
                .collect(),
            venue_types: catalog.venue_types.len(),
            amenities: catalog.amenities.len(),
            catering_options: catalog.catering_options.len(),
            decor_themes: catalog.decor_themes.len(),
            photography_packages: catalog.photography_packages.len(),
            entertainment_options: catalog.entertainment_options.len(),
            other_services: catalog.other_services.len(),
        },
    )
}
