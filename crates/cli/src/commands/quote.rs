use std::fs;
use std::path::Path;

use celebra_core::cpq::price_selection;
use celebra_core::domain::selection::SelectionState;

use crate::commands::{load_catalog, CommandResult};

/// Prices a selection saved as JSON, the same way the planner does on every edit.
pub fn run(selection_path: &Path, catalog_path: Option<&Path>) -> CommandResult {
    let raw = match fs::read_to_string(selection_path) {
        Ok(raw) => raw,
        Err(error) => {
            return CommandResult::failure(
                "quote",
                "selection_read",
                format!("could not read `{}`: {error}", selection_path.display()),
                2,
            );
        }
    };
    let selection: SelectionState = match serde_json::from_str(&raw) {
        Ok(selection) => selection,
        Err(error) => {
            return CommandResult::failure(
                "quote",
                "selection_parse",
                format!("selection is not valid JSON: {error}"),
                2,
            );
        }
    };
    let catalog = match load_catalog("quote", catalog_path) {
        Ok(catalog) => catalog,
        Err(result) => return result,
    };

    CommandResult::data("quote", price_selection(&selection, &catalog))
}
