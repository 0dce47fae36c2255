pub mod catalog;
pub mod config;
pub mod doctor;
pub mod migrate;
pub mod quote;

use std::path::Path;

use celebra_core::config::{AppConfig, LoadOptions};
use celebra_core::cpq::Catalog;
use serde::Serialize;
use tokio::runtime::Runtime;

/// Rendered JSON plus the process exit code.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
enum Status {
    Ok,
    Error,
}

#[derive(Serialize)]
struct Envelope<'a, B> {
    command: &'a str,
    status: Status,
    #[serde(flatten)]
    body: B,
}

#[derive(Serialize)]
struct Message {
    message: String,
}

#[derive(Serialize)]
struct Failure<'a> {
    error_class: &'a str,
    message: String,
}

#[derive(Serialize)]
struct Data<T> {
    data: T,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::render(0, command, Status::Ok, Message { message: message.into() })
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let body = Failure { error_class, message: message.into() };
        Self::render(exit_code, command, Status::Error, body)
    }

    pub fn data<T: Serialize>(command: &str, data: T) -> Self {
        Self::render(0, command, Status::Ok, Data { data })
    }

    fn render<B: Serialize>(exit_code: u8, command: &str, status: Status, body: B) -> Self {
        let output = serde_json::to_string(&Envelope { command, status, body }).unwrap_or_else(
            |error| {
                serde_json::json!({
                    "command": command,
                    "status": "error",
                    "error_class": "serialization",
                    "message": error.to_string(),
                })
                .to_string()
            },
        );
        Self { exit_code, output }
    }
}

pub(crate) fn load_config(command: &str) -> Result<AppConfig, CommandResult> {
    AppConfig::load(LoadOptions::default()).map_err(|error| {
        let message = format!("configuration issue: {error}");
        CommandResult::failure(command, "config_validation", message, 2)
    })
}

/// Commands are synchronous; database work runs on a throwaway current-thread runtime.
pub(crate) fn runtime(command: &str) -> Result<Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(command, "runtime_init", format!("no async runtime: {error}"), 3)
    })
}

/// The catalog at `path` after validation, or the built-in one. Unreadable
/// files exit with 2, invalid catalogs with 3.
pub(crate) fn load_catalog(command: &str, path: Option<&Path>) -> Result<Catalog, CommandResult> {
    let Some(path) = path else {
        return Ok(Catalog::standard());
    };

    let raw = std::fs::read_to_string(path).map_err(|error| {
        CommandResult::failure(
            command,
            "catalog_read",
            format!("could not read `{}`: {error}", path.display()),
            2,
        )
    })?;
    Catalog::from_json(&raw)
        .map_err(|error| CommandResult::failure(command, "catalog_validation", error.to_string(), 3))
}
