use std::env;
use std::fmt;
use std::fs;
use std::path::PathBuf;

use celebra_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

/// Key paths rendered by `celebra config`, each with the variables that can
/// set it. The first variable wins when several are present.
const FIELDS: [(&str, &[&str]); 14] = [
    ("backend.base_url", &["CELEBRA_BACKEND_BASE_URL"]),
    ("backend.timeout_secs", &["CELEBRA_BACKEND_TIMEOUT_SECS"]),
    ("gateway.key_id", &["CELEBRA_GATEWAY_KEY_ID"]),
    ("gateway.key_secret", &["CELEBRA_GATEWAY_KEY_SECRET"]),
    ("gateway.currency", &["CELEBRA_GATEWAY_CURRENCY"]),
    ("checkout.minimum_payable_total", &["CELEBRA_CHECKOUT_MINIMUM_PAYABLE_TOTAL"]),
    ("database.url", &["CELEBRA_DATABASE_URL"]),
    ("database.max_connections", &["CELEBRA_DATABASE_MAX_CONNECTIONS"]),
    ("database.timeout_secs", &["CELEBRA_DATABASE_TIMEOUT_SECS"]),
    ("server.bind_address", &["CELEBRA_SERVER_BIND_ADDRESS"]),
    ("server.port", &["CELEBRA_SERVER_PORT"]),
    ("server.graceful_shutdown_secs", &["CELEBRA_SERVER_GRACEFUL_SHUTDOWN_SECS"]),
    ("logging.level", &["CELEBRA_LOGGING_LEVEL", "CELEBRA_LOG_LEVEL"]),
    ("logging.format", &["CELEBRA_LOGGING_FORMAT", "CELEBRA_LOG_FORMAT"]),
];

const CONFIG_FILES: [&str; 2] = ["celebra.toml", "config/celebra.toml"];

enum Source<'a> {
    Default,
    File(&'a ConfigFile),
    Env(&'static str),
}

impl fmt::Display for Source<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default"),
            Self::File(file) => write!(f, "file ({})", file.path.display()),
            Self::Env(var) => write!(f, "env ({var})"),
        }
    }
}

struct ConfigFile {
    path: PathBuf,
    document: Value,
}

impl ConfigFile {
    fn discover() -> Option<Self> {
        let path = CONFIG_FILES.iter().map(PathBuf::from).find(|path| path.exists())?;
        let document = fs::read_to_string(&path).ok()?.parse::<Value>().ok()?;
        Some(Self { path, document })
    }

    fn defines(&self, key_path: &str) -> bool {
        key_path
            .split('.')
            .try_fold(&self.document, |table, key| table.get(key))
            .is_some()
    }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };
    let file = ConfigFile::discover();

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(FIELDS.iter().map(|(key_path, vars)| {
        let source = source_of(key_path, vars, file.as_ref());
        format!("- {key_path} = {} (source: {source})", display_value(&config, key_path))
    }));
    lines.join("\n")
}

fn source_of<'a>(
    key_path: &str,
    vars: &[&'static str],
    file: Option<&'a ConfigFile>,
) -> Source<'a> {
    let from_env = vars
        .iter()
        .find(|var| env::var(var).is_ok_and(|value| !value.trim().is_empty()));
    match (from_env, file) {
        (Some(var), _) => Source::Env(*var),
        (None, Some(file)) if file.defines(key_path) => Source::File(file),
        _ => Source::Default,
    }
}

fn display_value(config: &AppConfig, key_path: &str) -> String {
    match key_path {
        "backend.base_url" => config.backend.base_url.clone(),
        "backend.timeout_secs" => config.backend.timeout_secs.to_string(),
        "gateway.key_id" => mask_key_id(&config.gateway.key_id),
        "gateway.key_secret" => match &config.gateway.key_secret {
            Some(secret) if !secret.expose_secret().trim().is_empty() => "<redacted>".to_string(),
            _ => "<unset>".to_string(),
        },
        "gateway.currency" => config.gateway.currency.clone(),
        "checkout.minimum_payable_total" => config.checkout.minimum_payable_total.to_string(),
        "database.url" => config.database.url.clone(),
        "database.max_connections" => config.database.max_connections.to_string(),
        "database.timeout_secs" => config.database.timeout_secs.to_string(),
        "server.bind_address" => config.server.bind_address.clone(),
        "server.port" => config.server.port.to_string(),
        "server.graceful_shutdown_secs" => config.server.graceful_shutdown_secs.to_string(),
        "logging.level" => config.logging.level.clone(),
        "logging.format" => format!("{:?}", config.logging.format).to_ascii_lowercase(),
        _ => "<unknown>".to_string(),
    }
}

/// Publishable keys look like `rzp_live_XXXX`; keep the mode prefix only.
fn mask_key_id(key_id: &str) -> String {
    match key_id.trim() {
        "" => "<unset>".to_string(),
        trimmed => match trimmed.rsplit_once('_') {
            Some((prefix, _)) => format!("{prefix}_***"),
            None => "<redacted>".to_string(),
        },
    }
}
