use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub gateway: GatewayConfig,
    pub checkout: CheckoutConfig,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// Where the planner reaches the payment and booking API.
#[derive(Clone, Debug)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub key_id: String,
    pub key_secret: Option<SecretString>,
    pub currency: String,
}

#[derive(Clone, Debug)]
pub struct CheckoutConfig {
    /// Smallest quote total, in minor units, that may be sent to checkout.
    pub minimum_payable_total: i64,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub backend_base_url: Option<String>,
    pub gateway_key_id: Option<String>,
    pub gateway_key_secret: Option<String>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read `{path}`: {source}")]
    FileRead { path: PathBuf, source: std::io::Error },
    #[error("`{path}` is not valid TOML: {source}")]
    FileParse { path: PathBuf, source: toml::de::Error },
    #[error("config file `{0}` does not exist")]
    FileNotFound(PathBuf),
    #[error("`${{{var}}}` is referenced by the config file but not set")]
    UnsetInterpolation { var: String },
    #[error("`${{` without a closing `}}` in the config file")]
    UnterminatedInterpolation,
    #[error("{key}={value:?} cannot be parsed")]
    InvalidEnvValue { key: String, value: String },
    #[error("invalid configuration: {0}")]
    Validation(String),
}

const DEFAULT_FILES: [&str; 2] = ["celebra.toml", "config/celebra.toml"];
const ENV_PREFIX: &str = "CELEBRA_";

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig {
                base_url: "http://127.0.0.1:8080".to_string(),
                timeout_secs: 15,
            },
            gateway: GatewayConfig {
                key_id: String::new(),
                key_secret: None,
                currency: "INR".to_string(),
            },
            checkout: CheckoutConfig { minimum_payable_total: 1 },
            database: DatabaseConfig {
                url: "sqlite://celebra.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format `{other}`")),
        }
    }
}

impl GatewayConfig {
    /// Both halves of the key pair, or the reason the server cannot sign payments.
    pub fn require_credentials(&self) -> Result<(&str, &SecretString), ConfigError> {
        if self.key_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "gateway.key_id is required to issue payment orders".to_string(),
            ));
        }
        self.key_secret
            .as_ref()
            .filter(|secret| !secret.expose_secret().trim().is_empty())
            .map(|secret| (self.key_id.as_str(), secret))
            .ok_or_else(|| {
                ConfigError::Validation(
                    "gateway.key_secret is required to verify payment signatures".to_string(),
                )
            })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let currency = self.currency.trim();
        check(
            currency.len() == 3 && currency.chars().all(|ch| ch.is_ascii_uppercase()),
            "gateway.currency must be a three-letter upper-case ISO code such as `INR`",
        )
    }
}

impl BackendConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let base_url = self.base_url.trim();
        check(
            base_url.starts_with("http://") || base_url.starts_with("https://"),
            "backend.base_url must start with http:// or https://",
        )?;
        check((1..=120).contains(&self.timeout_secs), "backend.timeout_secs must be in 1..=120")
    }
}

impl CheckoutConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        check(
            self.minimum_payable_total >= 0,
            "checkout.minimum_payable_total must not be negative",
        )
    }
}

impl DatabaseConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let url = self.url.trim();
        check(
            url.starts_with("sqlite:") || url == ":memory:",
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)",
        )?;
        check(self.max_connections > 0, "database.max_connections must be at least 1")?;
        check((1..=300).contains(&self.timeout_secs), "database.timeout_secs must be in 1..=300")
    }
}

impl ServerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        check(self.port > 0, "server.port must be non-zero")?;
        check(self.graceful_shutdown_secs > 0, "server.graceful_shutdown_secs must be non-zero")
    }
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        check(
            matches!(
                self.level.trim().to_ascii_lowercase().as_str(),
                "trace" | "debug" | "info" | "warn" | "error"
            ),
            "logging.level must be one of trace|debug|info|warn|error",
        )
    }
}

impl AppConfig {
    /// Defaults, then the TOML file, then `CELEBRA_*` variables, then
    /// programmatic overrides. The result is validated before it is returned.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        Self::load_from(options, &|key| env::var(key).ok())
    }

    fn load_from(
        options: LoadOptions,
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        match locate_file(options.config_path.as_deref()) {
            Some(path) => config.merge(read_file(&path, lookup)?),
            None if options.require_file => {
                return Err(ConfigError::FileNotFound(
                    options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_FILES[0])),
                ));
            }
            None => {}
        }

        config.merge_env(&EnvLayer { lookup })?;
        config.merge_overrides(options.overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.backend.validate()?;
        self.gateway.validate()?;
        self.checkout.validate()?;
        self.database.validate()?;
        self.server.validate()?;
        self.logging.validate()
    }

    fn merge(&mut self, file: FileLayer) {
        let FileLayer { backend, gateway, checkout, database, server, logging } = file;

        set(&mut self.backend.base_url, backend.base_url);
        set(&mut self.backend.timeout_secs, backend.timeout_secs);

        set(&mut self.gateway.key_id, gateway.key_id);
        if let Some(secret) = gateway.key_secret {
            self.gateway.key_secret = Some(SecretString::from(secret));
        }
        set(&mut self.gateway.currency, gateway.currency);

        set(&mut self.checkout.minimum_payable_total, checkout.minimum_payable_total);

        set(&mut self.database.url, database.url);
        set(&mut self.database.max_connections, database.max_connections);
        set(&mut self.database.timeout_secs, database.timeout_secs);

        set(&mut self.server.bind_address, server.bind_address);
        set(&mut self.server.port, server.port);
        set(&mut self.server.graceful_shutdown_secs, server.graceful_shutdown_secs);

        set(&mut self.logging.level, logging.level);
        set(&mut self.logging.format, logging.format);
    }

    fn merge_env(&mut self, env: &EnvLayer<'_>) -> Result<(), ConfigError> {
        set(&mut self.backend.base_url, env.text("BACKEND_BASE_URL"));
        set(&mut self.backend.timeout_secs, env.parsed("BACKEND_TIMEOUT_SECS")?);

        set(&mut self.gateway.key_id, env.text("GATEWAY_KEY_ID"));
        if let Some(secret) = env.text("GATEWAY_KEY_SECRET") {
            self.gateway.key_secret = Some(SecretString::from(secret));
        }
        set(&mut self.gateway.currency, env.text("GATEWAY_CURRENCY"));

        set(
            &mut self.checkout.minimum_payable_total,
            env.parsed("CHECKOUT_MINIMUM_PAYABLE_TOTAL")?,
        );

        set(&mut self.database.url, env.text("DATABASE_URL"));
        set(&mut self.database.max_connections, env.parsed("DATABASE_MAX_CONNECTIONS")?);
        set(&mut self.database.timeout_secs, env.parsed("DATABASE_TIMEOUT_SECS")?);

        set(&mut self.server.bind_address, env.text("SERVER_BIND_ADDRESS"));
        set(&mut self.server.port, env.parsed("SERVER_PORT")?);
        set(
            &mut self.server.graceful_shutdown_secs,
            env.parsed("SERVER_GRACEFUL_SHUTDOWN_SECS")?,
        );

        // `LOG_*` are accepted as short aliases.
        set(&mut self.logging.level, env.text("LOGGING_LEVEL").or_else(|| env.text("LOG_LEVEL")));
        let format = match env.parsed("LOGGING_FORMAT")? {
            Some(format) => Some(format),
            None => env.parsed("LOG_FORMAT")?,
        };
        set(&mut self.logging.format, format);

        Ok(())
    }

    fn merge_overrides(&mut self, overrides: ConfigOverrides) {
        set(&mut self.database.url, overrides.database_url);
        set(&mut self.logging.level, overrides.log_level);
        set(&mut self.backend.base_url, overrides.backend_base_url);
        set(&mut self.gateway.key_id, overrides.gateway_key_id);
        if let Some(secret) = overrides.gateway_key_secret {
            self.gateway.key_secret = Some(SecretString::from(secret));
        }
        set(&mut self.server.port, overrides.server_port);
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn check(condition: bool, message: &str) -> Result<(), ConfigError> {
    if condition {
        Ok(())
    } else {
        Err(ConfigError::Validation(message.to_string()))
    }
}

/// Reads `CELEBRA_`-prefixed variables; blank values count as unset.
struct EnvLayer<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl EnvLayer<'_> {
    fn text(&self, suffix: &str) -> Option<String> {
        (self.lookup)(&format!("{ENV_PREFIX}{suffix}")).filter(|value| !value.trim().is_empty())
    }

    fn parsed<T: FromStr>(&self, suffix: &str) -> Result<Option<T>, ConfigError> {
        self.text(suffix)
            .map(|value| {
                value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvValue {
                    key: format!("{ENV_PREFIX}{suffix}"),
                    value,
                })
            })
            .transpose()
    }
}

fn locate_file(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => path.exists().then(|| path.to_path_buf()),
        None => DEFAULT_FILES.iter().map(PathBuf::from).find(|path| path.exists()),
    }
}

fn read_file(
    path: &Path,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<FileLayer, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::FileRead { path: path.to_path_buf(), source })?;
    let expanded = expand_placeholders(&raw, lookup)?;
    toml::from_str(&expanded)
        .map_err(|source| ConfigError::FileParse { path: path.to_path_buf(), source })
}

/// Substitutes every `${NAME}` with the variable's value.
fn expand_placeholders(
    raw: &str,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<String, ConfigError> {
    let mut expanded = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        expanded.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or(ConfigError::UnterminatedInterpolation)?;
        let var = &after[..end];
        let value =
            lookup(var).ok_or_else(|| ConfigError::UnsetInterpolation { var: var.to_string() })?;
        expanded.push_str(&value);
        rest = &after[end + 1..];
    }

    expanded.push_str(rest);
    Ok(expanded)
}

/// Every key optional: a file only names what it changes.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileLayer {
    backend: BackendFile,
    gateway: GatewayFile,
    checkout: CheckoutFile,
    database: DatabaseFile,
    server: ServerFile,
    logging: LoggingFile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct BackendFile {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct GatewayFile {
    key_id: Option<String>,
    key_secret: Option<String>,
    currency: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct CheckoutFile {
    minimum_payable_total: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct DatabaseFile {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ServerFile {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct LoggingFile {
    level: Option<String>,
    format: Option<LogFormat>,
}
