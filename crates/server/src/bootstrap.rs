use celebra_core::config::{AppConfig, ConfigError};
use celebra_db::{connect_with_settings, migrations, DbPool};
use thiserror::Error;
use tracing::info;

use crate::payments::GatewayCredentials;

/// Everything the HTTP layer needs, resolved before the listener binds.
pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub gateway: GatewayCredentials,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("cannot sign payments: {0}")]
    Gateway(#[source] ConfigError),
    #[error("database `{url}` is unreachable: {source}")]
    DatabaseConnect { url: String, source: sqlx::Error },
    #[error("schema migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

impl Application {
    /// Credentials are checked first so a misconfigured deploy fails before it
    /// touches the database.
    pub async fn start(config: AppConfig) -> Result<Self, BootstrapError> {
        let gateway =
            GatewayCredentials::try_from(&config.gateway).map_err(BootstrapError::Gateway)?;

        let db_pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|source| BootstrapError::DatabaseConnect {
            url: config.database.url.clone(),
            source,
        })?;

        migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
        info!(
            event_name = "system.bootstrap.ready",
            correlation_id = "bootstrap",
            schema_version = migrations::latest_version().unwrap_or_default(),
            currency = %gateway.currency,
            "database migrated and gateway keys loaded"
        );

        Ok(Self { config, db_pool, gateway })
    }
}

#[cfg(test)]
mod tests {
    use celebra_core::config::{AppConfig, ConfigOverrides, LoadOptions};
    use secrecy::ExposeSecret;

    use super::{Application, BootstrapError};

    async fn bootstrap(secret: &str) -> Result<Application, BootstrapError> {
        Application::start(AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                gateway_key_id: Some("rzp_test_key".to_string()),
                gateway_key_secret: Some(secret.to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })?)
        .await
    }

    #[tokio::test]
    async fn blank_gateway_secret_stops_startup() {
        let error = bootstrap("   ").await.err().expect("bootstrap should fail");

        assert!(matches!(error, BootstrapError::Gateway(_)));
        assert!(error.to_string().contains("gateway.key_secret"));
    }

    #[tokio::test]
    async fn startup_migrates_and_carries_gateway_keys() {
        let app = bootstrap("shh").await.expect("bootstrap should succeed");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('payment_order', 'payment_verification', 'booking')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("count tables");
        assert_eq!(table_count, 3);
        assert_eq!(app.gateway.key_id, "rzp_test_key");
        assert_eq!(app.gateway.key_secret.expose_secret(), "shh");
        assert_eq!(app.gateway.currency, "INR");

        app.db_pool.close().await;
    }
}
