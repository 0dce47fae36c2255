use celebra_db::{connect_with_settings, migrations, DbPool};

use crate::commands::{load_config, runtime, CommandResult};

const COMMAND: &str = "migrate";

/// Applies pending migrations. Exit codes: 2 config, 3 runtime, 4 connection,
/// 5 migration.
pub fn run() -> CommandResult {
    let config = match load_config(COMMAND) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime(COMMAND) {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    runtime.block_on(async {
        let database = &config.database;
        let pool = match connect_with_settings(
            &database.url,
            database.max_connections,
            database.timeout_secs,
        )
        .await
        {
            Ok(pool) => pool,
            Err(error) => {
                return CommandResult::failure(COMMAND, "db_connectivity", error.to_string(), 4);
            }
        };

        let result = apply(&pool).await;
        pool.close().await;
        result
    })
}

async fn apply(pool: &DbPool) -> CommandResult {
    let before = match migrations::applied_versions(pool).await {
        Ok(versions) => versions.len(),
        Err(error) => {
            return CommandResult::failure(COMMAND, "db_connectivity", error.to_string(), 4);
        }
    };
    if let Err(error) = migrations::run_pending(pool).await {
        return CommandResult::failure(COMMAND, "migration", error.to_string(), 5);
    }

    match migrations::applied_versions(pool).await {
        Ok(after) => {
            let version = after.last().map_or_else(|| "none".to_string(), ToString::to_string);
            CommandResult::success(
                COMMAND,
                format!(
                    "applied {} migration(s); schema at version {version}",
                    after.len().saturating_sub(before)
                ),
            )
        }
        Err(error) => CommandResult::failure(COMMAND, "migration", error.to_string(), 5),
    }
}
