use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use celebra_db::{migrations, ping, DbPool};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Ready,
    Degraded,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SchemaStatus {
    pub applied: Option<i64>,
    pub expected: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: Readiness,
    pub database: Readiness,
    pub schema: SchemaStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub checked_at: DateTime<Utc>,
}

/// `GET /health`: ready only when the database answers and its schema matches
/// the migrations bundled with this build.
pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(db_pool)
}

pub async fn health(State(pool): State<DbPool>) -> (StatusCode, Json<HealthReport>) {
    let report = inspect(&pool).await;
    let code = match report.status {
        Readiness::Ready => StatusCode::OK,
        Readiness::Degraded => StatusCode::SERVICE_UNAVAILABLE,
    };
    (code, Json(report))
}

async fn inspect(pool: &DbPool) -> HealthReport {
    let expected = migrations::latest_version();
    let mut report = HealthReport {
        status: Readiness::Degraded,
        database: Readiness::Degraded,
        schema: SchemaStatus { applied: None, expected },
        detail: None,
        checked_at: Utc::now(),
    };

    if let Err(error) = ping(pool).await {
        report.detail = Some(format!("database query failed: {error}"));
        return report;
    }
    report.database = Readiness::Ready;

    match migrations::applied_versions(pool).await {
        Ok(versions) => {
            report.schema.applied = versions.last().copied();
            if report.schema.applied == expected {
                report.status = Readiness::Ready;
            } else {
                report.detail = Some("schema is behind; run `celebra migrate`".to_string());
            }
        }
        Err(error) => report.detail = Some(format!("schema lookup failed: {error}")),
    }
    report
}
