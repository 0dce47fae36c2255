use celebra_core::config::{AppConfig, LoadOptions};
use celebra_db::{connect_with_settings, migrations, ping};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, reason: &str) -> Self {
        Self { name, status: CheckStatus::Skipped, details: format!("skipped because {reason}") }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const DATABASE_CHECK: &str = "database_connectivity";
const SCHEMA_CHECK: &str = "schema_version";

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            serde_json::json!({
                "overall_status": "fail",
                "summary": "doctor serialization failed",
                "error": error.to_string(),
            })
            .to_string()
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let checks = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            let mut checks =
                vec![DoctorCheck::pass("config_validation", "configuration loaded and validated")];
            checks.push(check_gateway_credentials(&config));
            checks.extend(check_database(&config));
            checks
        }
        Err(error) => vec![
            DoctorCheck::fail("config_validation", error.to_string()),
            DoctorCheck::skipped("gateway_credentials", "configuration did not load"),
            DoctorCheck::skipped(DATABASE_CHECK, "configuration did not load"),
            DoctorCheck::skipped(SCHEMA_CHECK, "configuration did not load"),
        ],
    };

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    DoctorReport {
        overall_status: if all_pass { CheckStatus::Pass } else { CheckStatus::Fail },
        summary: if all_pass {
            "doctor: all readiness checks passed".to_string()
        } else {
            "doctor: one or more readiness checks failed".to_string()
        },
        checks,
    }
}

fn check_gateway_credentials(config: &AppConfig) -> DoctorCheck {
    match config.gateway.require_credentials() {
        Ok(_) => DoctorCheck::pass(
            "gateway_credentials",
            format!("key id and secret present, settling in {}", config.gateway.currency),
        ),
        Err(error) => DoctorCheck::fail("gateway_credentials", error.to_string()),
    }
}

/// Connectivity first; the schema is only inspected on a reachable database.
fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![
                DoctorCheck::fail(
                    DATABASE_CHECK,
                    format!("failed to initialize async runtime: {error}"),
                ),
                DoctorCheck::skipped(SCHEMA_CHECK, "no async runtime"),
            ];
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        {
            Ok(pool) => pool,
            Err(error) => {
                return vec![
                    DoctorCheck::fail(
                        DATABASE_CHECK,
                        format!("failed to connect to database: {error}"),
                    ),
                    DoctorCheck::skipped(SCHEMA_CHECK, "the database is unreachable"),
                ];
            }
        };

        let checks = match ping(&pool).await {
            Ok(()) => vec![
                DoctorCheck::pass(
                    DATABASE_CHECK,
                    format!("connected using `{}`", config.database.url),
                ),
                schema_check(migrations::applied_versions(&pool).await),
            ],
            Err(error) => vec![
                DoctorCheck::fail(DATABASE_CHECK, format!("database query failed: {error}")),
                DoctorCheck::skipped(SCHEMA_CHECK, "the database is unreachable"),
            ],
        };
        pool.close().await;
        checks
    })
}

fn schema_check<E: std::fmt::Display>(applied: Result<Vec<i64>, E>) -> DoctorCheck {
    let expected = migrations::latest_version();
    match applied {
        Ok(versions) if versions.last().copied() == expected => DoctorCheck::pass(
            SCHEMA_CHECK,
            format!("schema at version {}", render_version(expected)),
        ),
        Ok(versions) => DoctorCheck::fail(
            SCHEMA_CHECK,
            format!(
                "schema at version {} but {} is available; run `celebra migrate`",
                render_version(versions.last().copied()),
                render_version(expected)
            ),
        ),
        Err(error) => {
            DoctorCheck::fail(SCHEMA_CHECK, format!("could not read schema version: {error}"))
        }
    }
}

fn render_version(version: Option<i64>) -> String {
    version.map(|version| version.to_string()).unwrap_or_else(|| "none".to_string())
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
