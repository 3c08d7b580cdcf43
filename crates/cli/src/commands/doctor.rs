use homecord_core::config::{AppConfig, LoadOptions};
use homecord_db::{connect_with_settings, migrations, ping};
use serde::Serialize;

use crate::commands::{block_on, CommandResult};

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

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return CommandResult::raw(exit_code, output);
    }

    CommandResult::raw(exit_code, render_human(&report))
}

fn skipped(name: &'static str) -> DoctorCheck {
    DoctorCheck {
        name,
        status: CheckStatus::Skipped,
        details: "skipped because configuration did not load".to_string(),
    }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(DoctorCheck {
                name: "discord_token_format",
                status: CheckStatus::Pass,
                details: "token shape validated by config contract".to_string(),
            });
            checks.extend(check_database(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(skipped("discord_token_format"));
            checks.push(skipped("database_connectivity"));
            checks.push(skipped("schema_version"));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

/// Connectivity first, then whether every bundled migration has been applied.
fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let result = block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;
        ping(&pool).await.map_err(|error| format!("database did not answer: {error}"))?;
        let applied = migrations::applied_versions(&pool).await;
        pool.close().await;
        Ok::<_, String>(applied)
    })
    .and_then(|inner| inner);

    let applied = match result {
        Ok(applied) => applied,
        Err(details) => {
            return vec![
                DoctorCheck { name: "database_connectivity", status: CheckStatus::Fail, details },
                DoctorCheck {
                    name: "schema_version",
                    status: CheckStatus::Skipped,
                    details: "skipped because the database is unreachable".to_string(),
                },
            ];
        }
    };

    let connectivity = DoctorCheck {
        name: "database_connectivity",
        status: CheckStatus::Pass,
        details: format!("connected using `{}`", config.database.url),
    };
    let bundled = migrations::MIGRATOR.iter().filter(|m| m.migration_type.is_up_migration()).count();
    let schema = match applied {
        Ok(versions) if versions.len() >= bundled => DoctorCheck {
            name: "schema_version",
            status: CheckStatus::Pass,
            details: format!("{} of {bundled} migrations applied", versions.len()),
        },
        Ok(versions) => DoctorCheck {
            name: "schema_version",
            status: CheckStatus::Fail,
            details: format!(
                "{} of {bundled} migrations applied; run `homecord migrate`",
                versions.len()
            ),
        },
        Err(error) => DoctorCheck {
            name: "schema_version",
            status: CheckStatus::Fail,
            details: format!("could not read migration history: {error}"),
        },
    };

    vec![connectivity, schema]
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

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

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
