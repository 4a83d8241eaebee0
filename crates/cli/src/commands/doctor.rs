use serde::Serialize;
use trailhead_agent::llm::client_from_config;
use trailhead_core::catalog::Catalog;
use trailhead_core::config::AppConfig;

use crate::commands::{escape_json, load_config, CommandResult};
use crate::RuntimeArgs;

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

pub fn run(runtime: &RuntimeArgs, json_output: bool) -> CommandResult {
    let report = build_report(runtime);
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return CommandResult { exit_code, output };
    }

    CommandResult { exit_code, output: render_human(&report) }
}

fn build_report(runtime: &RuntimeArgs) -> DoctorReport {
    let mut checks = Vec::new();

    match load_config(runtime) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_catalog(&config));
            checks.push(check_llm(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["catalog_data", "llm_readiness"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_catalog(config: &AppConfig) -> DoctorCheck {
    let missing = [config.catalog.orders_path(), config.catalog.products_path()]
        .into_iter()
        .filter(|path| !path.exists())
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return DoctorCheck {
            name: "catalog_data",
            status: CheckStatus::Fail,
            details: format!("missing data file(s): {}", missing.join(", ")),
        };
    }

    match Catalog::load(&config.catalog) {
        Ok(catalog) => DoctorCheck {
            name: "catalog_data",
            status: CheckStatus::Pass,
            details: format!(
                "loaded {} order(s) and {} product(s) from `{}`",
                catalog.orders().len(),
                catalog.products().len(),
                config.catalog.data_dir.display()
            ),
        },
        Err(error) => {
            DoctorCheck { name: "catalog_data", status: CheckStatus::Fail, details: error.to_string() }
        }
    }
}

fn check_llm(config: &AppConfig) -> DoctorCheck {
    match client_from_config(&config.llm) {
        Ok(None) => DoctorCheck {
            name: "llm_readiness",
            status: CheckStatus::Skipped,
            details: "language model disabled; rule table selects every action".to_string(),
        },
        Ok(Some(_)) => DoctorCheck {
            name: "llm_readiness",
            status: CheckStatus::Pass,
            details: format!(
                "{} client ready for `{}` at {}",
                config.llm.provider.as_str(),
                config.llm.model,
                config.llm.effective_base_url()
            ),
        },
        Err(error) => {
            DoctorCheck { name: "llm_readiness", status: CheckStatus::Fail, details: error.to_string() }
        }
    }
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
