use careline_core::config::{AppConfig, LoadOptions};
use careline_core::customer::CustomerDirectory;
use careline_core::retention::RetentionRuleSet;
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

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
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
            checks.push(check_llm_credentials(&config));
            checks.push(check_customer_directory(&config));
            checks.push(check_retention_rules(&config));
            checks.push(check_policy_documents(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in
                ["llm_credentials", "customer_directory", "retention_rules", "policy_documents"]
            {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    // policy documents are optional; only hard failures gate readiness
    let ready = checks.iter().all(|check| check.status != CheckStatus::Fail);
    let overall_status = if ready { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if ready {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_llm_credentials(config: &AppConfig) -> DoctorCheck {
    if config.llm.api_key.is_some() {
        DoctorCheck {
            name: "llm_credentials",
            status: CheckStatus::Pass,
            details: format!("API key configured for model `{}`", config.llm.model),
        }
    } else {
        DoctorCheck {
            name: "llm_credentials",
            status: CheckStatus::Fail,
            details: "no API key; set CARELINE_LLM_API_KEY or [llm].api_key".to_string(),
        }
    }
}

fn check_customer_directory(config: &AppConfig) -> DoctorCheck {
    let path = &config.resources.customers_path;
    if !path.exists() {
        return DoctorCheck {
            name: "customer_directory",
            status: CheckStatus::Fail,
            details: format!("customer file not found at `{}`", path.display()),
        };
    }
    let directory = CustomerDirectory::load(path);
    if directory.is_empty() {
        DoctorCheck {
            name: "customer_directory",
            status: CheckStatus::Fail,
            details: format!("`{}` exists but yielded no customer rows", path.display()),
        }
    } else {
        DoctorCheck {
            name: "customer_directory",
            status: CheckStatus::Pass,
            details: format!("{} customers loaded from `{}`", directory.len(), path.display()),
        }
    }
}

fn check_retention_rules(config: &AppConfig) -> DoctorCheck {
    let path = &config.resources.rules_path;
    let rules = RetentionRuleSet::load(path);
    if rules.is_empty() {
        DoctorCheck {
            name: "retention_rules",
            status: CheckStatus::Fail,
            details: format!("no retention rules loaded from `{}`", path.display()),
        }
    } else {
        DoctorCheck {
            name: "retention_rules",
            status: CheckStatus::Pass,
            details: format!("retention rules loaded from `{}`", path.display()),
        }
    }
}

fn check_policy_documents(config: &AppConfig) -> DoctorCheck {
    let dir = &config.resources.policy_docs_dir;
    if dir.is_dir() {
        DoctorCheck {
            name: "policy_documents",
            status: CheckStatus::Pass,
            details: format!("policy document directory present at `{}`", dir.display()),
        }
    } else {
        DoctorCheck {
            name: "policy_documents",
            status: CheckStatus::Skipped,
            details: format!(
                "`{}` not found; agent runs without the policy search tool",
                dir.display()
            ),
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

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
