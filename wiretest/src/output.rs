use std::process::ExitCode;

use serde::Serialize;

use wiretest_core::{SuiteReport, TestResult, TestStatus};

use crate::config::TestDefinition;

/// Outcomes of one definition file.
pub(super) struct FileReport {
    pub file: String,
    pub report: SuiteReport,
}

#[derive(Serialize)]
struct CliError<'a> {
    status: &'static str,
    message: &'a str,
}

pub(super) fn error_exit(message: &str, json: bool) -> ExitCode {
    if json {
        let payload = CliError {
            status: "error",
            message,
        };
        let output = serde_json::to_string_pretty(&payload).unwrap_or(message.to_string());
        eprintln!("{output}");
    } else {
        eprintln!("{message}");
    }
    ExitCode::from(2)
}

pub(super) fn run_exit_code(reports: &[FileReport]) -> ExitCode {
    if reports.iter().all(|entry| entry.report.success()) {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

#[derive(Serialize)]
struct RunSummary<'a> {
    files: Vec<FileSummary<'a>>,
    total: usize,
    passed: usize,
    failed: usize,
}

#[derive(Serialize)]
struct FileSummary<'a> {
    file: &'a str,
    cases: Vec<CaseSummary<'a>>,
}

#[derive(Serialize)]
struct CaseSummary<'a> {
    name: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
    duration_ms: u64,
}

fn case_summary(result: &TestResult) -> CaseSummary<'_> {
    let (status, reason) = match &result.status {
        TestStatus::Success => ("passed", None),
        TestStatus::Failure { reason } => ("failed", Some(reason.as_str())),
    };
    CaseSummary {
        name: &result.name,
        status,
        reason,
        duration_ms: result.duration.as_millis() as u64,
    }
}

pub(super) fn format_run_json(reports: &[FileReport]) -> String {
    let summary = RunSummary {
        files: reports
            .iter()
            .map(|entry| FileSummary {
                file: &entry.file,
                cases: entry.report.results.iter().map(case_summary).collect(),
            })
            .collect(),
        total: reports.iter().map(|entry| entry.report.total()).sum(),
        passed: reports.iter().map(|entry| entry.report.passed()).sum(),
        failed: reports.iter().map(|entry| entry.report.failed()).sum(),
    };
    serde_json::to_string_pretty(&summary)
        .unwrap_or("<failed to serialize run summary>".to_string())
}

pub(super) fn format_run_human(reports: &[FileReport]) -> String {
    let mut output = String::new();
    for entry in reports {
        output.push_str(&format!(
            "{}: {} passed, {} failed\n",
            entry.file,
            entry.report.passed(),
            entry.report.failed()
        ));
        for result in &entry.report.results {
            let millis = result.duration.as_millis();
            match &result.status {
                TestStatus::Success => {
                    output.push_str(&format!("  ok {} ({millis}ms)\n", result.name));
                }
                TestStatus::Failure { reason } => {
                    output.push_str(&format!("  FAILED {} ({millis}ms)\n", result.name));
                    for line in reason.lines() {
                        output.push_str(&format!("    {line}\n"));
                    }
                }
            }
        }
    }
    let total: usize = reports.iter().map(|entry| entry.report.total()).sum();
    let passed: usize = reports.iter().map(|entry| entry.report.passed()).sum();
    let failed: usize = reports.iter().map(|entry| entry.report.failed()).sum();
    output.push_str(&format!(
        "Total: {total} case(s), {passed} passed, {failed} failed\n"
    ));
    output
}

#[derive(Serialize)]
struct CheckedFile<'a> {
    file: &'a str,
    definition: &'a TestDefinition,
}

pub(super) fn format_check_json(checked: &[(String, TestDefinition)]) -> String {
    let files: Vec<CheckedFile> = checked
        .iter()
        .map(|(file, definition)| CheckedFile { file, definition })
        .collect();
    serde_json::to_string_pretty(&files)
        .unwrap_or("<failed to serialize definitions>".to_string())
}

/// Echoes each definition back as normalized YAML.
pub(super) fn format_check_human(checked: &[(String, TestDefinition)]) -> String {
    let mut output = String::new();
    for (file, definition) in checked {
        output.push_str(&format!("{file}:\n"));
        let rendered = serde_yaml::to_string(definition)
            .unwrap_or("<failed to serialize definition>\n".to_string());
        output.push_str(&rendered);
    }
    output
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn sample_reports() -> Vec<FileReport> {
        vec![FileReport {
            file: "orders.yaml".to_string(),
            report: SuiteReport {
                results: vec![
                    TestResult {
                        name: "creates an order".to_string(),
                        status: TestStatus::Success,
                        duration: Duration::from_millis(12),
                    },
                    TestResult {
                        name: "rejects a bad order".to_string(),
                        status: TestStatus::Failure {
                            reason: "validation failed with 2 mismatches:\n  - a\n  - b"
                                .to_string(),
                        },
                        duration: Duration::from_millis(40),
                    },
                ],
            },
        }]
    }

    #[test]
    fn human_output_lists_cases_and_totals() {
        let rendered = format_run_human(&sample_reports());
        let expected = concat!(
            "orders.yaml: 1 passed, 1 failed\n",
            "  ok creates an order (12ms)\n",
            "  FAILED rejects a bad order (40ms)\n",
            "    validation failed with 2 mismatches:\n",
            "      - a\n",
            "      - b\n",
            "Total: 2 case(s), 1 passed, 1 failed\n",
        );
        assert_eq!(rendered, expected);
    }

    #[test]
    fn json_output_summarizes_cases() {
        let rendered = format_run_json(&sample_reports());
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["total"], 2);
        assert_eq!(parsed["passed"], 1);
        assert_eq!(parsed["failed"], 1);
        assert_eq!(parsed["files"][0]["file"], "orders.yaml");
        let cases = parsed["files"][0]["cases"].as_array().unwrap();
        assert_eq!(cases[0]["status"], "passed");
        assert!(cases[0].get("reason").is_none());
        assert_eq!(cases[1]["status"], "failed");
        assert_eq!(
            cases[1]["reason"],
            "validation failed with 2 mismatches:\n  - a\n  - b"
        );
    }

    #[test]
    fn check_output_round_trips_the_definition() {
        let definition: TestDefinition = serde_json::from_str(
            r#"{
                "endpoints": [{"type": "direct", "name": "queue"}],
                "cases": [{"name": "a", "actions": [{"echo": "hi"}]}]
            }"#,
        )
        .unwrap();
        let checked = vec![("suite.json".to_string(), definition)];

        let human = format_check_human(&checked);
        assert!(human.starts_with("suite.json:\n"), "{human}");
        let reparsed: TestDefinition =
            serde_yaml::from_str(human.strip_prefix("suite.json:\n").unwrap()).unwrap();
        assert_eq!(reparsed.cases[0].name, "a");

        let json = format_check_json(&checked);
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0]["file"], "suite.json");
        assert_eq!(parsed[0]["definition"]["cases"][0]["name"], "a");
    }
}
