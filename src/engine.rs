//! Engine: evaluates configured rule sources against one context

use crate::context::EvaluationContext;
use crate::factory::RuleSource;
use crate::rule::{EvalError, RuleResult};
use serde::Serialize;
use std::time::{Duration, Instant};

/// Outcome of one rule source
#[derive(Debug, Serialize)]
pub struct RuleOutcome {
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Logical rule count for reporting
    pub rule_count: usize,

    #[serde(flatten)]
    pub result: RuleResult,
}

/// Aggregate counters for one run
#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    /// Sum of logical rule counts across sources
    pub total_rules: usize,

    /// Sources that passed
    pub passed_sources: usize,

    /// Sources that failed
    pub failed_sources: usize,

    pub error_count: usize,

    pub warning_count: usize,

    /// Files in the evaluated snapshot
    pub files_checked: usize,

    pub passed: bool,
}

/// Result of one full gate run
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub outcomes: Vec<RuleOutcome>,

    pub summary: RunSummary,

    #[serde(skip)]
    pub duration: Duration,
}

impl RunReport {
    pub fn has_errors(&self) -> bool {
        self.summary.error_count > 0
    }

    pub fn has_warnings(&self) -> bool {
        self.summary.warning_count > 0
    }

    pub fn is_clean(&self) -> bool {
        self.summary.error_count == 0 && self.summary.warning_count == 0
    }

    /// Get exit code (0 = success, 1 = warnings, 2 = errors)
    pub fn exit_code(&self) -> i32 {
        if self.summary.error_count > 0 {
            2
        } else if self.summary.warning_count > 0 {
            1
        } else {
            0
        }
    }
}

/// The gate engine.
///
/// Sources are evaluated strictly in the order given; a configuration or
/// hard external failure aborts the whole run, while data conditions are
/// reported as violations.
#[derive(Debug, Default)]
pub struct Engine;

impl Engine {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate every source against the context and aggregate a report
    pub fn run(
        &self,
        sources: &[RuleSource],
        ctx: &EvaluationContext,
    ) -> Result<RunReport, EvalError> {
        let start = Instant::now();

        let mut outcomes = Vec::new();
        let mut summary = RunSummary {
            files_checked: ctx.diff.files.len(),
            ..RunSummary::default()
        };

        for source in sources {
            log::debug!("evaluating rule source '{}'", source.id);
            let result = source.root.evaluate(ctx)?;

            summary.total_rules += source.root.count_rules();
            if result.passed {
                summary.passed_sources += 1;
            } else {
                summary.failed_sources += 1;
            }
            summary.error_count += result.violations.iter().filter(|v| v.is_error()).count();
            summary.warning_count += result.violations.iter().filter(|v| v.is_warning()).count();

            outcomes.push(RuleOutcome {
                id: source.id.clone(),
                description: source.description.clone(),
                rule_count: source.root.count_rules(),
                result,
            });
        }

        summary.passed = summary.failed_sources == 0;
        Ok(RunReport {
            outcomes,
            summary,
            duration: start.elapsed(),
        })
    }
}

/// Helper for tests and reporting: a report wrapping one prebuilt result
impl RunReport {
    pub fn from_results(results: Vec<(String, RuleResult)>) -> Self {
        let mut summary = RunSummary::default();
        let outcomes: Vec<RuleOutcome> = results
            .into_iter()
            .map(|(id, result)| {
                if result.passed {
                    summary.passed_sources += 1;
                } else {
                    summary.failed_sources += 1;
                }
                summary.total_rules += 1;
                summary.error_count +=
                    result.violations.iter().filter(|v| v.is_error()).count();
                summary.warning_count +=
                    result.violations.iter().filter(|v| v.is_warning()).count();
                RuleOutcome {
                    id,
                    description: None,
                    rule_count: 1,
                    result,
                }
            })
            .collect();
        summary.passed = summary.failed_sources == 0;
        Self {
            outcomes,
            summary,
            duration: Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{EvaluationContext, FileInfo, FileStatus};
    use crate::factory::RuleFactory;
    use crate::rule::{Severity, Violation};
    use serde_json::json;

    fn source(factory: &mut RuleFactory, node: serde_json::Value) -> RuleSource {
        let root = factory.create(&node).unwrap();
        RuleSource {
            id: root.id().to_string(),
            description: None,
            root,
        }
    }

    fn ctx() -> EvaluationContext {
        EvaluationContext::with_files(vec![
            FileInfo::new("a.ts", FileStatus::Modified).with_content("console.log(1)"),
            FileInfo::new("b.ts", FileStatus::Modified).with_content("const x=1"),
        ])
    }

    #[test]
    fn test_run_aggregates_counts() {
        let mut factory = RuleFactory::new();
        let failing = source(
            &mut factory,
            json!({
                "type": "for_each",
                "id": "no-console",
                "select": {"type": "select_files", "path_pattern": "**/*.ts"},
                "assert": {"type": "assert_match", "pattern": "console\\.log", "should_match": false},
            }),
        );
        let passing = source(
            &mut factory,
            json!({
                "type": "for_each",
                "id": "no-debugger",
                "select": {"type": "select_files"},
                "assert": {"type": "assert_match", "pattern": "debugger", "should_match": false},
            }),
        );

        let report = Engine::new().run(&[failing, passing], &ctx()).unwrap();
        assert_eq!(report.summary.total_rules, 2);
        assert_eq!(report.summary.failed_sources, 1);
        assert_eq!(report.summary.passed_sources, 1);
        assert_eq!(report.summary.error_count, 1);
        assert_eq!(report.summary.files_checked, 2);
        assert!(!report.summary.passed);
        assert_eq!(report.exit_code(), 2);
    }

    #[test]
    fn test_clean_run_exit_code() {
        let mut factory = RuleFactory::new();
        let passing = source(
            &mut factory,
            json!({
                "type": "for_each",
                "select": {"type": "select_files"},
                "assert": {"type": "assert_match", "pattern": "debugger", "should_match": false},
            }),
        );
        let report = Engine::new().run(&[passing], &ctx()).unwrap();
        assert!(report.summary.passed);
        assert!(report.is_clean());
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn test_warning_only_exit_code() {
        let mut factory = RuleFactory::new();
        let warning = source(
            &mut factory,
            json!({
                "type": "for_each",
                "select": {"type": "select_files", "path_pattern": "a.ts"},
                "assert": {
                    "type": "assert_line_count",
                    "condition": "<=",
                    "expected": 0,
                    "severity": "warning",
                },
            }),
        );
        let report = Engine::new().run(&[warning], &ctx()).unwrap();
        assert_eq!(report.summary.warning_count, 1);
        assert_eq!(report.summary.error_count, 0);
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_bare_assertion_root_aborts_run() {
        let mut factory = RuleFactory::new();
        let bare = source(
            &mut factory,
            json!({"type": "assert_match", "pattern": "x"}),
        );
        let err = Engine::new().run(&[bare], &ctx()).unwrap_err();
        assert!(err.to_string().contains("assertions require a combinator"));
    }

    #[test]
    fn test_report_from_results() {
        let failing = RuleResult::fail(
            "bad",
            vec![
                Violation::new("w", Severity::Warning),
                Violation::error("e"),
            ],
        );
        let report = RunReport::from_results(vec![
            ("a".to_string(), RuleResult::pass()),
            ("b".to_string(), failing),
        ]);
        assert_eq!(report.summary.error_count, 1);
        assert_eq!(report.summary.warning_count, 1);
        assert_eq!(report.exit_code(), 2);
    }
}
