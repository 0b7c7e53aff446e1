//! GitHub Actions output formatter
//!
//! Outputs violations in GitHub Actions workflow command format:
//! ::error file={name},line={line}::{message}

use super::OutputFormatter;
use crate::engine::RunReport;
use crate::rule::{Severity, Violation};

/// Formatter for GitHub Actions annotations
pub struct GithubFormatter {
    /// Whether to include summary
    pub show_summary: bool,
}

impl GithubFormatter {
    /// Create a new GitHub formatter
    pub fn new() -> Self {
        Self { show_summary: true }
    }

    /// Disable summary output
    pub fn without_summary(mut self) -> Self {
        self.show_summary = false;
        self
    }
}

impl Default for GithubFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputFormatter for GithubFormatter {
    fn format(&self, report: &RunReport) -> String {
        let mut output = String::new();

        for outcome in &report.outcomes {
            for violation in &outcome.result.violations {
                output.push_str(&self.format_violation(&outcome.id, violation));
                output.push('\n');
            }
        }

        if self.show_summary && !report.summary.passed {
            output.push_str(&format!(
                "::notice::Gate finished: {} error(s), {} warning(s) across {} rule(s)\n",
                report.summary.error_count,
                report.summary.warning_count,
                report.summary.total_rules
            ));

            output.push_str("::group::Gate Summary\n");
            output.push_str(&format!("Rules evaluated: {}\n", report.summary.total_rules));
            output.push_str(&format!("Files checked: {}\n", report.summary.files_checked));
            output.push_str(&format!("Errors: {}\n", report.summary.error_count));
            output.push_str(&format!("Warnings: {}\n", report.summary.warning_count));
            output.push_str("::endgroup::\n");
        }

        output
    }

    fn format_violation(&self, rule_id: &str, violation: &Violation) -> String {
        let level = match violation.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };

        // Escape special characters in message
        let message = violation
            .message
            .replace('%', "%25")
            .replace('\r', "%0D")
            .replace('\n', "%0A");

        let mut properties = Vec::new();
        if let Some(file) = &violation.file {
            properties.push(format!("file={}", file));
        }
        if let Some(line) = violation.line {
            properties.push(format!("line={}", line));
        }
        if let Some(column) = violation.column {
            // GitHub requires col >= 1
            properties.push(format!("col={}", column.max(1)));
        }
        properties.push(format!("title={}", rule_id));

        format!("::{} {}::{}", level, properties.join(","), message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RunReport;
    use crate::rule::RuleResult;

    fn violation(severity: Severity, file: &str, line: usize, msg: &str) -> Violation {
        Violation::new(msg, severity).with_file(file).with_line(line)
    }

    #[test]
    fn test_format_error() {
        let formatter = GithubFormatter::new();
        let output = formatter.format_violation(
            "no-console",
            &violation(Severity::Error, "src/a.ts", 10, "console.log found"),
        );

        assert!(output.starts_with("::error"));
        assert!(output.contains("file=src/a.ts"));
        assert!(output.contains("line=10"));
        assert!(output.contains("title=no-console"));
        assert!(output.contains("console.log found"));
    }

    #[test]
    fn test_format_warning() {
        let formatter = GithubFormatter::new();
        let output = formatter.format_violation(
            "big-file",
            &violation(Severity::Warning, "src/a.ts", 1, "too long"),
        );
        assert!(output.starts_with("::warning"));
    }

    #[test]
    fn test_escape_newlines() {
        let formatter = GithubFormatter::new();
        let output =
            formatter.format_violation("r", &Violation::error("Line1\nLine2"));
        assert!(output.contains("%0A"));
        assert!(!output.contains('\n'));
    }

    #[test]
    fn test_violation_without_location() {
        let formatter = GithubFormatter::new();
        let output = formatter.format_violation("r", &Violation::error("msg"));
        assert!(output.starts_with("::error title=r::msg"));
    }

    #[test]
    fn test_format_report() {
        let formatter = GithubFormatter::new();
        let report = RunReport::from_results(vec![(
            "no-console".to_string(),
            RuleResult::fail(
                "failed",
                vec![
                    violation(Severity::Error, "a.ts", 1, "bad"),
                    violation(Severity::Warning, "b.ts", 2, "meh"),
                ],
            ),
        )]);

        let output = formatter.format(&report);
        assert!(output.contains("::error"));
        assert!(output.contains("::warning"));
        assert!(output.contains("::group::"));
        assert!(output.contains("::endgroup::"));
    }

    #[test]
    fn test_clean_report_is_silent() {
        let formatter = GithubFormatter::new();
        let report = RunReport::from_results(vec![(
            "ok".to_string(),
            RuleResult::pass(),
        )]);
        assert!(formatter.format(&report).is_empty());
    }
}
