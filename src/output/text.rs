//! Human-readable text output formatter

use super::OutputFormatter;
use crate::engine::RunReport;
use crate::rule::{Severity, Violation};
use colored::*;

/// Text formatter with optional color support
pub struct TextFormatter {
    /// Enable colored output
    pub colored: bool,

    /// Show remediation hints
    pub show_hints: bool,

    /// Show statistics
    pub show_stats: bool,
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self {
            colored: true,
            show_hints: true,
            show_stats: true,
        }
    }
}

impl TextFormatter {
    /// Create a new text formatter
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable colors
    pub fn without_color(mut self) -> Self {
        self.colored = false;
        self
    }

    fn severity_str(&self, severity: Severity) -> ColoredString {
        let s = format!("{}", severity);
        if !self.colored {
            return s.normal();
        }
        match severity {
            Severity::Error => s.red().bold(),
            Severity::Warning => s.yellow().bold(),
        }
    }

    fn location(violation: &Violation) -> String {
        match (&violation.file, violation.line) {
            (Some(file), Some(line)) => format!("{}:{}", file, line),
            (Some(file), None) => file.clone(),
            _ => "(no file)".to_string(),
        }
    }
}

impl OutputFormatter for TextFormatter {
    fn format(&self, report: &RunReport) -> String {
        let mut output = String::new();

        for outcome in &report.outcomes {
            if outcome.result.passed {
                continue;
            }

            let header = if self.colored {
                outcome.id.underline().to_string()
            } else {
                outcome.id.clone()
            };
            output.push_str(&format!("{}\n", header));

            if let Some(description) = &outcome.description {
                output.push_str(&format!("  {}\n", description));
            }

            for violation in &outcome.result.violations {
                output.push_str(&self.format_violation(&outcome.id, violation));
                output.push('\n');
            }
            output.push('\n');
        }

        if self.show_stats {
            let summary = &report.summary;
            output.push_str(&format!(
                "{} {} evaluated, {} {} checked",
                summary.total_rules,
                if summary.total_rules == 1 {
                    "rule"
                } else {
                    "rules"
                },
                summary.files_checked,
                if summary.files_checked == 1 {
                    "file"
                } else {
                    "files"
                }
            ));

            let mut counts = Vec::new();
            if summary.error_count > 0 {
                let s = format!(
                    "{} {}",
                    summary.error_count,
                    if summary.error_count == 1 {
                        "error"
                    } else {
                        "errors"
                    }
                );
                counts.push(if self.colored { s.red().to_string() } else { s });
            }
            if summary.warning_count > 0 {
                let s = format!(
                    "{} {}",
                    summary.warning_count,
                    if summary.warning_count == 1 {
                        "warning"
                    } else {
                        "warnings"
                    }
                );
                counts.push(if self.colored {
                    s.yellow().to_string()
                } else {
                    s
                });
            }

            if counts.is_empty() {
                let ok = "clean".to_string();
                output.push_str(&format!(
                    ": {}",
                    if self.colored { ok.green().to_string() } else { ok }
                ));
            } else {
                output.push_str(&format!(": {}", counts.join(", ")));
            }
            output.push('\n');

            output.push_str(&format!(
                "Finished in {:.2}s\n",
                report.duration.as_secs_f64()
            ));
        }

        output
    }

    fn format_violation(&self, rule_id: &str, violation: &Violation) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "  {}: {}[{}]: {}\n",
            Self::location(violation),
            self.severity_str(violation.severity),
            if self.colored {
                rule_id.cyan().to_string()
            } else {
                rule_id.to_string()
            },
            violation.message
        ));

        if self.show_hints {
            if let Some(context) = &violation.context {
                if let Some(code) = &context.code {
                    output.push_str(&format!("     | {}\n", code));
                }
                if let Some(suggestion) = &context.suggestion {
                    output.push_str(&format!(
                        "     {} help: {}\n",
                        if self.colored {
                            "=".blue().to_string()
                        } else {
                            "=".to_string()
                        },
                        suggestion
                    ));
                }
                if let Some(docs) = &context.documentation {
                    output.push_str(&format!(
                        "     {} docs: {}\n",
                        if self.colored {
                            "=".blue().to_string()
                        } else {
                            "=".to_string()
                        },
                        docs
                    ));
                }
            }
        }

        // drop the trailing newline so callers control spacing
        if output.ends_with('\n') {
            output.pop();
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RunReport;
    use crate::rule::{RuleResult, ViolationContext};

    fn sample_report() -> RunReport {
        let result = RuleResult::fail(
            "failed",
            vec![Violation::error("no console.log allowed")
                .with_file("src/a.ts")
                .with_line(3)
                .with_context(ViolationContext::suggestion("remove the call"))],
        );
        RunReport::from_results(vec![
            ("no-console".to_string(), result),
            ("passing".to_string(), RuleResult::pass()),
        ])
    }

    #[test]
    fn test_format_violation() {
        let formatter = TextFormatter::new().without_color();
        let violation = Violation::error("bad").with_file("a.ts").with_line(7);
        let output = formatter.format_violation("rule-1", &violation);

        assert!(output.contains("a.ts:7"));
        assert!(output.contains("error"));
        assert!(output.contains("rule-1"));
        assert!(output.contains("bad"));
    }

    #[test]
    fn test_format_report_skips_passing_sources() {
        let formatter = TextFormatter::new().without_color();
        let output = formatter.format(&sample_report());

        assert!(output.contains("no-console"));
        assert!(!output.contains("passing\n"));
        assert!(output.contains("help: remove the call"));
        assert!(output.contains("1 error"));
        assert!(output.contains("2 rules evaluated"));
    }

    #[test]
    fn test_clean_summary() {
        let formatter = TextFormatter::new().without_color();
        let report = RunReport::from_results(vec![("ok".to_string(), RuleResult::pass())]);
        let output = formatter.format(&report);
        assert!(output.contains("clean"));
    }
}
