//! JSON output formatter

use super::OutputFormatter;
use crate::engine::RunReport;
use crate::rule::Violation;
use serde::Serialize;

/// JSON formatter for machine-readable output
#[derive(Default)]
pub struct JsonFormatter {
    /// Pretty print with indentation
    pub pretty: bool,
}

impl JsonFormatter {
    /// Create a new JSON formatter
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable pretty printing
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    fn serialize<T: Serialize>(&self, value: &T) -> String {
        if self.pretty {
            serde_json::to_string_pretty(value).unwrap_or_default()
        } else {
            serde_json::to_string(value).unwrap_or_default()
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    report: &'a RunReport,
    duration_ms: u128,
}

#[derive(Serialize)]
struct JsonViolation<'a> {
    rule_id: &'a str,
    #[serde(flatten)]
    violation: &'a Violation,
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, report: &RunReport) -> String {
        self.serialize(&JsonReport {
            report,
            duration_ms: report.duration.as_millis(),
        })
    }

    fn format_violation(&self, rule_id: &str, violation: &Violation) -> String {
        self.serialize(&JsonViolation { rule_id, violation })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{RuleResult, Severity};

    fn sample_report() -> RunReport {
        RunReport::from_results(vec![(
            "no-console".to_string(),
            RuleResult::fail(
                "failed",
                vec![Violation::error("no console.log allowed")
                    .with_file("src/a.ts")
                    .with_line(3)],
            ),
        )])
    }

    #[test]
    fn test_json_format_violation() {
        let formatter = JsonFormatter::new();
        let violation = Violation::new("msg", Severity::Warning).with_file("a.ts");
        let output = formatter.format_violation("rule-1", &violation);

        assert!(output.contains("\"rule_id\":\"rule-1\""));
        assert!(output.contains("\"severity\":\"warning\""));
        assert!(output.contains("\"file\":\"a.ts\""));
        // absent fields are omitted, not null
        assert!(!output.contains("\"line\""));
    }

    #[test]
    fn test_json_format_report() {
        let formatter = JsonFormatter::new();
        let output = formatter.format(&sample_report());

        assert!(output.contains("\"outcomes\""));
        assert!(output.contains("\"summary\""));
        assert!(output.contains("\"error_count\":1"));
        assert!(output.contains("\"duration_ms\""));
        assert!(output.contains("\"no-console\""));
    }

    #[test]
    fn test_json_pretty() {
        let formatter = JsonFormatter::new().pretty();
        let output = formatter.format(&sample_report());
        assert!(output.contains('\n'));
    }

    #[test]
    fn test_json_parses_back() {
        let formatter = JsonFormatter::new();
        let output = formatter.format(&sample_report());
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["summary"]["passed"], false);
        assert_eq!(value["outcomes"][0]["violations"][0]["line"], 3);
    }
}
