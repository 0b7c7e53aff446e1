//! Output formatters for gate reports

mod github;
mod json;
mod text;

pub use github::GithubFormatter;
pub use json::JsonFormatter;
pub use text::TextFormatter;

use crate::engine::RunReport;
use crate::rule::Violation;

/// Output formatter trait
pub trait OutputFormatter: Send + Sync {
    /// Format the entire run report
    fn format(&self, report: &RunReport) -> String;

    /// Format a single violation
    fn format_violation(&self, rule_id: &str, violation: &Violation) -> String;
}
