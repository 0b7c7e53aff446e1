//! Assertion rules: test one item against a predicate with diagnostics

use crate::context::EvaluationContext;
use crate::rule::{Assertion, AssertionResult, EvalError, Severity, ViolationContext};
use regex::Regex;
use serde_json::Value;
use std::fmt;

/// Comparison operator for counts and numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl Comparison {
    pub fn check(&self, actual: f64, expected: f64) -> bool {
        match self {
            Comparison::Eq => actual == expected,
            Comparison::Ne => actual != expected,
            Comparison::Gt => actual > expected,
            Comparison::Lt => actual < expected,
            Comparison::Ge => actual >= expected,
            Comparison::Le => actual <= expected,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Comparison::Eq => write!(f, "=="),
            Comparison::Ne => write!(f, "!="),
            Comparison::Gt => write!(f, ">"),
            Comparison::Lt => write!(f, "<"),
            Comparison::Ge => write!(f, ">="),
            Comparison::Le => write!(f, "<="),
        }
    }
}

impl std::str::FromStr for Comparison {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "==" | "=" | "eq" => Ok(Comparison::Eq),
            "!=" | "ne" => Ok(Comparison::Ne),
            ">" | "gt" => Ok(Comparison::Gt),
            "<" | "lt" => Ok(Comparison::Lt),
            ">=" | "gte" => Ok(Comparison::Ge),
            "<=" | "lte" => Ok(Comparison::Le),
            _ => Err(format!("Unknown comparison operator: {}", s)),
        }
    }
}

/// Condition operator for property assertions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyCondition {
    Compare(Comparison),
    Includes,
    Matches,
}

impl fmt::Display for PropertyCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyCondition::Compare(op) => write!(f, "{}", op),
            PropertyCondition::Includes => write!(f, "includes"),
            PropertyCondition::Matches => write!(f, "matches"),
        }
    }
}

impl std::str::FromStr for PropertyCondition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "includes" => Ok(PropertyCondition::Includes),
            "matches" => Ok(PropertyCondition::Matches),
            other => other
                .parse::<Comparison>()
                .map(PropertyCondition::Compare)
                .map_err(|_| format!("Unknown condition: {}", other)),
        }
    }
}

/// Extract the text a pattern assertion operates on: a bare string, or
/// the `content`, `text` or `path` field of an object.
fn extract_text(item: &Value) -> Option<String> {
    match item {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => obj
            .get("content")
            .or_else(|| obj.get("text"))
            .or_else(|| obj.get("path"))
            .and_then(Value::as_str)
            .map(String::from),
        _ => None,
    }
}

/// True for a file record with `status = deleted` and no inline content;
/// pattern matching is undefined for such items.
fn is_deleted_without_content(item: &Value) -> bool {
    let Some(obj) = item.as_object() else {
        return false;
    };
    obj.get("status").and_then(Value::as_str) == Some("deleted")
        && !obj.get("content").is_some_and(Value::is_string)
}

/// Render a value for diagnostics
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Numeric coercion for comparisons: numbers, booleans, numeric strings
fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Loose equality: strict equality, or equality after numeric coercion
fn loose_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (coerce_number(a), coerce_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Resolve a dotted property path; missing segments resolve to null.
/// Numeric segments index into arrays.
fn resolve_path<'a>(item: &'a Value, path: &str) -> &'a Value {
    let mut current = item;
    for segment in path.split('.') {
        current = match current {
            Value::Object(obj) => obj.get(segment).unwrap_or(&Value::Null),
            Value::Array(arr) => segment
                .parse::<usize>()
                .ok()
                .and_then(|idx| arr.get(idx))
                .unwrap_or(&Value::Null),
            _ => &Value::Null,
        };
    }
    current
}

/// Tests a regular expression against the item's extracted text.
///
/// Deleted files have no content to match: with `should_match` the
/// assertion always fails with a dedicated diagnostic, without it the
/// absence vacuously passes.
pub struct AssertMatch {
    id: String,
    pattern: Regex,
    should_match: bool,
    severity: Severity,
}

impl AssertMatch {
    pub fn new(id: &str, pattern: Regex, should_match: bool, severity: Severity) -> Self {
        Self {
            id: id.to_string(),
            pattern,
            should_match,
            severity,
        }
    }

    fn details(&self, item: &Value) -> AssertionResult {
        if is_deleted_without_content(item) {
            if self.should_match {
                return AssertionResult::fail("Cannot match pattern against deleted file")
                    .with_context(ViolationContext::suggestion(
                        "use assert_property to check deleted file metadata instead",
                    ));
            }
            // absent content cannot match anything
            return AssertionResult::pass();
        }

        let Some(text) = extract_text(item) else {
            return AssertionResult::fail("Item has no text content to match");
        };

        let matched = self.pattern.is_match(&text);
        if matched == self.should_match {
            return AssertionResult::pass();
        }
        let message = if self.should_match {
            format!("Expected content to match pattern: {}", self.pattern)
        } else {
            format!("Expected content NOT to match pattern: {}", self.pattern)
        };
        AssertionResult::fail(&message)
    }
}

impl Assertion for AssertMatch {
    fn id(&self) -> &str {
        &self.id
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn assert(&self, item: &Value, _ctx: &EvaluationContext) -> Result<bool, EvalError> {
        Ok(self.details(item).passed)
    }

    fn assert_with_details(
        &self,
        item: &Value,
        _ctx: &EvaluationContext,
    ) -> Result<AssertionResult, EvalError> {
        Ok(self.details(item))
    }
}

/// Compares the length of an array item against a threshold;
/// non-arrays count as zero elements.
pub struct AssertCount {
    id: String,
    condition: Comparison,
    expected: usize,
    severity: Severity,
}

impl AssertCount {
    pub fn new(id: &str, condition: Comparison, expected: usize, severity: Severity) -> Self {
        Self {
            id: id.to_string(),
            condition,
            expected,
            severity,
        }
    }

    fn details(&self, item: &Value) -> AssertionResult {
        let actual = item.as_array().map(Vec::len).unwrap_or(0);
        if self.condition.check(actual as f64, self.expected as f64) {
            AssertionResult::pass()
        } else {
            AssertionResult::fail(&format!(
                "Expected count {} {}, found {}",
                self.condition, self.expected, actual
            ))
        }
    }
}

impl Assertion for AssertCount {
    fn id(&self) -> &str {
        &self.id
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn assert(&self, item: &Value, _ctx: &EvaluationContext) -> Result<bool, EvalError> {
        Ok(self.details(item).passed)
    }

    fn assert_with_details(
        &self,
        item: &Value,
        _ctx: &EvaluationContext,
    ) -> Result<AssertionResult, EvalError> {
        Ok(self.details(item))
    }
}

/// Resolves a dotted property path on the item and compares the value.
///
/// An optional capture-group regex extracts a fragment first (thousands
/// separators are stripped from the capture).
pub struct AssertProperty {
    id: String,
    property: String,
    expected: Value,
    condition: PropertyCondition,
    extract_pattern: Option<Regex>,
    severity: Severity,
}

impl AssertProperty {
    pub fn new(
        id: &str,
        property: &str,
        expected: Value,
        condition: PropertyCondition,
        extract_pattern: Option<Regex>,
        severity: Severity,
    ) -> Self {
        Self {
            id: id.to_string(),
            property: property.to_string(),
            expected,
            condition,
            extract_pattern,
            severity,
        }
    }

    fn extract(&self, actual: &Value) -> Value {
        let Some(pattern) = &self.extract_pattern else {
            return actual.clone();
        };
        let text = display_value(actual);
        match pattern.captures(&text).and_then(|c| c.get(1)) {
            Some(capture) => Value::String(capture.as_str().replace(',', "")),
            None => Value::Null,
        }
    }

    fn details(&self, item: &Value) -> Result<AssertionResult, EvalError> {
        let actual = self.extract(resolve_path(item, &self.property));

        let passed = match self.condition {
            PropertyCondition::Compare(Comparison::Eq) => loose_eq(&actual, &self.expected),
            PropertyCondition::Compare(Comparison::Ne) => !loose_eq(&actual, &self.expected),
            PropertyCondition::Compare(op) => {
                match (coerce_number(&actual), coerce_number(&self.expected)) {
                    (Some(a), Some(e)) => op.check(a, e),
                    _ => {
                        return Ok(AssertionResult::fail(&format!(
                            "Property '{}' is not numeric: found {}",
                            self.property,
                            display_value(&actual)
                        )))
                    }
                }
            }
            PropertyCondition::Includes => match &actual {
                Value::String(s) => s.contains(&display_value(&self.expected)),
                Value::Array(items) => items.iter().any(|v| loose_eq(v, &self.expected)),
                _ => false,
            },
            PropertyCondition::Matches => {
                // the pattern comes from data, so it is compiled here and a
                // bad one surfaces as an assertion runtime error
                let pattern = display_value(&self.expected);
                let regex = Regex::new(&pattern).map_err(|e| EvalError::InvalidPattern {
                    pattern,
                    message: e.to_string(),
                })?;
                regex.is_match(&display_value(&actual))
            }
        };

        if passed {
            Ok(AssertionResult::pass())
        } else {
            Ok(AssertionResult::fail(&format!(
                "Expected property '{}' {} {}, found {}",
                self.property,
                self.condition,
                display_value(&self.expected),
                display_value(&actual)
            )))
        }
    }
}

impl Assertion for AssertProperty {
    fn id(&self) -> &str {
        &self.id
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn assert(&self, item: &Value, _ctx: &EvaluationContext) -> Result<bool, EvalError> {
        Ok(self.details(item)?.passed)
    }

    fn assert_with_details(
        &self,
        item: &Value,
        _ctx: &EvaluationContext,
    ) -> Result<AssertionResult, EvalError> {
        self.details(item)
    }
}

/// Which part of a command-output record an assertion inspects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandTarget {
    ExitCode,
    Stdout,
    Stderr,
}

impl fmt::Display for CommandTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandTarget::ExitCode => write!(f, "exit_code"),
            CommandTarget::Stdout => write!(f, "stdout"),
            CommandTarget::Stderr => write!(f, "stderr"),
        }
    }
}

impl std::str::FromStr for CommandTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exit_code" | "exitcode" => Ok(CommandTarget::ExitCode),
            "stdout" => Ok(CommandTarget::Stdout),
            "stderr" => Ok(CommandTarget::Stderr),
            _ => Err(format!("Unknown command output target: {}", s)),
        }
    }
}

/// Asserts against a command-output record: numeric comparison on the
/// exit code, or a pattern test on stdout/stderr optionally restricted
/// to the first or last N lines.
///
/// Parameter validation (condition and value present for exit codes,
/// first/last mutually exclusive) happens at construction in the factory.
pub struct AssertCommandOutput {
    id: String,
    target: CommandTarget,
    condition: Option<Comparison>,
    value: Option<f64>,
    pattern: Option<Regex>,
    should_match: bool,
    first_lines: Option<usize>,
    last_lines: Option<usize>,
    severity: Severity,
}

pub struct AssertCommandOutputSpec {
    pub target: CommandTarget,
    pub condition: Option<Comparison>,
    pub value: Option<f64>,
    pub pattern: Option<Regex>,
    pub should_match: bool,
    pub first_lines: Option<usize>,
    pub last_lines: Option<usize>,
    pub severity: Severity,
}

impl AssertCommandOutput {
    pub fn new(id: &str, spec: AssertCommandOutputSpec) -> Self {
        Self {
            id: id.to_string(),
            target: spec.target,
            condition: spec.condition,
            value: spec.value,
            pattern: spec.pattern,
            should_match: spec.should_match,
            first_lines: spec.first_lines,
            last_lines: spec.last_lines,
            severity: spec.severity,
        }
    }

    fn restrict(&self, stream: &str) -> String {
        let lines: Vec<&str> = stream.lines().collect();
        let selected: Vec<&str> = if let Some(n) = self.first_lines {
            lines.iter().take(n).copied().collect()
        } else if let Some(n) = self.last_lines {
            let skip = lines.len().saturating_sub(n);
            lines.iter().skip(skip).copied().collect()
        } else {
            lines
        };
        selected.join("\n")
    }

    fn details(&self, item: &Value) -> AssertionResult {
        match self.target {
            CommandTarget::ExitCode => {
                let actual = item
                    .get("exit_code")
                    .and_then(Value::as_f64)
                    .unwrap_or(f64::NAN);
                // validated at construction
                let (Some(condition), Some(expected)) = (self.condition, self.value) else {
                    return AssertionResult::fail(
                        "assert_command_output on exit_code requires condition and value",
                    );
                };
                if condition.check(actual, expected) {
                    AssertionResult::pass()
                } else {
                    AssertionResult::fail(&format!(
                        "Expected exit code {} {}, found {}",
                        condition, expected, actual
                    ))
                }
            }
            CommandTarget::Stdout | CommandTarget::Stderr => {
                let field = self.target.to_string();
                let stream = item.get(&field).and_then(Value::as_str).unwrap_or("");
                let Some(pattern) = &self.pattern else {
                    return AssertionResult::fail(&format!(
                        "assert_command_output on {} requires a pattern",
                        field
                    ));
                };
                let matched = pattern.is_match(&self.restrict(stream));
                if matched == self.should_match {
                    AssertionResult::pass()
                } else if self.should_match {
                    AssertionResult::fail(&format!(
                        "Expected {} to match pattern: {}",
                        field, pattern
                    ))
                } else {
                    AssertionResult::fail(&format!(
                        "Expected {} NOT to match pattern: {}",
                        field, pattern
                    ))
                }
            }
        }
    }
}

impl Assertion for AssertCommandOutput {
    fn id(&self) -> &str {
        &self.id
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn assert(&self, item: &Value, _ctx: &EvaluationContext) -> Result<bool, EvalError> {
        Ok(self.details(item).passed)
    }

    fn assert_with_details(
        &self,
        item: &Value,
        _ctx: &EvaluationContext,
    ) -> Result<AssertionResult, EvalError> {
        Ok(self.details(item))
    }
}

/// Counts lines of the item's text (trailing blanks stripped, internal
/// blanks retained) and compares against a threshold.
pub struct AssertLineCount {
    id: String,
    condition: Comparison,
    expected: usize,
    severity: Severity,
}

impl AssertLineCount {
    pub fn new(id: &str, condition: Comparison, expected: usize, severity: Severity) -> Self {
        Self {
            id: id.to_string(),
            condition,
            expected,
            severity,
        }
    }

    fn count_lines(text: &str) -> usize {
        let mut lines: Vec<&str> = text.lines().collect();
        while lines.last().is_some_and(|line| line.trim().is_empty()) {
            lines.pop();
        }
        lines.len()
    }

    fn details(&self, item: &Value) -> AssertionResult {
        let Some(text) = extract_text(item) else {
            return AssertionResult::fail("Item has no text content to count");
        };
        let actual = Self::count_lines(&text);
        if self.condition.check(actual as f64, self.expected as f64) {
            return AssertionResult::pass();
        }
        let mut result = AssertionResult::fail(&format!(
            "Expected line count {} {}, found {}",
            self.condition, self.expected, actual
        ));
        if actual > self.expected {
            result = result.with_context(ViolationContext::suggestion(
                "split into smaller modules",
            ));
        }
        result
    }
}

impl Assertion for AssertLineCount {
    fn id(&self) -> &str {
        &self.id
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn assert(&self, item: &Value, _ctx: &EvaluationContext) -> Result<bool, EvalError> {
        Ok(self.details(item).passed)
    }

    fn assert_with_details(
        &self,
        item: &Value,
        _ctx: &EvaluationContext,
    ) -> Result<AssertionResult, EvalError> {
        Ok(self.details(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> EvaluationContext {
        EvaluationContext::for_tests()
    }

    fn match_rule(pattern: &str, should_match: bool) -> AssertMatch {
        AssertMatch::new(
            "match",
            Regex::new(pattern).unwrap(),
            should_match,
            Severity::Error,
        )
    }

    #[test]
    fn test_match_against_string_item() {
        let rule = match_rule("console\\.log", true);
        assert!(rule.assert(&json!("console.log(1)"), &ctx()).unwrap());
        assert!(!rule.assert(&json!("const x = 1"), &ctx()).unwrap());
    }

    #[test]
    fn test_match_against_object_fields() {
        let rule = match_rule("TODO", true);
        assert!(rule.assert(&json!({"content": "// TODO"}), &ctx()).unwrap());
        assert!(rule.assert(&json!({"text": "TODO later"}), &ctx()).unwrap());
        // path is the fallback when no content or text is present
        assert!(rule.assert(&json!({"path": "TODO.md"}), &ctx()).unwrap());
    }

    #[test]
    fn test_match_flip() {
        let rule = match_rule("console\\.log", false);
        let result = rule
            .assert_with_details(&json!("console.log(1)"), &ctx())
            .unwrap();
        assert!(!result.passed);
        assert!(result.message.unwrap().contains("NOT to match pattern"));
    }

    #[test]
    fn test_match_deleted_file_policy() {
        let deleted = json!({"path": "gone.ts", "status": "deleted"});

        let positive = match_rule("anything", true);
        let result = positive.assert_with_details(&deleted, &ctx()).unwrap();
        assert!(!result.passed);
        assert_eq!(
            result.message.as_deref(),
            Some("Cannot match pattern against deleted file")
        );
        assert!(result
            .context
            .unwrap()
            .suggestion
            .unwrap()
            .contains("assert_property"));

        let negative = match_rule("anything", false);
        assert!(negative.assert(&deleted, &ctx()).unwrap());
    }

    #[test]
    fn test_match_deleted_file_with_content_matches_normally() {
        let item = json!({"status": "deleted", "content": "legacy code"});
        let rule = match_rule("legacy", true);
        assert!(rule.assert(&item, &ctx()).unwrap());
    }

    #[test]
    fn test_count_arrays_and_non_arrays() {
        let rule = AssertCount::new("count", Comparison::Le, 2, Severity::Error);
        assert!(rule.assert(&json!([1, 2]), &ctx()).unwrap());
        assert!(!rule.assert(&json!([1, 2, 3]), &ctx()).unwrap());
        // non-arrays count as zero
        assert!(rule.assert(&json!("not an array"), &ctx()).unwrap());
    }

    #[test]
    fn test_property_loose_equality() {
        let rule = AssertProperty::new(
            "prop",
            "value",
            json!(5),
            PropertyCondition::Compare(Comparison::Eq),
            None,
            Severity::Error,
        );
        assert!(rule.assert(&json!({"value": "5"}), &ctx()).unwrap());
        assert!(rule.assert(&json!({"value": 5}), &ctx()).unwrap());
        assert!(!rule.assert(&json!({"value": "6"}), &ctx()).unwrap());
    }

    #[test]
    fn test_property_missing_path_resolves_to_null() {
        let rule = AssertProperty::new(
            "prop",
            "a.b.c",
            json!(null),
            PropertyCondition::Compare(Comparison::Eq),
            None,
            Severity::Error,
        );
        assert!(rule.assert(&json!({"a": {}}), &ctx()).unwrap());
    }

    #[test]
    fn test_property_dotted_path_and_array_index() {
        let item = json!({"files": [{"path": "a.ts"}, {"path": "b.ts"}]});
        let rule = AssertProperty::new(
            "prop",
            "files.1.path",
            json!("b.ts"),
            PropertyCondition::Compare(Comparison::Eq),
            None,
            Severity::Error,
        );
        assert!(rule.assert(&item, &ctx()).unwrap());
    }

    #[test]
    fn test_property_numeric_comparison() {
        let rule = AssertProperty::new(
            "prop",
            "insertions",
            json!(10),
            PropertyCondition::Compare(Comparison::Gt),
            None,
            Severity::Error,
        );
        assert!(rule.assert(&json!({"insertions": 25}), &ctx()).unwrap());
        assert!(rule.assert(&json!({"insertions": "25"}), &ctx()).unwrap());

        let result = rule
            .assert_with_details(&json!({"insertions": "lots"}), &ctx())
            .unwrap();
        assert!(!result.passed);
        assert!(result.message.unwrap().contains("not numeric"));
    }

    #[test]
    fn test_property_extract_pattern_strips_separators() {
        let rule = AssertProperty::new(
            "prop",
            "summary",
            json!(1500),
            PropertyCondition::Compare(Comparison::Ge),
            Some(Regex::new(r"(\d[\d,]*) lines").unwrap()),
            Severity::Error,
        );
        assert!(rule
            .assert(&json!({"summary": "total 1,520 lines changed"}), &ctx())
            .unwrap());
    }

    #[test]
    fn test_property_includes() {
        let rule = AssertProperty::new(
            "prop",
            "tags",
            json!("urgent"),
            PropertyCondition::Includes,
            None,
            Severity::Error,
        );
        assert!(rule
            .assert(&json!({"tags": ["low", "urgent"]}), &ctx())
            .unwrap());
        assert!(!rule.assert(&json!({"tags": ["low"]}), &ctx()).unwrap());

        let substring = AssertProperty::new(
            "prop",
            "path",
            json!("src/"),
            PropertyCondition::Includes,
            None,
            Severity::Error,
        );
        assert!(substring
            .assert(&json!({"path": "src/lib.rs"}), &ctx())
            .unwrap());
    }

    #[test]
    fn test_property_matches_builds_regex_from_expected() {
        let rule = AssertProperty::new(
            "prop",
            "path",
            json!("^src/.*\\.rs$"),
            PropertyCondition::Matches,
            None,
            Severity::Error,
        );
        assert!(rule.assert(&json!({"path": "src/lib.rs"}), &ctx()).unwrap());
        assert!(!rule.assert(&json!({"path": "lib.rs"}), &ctx()).unwrap());
    }

    #[test]
    fn test_property_matches_invalid_regex_is_runtime_error() {
        let rule = AssertProperty::new(
            "prop",
            "path",
            json!("["),
            PropertyCondition::Matches,
            None,
            Severity::Error,
        );
        assert!(rule.assert(&json!({"path": "a"}), &ctx()).is_err());
    }

    #[test]
    fn test_command_output_exit_code() {
        let rule = AssertCommandOutput::new(
            "cmd",
            AssertCommandOutputSpec {
                target: CommandTarget::ExitCode,
                condition: Some(Comparison::Eq),
                value: Some(0.0),
                pattern: None,
                should_match: true,
                first_lines: None,
                last_lines: None,
                severity: Severity::Error,
            },
        );
        assert!(rule.assert(&json!({"exit_code": 0}), &ctx()).unwrap());
        assert!(!rule.assert(&json!({"exit_code": 2}), &ctx()).unwrap());
    }

    #[test]
    fn test_command_output_stream_restriction() {
        let item = json!({"stdout": "first\nmiddle\nlast"});
        let first = AssertCommandOutput::new(
            "cmd",
            AssertCommandOutputSpec {
                target: CommandTarget::Stdout,
                condition: None,
                value: None,
                pattern: Some(Regex::new("last").unwrap()),
                should_match: true,
                first_lines: Some(2),
                last_lines: None,
                severity: Severity::Error,
            },
        );
        assert!(!first.assert(&item, &ctx()).unwrap());

        let last = AssertCommandOutput::new(
            "cmd",
            AssertCommandOutputSpec {
                target: CommandTarget::Stderr,
                condition: None,
                value: None,
                pattern: Some(Regex::new("boom").unwrap()),
                should_match: true,
                first_lines: None,
                last_lines: Some(1),
                severity: Severity::Error,
            },
        );
        assert!(last
            .assert(&json!({"stderr": "noise\nboom"}), &ctx())
            .unwrap());
    }

    #[test]
    fn test_line_count_strips_trailing_blanks() {
        assert_eq!(AssertLineCount::count_lines("a\n\nb\n\n\n"), 3);
        assert_eq!(AssertLineCount::count_lines(""), 0);
        assert_eq!(AssertLineCount::count_lines("one"), 1);
    }

    #[test]
    fn test_line_count_suggestion_on_excess() {
        let rule = AssertLineCount::new("lines", Comparison::Le, 2, Severity::Warning);
        let result = rule
            .assert_with_details(&json!({"content": "a\nb\nc\nd"}), &ctx())
            .unwrap();
        assert!(!result.passed);
        assert_eq!(
            result.context.unwrap().suggestion.as_deref(),
            Some("split into smaller modules")
        );
    }

    #[test]
    fn test_line_count_no_suggestion_when_under() {
        let rule = AssertLineCount::new("lines", Comparison::Ge, 10, Severity::Error);
        let result = rule
            .assert_with_details(&json!({"content": "a\nb"}), &ctx())
            .unwrap();
        assert!(!result.passed);
        assert!(result.context.is_none());
    }
}
