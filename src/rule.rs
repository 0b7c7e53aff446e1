//! Rule model: the shared contract behind selectors, assertions and combinators

use crate::context::EvaluationContext;
use crate::repo::RepoError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Severity level for violations
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Warning - reported but does not fail the gate by itself
    Warning,
    /// Error - definite problem
    #[default]
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "warning" | "warn" => Ok(Severity::Warning),
            "error" | "err" => Ok(Severity::Error),
            _ => Err(format!("Unknown severity: {}", s)),
        }
    }
}

/// Remediation hints attached to a violation or assertion result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViolationContext {
    /// Offending source excerpt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Suggested fix
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,

    /// Documentation URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
}

impl ViolationContext {
    /// Context carrying only a suggestion
    pub fn suggestion(text: &str) -> Self {
        Self {
            suggestion: Some(text.to_string()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_none() && self.suggestion.is_none() && self.documentation.is_none()
    }
}

/// A structured report of one failed check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    /// File the violation was found in (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Line number (1-based)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,

    /// Column number (1-based)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,

    /// Human-readable message
    pub message: String,

    /// Severity level
    pub severity: Severity,

    /// Remediation hints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ViolationContext>,
}

impl Violation {
    /// Create a violation with the given severity
    pub fn new(message: &str, severity: Severity) -> Self {
        Self {
            file: None,
            line: None,
            column: None,
            message: message.to_string(),
            severity,
            context: None,
        }
    }

    /// Create an error-severity violation
    pub fn error(message: &str) -> Self {
        Self::new(message, Severity::Error)
    }

    /// Attach a file location
    pub fn with_file(mut self, file: &str) -> Self {
        self.file = Some(file.to_string());
        self
    }

    /// Attach a line number
    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    /// Attach remediation context
    pub fn with_context(mut self, context: ViolationContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

/// Outcome of one child rule inside a combinator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubResult {
    pub rule_id: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub violations: Vec<Violation>,
}

/// Result of evaluating one rule
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleResult {
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub violations: Vec<Violation>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub sub_results: Vec<SubResult>,

    /// Selector output payload (e.g. selected items)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl RuleResult {
    /// A passing result with no payload
    pub fn pass() -> Self {
        Self {
            passed: true,
            ..Self::default()
        }
    }

    /// A failing result carrying violations
    pub fn fail(message: &str, violations: Vec<Violation>) -> Self {
        Self {
            passed: false,
            message: Some(message.to_string()),
            violations,
            ..Self::default()
        }
    }

    /// Attach a details payload
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Attach per-child results
    pub fn with_sub_results(mut self, sub_results: Vec<SubResult>) -> Self {
        self.sub_results = sub_results;
        self
    }

    /// Record this result as a child outcome
    pub fn to_sub_result(&self, rule_id: &str) -> SubResult {
        SubResult {
            rule_id: rule_id.to_string(),
            passed: self.passed,
            violations: self.violations.clone(),
        }
    }
}

/// Rich result of a single assertion against one item
#[derive(Debug, Clone, Default)]
pub struct AssertionResult {
    pub passed: bool,
    pub message: Option<String>,
    pub context: Option<ViolationContext>,
}

impl AssertionResult {
    pub fn pass() -> Self {
        Self {
            passed: true,
            ..Self::default()
        }
    }

    pub fn fail(message: &str) -> Self {
        Self {
            passed: false,
            message: Some(message.to_string()),
            context: None,
        }
    }

    pub fn from_bool(passed: bool) -> Self {
        Self {
            passed,
            ..Self::default()
        }
    }

    /// Attach remediation context
    pub fn with_context(mut self, context: ViolationContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Lower into a `RuleResult`, synthesizing a violation on failure
    pub fn into_rule_result(self, severity: Severity) -> RuleResult {
        if self.passed {
            return RuleResult::pass();
        }
        let message = self.message.unwrap_or_else(|| "Assertion failed".to_string());
        let mut violation = Violation::new(&message, severity);
        violation.context = self.context.filter(|c| !c.is_empty());
        RuleResult::fail(&message, vec![violation])
    }
}

/// Error raised while evaluating a rule tree
#[derive(Debug, Error)]
pub enum EvalError {
    /// Contract violation: a bare assertion has no item to test
    #[error("assertions require a combinator (rule '{0}' cannot be evaluated alone)")]
    BareAssertion(String),

    #[error("external tool error: {0}")]
    ExternalTool(String),

    #[error("repository error: {0}")]
    Repo(#[from] RepoError),

    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Rule kind tag, used for dispatch instead of runtime type inspection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Selector,
    Assertion,
    Combinator,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKind::Selector => write!(f, "selector"),
            RuleKind::Assertion => write!(f, "assertion"),
            RuleKind::Combinator => write!(f, "combinator"),
        }
    }
}

/// A rule that produces a sequence of candidate items from context state.
///
/// `select` is restartable: invoking it again re-queries the source.
pub trait Selector: Send + Sync {
    fn id(&self) -> &str;

    fn select(&self, ctx: &EvaluationContext) -> Result<Vec<Value>, EvalError>;
}

/// A rule that tests one item against a predicate.
///
/// Assertions are only meaningful when invoked by a combinator against a
/// concrete item; they cannot be evaluated as top-level rules.
pub trait Assertion: Send + Sync {
    fn id(&self) -> &str;

    /// Severity assigned to violations synthesized from this assertion
    fn severity(&self) -> Severity {
        Severity::Error
    }

    fn assert(&self, item: &Value, ctx: &EvaluationContext) -> Result<bool, EvalError>;

    /// Like `assert`, but with diagnostic message and remediation context
    fn assert_with_details(
        &self,
        item: &Value,
        ctx: &EvaluationContext,
    ) -> Result<AssertionResult, EvalError> {
        Ok(AssertionResult::from_bool(self.assert(item, ctx)?))
    }
}

/// A rule that composes other rules via boolean logic or per-item fan-out
pub trait Combinator: Send + Sync {
    fn id(&self) -> &str;

    fn evaluate(&self, ctx: &EvaluationContext) -> Result<RuleResult, EvalError>;

    /// Number of logical rules this combinator represents in reports
    fn count_rules(&self) -> usize;
}

/// A node in an immutable rule tree.
///
/// The enum tag makes dispatch explicit: combinators match on the variant to
/// decide between `assert_with_details` and `evaluate` for their children.
pub enum RuleNode {
    Selector(Box<dyn Selector>),
    Assertion(Box<dyn Assertion>),
    Combinator(Box<dyn Combinator>),
}

impl RuleNode {
    pub fn id(&self) -> &str {
        match self {
            RuleNode::Selector(s) => s.id(),
            RuleNode::Assertion(a) => a.id(),
            RuleNode::Combinator(c) => c.id(),
        }
    }

    pub fn kind(&self) -> RuleKind {
        match self {
            RuleNode::Selector(_) => RuleKind::Selector,
            RuleNode::Assertion(_) => RuleKind::Assertion,
            RuleNode::Combinator(_) => RuleKind::Combinator,
        }
    }

    /// Number of logical rules under this node, for reporting
    pub fn count_rules(&self) -> usize {
        match self {
            RuleNode::Selector(_) | RuleNode::Assertion(_) => 1,
            RuleNode::Combinator(c) => c.count_rules(),
        }
    }

    /// Evaluate this node against the context.
    ///
    /// A selector always passes and reports its items under `details`; a
    /// bare assertion is a contract violation and fails loudly.
    pub fn evaluate(&self, ctx: &EvaluationContext) -> Result<RuleResult, EvalError> {
        match self {
            RuleNode::Selector(s) => {
                let items = s.select(ctx)?;
                Ok(RuleResult::pass().with_details(serde_json::json!({ "items": items })))
            }
            RuleNode::Assertion(a) => Err(EvalError::BareAssertion(a.id().to_string())),
            RuleNode::Combinator(c) => c.evaluate(ctx),
        }
    }
}

impl fmt::Debug for RuleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleNode")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .finish()
    }
}
