//! Combinator rules: boolean composition and per-item fan-out
//!
//! Children are evaluated strictly in configuration order and fan-out items
//! in selector order; the first failing/passing child decides short-circuit
//! outcomes, so output is reproducible across runs.

use crate::context::EvaluationContext;
use crate::repo::Repository;
use crate::rule::{Combinator, EvalError, RuleNode, RuleResult, Selector, Violation};
use serde_json::Value;

/// Evaluate a child node inside a combinator.
///
/// Assertion children are applied to the context's current item via
/// `assert_with_details`; an error raised by the assertion is converted
/// into a failing result carrying the error text, so sibling evaluation
/// is never aborted by a broken assertion.
fn evaluate_child(child: &RuleNode, ctx: &EvaluationContext) -> Result<RuleResult, EvalError> {
    match child {
        RuleNode::Assertion(assertion) => {
            match assertion.assert_with_details(ctx.current_item(), ctx) {
                Ok(result) => Ok(result.into_rule_result(assertion.severity())),
                Err(error) => {
                    let message = format!("Assertion '{}' raised: {}", assertion.id(), error);
                    Ok(RuleResult::fail(&message, vec![Violation::error(&message)]))
                }
            }
        }
        other => other.evaluate(ctx),
    }
}

/// Passes when every child passes; stops at the first failing child and
/// reports only that child's violations.
pub struct AllOf {
    id: String,
    children: Vec<RuleNode>,
}

impl AllOf {
    pub fn new(id: &str, children: Vec<RuleNode>) -> Self {
        Self {
            id: id.to_string(),
            children,
        }
    }
}

impl Combinator for AllOf {
    fn id(&self) -> &str {
        &self.id
    }

    fn evaluate(&self, ctx: &EvaluationContext) -> Result<RuleResult, EvalError> {
        let mut sub_results = Vec::new();
        for child in &self.children {
            let result = evaluate_child(child, ctx)?;
            sub_results.push(result.to_sub_result(child.id()));
            if !result.passed {
                let message = format!("Rule '{}' failed", child.id());
                return Ok(RuleResult {
                    passed: false,
                    message: Some(message),
                    violations: result.violations,
                    sub_results,
                    details: None,
                });
            }
        }
        Ok(RuleResult::pass().with_sub_results(sub_results))
    }

    fn count_rules(&self) -> usize {
        self.children.iter().map(RuleNode::count_rules).sum()
    }
}

/// Passes when at least one child passes; stops at the first passing
/// child. When none passes, reports the union of every child's violations.
pub struct AnyOf {
    id: String,
    children: Vec<RuleNode>,
}

impl AnyOf {
    pub fn new(id: &str, children: Vec<RuleNode>) -> Self {
        Self {
            id: id.to_string(),
            children,
        }
    }
}

impl Combinator for AnyOf {
    fn id(&self) -> &str {
        &self.id
    }

    fn evaluate(&self, ctx: &EvaluationContext) -> Result<RuleResult, EvalError> {
        let mut sub_results = Vec::new();
        let mut violations = Vec::new();
        for child in &self.children {
            let result = evaluate_child(child, ctx)?;
            sub_results.push(result.to_sub_result(child.id()));
            if result.passed {
                return Ok(RuleResult::pass().with_sub_results(sub_results));
            }
            violations.extend(result.violations);
        }
        let message = format!("No rule in '{}' passed", self.id);
        Ok(RuleResult {
            passed: false,
            message: Some(message),
            violations,
            sub_results,
            details: None,
        })
    }

    fn count_rules(&self) -> usize {
        self.children.iter().map(RuleNode::count_rules).sum()
    }
}

/// Passes when no child passes; stops at the first passing child and
/// reports a single synthetic violation naming it.
pub struct NoneOf {
    id: String,
    children: Vec<RuleNode>,
}

impl NoneOf {
    pub fn new(id: &str, children: Vec<RuleNode>) -> Self {
        Self {
            id: id.to_string(),
            children,
        }
    }
}

impl Combinator for NoneOf {
    fn id(&self) -> &str {
        &self.id
    }

    fn evaluate(&self, ctx: &EvaluationContext) -> Result<RuleResult, EvalError> {
        let mut sub_results = Vec::new();
        for child in &self.children {
            let result = evaluate_child(child, ctx)?;
            sub_results.push(result.to_sub_result(child.id()));
            if result.passed {
                let message = format!("Rule '{}' should have failed but passed", child.id());
                return Ok(RuleResult {
                    passed: false,
                    message: Some(message.clone()),
                    violations: vec![Violation::error(&message)],
                    sub_results,
                    details: None,
                });
            }
        }
        Ok(RuleResult::pass().with_sub_results(sub_results))
    }

    fn count_rules(&self) -> usize {
        self.children.iter().map(RuleNode::count_rules).sum()
    }
}

/// Applies one wrapped rule to every item a selector produces.
///
/// Never short-circuits across items; failures accumulate with each
/// item's file/line annotated onto its violations. Counted as exactly
/// one logical rule regardless of the wrapped rule's complexity.
pub struct ForEach {
    id: String,
    selector: Box<dyn Selector>,
    rule: RuleNode,
}

impl ForEach {
    pub fn new(id: &str, selector: Box<dyn Selector>, rule: RuleNode) -> Self {
        Self {
            id: id.to_string(),
            selector,
            rule,
        }
    }

    /// Fetch content for file-like items that lack it and are not deleted
    fn hydrate(item: Value, ctx: &EvaluationContext) -> Value {
        let Some(obj) = item.as_object() else {
            return item;
        };
        let path = obj
            .get("file")
            .or_else(|| obj.get("path"))
            .and_then(Value::as_str);
        let Some(path) = path else {
            return item;
        };
        if obj.get("content").is_some_and(Value::is_string)
            || obj.get("status").and_then(Value::as_str) == Some("deleted")
        {
            return item;
        }
        match ctx.repo.get_file_content(path) {
            Ok(content) => {
                let mut hydrated = item.clone();
                hydrated["content"] = Value::String(content);
                hydrated
            }
            Err(e) => {
                // leave the item as-is; assertions report the absence
                log::debug!("could not hydrate {}: {}", path, e);
                item
            }
        }
    }

    fn item_location(item: &Value) -> (Option<String>, Option<usize>) {
        let file = item
            .get("file")
            .or_else(|| item.get("path"))
            .and_then(Value::as_str)
            .map(String::from);
        let line = item
            .get("line")
            .or_else(|| item.get("line_number"))
            .and_then(Value::as_u64)
            .map(|n| n as usize);
        (file, line)
    }

    /// Fill in file/line from the item wherever the wrapped rule did not
    /// supply them
    fn annotate(mut violations: Vec<Violation>, item: &Value) -> Vec<Violation> {
        let (file, line) = Self::item_location(item);
        for violation in &mut violations {
            if violation.file.is_none() {
                violation.file = file.clone();
            }
            if violation.line.is_none() {
                violation.line = line;
            }
        }
        violations
    }
}

impl Combinator for ForEach {
    fn id(&self) -> &str {
        &self.id
    }

    fn evaluate(&self, ctx: &EvaluationContext) -> Result<RuleResult, EvalError> {
        let items = self.selector.select(ctx)?;
        let total = items.len();

        let mut violations = Vec::new();
        let mut failed_items = 0;
        for item in items {
            let item = Self::hydrate(item, ctx);
            let item_ctx = ctx.with_item(item.clone());

            let outcome = match &self.rule {
                RuleNode::Assertion(assertion) => assertion
                    .assert_with_details(&item, &item_ctx)
                    .map(|r| r.into_rule_result(assertion.severity())),
                node => node.evaluate(&item_ctx),
            };

            match outcome {
                Ok(result) if result.passed => {}
                Ok(result) => {
                    failed_items += 1;
                    let item_violations = if result.violations.is_empty() {
                        let message = result
                            .message
                            .unwrap_or_else(|| format!("Rule '{}' failed", self.rule.id()));
                        vec![Violation::error(&message)]
                    } else {
                        result.violations
                    };
                    violations.extend(Self::annotate(item_violations, &item));
                }
                Err(error) => {
                    // an error on one item must not abort the loop
                    failed_items += 1;
                    let message =
                        format!("Rule '{}' raised: {}", self.rule.id(), error);
                    violations.extend(Self::annotate(
                        vec![Violation::error(&message)],
                        &item,
                    ));
                }
            }
        }

        if failed_items == 0 {
            Ok(RuleResult::pass())
        } else {
            let message = format!("{} of {} selected items failed", failed_items, total);
            Ok(RuleResult::fail(&message, violations))
        }
    }

    /// A fan-out is one logical check regardless of internal nesting
    fn count_rules(&self) -> usize {
        1
    }
}
