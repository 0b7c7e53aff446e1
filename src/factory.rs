//! Rule factory: maps declarative configuration nodes to rule instances
//!
//! The registry is a string-keyed builder table; combinator builders call
//! back into the factory to construct nested trees. Ids omitted from the
//! configuration are assigned from a factory-owned counter so fixtures stay
//! deterministic.

use crate::assertions::{
    AssertCommandOutput, AssertCommandOutputSpec, AssertCount, AssertLineCount, AssertMatch,
    AssertProperty, CommandTarget, Comparison, PropertyCondition,
};
use crate::combinators::{AllOf, AnyOf, ForEach, NoneOf};
use crate::context::FileStatus;
use crate::rule::{RuleNode, Severity};
use crate::selectors::{
    SelectAstNodes, SelectCommandOutput, SelectFileChanges, SelectFiles, SelectLines,
};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Error building a rule tree from configuration
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Unknown rule type: {0}")]
    UnknownType(String),

    #[error("rule node is missing a 'type' field")]
    MissingType,

    #[error("rule '{rule}': {message}")]
    Invalid { rule: String, message: String },

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("malformed rule document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    fn invalid(rule: &str, message: impl ToString) -> Self {
        Self::Invalid {
            rule: rule.to_string(),
            message: message.to_string(),
        }
    }
}

/// One loaded rule document: a root rule plus reporting metadata
pub struct RuleSource {
    pub id: String,
    pub description: Option<String>,
    pub root: RuleNode,
}

/// Builder callback registered per rule type
pub type BuilderFn = fn(&mut RuleFactory, &Value) -> Result<RuleNode, BuildError>;

/// String-keyed registry constructing immutable rule trees
pub struct RuleFactory {
    builders: HashMap<String, BuilderFn>,
    next_id: u64,
}

impl Default for RuleFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleFactory {
    /// Factory with every built-in rule type registered
    pub fn new() -> Self {
        let mut factory = Self::empty();
        factory.register("select_files", build_select_files);
        factory.register("select_lines", build_select_lines);
        factory.register("select_ast_nodes", build_select_ast_nodes);
        factory.register("select_file_changes", build_select_file_changes);
        factory.register("select_command_output", build_select_command_output);
        factory.register("assert_match", build_assert_match);
        factory.register("assert_count", build_assert_count);
        factory.register("assert_property", build_assert_property);
        factory.register("assert_command_output", build_assert_command_output);
        factory.register("assert_line_count", build_assert_line_count);
        factory.register("all_of", build_all_of);
        factory.register("any_of", build_any_of);
        factory.register("none_of", build_none_of);
        factory.register("for_each", build_for_each);
        factory
    }

    /// Factory with no registered types
    pub fn empty() -> Self {
        Self {
            builders: HashMap::new(),
            next_id: 0,
        }
    }

    /// Register a builder for a rule type
    pub fn register(&mut self, type_name: &str, builder: BuilderFn) {
        self.builders.insert(type_name.to_string(), builder);
    }

    /// Build a rule from a configuration node, recursively for nested trees
    pub fn create(&mut self, node: &Value) -> Result<RuleNode, BuildError> {
        let type_name = node
            .get("type")
            .and_then(Value::as_str)
            .ok_or(BuildError::MissingType)?;
        let builder = self
            .builders
            .get(type_name)
            .copied()
            .ok_or_else(|| BuildError::UnknownType(type_name.to_string()))?;
        builder(self, node)
    }

    /// Load a rule document from YAML text.
    ///
    /// Accepts both the legacy shape (the node under a `rule` key with
    /// sibling `id`/`description`) and the direct shape (the document is
    /// the node).
    pub fn load_yaml(&mut self, text: &str) -> Result<RuleSource, BuildError> {
        let doc: serde_yaml::Value = serde_yaml::from_str(text)?;
        let doc: Value = serde_json::to_value(doc)?;

        let (mut node, id, description) = match doc.get("rule") {
            Some(node) => (
                node.clone(),
                doc.get("id").and_then(Value::as_str).map(String::from),
                doc.get("description")
                    .and_then(Value::as_str)
                    .map(String::from),
            ),
            None => (doc.clone(), None, None),
        };

        // a document-level id names the root rule unless the node has its own
        if let (Some(id), Some(obj)) = (&id, node.as_object_mut()) {
            obj.entry("id").or_insert_with(|| Value::String(id.clone()));
        }

        let root = self.create(&node)?;
        Ok(RuleSource {
            id: id.unwrap_or_else(|| root.id().to_string()),
            description,
            root,
        })
    }

    /// Load a rule document from a file
    pub fn load_file(&mut self, path: &Path) -> Result<RuleSource, BuildError> {
        let text = std::fs::read_to_string(path)?;
        self.load_yaml(&text).map_err(|e| match e {
            BuildError::Invalid { rule, message } => BuildError::Invalid {
                rule,
                message: format!("{} ({})", message, path.display()),
            },
            other => other,
        })
    }

    /// Load every `.yaml`/`.yml` rule document in a directory, sorted by
    /// file name for deterministic evaluation order
    pub fn load_dir(&mut self, dir: &Path) -> Result<Vec<RuleSource>, BuildError> {
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                matches!(
                    path.extension().and_then(|e| e.to_str()),
                    Some("yaml") | Some("yml")
                )
            })
            .collect();
        paths.sort();

        let mut sources = Vec::new();
        for path in paths {
            sources.push(self.load_file(&path)?);
        }
        Ok(sources)
    }

    /// Node id, or the next deterministic fallback
    fn node_id(&mut self, type_name: &str, node: &Value) -> String {
        if let Some(id) = node.get("id").and_then(Value::as_str) {
            return id.to_string();
        }
        self.next_id += 1;
        format!("{}-{}", type_name, self.next_id)
    }
}

fn params<T: serde::de::DeserializeOwned>(type_name: &str, node: &Value) -> Result<T, BuildError> {
    serde_json::from_value(node.clone()).map_err(|e| BuildError::invalid(type_name, e))
}

fn compile_regex(type_name: &str, pattern: &str) -> Result<Regex, BuildError> {
    Regex::new(pattern)
        .map_err(|e| BuildError::invalid(type_name, format!("invalid pattern: {}", e)))
}

fn parse_severity(type_name: &str, severity: Option<&str>) -> Result<Severity, BuildError> {
    match severity {
        Some(s) => s.parse().map_err(|e: String| BuildError::invalid(type_name, e)),
        None => Ok(Severity::Error),
    }
}

fn parse_comparison(type_name: &str, op: &str) -> Result<Comparison, BuildError> {
    op.parse()
        .map_err(|e: String| BuildError::invalid(type_name, e))
}

// ---- selector builders ----

fn build_select_files(factory: &mut RuleFactory, node: &Value) -> Result<RuleNode, BuildError> {
    #[derive(Deserialize)]
    struct Params {
        path_pattern: Option<String>,
        #[serde(default)]
        status: Vec<FileStatus>,
        exclude_pattern: Option<String>,
        #[serde(default)]
        select_all: bool,
    }

    let id = factory.node_id("select_files", node);
    let p: Params = params("select_files", node)?;
    let selector = SelectFiles::new(
        &id,
        p.path_pattern.as_deref(),
        p.status,
        p.exclude_pattern.as_deref(),
        p.select_all,
    )
    .map_err(|e| BuildError::invalid("select_files", e))?;
    Ok(RuleNode::Selector(Box::new(selector)))
}

fn build_select_lines(factory: &mut RuleFactory, node: &Value) -> Result<RuleNode, BuildError> {
    #[derive(Deserialize)]
    struct Params {
        pattern: String,
        #[serde(default)]
        context_lines: usize,
    }

    let id = factory.node_id("select_lines", node);
    let p: Params = params("select_lines", node)?;
    let pattern = compile_regex("select_lines", &p.pattern)?;
    Ok(RuleNode::Selector(Box::new(SelectLines::new(
        &id,
        pattern,
        p.context_lines,
    ))))
}

fn build_select_ast_nodes(factory: &mut RuleFactory, node: &Value) -> Result<RuleNode, BuildError> {
    #[derive(Deserialize)]
    struct Params {
        language: String,
        pattern: String,
    }

    let id = factory.node_id("select_ast_nodes", node);
    let p: Params = params("select_ast_nodes", node)?;
    if p.language.trim().is_empty() {
        return Err(BuildError::invalid(
            "select_ast_nodes",
            "language must not be empty",
        ));
    }
    Ok(RuleNode::Selector(Box::new(SelectAstNodes::new(
        &id,
        &p.language,
        &p.pattern,
    ))))
}

fn build_select_file_changes(
    factory: &mut RuleFactory,
    node: &Value,
) -> Result<RuleNode, BuildError> {
    #[derive(Deserialize)]
    struct Params {
        min_percent: Option<f64>,
        max_percent: Option<f64>,
    }

    let id = factory.node_id("select_file_changes", node);
    let p: Params = params("select_file_changes", node)?;
    if let (Some(min), Some(max)) = (p.min_percent, p.max_percent) {
        if min > max {
            return Err(BuildError::invalid(
                "select_file_changes",
                format!("min_percent {} exceeds max_percent {}", min, max),
            ));
        }
    }
    Ok(RuleNode::Selector(Box::new(SelectFileChanges::new(
        &id,
        p.min_percent,
        p.max_percent,
    ))))
}

fn build_select_command_output(
    factory: &mut RuleFactory,
    node: &Value,
) -> Result<RuleNode, BuildError> {
    #[derive(Deserialize)]
    struct Params {
        command: String,
    }

    let id = factory.node_id("select_command_output", node);
    let p: Params = params("select_command_output", node)?;
    Ok(RuleNode::Selector(Box::new(SelectCommandOutput::new(
        &id, &p.command,
    ))))
}

// ---- assertion builders ----

fn build_assert_match(factory: &mut RuleFactory, node: &Value) -> Result<RuleNode, BuildError> {
    #[derive(Deserialize)]
    struct Params {
        pattern: String,
        #[serde(default = "default_true")]
        should_match: bool,
        severity: Option<String>,
    }

    let id = factory.node_id("assert_match", node);
    let p: Params = params("assert_match", node)?;
    let pattern = compile_regex("assert_match", &p.pattern)?;
    let severity = parse_severity("assert_match", p.severity.as_deref())?;
    Ok(RuleNode::Assertion(Box::new(AssertMatch::new(
        &id,
        pattern,
        p.should_match,
        severity,
    ))))
}

fn build_assert_count(factory: &mut RuleFactory, node: &Value) -> Result<RuleNode, BuildError> {
    #[derive(Deserialize)]
    struct Params {
        condition: String,
        expected: usize,
        severity: Option<String>,
    }

    let id = factory.node_id("assert_count", node);
    let p: Params = params("assert_count", node)?;
    let condition = parse_comparison("assert_count", &p.condition)?;
    let severity = parse_severity("assert_count", p.severity.as_deref())?;
    Ok(RuleNode::Assertion(Box::new(AssertCount::new(
        &id, condition, p.expected, severity,
    ))))
}

fn build_assert_property(factory: &mut RuleFactory, node: &Value) -> Result<RuleNode, BuildError> {
    #[derive(Deserialize)]
    struct Params {
        property: String,
        expected: Value,
        #[serde(default = "default_eq")]
        condition: String,
        extract_pattern: Option<String>,
        severity: Option<String>,
    }

    let id = factory.node_id("assert_property", node);
    let p: Params = params("assert_property", node)?;
    let condition: PropertyCondition = p
        .condition
        .parse()
        .map_err(|e: String| BuildError::invalid("assert_property", e))?;
    let extract_pattern = p
        .extract_pattern
        .as_deref()
        .map(|pattern| compile_regex("assert_property", pattern))
        .transpose()?;
    let severity = parse_severity("assert_property", p.severity.as_deref())?;
    Ok(RuleNode::Assertion(Box::new(AssertProperty::new(
        &id,
        &p.property,
        p.expected,
        condition,
        extract_pattern,
        severity,
    ))))
}

fn build_assert_command_output(
    factory: &mut RuleFactory,
    node: &Value,
) -> Result<RuleNode, BuildError> {
    #[derive(Deserialize)]
    struct Params {
        target: String,
        condition: Option<String>,
        value: Option<f64>,
        pattern: Option<String>,
        #[serde(default = "default_true")]
        should_match: bool,
        first_lines: Option<usize>,
        last_lines: Option<usize>,
        severity: Option<String>,
    }

    let id = factory.node_id("assert_command_output", node);
    let p: Params = params("assert_command_output", node)?;
    let target: CommandTarget = p
        .target
        .parse()
        .map_err(|e: String| BuildError::invalid("assert_command_output", e))?;

    if p.first_lines.is_some() && p.last_lines.is_some() {
        return Err(BuildError::invalid(
            "assert_command_output",
            "first_lines and last_lines are mutually exclusive",
        ));
    }

    let condition = p
        .condition
        .as_deref()
        .map(|op| parse_comparison("assert_command_output", op))
        .transpose()?;
    let pattern = p
        .pattern
        .as_deref()
        .map(|pattern| compile_regex("assert_command_output", pattern))
        .transpose()?;

    match target {
        CommandTarget::ExitCode => {
            if condition.is_none() || p.value.is_none() {
                return Err(BuildError::invalid(
                    "assert_command_output",
                    "exit_code target requires condition and value",
                ));
            }
        }
        CommandTarget::Stdout | CommandTarget::Stderr => {
            if pattern.is_none() {
                return Err(BuildError::invalid(
                    "assert_command_output",
                    "stdout/stderr targets require a pattern",
                ));
            }
        }
    }

    let severity = parse_severity("assert_command_output", p.severity.as_deref())?;
    Ok(RuleNode::Assertion(Box::new(AssertCommandOutput::new(
        &id,
        AssertCommandOutputSpec {
            target,
            condition,
            value: p.value,
            pattern,
            should_match: p.should_match,
            first_lines: p.first_lines,
            last_lines: p.last_lines,
            severity,
        },
    ))))
}

fn build_assert_line_count(
    factory: &mut RuleFactory,
    node: &Value,
) -> Result<RuleNode, BuildError> {
    #[derive(Deserialize)]
    struct Params {
        condition: String,
        expected: usize,
        severity: Option<String>,
    }

    let id = factory.node_id("assert_line_count", node);
    let p: Params = params("assert_line_count", node)?;
    let condition = parse_comparison("assert_line_count", &p.condition)?;
    let severity = parse_severity("assert_line_count", p.severity.as_deref())?;
    Ok(RuleNode::Assertion(Box::new(AssertLineCount::new(
        &id, condition, p.expected, severity,
    ))))
}

// ---- combinator builders ----

fn child_nodes(
    factory: &mut RuleFactory,
    type_name: &str,
    node: &Value,
) -> Result<Vec<RuleNode>, BuildError> {
    let rules = node
        .get("rules")
        .and_then(Value::as_array)
        .ok_or_else(|| BuildError::invalid(type_name, "requires a 'rules' list"))?;
    rules.iter().map(|child| factory.create(child)).collect()
}

fn build_all_of(factory: &mut RuleFactory, node: &Value) -> Result<RuleNode, BuildError> {
    let id = factory.node_id("all_of", node);
    let children = child_nodes(factory, "all_of", node)?;
    Ok(RuleNode::Combinator(Box::new(AllOf::new(&id, children))))
}

fn build_any_of(factory: &mut RuleFactory, node: &Value) -> Result<RuleNode, BuildError> {
    let id = factory.node_id("any_of", node);
    let children = child_nodes(factory, "any_of", node)?;
    Ok(RuleNode::Combinator(Box::new(AnyOf::new(&id, children))))
}

fn build_none_of(factory: &mut RuleFactory, node: &Value) -> Result<RuleNode, BuildError> {
    let id = factory.node_id("none_of", node);
    let children = child_nodes(factory, "none_of", node)?;
    Ok(RuleNode::Combinator(Box::new(NoneOf::new(&id, children))))
}

fn build_for_each(factory: &mut RuleFactory, node: &Value) -> Result<RuleNode, BuildError> {
    let id = factory.node_id("for_each", node);

    let select_node = node
        .get("select")
        .ok_or_else(|| BuildError::invalid("for_each", "requires a 'select' rule"))?;
    let assert_node = node
        .get("assert")
        .ok_or_else(|| BuildError::invalid("for_each", "requires an 'assert' rule"))?;

    let selector = match factory.create(select_node)? {
        RuleNode::Selector(selector) => selector,
        other => {
            return Err(BuildError::invalid(
                "for_each",
                format!("'select' must be a selector, got a {}", other.kind()),
            ))
        }
    };

    let rule = factory.create(assert_node)?;
    if matches!(rule, RuleNode::Selector(_)) {
        return Err(BuildError::invalid(
            "for_each",
            "'assert' must be an assertion or combinator, got a selector",
        ));
    }

    Ok(RuleNode::Combinator(Box::new(ForEach::new(
        &id, selector, rule,
    ))))
}

fn default_true() -> bool {
    true
}

fn default_eq() -> String {
    "==".to_string()
}
