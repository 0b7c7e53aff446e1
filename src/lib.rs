//! Turnstile - a change-set gate
//!
//! Validates proposed code changes against declaratively-configured rules,
//! for use as a CI gate or pre-commit hook.
//!
//! # Architecture
//!
//! ```text
//! CLI/API -> Engine -> RuleSource (factory-built tree) -> Repository
//! ```
//!
//! A YAML rule document is built once into an immutable tree of selectors,
//! assertions and combinators by the [`factory::RuleFactory`]; an
//! [`context::EvaluationContext`] (repository capability, diff snapshot,
//! cache, run flags) is constructed once per invocation; the tree's
//! `evaluate` recurses deterministically and yields a [`rule::RuleResult`]
//! consumed by the output formatters.
//!
//! # Rule documents
//!
//! ```yaml
//! id: no-console
//! description: "Reject console.log in TypeScript changes"
//! rule:
//!   type: for_each
//!   select:
//!     type: select_files
//!     path_pattern: "**/*.ts"
//!   assert:
//!     type: assert_match
//!     pattern: "console\\.log"
//!     should_match: false
//! ```

pub mod assertions;
pub mod combinators;
pub mod config;
pub mod context;
pub mod engine;
pub mod factory;
pub mod output;
pub mod repo;
pub mod rule;
pub mod selectors;

// Re-export main types
pub use assertions::{
    AssertCommandOutput, AssertCount, AssertLineCount, AssertMatch, AssertProperty, CommandTarget,
    Comparison, PropertyCondition,
};
pub use combinators::{AllOf, AnyOf, ForEach, NoneOf};
pub use config::{ColorMode, Config, ConfigError, OutputFormat};
pub use context::{DiffSnapshot, EvaluationContext, FileInfo, FileStatus, Mode, ResultCache};
pub use engine::{Engine, RuleOutcome, RunReport, RunSummary};
pub use factory::{BuildError, BuilderFn, RuleFactory, RuleSource};
pub use output::{GithubFormatter, JsonFormatter, OutputFormatter, TextFormatter};
pub use repo::{GitRepository, RepoError, Repository, StaticRepository};
pub use rule::{
    Assertion, AssertionResult, Combinator, EvalError, RuleKind, RuleNode, RuleResult, Selector,
    Severity, SubResult, Violation, ViolationContext,
};
pub use selectors::{
    SelectAstNodes, SelectCommandOutput, SelectFileChanges, SelectFiles, SelectLines,
};
