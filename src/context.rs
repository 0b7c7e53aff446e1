//! Evaluation context: the capability bundle threaded through a rule tree

use crate::repo::Repository;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Which file set a run evaluates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Files changed between base and head
    #[default]
    Diff,
    /// Every file in the working tree
    All,
    /// Files staged in the index
    Staged,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Diff => write!(f, "diff"),
            Mode::All => write!(f, "all"),
            Mode::Staged => write!(f, "staged"),
        }
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "diff" => Ok(Mode::Diff),
            "all" => Ok(Mode::All),
            "staged" => Ok(Mode::Staged),
            _ => Err(format!("Unknown mode: {}", s)),
        }
    }
}

/// Change status of a file in a diff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    #[default]
    Modified,
    Deleted,
    Renamed,
    /// Placeholder used when the full tree is listed without a diff
    Unknown,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Added => write!(f, "added"),
            FileStatus::Modified => write!(f, "modified"),
            FileStatus::Deleted => write!(f, "deleted"),
            FileStatus::Renamed => write!(f, "renamed"),
            FileStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// One file in a diff snapshot.
///
/// Content is absent for deleted files and is fetched lazily when a
/// combinator needs it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: String,

    pub status: FileStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Previous path for renamed files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_path: Option<String>,

    #[serde(default)]
    pub insertions: usize,

    #[serde(default)]
    pub deletions: usize,
}

impl FileInfo {
    /// Create a file record with no content
    pub fn new(path: &str, status: FileStatus) -> Self {
        Self {
            path: path.to_string(),
            status,
            content: None,
            old_path: None,
            insertions: 0,
            deletions: 0,
        }
    }

    /// Attach inline content
    pub fn with_content(mut self, content: &str) -> Self {
        self.content = Some(content.to_string());
        self
    }

    /// Attach change counts
    pub fn with_changes(mut self, insertions: usize, deletions: usize) -> Self {
        self.insertions = insertions;
        self.deletions = deletions;
        self
    }

    pub fn is_deleted(&self) -> bool {
        self.status == FileStatus::Deleted
    }

    /// Convert into a selector item
    pub fn to_item(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// The set of files changed between two refs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiffSnapshot {
    pub base: String,

    /// Head ref; `None` means the working tree
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<String>,

    pub files: Vec<FileInfo>,
}

impl DiffSnapshot {
    pub fn new(base: &str, head: Option<&str>, files: Vec<FileInfo>) -> Self {
        Self {
            base: base.to_string(),
            head: head.map(String::from),
            files,
        }
    }
}

/// Key-value memo table scoped to one evaluation run
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: Mutex<HashMap<String, Value>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get the cached value for `key`, computing and storing it on first use
    pub fn get_with(&self, key: &str, factory: impl FnOnce() -> Value) -> Value {
        if let Some(value) = self.entries().get(key) {
            return value.clone();
        }
        let value = factory();
        self.entries().insert(key.to_string(), value.clone());
        value
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries().get(key).cloned()
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries().contains_key(key)
    }

    pub fn set(&self, key: &str, value: Value) {
        self.entries().insert(key.to_string(), value);
    }

    pub fn clear(&self) {
        self.entries().clear();
    }
}

static NULL_ITEM: Value = Value::Null;

/// Capabilities and current scope for one rule tree evaluation.
///
/// Constructed once per run and shared read-mostly; per-item variation in a
/// fan-out is carried by `with_item`, which forks a new context value rather
/// than mutating the shared one.
#[derive(Clone)]
pub struct EvaluationContext {
    pub repo: Arc<dyn Repository>,
    pub diff: Arc<DiffSnapshot>,
    pub cache: Arc<ResultCache>,
    pub mode: Mode,
    current_item: Option<Arc<Value>>,
    /// Degrade gracefully when an external tool is missing
    pub tolerate_missing_tools: bool,
}

impl EvaluationContext {
    pub fn new(repo: Arc<dyn Repository>, diff: DiffSnapshot, mode: Mode) -> Self {
        Self {
            repo,
            diff: Arc::new(diff),
            cache: Arc::new(ResultCache::new()),
            mode,
            current_item: None,
            tolerate_missing_tools: false,
        }
    }

    /// Tolerate missing external tools for this run
    pub fn with_tolerance(mut self, tolerate: bool) -> Self {
        self.tolerate_missing_tools = tolerate;
        self
    }

    /// Fork a context scoped to one fan-out item
    pub fn with_item(&self, item: Value) -> Self {
        let mut forked = self.clone();
        forked.current_item = Some(Arc::new(item));
        forked
    }

    /// The item a nested assertion or selector currently operates on
    pub fn current_item(&self) -> &Value {
        match &self.current_item {
            Some(item) => item,
            None => &NULL_ITEM,
        }
    }

    pub fn has_item(&self) -> bool {
        self.current_item.is_some()
    }
}

#[cfg(test)]
impl EvaluationContext {
    /// Context over an empty in-memory repository
    pub(crate) fn for_tests() -> Self {
        Self::with_files(vec![])
    }

    /// Context over an in-memory repository holding `files`
    pub(crate) fn with_files(files: Vec<FileInfo>) -> Self {
        let repo = Arc::new(crate::repo::StaticRepository::new(files.clone()));
        let diff = DiffSnapshot::new("base", Some("head"), files);
        Self::new(repo, diff, Mode::Diff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mode_from_str() {
        assert_eq!("diff".parse::<Mode>(), Ok(Mode::Diff));
        assert_eq!("STAGED".parse::<Mode>(), Ok(Mode::Staged));
        assert!("other".parse::<Mode>().is_err());
    }

    #[test]
    fn test_file_info_to_item() {
        let file = FileInfo::new("src/a.ts", FileStatus::Modified)
            .with_content("let x = 1;")
            .with_changes(3, 1);
        let item = file.to_item();

        assert_eq!(item["path"], "src/a.ts");
        assert_eq!(item["status"], "modified");
        assert_eq!(item["content"], "let x = 1;");
        assert_eq!(item["insertions"], 3);
    }

    #[test]
    fn test_deleted_file_has_no_content_field() {
        let file = FileInfo::new("gone.rs", FileStatus::Deleted);
        let item = file.to_item();
        assert_eq!(item["status"], "deleted");
        assert!(item.get("content").is_none());
    }

    #[test]
    fn test_cache_computes_once() {
        let cache = ResultCache::new();
        let mut calls = 0;
        let first = cache.get_with("key", || {
            calls += 1;
            json!(42)
        });
        let second = cache.get_with("key", || {
            calls += 1;
            json!(99)
        });

        assert_eq!(first, json!(42));
        assert_eq!(second, json!(42));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_cache_surface() {
        let cache = ResultCache::new();
        assert!(!cache.has("k"));
        cache.set("k", json!("v"));
        assert!(cache.has("k"));
        assert_eq!(cache.get("k"), Some(json!("v")));
        cache.clear();
        assert!(!cache.has("k"));
    }

    #[test]
    fn test_with_item_forks_context() {
        let ctx = EvaluationContext::for_tests();
        assert!(!ctx.has_item());
        assert_eq!(ctx.current_item(), &Value::Null);

        let forked = ctx.with_item(json!({"path": "a.ts"}));
        assert!(forked.has_item());
        assert_eq!(forked.current_item()["path"], "a.ts");

        // the original context is untouched
        assert!(!ctx.has_item());
    }
}
