//! Selector rules: produce candidate items from the evaluation context

use crate::context::{EvaluationContext, FileStatus};
use crate::repo::Repository;
use crate::rule::{EvalError, Selector};
use globset::{Glob, GlobMatcher};
use regex::Regex;
use serde_json::{json, Value};
use std::io::Write;
use std::process::{Command, Stdio};

/// Ceiling for captured process output
const MAX_CAPTURED_OUTPUT: usize = 10 * 1024 * 1024;

/// Cache key for the structural-search tool probe
const AST_TOOL_CACHE_KEY: &str = "ast-grep:available";

/// Extract the text a line or pattern rule operates on.
///
/// Accepts a bare string item or an object carrying `content` or `text`.
pub(crate) fn item_text(item: &Value) -> Option<String> {
    match item {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => obj
            .get("content")
            .or_else(|| obj.get("text"))
            .and_then(Value::as_str)
            .map(String::from),
        _ => None,
    }
}

/// Truncate captured process output to the ceiling
fn bounded(bytes: Vec<u8>) -> String {
    let mut text = String::from_utf8_lossy(&bytes).into_owned();
    if text.len() > MAX_CAPTURED_OUTPUT {
        let mut end = MAX_CAPTURED_OUTPUT;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }
    text
}

fn compile_glob(pattern: &str) -> Result<GlobMatcher, EvalError> {
    Glob::new(pattern)
        .map(|g| g.compile_matcher())
        .map_err(|e| EvalError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}

/// Selects files from the diff snapshot or the full working tree,
/// filtered by path glob, status set and exclude glob.
pub struct SelectFiles {
    id: String,
    path_pattern: Option<GlobMatcher>,
    statuses: Vec<FileStatus>,
    exclude_pattern: Option<GlobMatcher>,
    select_all: bool,
}

impl SelectFiles {
    pub fn new(
        id: &str,
        path_pattern: Option<&str>,
        statuses: Vec<FileStatus>,
        exclude_pattern: Option<&str>,
        select_all: bool,
    ) -> Result<Self, EvalError> {
        Ok(Self {
            id: id.to_string(),
            path_pattern: path_pattern.map(compile_glob).transpose()?,
            statuses,
            exclude_pattern: exclude_pattern.map(compile_glob).transpose()?,
            select_all,
        })
    }
}

impl Selector for SelectFiles {
    fn id(&self) -> &str {
        &self.id
    }

    fn select(&self, ctx: &EvaluationContext) -> Result<Vec<Value>, EvalError> {
        let files = if self.select_all {
            ctx.repo.get_all_files()?
        } else {
            ctx.repo.get_files(&ctx.diff, ctx.mode)?
        };

        let items = files
            .into_iter()
            .filter(|file| {
                if let Some(pattern) = &self.path_pattern {
                    if !pattern.is_match(&file.path) {
                        return false;
                    }
                }
                // the full tree carries placeholder statuses, so the
                // status filter only applies to diff-derived sets
                if !self.select_all
                    && !self.statuses.is_empty()
                    && !self.statuses.contains(&file.status)
                {
                    return false;
                }
                if let Some(exclude) = &self.exclude_pattern {
                    if exclude.is_match(&file.path) {
                        return false;
                    }
                }
                true
            })
            .map(|file| file.to_item())
            .collect();
        Ok(items)
    }
}

/// Selects matching lines from the current item's text, each with a
/// 1-based line number and an optional window of surrounding lines.
pub struct SelectLines {
    id: String,
    pattern: Regex,
    context_lines: usize,
}

impl SelectLines {
    pub fn new(id: &str, pattern: Regex, context_lines: usize) -> Self {
        Self {
            id: id.to_string(),
            pattern,
            context_lines,
        }
    }
}

impl Selector for SelectLines {
    fn id(&self) -> &str {
        &self.id
    }

    fn select(&self, ctx: &EvaluationContext) -> Result<Vec<Value>, EvalError> {
        let Some(text) = item_text(ctx.current_item()) else {
            log::debug!("select_lines '{}': current item has no text", self.id);
            return Ok(vec![]);
        };

        let lines: Vec<&str> = text.lines().collect();
        let mut items = Vec::new();
        for (idx, line) in lines.iter().enumerate() {
            if !self.pattern.is_match(line) {
                continue;
            }
            let mut record = json!({
                "line": idx + 1,
                "text": line,
            });
            if self.context_lines > 0 {
                let start = idx.saturating_sub(self.context_lines);
                let end = (idx + self.context_lines + 1).min(lines.len());
                let window: Vec<Value> = (start..end)
                    .filter(|&i| i != idx)
                    .map(|i| json!({ "line": i + 1, "text": lines[i] }))
                    .collect();
                record["context"] = Value::Array(window);
            }
            items.push(record);
        }
        Ok(items)
    }
}

/// Selects AST nodes from the current item's text by shelling out to
/// `ast-grep`.
///
/// Availability is probed once per run and memoized in the result cache.
/// A missing tool is a hard error unless the run tolerates it, in which
/// case the selection degrades to empty.
pub struct SelectAstNodes {
    id: String,
    language: String,
    pattern: String,
}

impl SelectAstNodes {
    pub fn new(id: &str, language: &str, pattern: &str) -> Self {
        Self {
            id: id.to_string(),
            language: language.to_string(),
            pattern: pattern.to_string(),
        }
    }

    fn tool_available(ctx: &EvaluationContext) -> bool {
        let cached = ctx.cache.get_with(AST_TOOL_CACHE_KEY, || {
            let found = Command::new("ast-grep")
                .arg("--version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(|s| s.success())
                .unwrap_or(false);
            log::debug!("probed ast-grep: available={}", found);
            Value::Bool(found)
        });
        cached.as_bool().unwrap_or(false)
    }

    fn run_tool(&self, text: &str) -> Result<String, EvalError> {
        log::debug!(
            "running ast-grep --lang {} --pattern {}",
            self.language,
            self.pattern
        );
        let mut child = Command::new("ast-grep")
            .args([
                "run",
                "--pattern",
                self.pattern.as_str(),
                "--lang",
                self.language.as_str(),
                "--json=stream",
                "--stdin",
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| EvalError::ExternalTool(format!("failed to spawn ast-grep: {}", e)))?;

        if let Some(stdin) = child.stdin.as_mut() {
            stdin
                .write_all(text.as_bytes())
                .map_err(|e| EvalError::ExternalTool(format!("ast-grep stdin: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| EvalError::ExternalTool(format!("ast-grep: {}", e)))?;
        if !output.status.success() {
            let stderr = bounded(output.stderr);
            return Err(EvalError::ExternalTool(format!(
                "ast-grep exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(bounded(output.stdout))
    }

    /// Map one streamed match record to a node item with 1-based positions
    fn to_node(record: &Value) -> Value {
        let start = &record["range"]["start"];
        let end = &record["range"]["end"];
        let line = start["line"].as_u64().unwrap_or(0) + 1;
        let column = start["column"].as_u64().unwrap_or(0) + 1;
        json!({
            "text": record["text"].as_str().unwrap_or(""),
            "line": line,
            "column": column,
            "end_line": end["line"].as_u64().unwrap_or(0) + 1,
            "end_column": end["column"].as_u64().unwrap_or(0) + 1,
        })
    }
}

impl Selector for SelectAstNodes {
    fn id(&self) -> &str {
        &self.id
    }

    fn select(&self, ctx: &EvaluationContext) -> Result<Vec<Value>, EvalError> {
        let Some(text) = item_text(ctx.current_item()) else {
            return Ok(vec![]);
        };

        if !Self::tool_available(ctx) {
            if ctx.tolerate_missing_tools {
                log::warn!(
                    "ast-grep not found; select_ast_nodes '{}' yields no items",
                    self.id
                );
                return Ok(vec![]);
            }
            return Err(EvalError::ExternalTool(
                "ast-grep not found on PATH (install it or run with --tolerate-missing-tools)"
                    .to_string(),
            ));
        }

        let stdout = self.run_tool(&text)?;
        let mut items = Vec::new();
        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str::<Value>(line) {
                Ok(record) => items.push(Self::to_node(&record)),
                Err(e) => log::warn!("skipping unparseable ast-grep record: {}", e),
            }
        }
        Ok(items)
    }
}

/// Selects added or modified files whose change ratio falls within an
/// inclusive percentage band.
pub struct SelectFileChanges {
    id: String,
    min_percent: Option<f64>,
    max_percent: Option<f64>,
}

impl SelectFileChanges {
    pub fn new(id: &str, min_percent: Option<f64>, max_percent: Option<f64>) -> Self {
        Self {
            id: id.to_string(),
            min_percent,
            max_percent,
        }
    }
}

impl Selector for SelectFileChanges {
    fn id(&self) -> &str {
        &self.id
    }

    fn select(&self, ctx: &EvaluationContext) -> Result<Vec<Value>, EvalError> {
        let files = ctx.repo.get_files(&ctx.diff, ctx.mode)?;
        let mut items = Vec::new();

        for file in files {
            if !matches!(file.status, FileStatus::Added | FileStatus::Modified) {
                continue;
            }
            let content = match &file.content {
                Some(content) => content.clone(),
                None => match ctx.repo.get_file_content(&file.path) {
                    Ok(content) => content,
                    Err(e) => {
                        log::debug!("skipping unreadable {}: {}", file.path, e);
                        continue;
                    }
                },
            };

            let total_lines = content.lines().count();
            let changes = file.insertions + file.deletions;
            let percent = if total_lines == 0 {
                if changes > 0 {
                    100.0
                } else {
                    0.0
                }
            } else {
                changes as f64 / total_lines as f64 * 100.0
            };

            if self.min_percent.is_some_and(|min| percent < min) {
                continue;
            }
            if self.max_percent.is_some_and(|max| percent > max) {
                continue;
            }

            let mut item = file.to_item();
            item["content"] = Value::String(content);
            item["change_percent"] = json!(percent);
            items.push(item);
        }
        Ok(items)
    }
}

/// Executes a shell command and selects a single record carrying its
/// trimmed output and exit code. A non-zero exit is captured, not raised.
pub struct SelectCommandOutput {
    id: String,
    command: String,
}

impl SelectCommandOutput {
    pub fn new(id: &str, command: &str) -> Self {
        Self {
            id: id.to_string(),
            command: command.to_string(),
        }
    }
}

impl Selector for SelectCommandOutput {
    fn id(&self) -> &str {
        &self.id
    }

    fn select(&self, _ctx: &EvaluationContext) -> Result<Vec<Value>, EvalError> {
        log::debug!("running command: {}", self.command);
        let output = if cfg!(windows) {
            Command::new("cmd").args(["/C", self.command.as_str()]).output()?
        } else {
            Command::new("sh").args(["-c", self.command.as_str()]).output()?
        };

        let record = json!({
            "command": self.command,
            "exit_code": output.status.code().unwrap_or(-1),
            "stdout": bounded(output.stdout).trim(),
            "stderr": bounded(output.stderr).trim(),
        });
        Ok(vec![record])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{FileInfo, FileStatus};

    fn files_ctx() -> EvaluationContext {
        EvaluationContext::with_files(vec![
            FileInfo::new("src/a.ts", FileStatus::Modified)
                .with_content("console.log(1)\nconst x = 1\n")
                .with_changes(2, 0),
            FileInfo::new("src/b.rs", FileStatus::Added)
                .with_content("fn main() {}\n")
                .with_changes(1, 0),
            FileInfo::new("docs/readme.md", FileStatus::Deleted),
        ])
    }

    #[test]
    fn test_select_files_by_glob() {
        let selector =
            SelectFiles::new("ts-files", Some("**/*.ts"), vec![], None, false).unwrap();
        let items = selector.select(&files_ctx()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["path"], "src/a.ts");
    }

    #[test]
    fn test_select_files_by_status() {
        let selector =
            SelectFiles::new("added", None, vec![FileStatus::Added], None, false).unwrap();
        let items = selector.select(&files_ctx()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["status"], "added");
    }

    #[test]
    fn test_select_files_exclude() {
        let selector =
            SelectFiles::new("no-docs", None, vec![], Some("docs/**"), false).unwrap();
        let items = selector.select(&files_ctx()).unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i["path"] != "docs/readme.md"));
    }

    #[test]
    fn test_select_files_all_skips_status_filter() {
        // the placeholder status would never match the filter, which is
        // why select_all skips it
        let selector =
            SelectFiles::new("all", None, vec![FileStatus::Modified], None, true).unwrap();
        let items = selector.select(&files_ctx()).unwrap();
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|i| i["status"] == "unknown"));
    }

    #[test]
    fn test_select_files_invalid_glob() {
        assert!(SelectFiles::new("bad", Some("a{b"), vec![], None, false).is_err());
    }

    #[test]
    fn test_select_lines_matches_with_numbers() {
        let ctx = EvaluationContext::for_tests()
            .with_item(json!({"content": "alpha\ntodo: later\nbeta\ntodo: again\n"}));
        let selector = SelectLines::new("todos", Regex::new("^todo").unwrap(), 0);
        let items = selector.select(&ctx).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["line"], 2);
        assert_eq!(items[0]["text"], "todo: later");
        assert_eq!(items[1]["line"], 4);
        assert!(items[0].get("context").is_none());
    }

    #[test]
    fn test_select_lines_context_window_excludes_match() {
        let ctx = EvaluationContext::for_tests().with_item(json!("a\nb\nmatch\nc\nd"));
        let selector = SelectLines::new("ctx", Regex::new("match").unwrap(), 1);
        let items = selector.select(&ctx).unwrap();

        assert_eq!(items.len(), 1);
        let window = items[0]["context"].as_array().unwrap();
        assert_eq!(window.len(), 2);
        assert_eq!(window[0]["line"], 2);
        assert_eq!(window[0]["text"], "b");
        assert_eq!(window[1]["line"], 4);
        assert_eq!(window[1]["text"], "c");
    }

    #[test]
    fn test_select_lines_window_clipped_at_edges() {
        let ctx = EvaluationContext::for_tests().with_item(json!("match\nx"));
        let selector = SelectLines::new("edge", Regex::new("match").unwrap(), 3);
        let items = selector.select(&ctx).unwrap();
        let window = items[0]["context"].as_array().unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0]["text"], "x");
    }

    #[test]
    fn test_select_lines_without_item_is_empty() {
        let selector = SelectLines::new("none", Regex::new(".").unwrap(), 0);
        let items = selector.select(&EvaluationContext::for_tests()).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_ast_nodes_missing_tool_tolerated() {
        let ctx = EvaluationContext::for_tests()
            .with_tolerance(true)
            .with_item(json!({"content": "let x = 1;"}));
        // force the probe result instead of relying on the environment
        ctx.cache.set(AST_TOOL_CACHE_KEY, Value::Bool(false));

        let selector = SelectAstNodes::new("ast", "ts", "console.log($A)");
        assert!(selector.select(&ctx).unwrap().is_empty());
    }

    #[test]
    fn test_ast_nodes_missing_tool_is_hard_error() {
        let ctx = EvaluationContext::for_tests().with_item(json!({"content": "let x = 1;"}));
        ctx.cache.set(AST_TOOL_CACHE_KEY, Value::Bool(false));

        let selector = SelectAstNodes::new("ast", "ts", "console.log($A)");
        let err = selector.select(&ctx).unwrap_err();
        assert!(matches!(err, EvalError::ExternalTool(_)));
    }

    #[test]
    fn test_ast_node_record_is_one_based() {
        let record = json!({
            "text": "console.log(1)",
            "range": {
                "start": { "line": 0, "column": 4 },
                "end": { "line": 0, "column": 18 },
            }
        });
        let node = SelectAstNodes::to_node(&record);
        assert_eq!(node["line"], 1);
        assert_eq!(node["column"], 5);
        assert_eq!(node["end_column"], 19);
        assert_eq!(node["text"], "console.log(1)");
    }

    #[test]
    fn test_file_changes_band() {
        let ctx = EvaluationContext::with_files(vec![
            // 2 changes over 2 lines = 100%
            FileInfo::new("hot.ts", FileStatus::Modified)
                .with_content("a\nb\n")
                .with_changes(1, 1),
            // 1 change over 4 lines = 25%
            FileInfo::new("warm.ts", FileStatus::Modified)
                .with_content("a\nb\nc\nd\n")
                .with_changes(1, 0),
            // deleted files never qualify
            FileInfo::new("gone.ts", FileStatus::Deleted),
        ]);

        let selector = SelectFileChanges::new("churn", Some(50.0), None);
        let items = selector.select(&ctx).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["path"], "hot.ts");
        assert_eq!(items[0]["change_percent"], 100.0);
    }

    #[test]
    fn test_file_changes_empty_file_counts_as_full_change() {
        let ctx = EvaluationContext::with_files(vec![FileInfo::new(
            "truncated.ts",
            FileStatus::Modified,
        )
        .with_content("")
        .with_changes(0, 12)]);

        let selector = SelectFileChanges::new("churn", Some(99.0), Some(100.0));
        let items = selector.select(&ctx).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["change_percent"], 100.0);
    }

    #[test]
    fn test_file_changes_skips_unreadable() {
        // the file is in the diff but carries no content and none can be read
        let ctx = EvaluationContext::with_files(vec![
            FileInfo::new("ghost.ts", FileStatus::Modified).with_changes(1, 1)
        ]);

        let selector = SelectFileChanges::new("churn", None, None);
        assert!(selector.select(&ctx).unwrap().is_empty());
    }

    #[test]
    #[cfg(unix)]
    fn test_command_output_capture() {
        let selector = SelectCommandOutput::new("cmd", "echo hello; echo oops >&2; exit 3");
        let items = selector.select(&EvaluationContext::for_tests()).unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["command"], "echo hello; echo oops >&2; exit 3");
        assert_eq!(items[0]["exit_code"], 3);
        assert_eq!(items[0]["stdout"], "hello");
        assert_eq!(items[0]["stderr"], "oops");
    }
}
