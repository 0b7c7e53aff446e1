//! Repository capability: changed-file discovery and content access
//!
//! The engine never computes diffs itself; it consumes this trait. The
//! git-backed implementation shells out to `git`, the in-memory one serves
//! fixtures for tests and hermetic runs.

use crate::context::{DiffSnapshot, FileInfo, FileStatus, Mode};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use thiserror::Error;

/// Error talking to the repository
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("git command failed: {0}")]
    Git(String),

    #[error("unreadable file {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read access to a repository's files and diffs
pub trait Repository: Send + Sync {
    /// Files for the given snapshot and mode.
    ///
    /// Re-invoking re-queries the source; `Mode::Staged` and `Mode::All`
    /// ignore the snapshot's file list.
    fn get_files(&self, diff: &DiffSnapshot, mode: Mode) -> Result<Vec<FileInfo>, RepoError>;

    /// Every tracked file, with a placeholder status
    fn get_all_files(&self) -> Result<Vec<FileInfo>, RepoError>;

    /// Content of one file; fails if unreadable
    fn get_file_content(&self, path: &str) -> Result<String, RepoError>;

    /// Changed files between two refs; `head = None` means the working tree
    fn get_diff(&self, base: &str, head: Option<&str>) -> Result<DiffSnapshot, RepoError>;
}

/// Repository backed by a git working tree
pub struct GitRepository {
    root: PathBuf,
}

impl GitRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn run(&self, args: &[&str]) -> Result<Output, RepoError> {
        log::debug!("running git {}", args.join(" "));
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()?;
        Ok(output)
    }

    fn run_checked(&self, args: &[&str]) -> Result<String, RepoError> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RepoError::Git(format!(
                "git {}: {}",
                args.join(" "),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Run `git diff` with the given selection args and assemble file records
    fn diff_files(&self, selection: &[&str]) -> Result<Vec<FileInfo>, RepoError> {
        let mut status_args = vec!["diff", "--name-status", "--find-renames"];
        status_args.extend_from_slice(selection);
        let name_status = self.run_checked(&status_args)?;

        let mut numstat_args = vec!["diff", "--numstat", "--find-renames"];
        numstat_args.extend_from_slice(selection);
        let numstat = self.run_checked(&numstat_args)?;
        let changes = parse_numstat(&numstat);

        let mut files = Vec::new();
        for line in name_status.lines() {
            let Some(mut file) = parse_name_status_line(line) else {
                continue;
            };
            if let Some(&(insertions, deletions)) = changes.get(file.path.as_str()) {
                file.insertions = insertions;
                file.deletions = deletions;
            }
            files.push(file);
        }
        Ok(files)
    }

    fn staged_files(&self) -> Result<Vec<FileInfo>, RepoError> {
        self.diff_files(&["--cached"])
    }
}

impl Repository for GitRepository {
    fn get_files(&self, diff: &DiffSnapshot, mode: Mode) -> Result<Vec<FileInfo>, RepoError> {
        match mode {
            Mode::Diff => Ok(diff.files.clone()),
            Mode::Staged => self.staged_files(),
            Mode::All => self.get_all_files(),
        }
    }

    fn get_all_files(&self) -> Result<Vec<FileInfo>, RepoError> {
        let stdout = self.run_checked(&["ls-files"])?;
        Ok(stdout
            .lines()
            .filter(|line| !line.is_empty())
            .map(|path| FileInfo::new(path, FileStatus::Unknown))
            .collect())
    }

    fn get_file_content(&self, path: &str) -> Result<String, RepoError> {
        std::fs::read_to_string(self.root.join(path)).map_err(|e| RepoError::Unreadable {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    fn get_diff(&self, base: &str, head: Option<&str>) -> Result<DiffSnapshot, RepoError> {
        let mut selection = vec![base];
        if let Some(head) = head {
            selection.push(head);
        }
        let files = self.diff_files(&selection)?;
        Ok(DiffSnapshot::new(base, head, files))
    }
}

/// Parse one `git diff --name-status` line into a file record
fn parse_name_status_line(line: &str) -> Option<FileInfo> {
    let mut parts = line.split('\t');
    let status_code = parts.next()?.trim();
    let first_path = parts.next()?.trim();
    if status_code.is_empty() || first_path.is_empty() {
        return None;
    }

    match status_code.chars().next()? {
        'A' => Some(FileInfo::new(first_path, FileStatus::Added)),
        'M' => Some(FileInfo::new(first_path, FileStatus::Modified)),
        'D' => Some(FileInfo::new(first_path, FileStatus::Deleted)),
        'R' => {
            // rename lines carry old and new paths
            let new_path = parts.next()?.trim();
            let mut file = FileInfo::new(new_path, FileStatus::Renamed);
            file.old_path = Some(first_path.to_string());
            Some(file)
        }
        // copies, type changes etc. are reported as modifications
        _ => Some(FileInfo::new(first_path, FileStatus::Modified)),
    }
}

/// Parse `git diff --numstat` output into path -> (insertions, deletions)
fn parse_numstat(output: &str) -> HashMap<&str, (usize, usize)> {
    let mut changes = HashMap::new();
    for line in output.lines() {
        let mut parts = line.split('\t');
        let (Some(ins), Some(del), Some(path)) = (parts.next(), parts.next(), parts.next()) else {
            continue;
        };
        // binary files report "-" counts
        let insertions = ins.trim().parse().unwrap_or(0);
        let deletions = del.trim().parse().unwrap_or(0);
        // renames are reported as "old => new"; key by the new path
        let path = match path.rsplit_once(" => ") {
            Some((_, new_path)) => new_path,
            None => path,
        };
        changes.insert(path.trim(), (insertions, deletions));
    }
    changes
}

/// In-memory repository serving a fixed file set
#[derive(Default)]
pub struct StaticRepository {
    files: Vec<FileInfo>,
}

impl StaticRepository {
    pub fn new(files: Vec<FileInfo>) -> Self {
        Self { files }
    }
}

impl Repository for StaticRepository {
    fn get_files(&self, _diff: &DiffSnapshot, _mode: Mode) -> Result<Vec<FileInfo>, RepoError> {
        Ok(self.files.clone())
    }

    fn get_all_files(&self) -> Result<Vec<FileInfo>, RepoError> {
        Ok(self
            .files
            .iter()
            .map(|f| {
                let mut file = f.clone();
                file.status = FileStatus::Unknown;
                file
            })
            .collect())
    }

    fn get_file_content(&self, path: &str) -> Result<String, RepoError> {
        self.files
            .iter()
            .find(|f| f.path == path)
            .and_then(|f| f.content.clone())
            .ok_or_else(|| RepoError::Unreadable {
                path: path.to_string(),
                reason: "no such fixture".to_string(),
            })
    }

    fn get_diff(&self, base: &str, head: Option<&str>) -> Result<DiffSnapshot, RepoError> {
        Ok(DiffSnapshot::new(base, head, self.files.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn init_repo(dir: &Path) {
        let run = |args: &[&str]| {
            let ok = Command::new("git")
                .args(args)
                .current_dir(dir)
                .output()
                .map(|o| o.status.success())
                .unwrap_or(false);
            assert!(ok, "git {:?} failed", args);
        };
        run(&["init", "-q", "-b", "main"]);
        run(&["config", "user.email", "test@test"]);
        run(&["config", "user.name", "test"]);
    }

    #[test]
    fn test_parse_name_status() {
        let added = parse_name_status_line("A\tsrc/new.rs").unwrap();
        assert_eq!(added.status, FileStatus::Added);
        assert_eq!(added.path, "src/new.rs");

        let deleted = parse_name_status_line("D\told.rs").unwrap();
        assert_eq!(deleted.status, FileStatus::Deleted);

        let renamed = parse_name_status_line("R100\ta.rs\tb.rs").unwrap();
        assert_eq!(renamed.status, FileStatus::Renamed);
        assert_eq!(renamed.path, "b.rs");
        assert_eq!(renamed.old_path.as_deref(), Some("a.rs"));

        assert!(parse_name_status_line("").is_none());
    }

    #[test]
    fn test_parse_numstat() {
        let output = "3\t1\tsrc/a.rs\n-\t-\tassets/logo.png\n2\t0\told.rs => new.rs\n";
        let changes = parse_numstat(output);
        assert_eq!(changes["src/a.rs"], (3, 1));
        assert_eq!(changes["assets/logo.png"], (0, 0));
        assert_eq!(changes["new.rs"], (2, 0));
    }

    #[test]
    fn test_static_repository_content() {
        let repo = StaticRepository::new(vec![
            FileInfo::new("a.ts", FileStatus::Modified).with_content("let x;")
        ]);
        assert_eq!(repo.get_file_content("a.ts").unwrap(), "let x;");
        assert!(repo.get_file_content("missing.ts").is_err());
    }

    #[test]
    fn test_git_diff_roundtrip() {
        if !git_available() {
            return;
        }
        let temp = TempDir::new().unwrap();
        init_repo(temp.path());
        fs::write(temp.path().join("kept.txt"), "one\ntwo\n").unwrap();
        fs::write(temp.path().join("gone.txt"), "bye\n").unwrap();

        let repo = GitRepository::new(temp.path());
        repo.run_checked(&["add", "-A"]).unwrap();
        repo.run_checked(&["commit", "-q", "-m", "init"]).unwrap();

        fs::write(temp.path().join("kept.txt"), "one\nchanged\nthree\n").unwrap();
        fs::write(temp.path().join("fresh.txt"), "hello\n").unwrap();
        fs::remove_file(temp.path().join("gone.txt")).unwrap();
        repo.run_checked(&["add", "-A"]).unwrap();

        let snapshot = repo.get_diff("HEAD", None).unwrap();
        assert_eq!(snapshot.base, "HEAD");
        assert_eq!(snapshot.files.len(), 3);

        let by_path: HashMap<_, _> = snapshot
            .files
            .iter()
            .map(|f| (f.path.as_str(), f))
            .collect();
        assert_eq!(by_path["fresh.txt"].status, FileStatus::Added);
        assert_eq!(by_path["gone.txt"].status, FileStatus::Deleted);
        let kept = by_path["kept.txt"];
        assert_eq!(kept.status, FileStatus::Modified);
        assert!(kept.insertions >= 2);
        assert!(kept.deletions >= 1);

        // content is not pre-fetched
        assert!(kept.content.is_none());
        assert!(repo.get_file_content("kept.txt").unwrap().contains("changed"));
    }

    #[test]
    fn test_git_all_files() {
        if !git_available() {
            return;
        }
        let temp = TempDir::new().unwrap();
        init_repo(temp.path());
        fs::write(temp.path().join("a.txt"), "a\n").unwrap();
        fs::write(temp.path().join("b.txt"), "b\n").unwrap();

        let repo = GitRepository::new(temp.path());
        repo.run_checked(&["add", "-A"]).unwrap();
        repo.run_checked(&["commit", "-q", "-m", "init"]).unwrap();

        let files = repo.get_all_files().unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.status == FileStatus::Unknown));
    }
}
