//! # Gatekeep Git Operations
//!
//! Builds an immutable [`GitSnapshot`] of the working repository for the
//! rule engine. The snapshot is collected once per run, before any rule
//! executes, so every rule observes the same repository state no matter
//! how it is scheduled.
//!
//! ## Example
//!
//! ```rust,no_run
//! use gatekeep_git::GitSnapshot;
//!
//! let snapshot = GitSnapshot::collect().unwrap();
//! println!("on branch {}", snapshot.branch);
//! for file in &snapshot.staged {
//!     println!("staged: {} ({} bytes)", file.path, file.size);
//! }
//! ```
//!
//! Staged file contents are read from the index (`git show :<path>`), not
//! from the working tree, and cached in an LRU so repeated reads of the
//! same file are cheap.

use anyhow::{Context, Result, bail};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::process::Command;
use std::sync::{Mutex, OnceLock};

static CONTENT_CACHE: OnceLock<Mutex<LruCache<String, String>>> = OnceLock::new();
static DIFF_CACHE: OnceLock<Mutex<LruCache<String, String>>> = OnceLock::new();

fn cache(
    cell: &'static OnceLock<Mutex<LruCache<String, String>>>,
) -> &'static Mutex<LruCache<String, String>> {
    cell.get_or_init(|| {
        Mutex::new(LruCache::new(
            NonZeroUsize::new(64).expect("valid cache size"),
        ))
    })
}

/// How a file appears in the index or working tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Staged,
    Modified,
    Unstaged,
    Deleted,
    Added,
    Renamed,
    /// Tracked by git, not part of the current change.
    Tracked,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Staged => "staged",
            FileStatus::Modified => "modified",
            FileStatus::Unstaged => "unstaged",
            FileStatus::Deleted => "deleted",
            FileStatus::Added => "added",
            FileStatus::Renamed => "renamed",
            FileStatus::Tracked => "tracked",
        }
    }
}

/// One file as captured at snapshot time.
#[derive(Debug, Clone)]
pub struct GitFileRecord {
    /// Repository-relative path.
    pub path: String,
    pub status: FileStatus,
    /// Size in bytes of the staged blob (0 for deleted files).
    pub size: u64,
    /// Lines added by the staged diff for this file.
    pub additions: usize,
    /// Lines removed by the staged diff for this file.
    pub deletions: usize,
    /// Staged content, if it was readable from the index.
    pub content: Option<String>,
    /// Staged unified diff for this file, if one exists.
    pub diff: Option<String>,
}

impl GitFileRecord {
    /// File name without its directory part.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Extension without the dot, empty if none.
    pub fn extension(&self) -> &str {
        self.name().rsplit_once('.').map(|(_, ext)| ext).unwrap_or("")
    }

    /// Line count of the captured content.
    pub fn lines(&self) -> usize {
        self.content.as_deref().map(|c| c.lines().count()).unwrap_or(0)
    }
}

/// Aggregate numbers for the staged diff.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DiffStats {
    pub files_changed: usize,
    pub additions: usize,
    pub deletions: usize,
    /// additions + deletions across the staged diff.
    pub modified_lines: usize,
}

/// Message and hash of the last commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub message: String,
    pub hash: String,
}

/// Immutable view of the repository at collection time.
#[derive(Debug, Default, Clone)]
pub struct GitSnapshot {
    pub branch: String,
    /// Absent before the first commit exists.
    pub commit: Option<CommitInfo>,
    pub author_name: String,
    pub author_email: String,
    pub remote_name: String,
    pub remote_url: String,
    pub staged: Vec<GitFileRecord>,
    pub modified: Vec<GitFileRecord>,
    pub added: Vec<GitFileRecord>,
    pub deleted: Vec<GitFileRecord>,
    pub unstaged: Vec<GitFileRecord>,
    /// Every tracked file. Content is not captured here; readers go to
    /// the filesystem lazily.
    pub all: Vec<GitFileRecord>,
    pub diff_stats: DiffStats,
}

impl GitSnapshot {
    pub fn is_main(&self) -> bool {
        matches!(self.branch.as_str(), "main" | "master")
    }

    /// Collects a snapshot of the current repository.
    ///
    /// Fails if the working directory is not inside a git repository.
    pub fn collect() -> Result<Self> {
        let branch = git_capture(&["branch", "--show-current"]).unwrap_or_default();
        let commit = match git_capture(&["rev-parse", "HEAD"]) {
            Ok(hash) => Some(CommitInfo {
                message: git_capture(&["log", "-1", "--pretty=%B"]).unwrap_or_default(),
                hash,
            }),
            Err(_) => None,
        };
        let author_name = git_capture(&["config", "user.name"]).unwrap_or_default();
        let author_email = git_capture(&["config", "user.email"]).unwrap_or_default();
        let remote_url =
            git_capture(&["config", "--get", "remote.origin.url"]).unwrap_or_default();

        let numstat = staged_numstat()?;

        let mut snapshot = GitSnapshot {
            branch,
            commit,
            author_name,
            author_email,
            remote_name: "origin".to_string(),
            remote_url,
            ..Default::default()
        };

        for (status_code, path) in staged_name_status()? {
            let (additions, deletions) = numstat
                .iter()
                .find(|(p, ..)| *p == path)
                .map(|(_, a, d)| (*a, *d))
                .unwrap_or((0, 0));
            let content = if status_code == 'D' {
                None
            } else {
                staged_content(&path).ok()
            };
            let record = GitFileRecord {
                size: content.as_deref().map(|c| c.len() as u64).unwrap_or(0),
                status: match status_code {
                    'A' => FileStatus::Added,
                    'D' => FileStatus::Deleted,
                    'R' => FileStatus::Renamed,
                    _ => FileStatus::Staged,
                },
                diff: staged_diff(&path).ok().filter(|d| !d.is_empty()),
                path,
                additions,
                deletions,
                content,
            };
            match record.status {
                FileStatus::Added => snapshot.added.push(record.clone()),
                FileStatus::Deleted => snapshot.deleted.push(record.clone()),
                _ => {}
            }
            // Everything in the index counts as staged, whatever its code.
            snapshot.staged.push(record);
        }

        for path in capture_lines(&["diff", "--name-only"])? {
            snapshot
                .unstaged
                .push(working_tree_record(path, FileStatus::Unstaged));
        }
        // Needs a HEAD to diff against, so an empty repo yields nothing.
        for path in
            capture_lines(&["diff", "--name-only", "--diff-filter=M", "HEAD"]).unwrap_or_default()
        {
            snapshot
                .modified
                .push(working_tree_record(path, FileStatus::Modified));
        }
        for path in capture_lines(&["ls-files"])? {
            snapshot.all.push(tracked_record(path));
        }

        snapshot.diff_stats = DiffStats {
            files_changed: snapshot.staged.len(),
            additions: numstat.iter().map(|(_, a, _)| a).sum(),
            deletions: numstat.iter().map(|(_, _, d)| d).sum(),
            modified_lines: numstat.iter().map(|(_, a, d)| a + d).sum(),
        };

        Ok(snapshot)
    }
}

fn working_tree_record(path: String, status: FileStatus) -> GitFileRecord {
    let content = std::fs::read_to_string(&path).ok();
    GitFileRecord {
        size: std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0),
        status,
        path,
        additions: 0,
        deletions: 0,
        content,
        diff: None,
    }
}

fn tracked_record(path: String) -> GitFileRecord {
    GitFileRecord {
        size: std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0),
        status: FileStatus::Tracked,
        path,
        additions: 0,
        deletions: 0,
        content: None,
        diff: None,
    }
}

/// Runs `git` with the given arguments and returns trimmed stdout.
pub fn git_capture(args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .output()
        .context("failed to spawn git")?;

    if !output.status.success() {
        bail!(
            "git {} failed: {}",
            args.first().unwrap_or(&""),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn capture_lines(args: &[&str]) -> Result<Vec<String>> {
    Ok(git_capture(args)?
        .lines()
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// `git diff --cached --name-status`, one `(status, path)` per entry.
/// Renames report the new path.
fn staged_name_status() -> Result<Vec<(char, String)>> {
    let mut entries = Vec::new();
    for line in capture_lines(&["diff", "--cached", "--name-status", "-M"])? {
        let mut parts = line.split('\t');
        let Some(code) = parts.next().and_then(|c| c.chars().next()) else {
            continue;
        };
        let path = if code == 'R' {
            parts.nth(1)
        } else {
            parts.next()
        };
        if let Some(path) = path {
            entries.push((code, path.to_string()));
        }
    }
    Ok(entries)
}

/// `git diff --cached --numstat`, `(path, additions, deletions)` per entry.
/// Binary files report `-` counts and come back as zero.
fn staged_numstat() -> Result<Vec<(String, usize, usize)>> {
    let mut entries = Vec::new();
    for line in capture_lines(&["diff", "--cached", "--numstat"])? {
        let mut parts = line.split('\t');
        let additions = parts.next().and_then(|n| n.parse().ok()).unwrap_or(0);
        let deletions = parts.next().and_then(|n| n.parse().ok()).unwrap_or(0);
        if let Some(path) = parts.next() {
            entries.push((path.to_string(), additions, deletions));
        }
    }
    Ok(entries)
}

/// Content of a staged file as it sits in the index.
pub fn staged_content(path: &str) -> Result<String> {
    if let Ok(mut c) = cache(&CONTENT_CACHE).lock() {
        if let Some(content) = c.get(path) {
            return Ok(content.clone());
        }
    }

    let content = git_capture(&["show", &format!(":{}", path)])?;

    if let Ok(mut c) = cache(&CONTENT_CACHE).lock() {
        c.put(path.to_string(), content.clone());
    }

    Ok(content)
}

/// Staged unified diff for one file (`git diff --cached -- <path>`).
pub fn staged_diff(path: &str) -> Result<String> {
    if let Ok(mut c) = cache(&DIFF_CACHE).lock() {
        if let Some(diff) = c.get(path) {
            return Ok(diff.clone());
        }
    }

    let diff = git_capture(&["diff", "--cached", "--", path])?;

    if let Ok(mut c) = cache(&DIFF_CACHE).lock() {
        c.put(path.to_string(), diff.clone());
    }

    Ok(diff)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(path: &str, content: &str) -> GitFileRecord {
        GitFileRecord {
            path: path.to_string(),
            status: FileStatus::Staged,
            size: content.len() as u64,
            additions: 0,
            deletions: 0,
            content: Some(content.to_string()),
            diff: None,
        }
    }

    #[test]
    fn record_name_and_extension() {
        let r = record("src/main.rs", "fn main() {}\n");
        assert_eq!(r.name(), "main.rs");
        assert_eq!(r.extension(), "rs");

        let bare = record("Makefile", "all:\n");
        assert_eq!(bare.name(), "Makefile");
        assert_eq!(bare.extension(), "");
    }

    #[test]
    fn record_counts_lines() {
        let r = record("a.txt", "one\ntwo\nthree\n");
        assert_eq!(r.lines(), 3);

        let empty = GitFileRecord {
            content: None,
            ..record("gone.txt", "")
        };
        assert_eq!(empty.lines(), 0);
    }

    #[test]
    fn main_and_master_are_main() {
        let mut snapshot = GitSnapshot::default();
        assert!(!snapshot.is_main());
        snapshot.branch = "main".to_string();
        assert!(snapshot.is_main());
        snapshot.branch = "master".to_string();
        assert!(snapshot.is_main());
        snapshot.branch = "feature/login".to_string();
        assert!(!snapshot.is_main());
    }

    #[test]
    fn diff_stats_default_is_zero() {
        let stats = DiffStats::default();
        assert_eq!(stats.files_changed, 0);
        assert_eq!(stats.modified_lines, 0);
    }
}
