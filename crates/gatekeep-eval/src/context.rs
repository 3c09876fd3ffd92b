//! Runtime context objects seeded into the root scope.
//!
//! `git` is built once from a [`GitSnapshot`], before the first statement
//! runs. Rules therefore see a frozen view of the repository; nothing a
//! rule does can change what a later (or parallel) rule observes.

use crate::error::EvalError;
use crate::services::FileSystem;
use crate::value::{FileValue, Object, Value};
use gatekeep_git::{GitFileRecord, GitSnapshot};
use std::sync::Arc;

/// Builds the `git` object: branch, commit, author, remote, the six file
/// collections, and staged diff stats.
pub fn git_object(snapshot: &GitSnapshot, fs: Arc<dyn FileSystem>) -> Value {
    let branch = Object::new("Branch")
        .with_property("name", Value::String(snapshot.branch.clone()))
        .with_property("is_main", Value::Bool(snapshot.is_main()));

    // `git.commit` is null before the first commit exists.
    let commit = match &snapshot.commit {
        Some(c) => Value::Object(
            Object::new("Commit")
                .with_property("message", Value::String(c.message.clone()))
                .with_property("hash", Value::String(c.hash.clone())),
        ),
        None => Value::Null,
    };

    let author = Object::new("Author")
        .with_property("name", Value::String(snapshot.author_name.clone()))
        .with_property("email", Value::String(snapshot.author_email.clone()));

    let remote = Object::new("Remote")
        .with_property("name", Value::String(snapshot.remote_name.clone()))
        .with_property("url", Value::String(snapshot.remote_url.clone()));

    // `all` is every tracked file; contents come off disk on demand
    // instead of being captured in the snapshot.
    let files = Object::new("Files")
        .with_property("staged", file_array(&snapshot.staged))
        .with_property("modified", file_array(&snapshot.modified))
        .with_property("added", file_array(&snapshot.added))
        .with_property("deleted", file_array(&snapshot.deleted))
        .with_property("unstaged", file_array(&snapshot.unstaged))
        .with_property("all", disk_array(&snapshot.all, &fs));

    let diff = Object::new("Diff")
        .with_property(
            "files_changed",
            Value::Number(snapshot.diff_stats.files_changed as f64),
        )
        .with_property(
            "additions",
            Value::Number(snapshot.diff_stats.additions as f64),
        )
        .with_property(
            "deletions",
            Value::Number(snapshot.diff_stats.deletions as f64),
        )
        .with_property(
            "modified_lines",
            Value::Number(snapshot.diff_stats.modified_lines as f64),
        );

    let git = Object::new("Git")
        .with_property("branch", Value::Object(branch))
        .with_property("commit", commit)
        .with_property("author", Value::Object(author))
        .with_property("remote", Value::Object(remote))
        .with_property("files", Value::Object(files))
        .with_property("diff", Value::Object(diff));

    Value::Object(git)
}

fn file_array(records: &[GitFileRecord]) -> Value {
    Value::Array(
        records
            .iter()
            .map(|r| FileValue::from_record(Arc::new(r.clone())))
            .collect(),
    )
}

fn disk_array(records: &[GitFileRecord], fs: &Arc<dyn FileSystem>) -> Value {
    Value::Array(
        records
            .iter()
            .map(|r| FileValue::from_disk(r.path.clone(), fs.clone()))
            .collect(),
    )
}

/// The `http` marker object; its `get` method is dispatched by the
/// interpreter through the HTTP collaborator.
pub fn http_object() -> Value {
    Value::Object(Object::new("Http"))
}

/// What a `catch` binding sees: the error's kind and message.
pub fn error_object(error: &EvalError) -> Value {
    let obj = Object::new("Error")
        .with_property("kind", Value::String(error.kind.as_str().to_string()))
        .with_property("message", Value::String(error.message.clone()));
    Value::Object(obj)
}
