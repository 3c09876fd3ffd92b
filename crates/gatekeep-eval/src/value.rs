//! Runtime value model.
//!
//! [`Value`] is a closed union: the interpreter dispatches every property,
//! method, and operator through explicit match tables here, so the full
//! surface of each type is visible in one place.

use crate::env::ScopeId;
use crate::error::{EvalError, EvalErrorKind, IntoOptionSpan};
use crate::services::FileSystem;
use crate::bail_eval;
use gatekeep_git::GitFileRecord;
use gatekeep_syntax::{Expr, Span};
use rustc_hash::FxHashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum Value {
    String(String),
    Number(f64),
    Bool(bool),
    Null,
    Array(Vec<Value>),
    Object(Object),
    File(FileValue),
    Closure(ClosureValue),
}

/// A named bag of properties, e.g. the `git` context or an HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    pub type_name: String,
    pub properties: FxHashMap<String, Value>,
}

impl Object {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            properties: FxHashMap::default(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.properties.insert(key.into(), value);
    }
}

/// A file handle. Git-backed handles read the captured snapshot record;
/// disk-backed handles read through the [`FileSystem`] service lazily.
#[derive(Clone)]
pub struct FileValue {
    pub path: String,
    pub backing: FileBacking,
}

#[derive(Clone)]
pub enum FileBacking {
    Git(Arc<GitFileRecord>),
    Disk(Arc<dyn FileSystem>),
}

impl std::fmt::Debug for FileValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backing = match self.backing {
            FileBacking::Git(_) => "git",
            FileBacking::Disk(_) => "disk",
        };
        f.debug_struct("FileValue")
            .field("path", &self.path)
            .field("backing", &backing)
            .finish()
    }
}

/// A single-parameter closure capturing its defining scope by id.
#[derive(Debug, Clone)]
pub struct ClosureValue {
    pub param: String,
    pub body: Arc<Expr>,
    pub scope: ScopeId,
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::File(a), Value::File(b)) => a.path == b.path,
            // Closures have no useful identity.
            _ => false,
        }
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Number(_) => "number",
            Value::Bool(_) => "bool",
            Value::Null => "null",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::File(_) => "file",
            Value::Closure(_) => "closure",
        }
    }

    /// Only `false` and `null` are falsy. Empty strings, zero, and empty
    /// arrays count as truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Bool(false) | Value::Null)
    }

    pub fn as_number(&self, span: impl IntoOptionSpan) -> Result<f64, EvalError> {
        match self {
            Value::Number(n) => Ok(*n),
            other => Err(EvalError::new(
                EvalErrorKind::TypeMismatch,
                format!("expected a number, got {}", other.type_name()),
                span.into_option_span(),
            )),
        }
    }

    pub fn as_str(&self, span: impl IntoOptionSpan) -> Result<&str, EvalError> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(EvalError::new(
                EvalErrorKind::TypeMismatch,
                format!("expected a string, got {}", other.type_name()),
                span.into_option_span(),
            )),
        }
    }

    /// Canonical text form, also used by string interpolation. Whole
    /// numbers render without a fraction, arrays comma-join their items.
    pub fn display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            Value::Bool(b) => b.to_string(),
            Value::Null => "null".to_string(),
            Value::Array(items) => items
                .iter()
                .map(|v| v.display())
                .collect::<Vec<_>>()
                .join(", "),
            Value::Object(obj) => format!("<{}>", obj.type_name),
            Value::File(file) => file.path.clone(),
            Value::Closure(_) => "<closure>".to_string(),
        }
    }

    pub fn equals(&self, other: &Value) -> bool {
        self == other
    }

    /// Ordering for `<`, `<=`, `>`, `>=`. Defined for number pairs and
    /// string pairs only.
    pub fn compare(&self, other: &Value, span: &Span) -> Result<std::cmp::Ordering, EvalError> {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => Ok(a
                .partial_cmp(b)
                .unwrap_or(std::cmp::Ordering::Equal)),
            (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
            (a, b) => Err(EvalError::new(
                EvalErrorKind::TypeMismatch,
                format!("cannot order {} against {}", a.type_name(), b.type_name()),
                Some(*span),
            )),
        }
    }
}

// Property access tables.
impl Value {
    pub fn get_property(&self, name: &str, span: &Span) -> Result<Value, EvalError> {
        match self {
            Value::Object(obj) => obj.get(name).cloned().ok_or_else(|| {
                EvalError::new(
                    EvalErrorKind::NoSuchMember,
                    format!("no property '{}' on {}", name, obj.type_name),
                    Some(*span),
                )
            }),
            Value::String(s) => string_property(s, name, span),
            Value::Array(items) => array_property(items, name, span),
            Value::File(file) => file.property(name, span),
            other => Err(EvalError::new(
                EvalErrorKind::NoSuchMember,
                format!("{} has no properties", other.type_name()),
                Some(*span),
            )),
        }
    }

    /// Dispatches methods that do not take closures. Closure-driven array
    /// methods (`filter`, `map`, ...) live in the interpreter, which can
    /// invoke the closure body.
    pub fn call_method(&self, name: &str, args: &[Value], span: &Span) -> Result<Value, EvalError> {
        match self {
            Value::String(s) => string_method(s, name, args, span),
            Value::Number(n) => number_method(*n, name, args, span),
            Value::Array(items) => array_method(items, name, args, span),
            Value::File(file) => file.call(name, args, span),
            other => Err(EvalError::new(
                EvalErrorKind::NoSuchMember,
                format!("cannot call '{}' on {}", name, other.type_name()),
                Some(*span),
            )),
        }
    }
}

impl FileValue {
    pub fn from_record(record: Arc<GitFileRecord>) -> Value {
        Value::File(FileValue {
            path: record.path.clone(),
            backing: FileBacking::Git(record),
        })
    }

    pub fn from_disk(path: impl Into<String>, fs: Arc<dyn FileSystem>) -> Value {
        Value::File(FileValue {
            path: path.into(),
            backing: FileBacking::Disk(fs),
        })
    }

    fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    fn extension(&self) -> &str {
        self.name().rsplit_once('.').map(|(_, e)| e).unwrap_or("")
    }

    fn basename(&self) -> String {
        std::path::Path::new(&self.path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_string()
    }

    fn dirname(&self) -> String {
        std::path::Path::new(&self.path)
            .parent()
            .and_then(|p| p.to_str())
            .unwrap_or("")
            .to_string()
    }

    /// Properties and zero-argument methods share one table: `f.size` and
    /// `f.size()` read the same.
    pub fn property(&self, name: &str, span: &Span) -> Result<Value, EvalError> {
        match name {
            "path" => return Ok(Value::String(self.path.clone())),
            "name" => return Ok(Value::String(self.name().to_string())),
            "extension" | "ext" => return Ok(Value::String(self.extension().to_string())),
            "basename" => return Ok(Value::String(self.basename())),
            "dirname" => return Ok(Value::String(self.dirname())),
            _ => {}
        }

        match &self.backing {
            FileBacking::Git(record) => match name {
                "size" => Ok(Value::Number(record.size as f64)),
                "lines" => Ok(Value::Number(record.lines() as f64)),
                "content" => Ok(record
                    .content
                    .clone()
                    .map(Value::String)
                    .unwrap_or(Value::Null)),
                "diff" => Ok(record
                    .diff
                    .clone()
                    .map(Value::String)
                    .unwrap_or(Value::Null)),
                "exists" => Ok(Value::Bool(record.status != gatekeep_git::FileStatus::Deleted)),
                "is_file" => Ok(Value::Bool(record.status != gatekeep_git::FileStatus::Deleted)),
                "status" => Ok(Value::String(record.status.as_str().to_string())),
                "additions" => Ok(Value::Number(record.additions as f64)),
                "deletions" => Ok(Value::Number(record.deletions as f64)),
                _ => Err(no_file_member(name, span)),
            },
            FileBacking::Disk(fs) => match name {
                "size" => Ok(Value::Number(fs.size(&self.path).map_err(|e| {
                    EvalError::io(format!("cannot stat {}: {}", self.path, e), span)
                })? as f64)),
                "lines" => {
                    let content = self.read(fs, span)?;
                    Ok(Value::Number(content.lines().count() as f64))
                }
                "content" => Ok(Value::String(self.read(fs, span)?)),
                // Disk handles have no staged change attached.
                "diff" => Ok(Value::Null),
                "exists" => Ok(Value::Bool(fs.exists(&self.path))),
                "is_file" => Ok(Value::Bool(fs.is_file(&self.path))),
                "status" => Ok(Value::String("disk".to_string())),
                _ => Err(no_file_member(name, span)),
            },
        }
    }

    /// Method dispatch. Path membership tests take an argument; anything
    /// else falls through to the property table as a zero-argument call.
    pub fn call(&self, name: &str, args: &[Value], span: &Span) -> Result<Value, EvalError> {
        match name {
            "contains" => {
                expect_arity(name, args, 1, span)?;
                Ok(Value::Bool(self.path.contains(args[0].as_str(span)?)))
            }
            "starts_with" => {
                expect_arity(name, args, 1, span)?;
                Ok(Value::Bool(self.path.starts_with(args[0].as_str(span)?)))
            }
            "ends_with" => {
                expect_arity(name, args, 1, span)?;
                Ok(Value::Bool(self.path.ends_with(args[0].as_str(span)?)))
            }
            _ => {
                expect_arity(name, args, 0, span)?;
                self.property(name, span)
            }
        }
    }

    fn read(&self, fs: &Arc<dyn FileSystem>, span: &Span) -> Result<String, EvalError> {
        fs.read_to_string(&self.path)
            .map_err(|e| EvalError::io(format!("cannot read {}: {}", self.path, e), span))
    }
}

fn no_file_member(name: &str, span: &Span) -> EvalError {
    EvalError::new(
        EvalErrorKind::NoSuchMember,
        format!("no property '{}' on file", name),
        Some(*span),
    )
}

fn string_property(s: &str, name: &str, span: &Span) -> Result<Value, EvalError> {
    match name {
        "length" => Ok(Value::Number(s.chars().count() as f64)),
        _ => bail_eval!(
            EvalErrorKind::NoSuchMember,
            span,
            "no property '{}' on string",
            name
        ),
    }
}

fn array_property(items: &[Value], name: &str, span: &Span) -> Result<Value, EvalError> {
    match name {
        "length" => Ok(Value::Number(items.len() as f64)),
        _ => bail_eval!(
            EvalErrorKind::NoSuchMember,
            span,
            "no property '{}' on array",
            name
        ),
    }
}

fn expect_arity(
    method: &str,
    args: &[Value],
    want: usize,
    span: &Span,
) -> Result<(), EvalError> {
    if args.len() != want {
        bail_eval!(
            EvalErrorKind::TypeMismatch,
            span,
            "{}() expects {} argument{}, got {}",
            method,
            want,
            if want == 1 { "" } else { "s" },
            args.len()
        );
    }
    Ok(())
}

fn string_method(s: &str, name: &str, args: &[Value], span: &Span) -> Result<Value, EvalError> {
    match name {
        "length" | "len" => {
            expect_arity(name, args, 0, span)?;
            Ok(Value::Number(s.chars().count() as f64))
        }
        "is_empty" => {
            expect_arity(name, args, 0, span)?;
            Ok(Value::Bool(s.is_empty()))
        }
        "upper" | "to_uppercase" => {
            expect_arity(name, args, 0, span)?;
            Ok(Value::String(s.to_uppercase()))
        }
        "lower" | "to_lowercase" => {
            expect_arity(name, args, 0, span)?;
            Ok(Value::String(s.to_lowercase()))
        }
        "trim" => {
            expect_arity(name, args, 0, span)?;
            Ok(Value::String(s.trim().to_string()))
        }
        "contains" => {
            expect_arity(name, args, 1, span)?;
            Ok(Value::Bool(s.contains(args[0].as_str(span)?)))
        }
        "starts_with" => {
            expect_arity(name, args, 1, span)?;
            Ok(Value::Bool(s.starts_with(args[0].as_str(span)?)))
        }
        "ends_with" => {
            expect_arity(name, args, 1, span)?;
            Ok(Value::Bool(s.ends_with(args[0].as_str(span)?)))
        }
        "matches" => {
            expect_arity(name, args, 1, span)?;
            let pattern = args[0].as_str(span)?;
            let regex = regex::Regex::new(pattern).map_err(|e| {
                EvalError::new(
                    EvalErrorKind::TypeMismatch,
                    format!("invalid regex '{}': {}", pattern, e),
                    Some(*span),
                )
            })?;
            Ok(Value::Bool(regex.is_match(s)))
        }
        "replace" => {
            expect_arity(name, args, 2, span)?;
            let from = args[0].as_str(span)?;
            let to = args[1].as_str(span)?;
            Ok(Value::String(s.replace(from, to)))
        }
        "split" => {
            expect_arity(name, args, 1, span)?;
            let sep = args[0].as_str(span)?;
            Ok(Value::Array(
                s.split(sep).map(|p| Value::String(p.to_string())).collect(),
            ))
        }
        _ => bail_eval!(
            EvalErrorKind::NoSuchMember,
            span,
            "no method '{}' on string",
            name
        ),
    }
}

fn number_method(n: f64, name: &str, args: &[Value], span: &Span) -> Result<Value, EvalError> {
    expect_arity(name, args, 0, span)?;
    match name {
        "abs" => Ok(Value::Number(n.abs())),
        "floor" => Ok(Value::Number(n.floor())),
        "ceil" => Ok(Value::Number(n.ceil())),
        "round" => Ok(Value::Number(n.round())),
        _ => bail_eval!(
            EvalErrorKind::NoSuchMember,
            span,
            "no method '{}' on number",
            name
        ),
    }
}

fn array_method(
    items: &[Value],
    name: &str,
    args: &[Value],
    span: &Span,
) -> Result<Value, EvalError> {
    match name {
        "length" | "len" => {
            expect_arity(name, args, 0, span)?;
            Ok(Value::Number(items.len() as f64))
        }
        "is_empty" => {
            expect_arity(name, args, 0, span)?;
            Ok(Value::Bool(items.is_empty()))
        }
        "first" => {
            expect_arity(name, args, 0, span)?;
            Ok(items.first().cloned().unwrap_or(Value::Null))
        }
        "last" => {
            expect_arity(name, args, 0, span)?;
            Ok(items.last().cloned().unwrap_or(Value::Null))
        }
        "contains" => {
            expect_arity(name, args, 1, span)?;
            Ok(Value::Bool(items.iter().any(|v| v.equals(&args[0]))))
        }
        "join" => {
            let sep = match args.first() {
                Some(v) => v.as_str(span)?.to_string(),
                None => ", ".to_string(),
            };
            Ok(Value::String(
                items
                    .iter()
                    .map(|v| v.display())
                    .collect::<Vec<_>>()
                    .join(&sep),
            ))
        }
        "reverse" => {
            expect_arity(name, args, 0, span)?;
            let mut out = items.to_vec();
            out.reverse();
            Ok(Value::Array(out))
        }
        "sort" => {
            expect_arity(name, args, 0, span)?;
            let mut out = items.to_vec();
            out.sort_by(|a, b| match (a, b) {
                (Value::Number(x), Value::Number(y)) => {
                    x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal)
                }
                (Value::String(x), Value::String(y)) => x.cmp(y),
                _ => std::cmp::Ordering::Equal,
            });
            Ok(Value::Array(out))
        }
        "sum" => {
            expect_arity(name, args, 0, span)?;
            let mut total = 0.0;
            for item in items {
                total += item.as_number(span)?;
            }
            Ok(Value::Number(total))
        }
        // Closure-taking methods are resolved by the interpreter.
        "filter" | "map" | "find" | "any" | "all" | "count" => bail_eval!(
            EvalErrorKind::TypeMismatch,
            span,
            "{}() expects a closure argument",
            name
        ),
        _ => bail_eval!(
            EvalErrorKind::NoSuchMember,
            span,
            "no method '{}' on array",
            name
        ),
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> Span {
        Span::new(1, 1, 0, 1)
    }

    #[test]
    fn only_false_and_null_are_falsy() {
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(Value::Number(0.0).is_truthy());
        assert!(Value::String(String::new()).is_truthy());
        assert!(Value::Array(vec![]).is_truthy());
    }

    #[test]
    fn display_trims_whole_numbers() {
        assert_eq!(Value::Number(5.0).display(), "5");
        assert_eq!(Value::Number(2.5).display(), "2.5");
        assert_eq!(Value::Number(-3.0).display(), "-3");
    }

    #[test]
    fn display_joins_arrays() {
        let arr = Value::Array(vec![
            Value::String("a".into()),
            Value::Number(2.0),
            Value::Bool(true),
        ]);
        assert_eq!(arr.display(), "a, 2, true");
    }

    #[test]
    fn compare_rejects_mixed_types() {
        let err = Value::Number(1.0)
            .compare(&Value::String("x".into()), &span())
            .unwrap_err();
        assert_eq!(err.kind, EvalErrorKind::TypeMismatch);
    }

    #[test]
    fn string_methods() {
        let s = Value::String("  Hello.rs  ".into());
        let sp = span();
        assert_eq!(
            s.call_method("trim", &[], &sp).unwrap(),
            Value::String("Hello.rs".into())
        );
        let trimmed = Value::String("Hello.rs".into());
        assert_eq!(
            trimmed
                .call_method("ends_with", &[Value::String(".rs".into())], &sp)
                .unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            trimmed
                .call_method("matches", &[Value::String("^[A-Z]".into())], &sp)
                .unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn unknown_member_is_no_such_member() {
        let err = Value::String("x".into())
            .call_method("explode", &[], &span())
            .unwrap_err();
        assert_eq!(err.kind, EvalErrorKind::NoSuchMember);
    }

    #[test]
    fn array_first_on_empty_is_null() {
        let empty = Value::Array(vec![]);
        assert_eq!(empty.call_method("first", &[], &span()).unwrap(), Value::Null);
    }

    #[test]
    fn closure_methods_need_interpreter() {
        let arr = Value::Array(vec![Value::Number(1.0)]);
        let err = arr.call_method("filter", &[], &span()).unwrap_err();
        assert!(err.message.contains("closure"));
    }

    fn staged_file(path: &str) -> Value {
        FileValue::from_record(Arc::new(GitFileRecord {
            path: path.into(),
            status: gatekeep_git::FileStatus::Staged,
            size: 24,
            additions: 3,
            deletions: 1,
            content: Some("line one\nline two\n".into()),
            diff: Some("+line two\n".into()),
        }))
    }

    #[test]
    fn git_file_properties() {
        let file = staged_file("src/lib.rs");
        let sp = span();
        assert_eq!(
            file.get_property("name", &sp).unwrap(),
            Value::String("lib.rs".into())
        );
        assert_eq!(
            file.get_property("extension", &sp).unwrap(),
            Value::String("rs".into())
        );
        assert_eq!(
            file.get_property("basename", &sp).unwrap(),
            Value::String("lib".into())
        );
        assert_eq!(
            file.get_property("dirname", &sp).unwrap(),
            Value::String("src".into())
        );
        assert_eq!(file.get_property("size", &sp).unwrap(), Value::Number(24.0));
        assert_eq!(file.get_property("lines", &sp).unwrap(), Value::Number(2.0));
        assert_eq!(
            file.get_property("diff", &sp).unwrap(),
            Value::String("+line two\n".into())
        );
    }

    #[test]
    fn file_path_membership_methods() {
        let file = staged_file("src/auth/login.rs");
        let sp = span();
        assert_eq!(
            file.call_method("contains", &[Value::String("auth".into())], &sp)
                .unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            file.call_method("ends_with", &[Value::String(".rs".into())], &sp)
                .unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            file.call_method("starts_with", &[Value::String("tests/".into())], &sp)
                .unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            file.call_method("is_file", &[], &sp).unwrap(),
            Value::Bool(true)
        );
        // A zero-argument method rejects stray arguments.
        let err = file
            .call_method("exists", &[Value::Bool(true)], &sp)
            .unwrap_err();
        assert_eq!(err.kind, EvalErrorKind::TypeMismatch);
    }
}
