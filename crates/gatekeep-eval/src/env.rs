//! Lexically scoped variable environment.
//!
//! Scopes form an arena of frames indexed by [`ScopeId`]. A frame never
//! moves once pushed, so a closure can capture its defining scope as a
//! plain id and the whole environment stays `Clone` for `parallel`
//! snapshots.

use crate::value::Value;
use rustc_hash::FxHashMap;

/// Index of a frame in the [`Environment`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub(crate) usize);

#[derive(Debug, Clone, Default)]
struct Frame {
    vars: FxHashMap<String, Value>,
    parent: Option<ScopeId>,
}

/// Arena of scope frames. Lookup walks the parent chain; definition always
/// writes the given frame, so `let` shadows instead of mutating outer
/// bindings.
#[derive(Debug, Clone)]
pub struct Environment {
    frames: Vec<Frame>,
}

impl Environment {
    /// Creates an environment containing only the root scope.
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::default()],
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    /// Pushes a new child frame and returns its id.
    pub fn push_scope(&mut self, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.frames.len());
        self.frames.push(Frame {
            vars: FxHashMap::default(),
            parent: Some(parent),
        });
        id
    }

    /// Binds `name` in exactly the given frame.
    pub fn define(&mut self, scope: ScopeId, name: impl Into<String>, value: Value) {
        self.frames[scope.0].vars.insert(name.into(), value);
    }

    /// Resolves `name` by walking from `scope` to the root.
    pub fn get(&self, scope: ScopeId, name: &str) -> Option<&Value> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let frame = &self.frames[id.0];
            if let Some(value) = frame.vars.get(name) {
                return Some(value);
            }
            current = frame.parent;
        }
        None
    }

    /// True if `name` resolves from `scope`.
    pub fn is_defined(&self, scope: ScopeId, name: &str) -> bool {
        self.get(scope, name).is_some()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_lookup() {
        let mut env = Environment::new();
        let root = env.root();
        env.define(root, "x", Value::Number(1.0));
        assert_eq!(env.get(root, "x"), Some(&Value::Number(1.0)));
        assert!(env.get(root, "y").is_none());
    }

    #[test]
    fn child_sees_parent_bindings() {
        let mut env = Environment::new();
        let root = env.root();
        env.define(root, "x", Value::Number(1.0));
        let child = env.push_scope(root);
        assert_eq!(env.get(child, "x"), Some(&Value::Number(1.0)));
    }

    #[test]
    fn child_shadows_without_mutating_parent() {
        let mut env = Environment::new();
        let root = env.root();
        env.define(root, "x", Value::Number(1.0));
        let child = env.push_scope(root);
        env.define(child, "x", Value::Number(2.0));
        assert_eq!(env.get(child, "x"), Some(&Value::Number(2.0)));
        assert_eq!(env.get(root, "x"), Some(&Value::Number(1.0)));
    }

    #[test]
    fn sibling_scopes_are_isolated() {
        let mut env = Environment::new();
        let root = env.root();
        let a = env.push_scope(root);
        let b = env.push_scope(root);
        env.define(a, "x", Value::Bool(true));
        assert!(env.get(b, "x").is_none());
    }

    #[test]
    fn captured_scope_survives_later_pushes() {
        let mut env = Environment::new();
        let root = env.root();
        let captured = env.push_scope(root);
        env.define(captured, "n", Value::Number(7.0));
        for _ in 0..10 {
            env.push_scope(root);
        }
        assert_eq!(env.get(captured, "n"), Some(&Value::Number(7.0)));
    }
}
