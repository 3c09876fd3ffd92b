//! Pre-execution resolution of imports, packages, and macros.
//!
//! Before any statement runs, the resolver fetches every `import` and
//! `use` target, parses it, and folds all macro definitions into one
//! immutable [`MacroRegistry`]. Execution never mutates the registry, so
//! `parallel` tasks can share it freely. Unknown macros, wrong arities,
//! and import cycles are all caught here, where the run can still end as
//! `Errored` without half the checks having executed.

use crate::fetcher::{ImportTarget, SourceFetcher};
use gatekeep_syntax::{
    Diagnostic, MatchArm, Span, Stmt, StmtKind, parse, tokenize,
};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::fmt;

#[derive(Debug, Clone)]
pub enum ResolveError {
    /// An `import` or `use` target could not be fetched.
    NotFound { target: String, cause: String },
    /// The import graph contains a cycle; `chain` lists it in order.
    CircularImport { chain: Vec<String> },
    /// An imported file failed to lex or parse.
    Syntax { target: String, message: String },
    /// A macro call names a macro no unit defines.
    UnknownMacro {
        namespace: Option<String>,
        name: String,
        span: Span,
    },
    /// A macro call passes the wrong number of arguments.
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
        span: Span,
    },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::NotFound { target, cause } => {
                write!(f, "cannot load '{}': {}", target, cause)
            }
            ResolveError::CircularImport { chain } => {
                write!(f, "circular import: {}", chain.join(" -> "))
            }
            ResolveError::Syntax { target, message } => {
                write!(f, "in '{}': {}", target, message)
            }
            ResolveError::UnknownMacro {
                namespace, name, ..
            } => match namespace {
                Some(ns) => write!(f, "unknown macro '@{}.{}'", ns, name),
                None => write!(f, "unknown macro '@{}'", name),
            },
            ResolveError::ArityMismatch {
                name,
                expected,
                got,
                ..
            } => write!(
                f,
                "macro '{}' takes {} argument{}, got {}",
                name,
                expected,
                if *expected == 1 { "" } else { "s" },
                got
            ),
        }
    }
}

impl std::error::Error for ResolveError {}

#[derive(Debug, Clone)]
pub struct MacroDef {
    /// Namespace the macro was registered under; unqualified calls in its
    /// body resolve against this before falling back to the root space.
    pub namespace: Option<String>,
    pub params: SmallVec<[String; 4]>,
    pub body: Vec<Stmt>,
}

/// Immutable macro table keyed by `(namespace, name)`.
#[derive(Debug, Clone, Default)]
pub struct MacroRegistry {
    macros: FxHashMap<(Option<String>, String), MacroDef>,
}

impl MacroRegistry {
    pub fn get(&self, namespace: Option<&str>, name: &str) -> Option<&MacroDef> {
        self.macros
            .get(&(namespace.map(str::to_string), name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }
}

/// One parsed source together with the namespace its macros landed in.
struct Unit<'a> {
    namespace: Option<String>,
    statements: &'a [Stmt],
}

pub struct Resolver<'a> {
    fetcher: &'a dyn SourceFetcher,
    registry: MacroRegistry,
    /// DFS stack of targets currently being loaded, for cycle reporting.
    loading: Vec<String>,
    /// Parsed imported programs; kept alive so units can borrow them.
    parsed: Vec<(Option<String>, Vec<Stmt>)>,
}

impl<'a> Resolver<'a> {
    pub fn new(fetcher: &'a dyn SourceFetcher) -> Self {
        Self {
            fetcher,
            registry: MacroRegistry::default(),
            loading: Vec::new(),
            parsed: Vec::new(),
        }
    }

    /// Resolves a program: loads its import graph, registers every macro,
    /// and validates every macro call.
    pub fn resolve(mut self, program: &[Stmt]) -> Result<MacroRegistry, ResolveError> {
        self.collect(program, None)?;

        let mut units: Vec<Unit<'_>> = vec![Unit {
            namespace: None,
            statements: program,
        }];
        for (namespace, statements) in &self.parsed {
            units.push(Unit {
                namespace: namespace.clone(),
                statements,
            });
        }

        for unit in &units {
            validate_calls(&self.registry, unit.statements, unit.namespace.as_deref())?;
        }

        Ok(self.registry)
    }

    /// Registers macros from `statements` under `namespace`, following
    /// nested imports depth-first.
    fn collect(
        &mut self,
        statements: &[Stmt],
        namespace: Option<&str>,
    ) -> Result<(), ResolveError> {
        for stmt in statements {
            match &stmt.kind {
                StmtKind::MacroDef { name, params, body } => {
                    self.registry.macros.insert(
                        (namespace.map(str::to_string), name.clone()),
                        MacroDef {
                            namespace: namespace.map(str::to_string),
                            params: params.clone(),
                            body: body.clone(),
                        },
                    );
                }
                StmtKind::Import { path, alias } => {
                    let target = ImportTarget::Path(path.clone());
                    // Macros of an aliased import go under the alias;
                    // without one they merge into the importer's space.
                    let ns = alias.as_deref().or(namespace).map(str::to_string);
                    self.load(target, ns)?;
                }
                StmtKind::Use { package, alias } => {
                    let target = ImportTarget::Package(package.clone());
                    let ns = alias
                        .clone()
                        .unwrap_or_else(|| default_package_namespace(package));
                    self.load(target, Some(ns))?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn load(&mut self, target: ImportTarget, namespace: Option<String>) -> Result<(), ResolveError> {
        let key = target.key();
        if self.loading.contains(&key) {
            let mut chain = self.loading.clone();
            chain.push(key);
            return Err(ResolveError::CircularImport { chain });
        }

        let source = self
            .fetcher
            .fetch(&target)
            .map_err(|e| ResolveError::NotFound {
                target: key.clone(),
                cause: e.to_string(),
            })?;

        let statements = parse_source(&key, &source)?;

        self.loading.push(key);
        self.collect(&statements, namespace.as_deref())?;
        self.loading.pop();

        self.parsed.push((namespace, statements));
        Ok(())
    }
}

/// `use "@shared/quality"` without an alias namespaces as `quality`.
fn default_package_namespace(package: &str) -> String {
    package
        .trim_start_matches('@')
        .rsplit('/')
        .next()
        .unwrap_or(package)
        .to_string()
}

fn parse_source(target: &str, source: &str) -> Result<Vec<Stmt>, ResolveError> {
    let tokens = tokenize(source).map_err(|e| ResolveError::Syntax {
        target: target.to_string(),
        message: Diagnostic::lex(source, &e).to_string(),
    })?;
    parse(tokens).map_err(|e| ResolveError::Syntax {
        target: target.to_string(),
        message: Diagnostic::parse(source, &e).to_string(),
    })
}

/// Checks every macro call in `statements` against the registry. Calls
/// without a namespace first try the unit's own namespace, then the
/// root namespace.
fn validate_calls(
    registry: &MacroRegistry,
    statements: &[Stmt],
    unit_ns: Option<&str>,
) -> Result<(), ResolveError> {
    for stmt in statements {
        match &stmt.kind {
            StmtKind::MacroCall {
                namespace,
                name,
                args,
            } => {
                let def = match namespace {
                    Some(ns) => registry.get(Some(ns), name),
                    None => registry
                        .get(unit_ns, name)
                        .or_else(|| registry.get(None, name)),
                };
                let Some(def) = def else {
                    return Err(ResolveError::UnknownMacro {
                        namespace: namespace.clone(),
                        name: name.clone(),
                        span: stmt.span,
                    });
                };
                if def.params.len() != args.len() {
                    return Err(ResolveError::ArityMismatch {
                        name: name.clone(),
                        expected: def.params.len(),
                        got: args.len(),
                        span: stmt.span,
                    });
                }
            }
            StmtKind::If {
                then_body,
                else_body,
                ..
            } => {
                validate_calls(registry, then_body, unit_ns)?;
                if let Some(body) = else_body {
                    validate_calls(registry, body, unit_ns)?;
                }
            }
            StmtKind::Foreach { body, .. }
            | StmtKind::Parallel { body }
            | StmtKind::Group { body, .. }
            | StmtKind::MacroDef { body, .. } => {
                validate_calls(registry, body, unit_ns)?;
            }
            StmtKind::Match { arms, .. } => {
                for MatchArm { body, .. } in arms {
                    validate_calls(registry, body, unit_ns)?;
                }
            }
            StmtKind::TryCatch {
                body, catch_body, ..
            } => {
                validate_calls(registry, body, unit_ns)?;
                validate_calls(registry, catch_body, unit_ns)?;
            }
            _ => {}
        }
    }
    Ok(())
}
