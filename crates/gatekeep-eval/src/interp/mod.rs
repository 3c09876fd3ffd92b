//! Tree-walking interpreter for gatekeep programs.
//!
//! Submodules:
//! - [`expressions`]: expression evaluation and operator dispatch
//! - [`parallel`]: bounded-concurrency scheduler for `parallel` blocks

mod expressions;
mod parallel;

use crate::config::Config;
use crate::context;
use crate::env::{Environment, ScopeId};
use crate::error::{EvalError, EvalErrorKind};
use crate::http::{HttpClient, ReqwestClient};
use crate::report::{Outcome, OutcomeKind, Report};
use crate::resolver::MacroRegistry;
use crate::services::{FileSystem, LocalFileSystem, ProcessRunner, ShellRunner};
use crate::value::Value;
use gatekeep_git::GitSnapshot;
use gatekeep_syntax::{MatchPattern, OutcomeAction, Severity, Stmt, StmtKind};
use std::sync::Arc;

/// Control-flow result of executing a statement or block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Normal,
    Break,
    Continue,
}

/// External collaborators, shareable across `parallel` tasks.
#[derive(Clone)]
pub struct Services {
    pub process: Arc<dyn ProcessRunner>,
    pub fs: Arc<dyn FileSystem>,
    pub http: Arc<dyn HttpClient>,
}

impl Services {
    /// Real process, filesystem, and HTTP implementations.
    pub fn real(auth_token: Option<String>) -> Self {
        Self {
            process: Arc::new(ShellRunner),
            fs: Arc::new(LocalFileSystem),
            http: Arc::new(ReqwestClient::new(auth_token)),
        }
    }
}

#[derive(Clone)]
struct GroupFrame {
    name: String,
    severity: Severity,
}

/// The tree-walking interpreter.
///
/// Build one with [`Interpreter::new`], configure it with the `with_*`
/// builders, then call [`run`](Interpreter::run) on a parsed program.
/// Outcomes accumulate in [`report`](Interpreter::report); printed lines
/// are buffered in order in [`output`](Interpreter::output).
#[derive(Clone)]
pub struct Interpreter {
    pub(crate) env: Environment,
    registry: Arc<MacroRegistry>,
    pub(crate) services: Services,
    pub(crate) config: Arc<Config>,
    report: Report,
    output: Vec<String>,
    /// Parallel tasks buffer output instead of printing directly.
    buffered: bool,
    group_stack: Vec<GroupFrame>,
    /// Namespace of the macro currently executing, for unqualified
    /// macro calls inside imported macro bodies.
    macro_ns: Option<String>,
}

impl Interpreter {
    pub fn new(registry: MacroRegistry) -> Self {
        let mut env = Environment::new();
        let root = env.root();
        env.define(root, "http", context::http_object());

        Self {
            env,
            registry: Arc::new(registry),
            services: Services::real(None),
            config: Arc::new(Config::default()),
            report: Report::new(),
            output: Vec::new(),
            buffered: false,
            group_stack: Vec::new(),
            macro_ns: None,
        }
    }

    pub fn with_services(mut self, services: Services) -> Self {
        self.services = services;
        self
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Arc::new(config);
        self
    }

    /// Seeds the `git` context object from a snapshot. Call after
    /// `with_services` so `git.files.all` reads through the right
    /// filesystem.
    pub fn with_git(mut self, snapshot: GitSnapshot) -> Self {
        let root = self.env.root();
        let git = context::git_object(&snapshot, self.services.fs.clone());
        self.env.define(root, "git", git);
        self
    }

    pub fn report(&self) -> &Report {
        &self.report
    }

    pub fn into_report(self) -> Report {
        self.report
    }

    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// Runs a whole program. A non-zero `run` exit that no `try` caught
    /// becomes an implicit block outcome and execution continues with the
    /// next top-level statement; any other uncaught error aborts the run.
    pub fn run(&mut self, program: &[Stmt]) -> Result<(), EvalError> {
        let root = self.env.root();
        for stmt in program {
            match self.exec_stmt(stmt, root) {
                Ok(_) => {}
                Err(e) if matches!(e.kind, EvalErrorKind::NonZeroExit { .. }) => {
                    self.push_outcome(OutcomeKind::Block, Some(e.message.clone()), stmt);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    pub(crate) fn emit(&mut self, line: String) {
        if !self.buffered {
            println!("{}", line);
        }
        self.output.push(line);
    }

    /// Records an outcome, remapping its kind through the enclosing
    /// group's severity.
    fn push_outcome(&mut self, kind: OutcomeKind, message: Option<String>, stmt: &Stmt) {
        let (kind, group) = match self.group_stack.last() {
            Some(frame) => (remap_kind(kind, frame.severity), Some(frame.name.clone())),
            None => (kind, None),
        };
        self.report.push(Outcome {
            kind,
            message,
            origin: stmt.id,
            span: stmt.span,
            group,
        });
    }

    /// Executes statements in order; `break`/`continue` stop the block and
    /// bubble up to the nearest loop.
    pub(crate) fn exec_block(&mut self, stmts: &[Stmt], scope: ScopeId) -> Result<Flow, EvalError> {
        for stmt in stmts {
            match self.exec_stmt(stmt, scope)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    pub(crate) fn exec_stmt(&mut self, stmt: &Stmt, scope: ScopeId) -> Result<Flow, EvalError> {
        match &stmt.kind {
            StmtKind::Print { message } => {
                let value = self.eval_expr(message, scope)?;
                let line = value.display();
                self.emit(line);
                Ok(Flow::Normal)
            }

            StmtKind::Let { name, value } => {
                let value = self.eval_expr(value, scope)?;
                self.env.define(scope, name.clone(), value);
                Ok(Flow::Normal)
            }

            StmtKind::Run { command } => {
                let value = self.eval_expr(command, scope)?;
                let command = value.as_str(&stmt.span)?.to_string();
                self.run_command(&command, stmt)?;
                Ok(Flow::Normal)
            }

            StmtKind::Outcome {
                action,
                condition,
                message,
            } => {
                let fired = match condition {
                    Some(cond) => self.eval_expr(cond, scope)?.is_truthy(),
                    None => true,
                };
                if fired {
                    let kind = match action {
                        OutcomeAction::Block => OutcomeKind::Block,
                        OutcomeAction::Warn => OutcomeKind::Warn,
                        OutcomeAction::Allow => OutcomeKind::Allow,
                    };
                    let message = message
                        .as_ref()
                        .map(|m| self.interpolate(m, scope, &stmt.span))
                        .transpose()?;
                    self.push_outcome(kind, message, stmt);
                }
                Ok(Flow::Normal)
            }

            StmtKind::If {
                condition,
                then_body,
                else_body,
            } => {
                let cond = self.eval_expr(condition, scope)?;
                if cond.is_truthy() {
                    let child = self.env.push_scope(scope);
                    self.exec_block(then_body, child)
                } else if let Some(else_body) = else_body {
                    let child = self.env.push_scope(scope);
                    self.exec_block(else_body, child)
                } else {
                    Ok(Flow::Normal)
                }
            }

            StmtKind::Foreach {
                collection,
                pattern,
                var,
                body,
            } => self.exec_foreach(collection, pattern.as_deref(), var, body, scope, stmt),

            StmtKind::Match { subject, arms } => {
                let value = self.eval_expr(subject, scope)?;
                for arm in arms {
                    let matched = match &arm.pattern {
                        MatchPattern::Glob(pattern) => {
                            glob_match(pattern, &value.display())
                        }
                        MatchPattern::Literal(expr) => {
                            let pattern = self.eval_expr(expr, scope)?;
                            value.equals(&pattern)
                        }
                        MatchPattern::Wildcard => true,
                    };
                    if matched {
                        let child = self.env.push_scope(scope);
                        return self.exec_block(&arm.body, child);
                    }
                }
                Ok(Flow::Normal)
            }

            StmtKind::Parallel { body } => self.exec_parallel(body, scope),

            StmtKind::Group {
                name,
                severity,
                enabled,
                body,
            } => self.exec_group(name, *severity, *enabled, body, scope, stmt),

            // Definitions were collected by the resolver; nothing runs here.
            StmtKind::MacroDef { .. } => Ok(Flow::Normal),

            StmtKind::MacroCall {
                namespace,
                name,
                args,
            } => self.exec_macro_call(namespace.as_deref(), name, args, scope, stmt),

            // Imports were resolved before execution.
            StmtKind::Import { .. } | StmtKind::Use { .. } => Ok(Flow::Normal),

            StmtKind::TryCatch {
                body,
                catch_var,
                catch_body,
            } => {
                let child = self.env.push_scope(scope);
                match self.exec_block(body, child) {
                    Ok(flow) => Ok(flow),
                    Err(e) => {
                        let catch_scope = self.env.push_scope(scope);
                        if let Some(var) = catch_var {
                            self.env
                                .define(catch_scope, var.clone(), context::error_object(&e));
                        }
                        self.exec_block(catch_body, catch_scope)
                    }
                }
            }

            StmtKind::Break => Ok(Flow::Break),
            StmtKind::Continue => Ok(Flow::Continue),
        }
    }

    fn run_command(&mut self, command: &str, stmt: &Stmt) -> Result<(), EvalError> {
        let output = self
            .services
            .process
            .run(command, self.config.command_timeout)?;

        if !output.stdout.is_empty() {
            for line in output.stdout.lines() {
                self.emit(line.to_string());
            }
        }

        if !output.success() {
            let detail = output.stderr.trim();
            let mut message = match output.code {
                Some(code) => format!("command '{}' exited with status {}", command, code),
                None => format!("command '{}' was killed by a signal", command),
            };
            if !detail.is_empty() {
                message.push_str(&format!(": {}", detail));
            }
            return Err(EvalError::new(
                EvalErrorKind::NonZeroExit { code: output.code },
                message,
                Some(stmt.span),
            ));
        }
        Ok(())
    }

    fn exec_foreach(
        &mut self,
        collection: &gatekeep_syntax::Expr,
        pattern: Option<&str>,
        var: &str,
        body: &[Stmt],
        scope: ScopeId,
        stmt: &Stmt,
    ) -> Result<Flow, EvalError> {
        let value = self.eval_expr(collection, scope)?;
        let Value::Array(items) = value else {
            return Err(EvalError::new(
                EvalErrorKind::TypeMismatch,
                format!("foreach expects an array, got {}", value.type_name()),
                Some(stmt.span),
            ));
        };

        for item in items {
            if let Some(pattern) = pattern {
                let subject = match &item {
                    Value::File(f) => f.path.clone(),
                    other => other.display(),
                };
                if !glob_match(pattern, &subject) {
                    continue;
                }
            }

            let child = self.env.push_scope(scope);
            self.env.define(child, var.to_string(), item);
            match self.exec_block(body, child)? {
                Flow::Break => break,
                Flow::Continue | Flow::Normal => {}
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_group(
        &mut self,
        name: &str,
        severity: Severity,
        enabled: bool,
        body: &[Stmt],
        scope: ScopeId,
        stmt: &Stmt,
    ) -> Result<Flow, EvalError> {
        if !enabled {
            return Ok(Flow::Normal);
        }

        self.group_stack.push(GroupFrame {
            name: name.to_string(),
            severity,
        });
        let before = self.report.outcomes.len();

        let child = self.env.push_scope(scope);
        let result = self.exec_block(body, child);

        match result {
            Ok(_) => {}
            Err(e) if matches!(e.kind, EvalErrorKind::NonZeroExit { .. }) => {
                self.push_outcome(OutcomeKind::Block, Some(e.message.clone()), stmt);
            }
            Err(e) => {
                self.group_stack.pop();
                return Err(e);
            }
        }

        let failed = self.report.outcomes[before..]
            .iter()
            .any(|o| matches!(o.kind, OutcomeKind::Block | OutcomeKind::Warn));
        self.group_stack.pop();

        if !failed {
            self.report.push(Outcome {
                kind: OutcomeKind::Pass,
                message: None,
                origin: stmt.id,
                span: stmt.span,
                group: Some(name.to_string()),
            });
        }
        Ok(Flow::Normal)
    }

    fn exec_macro_call(
        &mut self,
        namespace: Option<&str>,
        name: &str,
        args: &[gatekeep_syntax::Expr],
        scope: ScopeId,
        stmt: &Stmt,
    ) -> Result<Flow, EvalError> {
        let def = match namespace {
            Some(ns) => self.registry.get(Some(ns), name),
            None => self
                .registry
                .get(self.macro_ns.as_deref(), name)
                .or_else(|| self.registry.get(None, name)),
        };
        let Some(def) = def else {
            // The resolver already validated calls; this covers dynamic
            // paths the resolver could not see.
            return Err(EvalError::new(
                EvalErrorKind::UndefinedVariable,
                format!("unknown macro '@{}'", name),
                Some(stmt.span),
            ));
        };
        let def = def.clone();

        // Macro bodies see the root scope plus their parameters, not the
        // caller's locals.
        let macro_scope = self.env.push_scope(self.env.root());
        for (param, arg) in def.params.iter().zip(args) {
            let value = self.eval_expr(arg, scope)?;
            self.env.define(macro_scope, param.clone(), value);
        }

        let saved_ns = self.macro_ns.take();
        self.macro_ns = def.namespace.clone();
        let result = self.exec_block(&def.body, macro_scope);
        self.macro_ns = saved_ns;

        result?;
        Ok(Flow::Normal)
    }
}

fn remap_kind(kind: OutcomeKind, severity: Severity) -> OutcomeKind {
    match (severity, kind) {
        (Severity::Critical, kind) => kind,
        (Severity::Warning, OutcomeKind::Block) => OutcomeKind::Warn,
        (Severity::Warning, kind) => kind,
        (Severity::Info, OutcomeKind::Block | OutcomeKind::Warn) => OutcomeKind::Allow,
        (Severity::Info, kind) => kind,
    }
}

/// Full-string shell-style glob match: `*` spans any run, `?` one
/// character. Patterns without wildcards compare exactly.
pub(crate) fn glob_match(pattern: &str, subject: &str) -> bool {
    if !pattern.contains(['*', '?']) {
        return pattern == subject;
    }
    let mut regex = String::with_capacity(pattern.len() + 8);
    regex.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            other => regex.push_str(&regex::escape(&other.to_string())),
        }
    }
    regex.push('$');
    regex::Regex::new(&regex)
        .map(|re| re.is_match(subject))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::StaticFetcher;
    use crate::report::Verdict;
    use crate::resolver::Resolver;
    use gatekeep_syntax::{parse, tokenize};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Process runner that returns scripted results and records calls.
    pub(crate) struct ScriptedRunner {
        pub calls: Mutex<Vec<String>>,
        pub fail_on: Vec<String>,
    }

    impl ScriptedRunner {
        pub fn ok() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_on: Vec::new(),
            }
        }

        pub fn failing_on(command: &str) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_on: vec![command.to_string()],
            }
        }
    }

    impl ProcessRunner for ScriptedRunner {
        fn run(
            &self,
            command: &str,
            _timeout: Duration,
        ) -> Result<crate::services::ProcessOutput, EvalError> {
            self.calls.lock().unwrap().push(command.to_string());
            let fails = self.fail_on.iter().any(|f| f == command);
            Ok(crate::services::ProcessOutput {
                code: if fails { Some(1) } else { Some(0) },
                stdout: String::new(),
                stderr: String::new(),
            })
        }
    }

    impl Interpreter {
        /// Test helper: buffer output instead of printing.
        pub(crate) fn buffered(mut self) -> Self {
            self.buffered = true;
            self
        }
    }

    pub(crate) fn run_program(source: &str) -> Interpreter {
        run_program_with(source, ScriptedRunner::ok())
    }

    pub(crate) fn run_program_with(source: &str, runner: ScriptedRunner) -> Interpreter {
        run_program_sharing(source, Arc::new(runner))
    }

    /// Like `run_program_with`, but the caller keeps a handle on the
    /// runner to inspect recorded calls afterwards.
    pub(crate) fn run_program_sharing(source: &str, runner: Arc<ScriptedRunner>) -> Interpreter {
        let program = parse(tokenize(source).unwrap()).unwrap();
        let fetcher = StaticFetcher::new();
        let registry = Resolver::new(&fetcher).resolve(&program).unwrap();
        let mut services = Services::real(None);
        services.process = runner;
        let mut interp = Interpreter::new(registry)
            .with_services(services)
            .buffered();
        interp.run(&program).unwrap();
        interp
    }

    #[test]
    fn print_and_let() {
        let interp = run_program("let x = 2\nprint \"x is ${x}\"");
        assert_eq!(interp.output(), ["x is 2"]);
    }

    #[test]
    fn unconditional_block_blocks() {
        let interp = run_program("block \"nope\"\nprint \"still runs\"");
        assert_eq!(interp.report().verdict(), Verdict::Blocked);
        // Execution continues after a block; only the verdict is sticky.
        assert_eq!(interp.output(), ["still runs"]);
    }

    #[test]
    fn conditional_outcome_fires_on_truthy_only() {
        let interp = run_program("warn if 1 > 2\nwarn if 2 > 1 message \"yes\"");
        let warnings: Vec<_> = interp.report().warnings().collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].message.as_deref(), Some("yes"));
    }

    #[test]
    fn failing_run_becomes_implicit_block() {
        let interp = run_program_with(
            "run \"make lint\"\nprint \"after\"",
            ScriptedRunner::failing_on("make lint"),
        );
        assert_eq!(interp.report().verdict(), Verdict::Blocked);
        assert_eq!(interp.output(), ["after"]);
    }

    #[test]
    fn try_catch_catches_failing_run() {
        let interp = run_program_with(
            r#"try { run "make lint" } catch err { print err.message }"#,
            ScriptedRunner::failing_on("make lint"),
        );
        assert_eq!(interp.report().verdict(), Verdict::Passed);
        assert!(interp.output()[0].contains("make lint"));
    }

    #[test]
    fn disabled_group_runs_nothing() {
        let runner = Arc::new(ScriptedRunner::ok());
        let interp = run_program_sharing(
            r#"group lint disabled { run "make lint" }"#,
            runner.clone(),
        );
        assert!(interp.report().outcomes.is_empty());
        assert_eq!(interp.output().len(), 0);
        // The collaborator was never touched.
        assert!(runner.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn passing_group_records_pass() {
        let interp = run_program(r#"group checks critical { print "checking" }"#);
        let outcomes = &interp.report().outcomes;
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].kind, OutcomeKind::Pass);
        assert_eq!(outcomes[0].group.as_deref(), Some("checks"));
    }

    #[test]
    fn warning_group_downgrades_block() {
        let interp = run_program(r#"group style warning { block "tabs found" }"#);
        assert_eq!(interp.report().verdict(), Verdict::Warned);
    }

    #[test]
    fn info_group_is_verdict_neutral_but_recorded() {
        let interp = run_program(r#"group fyi info { block "just so you know" }"#);
        assert_eq!(interp.report().verdict(), Verdict::Passed);
        assert_eq!(interp.report().outcomes.len(), 1);
        assert_eq!(interp.report().outcomes[0].kind, OutcomeKind::Allow);
    }

    #[test]
    fn foreach_with_break_and_continue() {
        let interp = run_program(
            r#"
            foreach [1, 2, 3, 4] {
                n in
                if n == 2 { continue }
                if n == 4 { break }
                print n
            }
            "#,
        );
        assert_eq!(interp.output(), ["1", "3"]);
    }

    #[test]
    fn foreach_matching_filters_strings() {
        let interp = run_program(
            r#"
            foreach ["a.rs", "b.txt", "c.rs"] matching "*.rs" {
                f in
                print f
            }
            "#,
        );
        assert_eq!(interp.output(), ["a.rs", "c.rs"]);
    }

    #[test]
    fn match_first_arm_wins() {
        let interp = run_program(
            r#"
            let branch = "feature/login"
            match branch {
                "main" -> print "main"
                "feature/*" -> print "feature"
                _ -> print "other"
            }
            "#,
        );
        assert_eq!(interp.output(), ["feature"]);
    }

    #[test]
    fn match_literal_and_wildcard() {
        let interp = run_program(
            r#"
            match 3 {
                1 + 1 -> print "two"
                _ -> print "fallthrough"
            }
            "#,
        );
        assert_eq!(interp.output(), ["fallthrough"]);
    }

    #[test]
    fn let_shadows_lexically() {
        let interp = run_program(
            r#"
            let x = "outer"
            if true {
                let x = "inner"
                print x
            }
            print x
            "#,
        );
        assert_eq!(interp.output(), ["inner", "outer"]);
    }

    #[test]
    fn macro_params_bind_in_child_scope() {
        let interp = run_program(
            r#"
            macro shout(word) { print word.upper() }
            @shout("hey")
            "#,
        );
        assert_eq!(interp.output(), ["HEY"]);
    }

    #[test]
    fn macro_does_not_see_caller_locals() {
        let program = parse(tokenize("macro peek { print secret }\nlet secret = 1\n@peek").unwrap())
            .unwrap();
        let fetcher = StaticFetcher::new();
        let registry = Resolver::new(&fetcher).resolve(&program).unwrap();
        let mut interp = Interpreter::new(registry).buffered();
        // `secret` is bound at root scope here, so the macro does see it;
        // bind it inside an if-block instead and the macro must not.
        let program = parse(
            tokenize("macro peek { print secret }\nif true { let secret = 1\n@peek }").unwrap(),
        )
        .unwrap();
        let err = interp.run(&program).unwrap_err();
        assert_eq!(err.kind, EvalErrorKind::UndefinedVariable);
    }

    #[test]
    fn git_context_exposes_the_full_surface() {
        let source = "print git.branch.is_main\n\
                      print git.branch.name\n\
                      print git.author.email\n\
                      print git.remote.name\n\
                      print git.files.all.length\n\
                      print git.files.unstaged.length";
        let program = parse(tokenize(source).unwrap()).unwrap();
        let fetcher = StaticFetcher::new();
        let registry = Resolver::new(&fetcher).resolve(&program).unwrap();
        let snapshot = gatekeep_git::GitSnapshot {
            branch: "main".into(),
            author_email: "dev@example.com".into(),
            remote_name: "origin".into(),
            ..Default::default()
        };
        let mut interp = Interpreter::new(registry).buffered().with_git(snapshot);
        interp.run(&program).unwrap();
        assert_eq!(
            interp.output(),
            ["true", "main", "dev@example.com", "origin", "0", "0"]
        );
    }

    #[test]
    fn type_mismatch_aborts_run() {
        let program = parse(tokenize("let x = 1 - \"a\"\nprint \"unreached\"").unwrap()).unwrap();
        let fetcher = StaticFetcher::new();
        let registry = Resolver::new(&fetcher).resolve(&program).unwrap();
        let mut interp = Interpreter::new(registry).buffered();
        let err = interp.run(&program).unwrap_err();
        assert_eq!(err.kind, EvalErrorKind::TypeMismatch);
        assert!(interp.output().is_empty());
    }

    #[test]
    fn glob_match_semantics() {
        assert!(glob_match("*.rs", "main.rs"));
        assert!(glob_match("src/*.rs", "src/lib.rs"));
        assert!(!glob_match("*.rs", "main.rs.bak"));
        assert!(glob_match("exact", "exact"));
        assert!(!glob_match("exact", "exactly"));
        assert!(glob_match("a?c", "abc"));
        // Regex metacharacters in the subject must not be interpreted.
        assert!(glob_match("release/*", "release/v1.2"));
        assert!(!glob_match("release/*", "releaseXv1"));
    }
}
