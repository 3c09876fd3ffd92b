//! # Gatekeep
//!
//! A rule language for validating version-control changes. Scripts
//! declare checks (`block`, `warn`, `allow`, `run`, groups, macros) and
//! the engine folds everything that fired into one monotonic verdict:
//! `Passed`, `Warned`, `Blocked`, or `Errored`.
//!
//! ## Example
//!
//! ```rust
//! use gatekeep::Engine;
//!
//! let result = Engine::new()
//!     .run_source(r#"
//!         let limit = 3
//!         warn if 5 > limit message "that is a lot"
//!     "#)
//!     .unwrap();
//! assert_eq!(result.report.verdict(), gatekeep::Verdict::Warned);
//! ```
//!
//! The pipeline is `tokenize` -> `parse` -> `resolve` (imports and
//! macros, before anything runs) -> `interpret`. A failure in any stage
//! surfaces as [`RunError`] and the run counts as [`Verdict::Errored`];
//! rule-level failures are not errors, they are outcomes in the
//! [`Report`].

use gatekeep_eval::{Interpreter, Resolver};
use gatekeep_git::GitSnapshot;
use gatekeep_syntax::{Diagnostic, parse, tokenize};
use std::fmt;

pub use gatekeep_eval::{
    Config, DirFetcher, EvalError, Outcome, OutcomeKind, Report, ResolveError, Services,
    SourceFetcher, StaticFetcher, Value, Verdict,
};
pub use gatekeep_git;
pub use gatekeep_syntax::{LexError, ParseError, Span, Stmt, StmtId};

/// Why a run never produced a verdict from its checks.
#[derive(Debug)]
pub enum RunError {
    Lex(LexError),
    Parse(ParseError),
    Resolve(ResolveError),
    Eval(EvalError),
}

impl RunError {
    /// Every engine failure maps to the same terminal verdict.
    pub fn verdict(&self) -> Verdict {
        Verdict::Errored
    }

    /// Renders the error against the source, with carets for syntax
    /// errors.
    pub fn render(&self, source: &str) -> String {
        match self {
            RunError::Lex(e) => Diagnostic::lex(source, e).to_string(),
            RunError::Parse(e) => Diagnostic::parse(source, e).to_string(),
            RunError::Resolve(e) => format!("error: {}\n", e),
            RunError::Eval(e) => match e.span {
                Some(span) => format!("error: {} (line {}:{})\n", e, span.line, span.col),
                None => format!("error: {}\n", e),
            },
        }
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Lex(e) => write!(f, "{}", e),
            RunError::Parse(e) => write!(f, "{}", e),
            RunError::Resolve(e) => write!(f, "{}", e),
            RunError::Eval(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for RunError {}

impl From<LexError> for RunError {
    fn from(e: LexError) -> Self {
        RunError::Lex(e)
    }
}

impl From<ParseError> for RunError {
    fn from(e: ParseError) -> Self {
        RunError::Parse(e)
    }
}

impl From<ResolveError> for RunError {
    fn from(e: ResolveError) -> Self {
        RunError::Resolve(e)
    }
}

impl From<EvalError> for RunError {
    fn from(e: EvalError) -> Self {
        RunError::Eval(e)
    }
}

/// Everything a completed run produced.
#[derive(Debug)]
pub struct RunResult {
    pub report: Report,
    /// Printed lines, in deterministic order.
    pub output: Vec<String>,
}

/// Front door of the engine: owns configuration, collaborators, the
/// import fetcher, and optionally a git snapshot.
pub struct Engine {
    config: Config,
    services: Services,
    fetcher: Box<dyn SourceFetcher>,
    git: Option<GitSnapshot>,
}

impl Engine {
    /// Engine with default config, real collaborators, and no sources to
    /// import from. Use the `with_*` builders to attach them.
    pub fn new() -> Self {
        let config = Config::default();
        let services = Services::real(config.auth_token.clone());
        Self {
            config,
            services,
            fetcher: Box::new(StaticFetcher::new()),
            git: None,
        }
    }

    /// Engine wired for a real repository: loads `.gkrc`, collects a git
    /// snapshot, and fetches imports relative to `script_dir`.
    pub fn for_repository(script_dir: impl Into<std::path::PathBuf>) -> Result<Self, RunError> {
        let script_dir = script_dir.into();
        let config = Config::load(&script_dir)?;
        let services = Services::real(config.auth_token.clone());
        let fetcher = Box::new(DirFetcher::new(&script_dir, &config.package_dir));
        let git = GitSnapshot::collect().map_err(|e| {
            RunError::Eval(EvalError::io(format!("git snapshot failed: {:#}", e), None))
        })?;
        Ok(Self {
            config,
            services,
            fetcher,
            git: Some(git),
        })
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn with_services(mut self, services: Services) -> Self {
        self.services = services;
        self
    }

    pub fn with_fetcher(mut self, fetcher: impl SourceFetcher + 'static) -> Self {
        self.fetcher = Box::new(fetcher);
        self
    }

    pub fn with_git(mut self, snapshot: GitSnapshot) -> Self {
        self.git = Some(snapshot);
        self
    }

    /// Runs a script through the whole pipeline.
    pub fn run_source(&self, source: &str) -> Result<RunResult, RunError> {
        let tokens = tokenize(source)?;
        let program = parse(tokens)?;
        let registry = Resolver::new(self.fetcher.as_ref()).resolve(&program)?;

        let mut interp = Interpreter::new(registry)
            .with_services(self.services.clone())
            .with_config(self.config.clone());
        if let Some(git) = &self.git {
            interp = interp.with_git(git.clone());
        }

        interp.run(&program)?;
        let output = interp.output().to_vec();
        Ok(RunResult {
            report: interp.into_report(),
            output,
        })
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

pub mod prelude {
    pub use crate::{Engine, RunError, RunResult, Verdict};
}
