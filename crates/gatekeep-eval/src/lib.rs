//! # Gatekeep Eval
//!
//! Execution engine for the gatekeep rule language: value model, scoped
//! environments, the pre-execution resolver, and the tree-walking
//! interpreter with its process/filesystem/HTTP collaborators.

mod builtins;
pub mod config;
pub mod context;
pub mod env;
pub mod error;
pub mod fetcher;
pub mod http;
pub mod interp;
pub mod report;
pub mod resolver;
pub mod services;
pub mod value;

pub use config::Config;
pub use env::{Environment, ScopeId};
pub use error::{EvalError, EvalErrorKind};
pub use fetcher::{DirFetcher, ImportTarget, SourceFetcher, StaticFetcher};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use interp::{Flow, Interpreter, Services};
pub use report::{Outcome, OutcomeKind, Report, Verdict};
pub use resolver::{MacroRegistry, ResolveError, Resolver};
pub use services::{FileSystem, LocalFileSystem, ProcessRunner, ProcessOutput, ShellRunner};
pub use value::{ClosureValue, FileValue, Object, Value};
