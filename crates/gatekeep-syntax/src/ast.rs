//! Abstract syntax tree for gatekeep programs.
//!
//! Every statement carries a [`StmtId`] assigned by the parser in source
//! order. The interpreter uses these ids to keep report output
//! deterministic when statements execute concurrently inside `parallel`.

use crate::error::Span;
use smallvec::SmallVec;

/// Source-order identifier of a statement within one parsed program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StmtId(pub u32);

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
    pub id: StmtId,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Run {
        command: Expr,
    },
    Print {
        message: Expr,
    },
    /// `let <name> = <expr>`, binding in the current scope frame.
    Let {
        name: String,
        value: Expr,
    },
    /// Unconditional or conditional `block` / `warn` / `allow`.
    Outcome {
        action: OutcomeAction,
        condition: Option<Expr>,
        message: Option<String>,
    },
    If {
        condition: Expr,
        then_body: Vec<Stmt>,
        else_body: Option<Vec<Stmt>>,
    },
    Foreach {
        collection: Expr,
        pattern: Option<String>,
        var: String,
        body: Vec<Stmt>,
    },
    Match {
        subject: Expr,
        arms: Vec<MatchArm>,
    },
    Parallel {
        body: Vec<Stmt>,
    },
    Group {
        name: String,
        severity: Severity,
        enabled: bool,
        body: Vec<Stmt>,
    },
    MacroDef {
        name: String,
        params: SmallVec<[String; 4]>,
        body: Vec<Stmt>,
    },
    MacroCall {
        namespace: Option<String>,
        name: String,
        args: Vec<Expr>,
    },
    Import {
        path: String,
        alias: Option<String>,
    },
    Use {
        package: String,
        alias: Option<String>,
    },
    TryCatch {
        body: Vec<Stmt>,
        catch_var: Option<String>,
        catch_body: Vec<Stmt>,
    },
    Break,
    Continue,
}

/// Which report entry a `block` / `warn` / `allow` statement appends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeAction {
    Block,
    Warn,
    Allow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

#[derive(Debug, Clone)]
pub struct MatchArm {
    pub pattern: MatchPattern,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum MatchPattern {
    /// A string pattern, matched as a full-string shell glob when it
    /// contains wildcards and as an exact string otherwise.
    Glob(String),
    /// Any non-string literal or computed expression; matched by
    /// structural equality.
    Literal(Expr),
    /// `_`, matches anything.
    Wildcard,
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    String(String),
    Number(f64),
    Bool(bool),
    Null,
    Identifier(String),
    Array(Vec<Expr>),
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    /// Free-function call, e.g. `file("a.txt")` or `glob("**/*.rs")`.
    Call {
        name: String,
        args: Vec<Expr>,
    },
    MethodCall {
        receiver: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    PropertyAccess {
        receiver: Box<Expr>,
        property: String,
    },
    Index {
        receiver: Box<Expr>,
        index: Box<Expr>,
    },
    /// Single-parameter closure, e.g. `x => x * 2`.
    Closure {
        param: String,
        body: Box<Expr>,
    },
    Interpolated {
        parts: Vec<StringPart>,
    },
    /// `if c then a else b`, chainable as `else if`.
    Ternary {
        condition: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
}

#[derive(Debug, Clone)]
pub enum StringPart {
    Literal(String),
    Expr(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}
