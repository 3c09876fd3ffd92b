//! Runtime error type with source-location tracking.
//!
//! [`EvalError`] pairs a closed [`EvalErrorKind`] with a message and an
//! optional [`Span`] so callers can both branch on the failure class
//! (e.g. `try`/`catch` mapping a non-zero exit to a catchable value) and
//! point at the exact source position.

use gatekeep_syntax::Span;
use std::fmt;

/// Classification of a runtime failure.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalErrorKind {
    /// An identifier was read before any enclosing scope bound it.
    UndefinedVariable,
    /// An operation was applied to a value of the wrong type.
    TypeMismatch,
    /// A property or method does not exist on the receiver's type.
    NoSuchMember,
    /// A filesystem or process operation failed.
    IoError,
    /// An HTTP request failed or returned a non-success status.
    HttpError,
    /// A command or request exceeded its configured timeout.
    Timeout,
    /// A `run` command exited non-zero. `None` means killed by signal.
    NonZeroExit { code: Option<i32> },
}

impl EvalErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvalErrorKind::UndefinedVariable => "undefined variable",
            EvalErrorKind::TypeMismatch => "type mismatch",
            EvalErrorKind::NoSuchMember => "no such member",
            EvalErrorKind::IoError => "io error",
            EvalErrorKind::HttpError => "http error",
            EvalErrorKind::Timeout => "timeout",
            EvalErrorKind::NonZeroExit { .. } => "command failed",
        }
    }
}

/// A runtime evaluation error carrying its kind and an optional [`Span`].
///
/// Construct via [`EvalError::new`] or the [`bail_eval!`] macro.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalError {
    pub kind: EvalErrorKind,
    pub message: String,
    pub span: Option<Span>,
}

impl EvalError {
    pub fn new(kind: EvalErrorKind, message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            kind,
            message: message.into(),
            span,
        }
    }

    pub fn undefined_variable(name: &str, span: impl IntoOptionSpan) -> Self {
        Self::new(
            EvalErrorKind::UndefinedVariable,
            format!("variable '{}' is not defined", name),
            span.into_option_span(),
        )
    }

    pub fn io(message: impl Into<String>, span: impl IntoOptionSpan) -> Self {
        Self::new(EvalErrorKind::IoError, message, span.into_option_span())
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for EvalError {}

/// Bail out of a function with an [`EvalError`] of the given kind.
///
/// ```ignore
/// bail_eval!(EvalErrorKind::TypeMismatch, span, "expected a number, got {}", v.type_name());
/// bail_eval!(EvalErrorKind::IoError, None::<Span>, "cannot read {}", path);
/// ```
#[macro_export]
macro_rules! bail_eval {
    ($kind:expr, $span:expr, $($arg:tt)*) => {
        return Err($crate::error::EvalError::new(
            $kind,
            format!($($arg)*),
            $crate::error::into_option_span($span),
        ))
    };
}

/// Converts span-like values (`Span`, `&Span`, `Option<Span>`) into
/// `Option<Span>` for the error constructors.
pub fn into_option_span(span: impl IntoOptionSpan) -> Option<Span> {
    span.into_option_span()
}

pub trait IntoOptionSpan {
    fn into_option_span(self) -> Option<Span>;
}

impl IntoOptionSpan for Span {
    fn into_option_span(self) -> Option<Span> {
        Some(self)
    }
}

impl IntoOptionSpan for &Span {
    fn into_option_span(self) -> Option<Span> {
        Some(*self)
    }
}

impl IntoOptionSpan for Option<Span> {
    fn into_option_span(self) -> Option<Span> {
        self
    }
}
