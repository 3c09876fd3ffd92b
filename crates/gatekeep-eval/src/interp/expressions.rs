//! Expression evaluation and operator dispatch.

use super::Interpreter;
use crate::builtins;
use crate::env::ScopeId;
use crate::error::{EvalError, EvalErrorKind};
use crate::value::{ClosureValue, Value};
use crate::bail_eval;
use gatekeep_syntax::{BinaryOp, Expr, ExprKind, Span, StringPart, UnaryOp, tokenize};
use std::sync::Arc;

impl Interpreter {
    pub(crate) fn eval_expr(&mut self, expr: &Expr, scope: ScopeId) -> Result<Value, EvalError> {
        match &expr.kind {
            ExprKind::String(s) => Ok(Value::String(s.clone())),
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Null => Ok(Value::Null),

            ExprKind::Identifier(name) => self
                .env
                .get(scope, name)
                .cloned()
                .ok_or_else(|| EvalError::undefined_variable(name, &expr.span)),

            ExprKind::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval_expr(item, scope)?);
                }
                Ok(Value::Array(values))
            }

            ExprKind::Binary { left, op, right } => self.eval_binary(left, *op, right, scope, &expr.span),

            ExprKind::Unary { op, expr: inner } => {
                let value = self.eval_expr(inner, scope)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                    UnaryOp::Neg => Ok(Value::Number(-value.as_number(&inner.span)?)),
                }
            }

            ExprKind::Call { name, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval_expr(arg, scope)?);
                }
                builtins::call(self, name, &values, &expr.span)
            }

            ExprKind::MethodCall {
                receiver,
                method,
                args,
            } => self.eval_method_call(receiver, method, args, scope, &expr.span),

            ExprKind::PropertyAccess { receiver, property } => {
                let value = self.eval_expr(receiver, scope)?;
                value.get_property(property, &expr.span)
            }

            ExprKind::Index { receiver, index } => {
                let value = self.eval_expr(receiver, scope)?;
                let index = self.eval_expr(index, scope)?;
                eval_index(&value, &index, &expr.span)
            }

            ExprKind::Closure { param, body } => Ok(Value::Closure(ClosureValue {
                param: param.clone(),
                body: Arc::new((**body).clone()),
                scope,
            })),

            ExprKind::Interpolated { parts } => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        StringPart::Literal(text) => out.push_str(text),
                        StringPart::Expr(inner) => {
                            out.push_str(&self.eval_expr(inner, scope)?.display());
                        }
                    }
                }
                Ok(Value::String(out))
            }

            ExprKind::Ternary {
                condition,
                then_expr,
                else_expr,
            } => {
                if self.eval_expr(condition, scope)?.is_truthy() {
                    self.eval_expr(then_expr, scope)
                } else {
                    self.eval_expr(else_expr, scope)
                }
            }
        }
    }

    fn eval_binary(
        &mut self,
        left: &Expr,
        op: BinaryOp,
        right: &Expr,
        scope: ScopeId,
        span: &Span,
    ) -> Result<Value, EvalError> {
        // `and` / `or` short-circuit on truthiness.
        if op == BinaryOp::And {
            let lhs = self.eval_expr(left, scope)?;
            if !lhs.is_truthy() {
                return Ok(Value::Bool(false));
            }
            return Ok(Value::Bool(self.eval_expr(right, scope)?.is_truthy()));
        }
        if op == BinaryOp::Or {
            let lhs = self.eval_expr(left, scope)?;
            if lhs.is_truthy() {
                return Ok(Value::Bool(true));
            }
            return Ok(Value::Bool(self.eval_expr(right, scope)?.is_truthy()));
        }

        let lhs = self.eval_expr(left, scope)?;
        let rhs = self.eval_expr(right, scope)?;

        match op {
            BinaryOp::Eq => Ok(Value::Bool(lhs.equals(&rhs))),
            BinaryOp::Ne => Ok(Value::Bool(!lhs.equals(&rhs))),
            BinaryOp::Lt => Ok(Value::Bool(lhs.compare(&rhs, span)?.is_lt())),
            BinaryOp::Le => Ok(Value::Bool(lhs.compare(&rhs, span)?.is_le())),
            BinaryOp::Gt => Ok(Value::Bool(lhs.compare(&rhs, span)?.is_gt())),
            BinaryOp::Ge => Ok(Value::Bool(lhs.compare(&rhs, span)?.is_ge())),

            BinaryOp::Add => match (&lhs, &rhs) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                // A string on either side concatenates.
                (Value::String(_), _) | (_, Value::String(_)) => {
                    Ok(Value::String(format!("{}{}", lhs.display(), rhs.display())))
                }
                (a, b) => bail_eval!(
                    EvalErrorKind::TypeMismatch,
                    span,
                    "cannot add {} and {}",
                    a.type_name(),
                    b.type_name()
                ),
            },

            BinaryOp::Sub => Ok(Value::Number(
                lhs.as_number(span)? - rhs.as_number(span)?,
            )),
            BinaryOp::Mul => Ok(Value::Number(
                lhs.as_number(span)? * rhs.as_number(span)?,
            )),
            BinaryOp::Div => {
                let divisor = rhs.as_number(span)?;
                if divisor == 0.0 {
                    bail_eval!(EvalErrorKind::TypeMismatch, span, "division by zero");
                }
                Ok(Value::Number(lhs.as_number(span)? / divisor))
            }
            BinaryOp::Mod => {
                let divisor = rhs.as_number(span)?;
                if divisor == 0.0 {
                    bail_eval!(EvalErrorKind::TypeMismatch, span, "modulo by zero");
                }
                Ok(Value::Number(lhs.as_number(span)? % divisor))
            }

            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        }
    }

    fn eval_method_call(
        &mut self,
        receiver: &Expr,
        method: &str,
        args: &[Expr],
        scope: ScopeId,
        span: &Span,
    ) -> Result<Value, EvalError> {
        let value = self.eval_expr(receiver, scope)?;

        // http.get(url) goes through the HTTP collaborator.
        if let Value::Object(obj) = &value {
            if obj.type_name == "Http" && method == "get" {
                let Some(url) = args.first() else {
                    bail_eval!(EvalErrorKind::TypeMismatch, span, "get() expects a url");
                };
                let url = self.eval_expr(url, scope)?;
                let url = url.as_str(span)?;
                let response = self
                    .services
                    .http
                    .get(url, self.config.http_timeout)
                    .map_err(|mut e| {
                        e.span = e.span.or(Some(*span));
                        e
                    })?;
                return Ok(response.into_value());
            }
        }

        // Closure-driven array methods are evaluated here, where the
        // closure body can run.
        if let Value::Array(items) = &value {
            if matches!(method, "filter" | "map" | "find" | "any" | "all" | "count") {
                let Some(arg) = args.first() else {
                    bail_eval!(
                        EvalErrorKind::TypeMismatch,
                        span,
                        "{}() expects a closure argument",
                        method
                    );
                };
                let closure = match self.eval_expr(arg, scope)? {
                    Value::Closure(c) => c,
                    other => bail_eval!(
                        EvalErrorKind::TypeMismatch,
                        span,
                        "{}() expects a closure, got {}",
                        method,
                        other.type_name()
                    ),
                };
                return self.eval_array_closure(items, method, &closure, span);
            }
        }

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval_expr(arg, scope)?);
        }
        value.call_method(method, &values, span)
    }

    fn eval_array_closure(
        &mut self,
        items: &[Value],
        method: &str,
        closure: &ClosureValue,
        span: &Span,
    ) -> Result<Value, EvalError> {
        match method {
            "filter" => {
                let mut out = Vec::new();
                for item in items {
                    if self.call_closure(closure, item.clone())?.is_truthy() {
                        out.push(item.clone());
                    }
                }
                Ok(Value::Array(out))
            }
            "map" => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.call_closure(closure, item.clone())?);
                }
                Ok(Value::Array(out))
            }
            "find" => {
                for item in items {
                    if self.call_closure(closure, item.clone())?.is_truthy() {
                        return Ok(item.clone());
                    }
                }
                Ok(Value::Null)
            }
            "any" => {
                for item in items {
                    if self.call_closure(closure, item.clone())?.is_truthy() {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            "all" => {
                for item in items {
                    if !self.call_closure(closure, item.clone())?.is_truthy() {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            "count" => {
                let mut n = 0usize;
                for item in items {
                    if self.call_closure(closure, item.clone())?.is_truthy() {
                        n += 1;
                    }
                }
                Ok(Value::Number(n as f64))
            }
            _ => bail_eval!(
                EvalErrorKind::NoSuchMember,
                span,
                "no method '{}' on array",
                method
            ),
        }
    }

    /// Invokes a closure: one fresh frame whose parent is the closure's
    /// captured scope, so the body sees its defining environment.
    pub(crate) fn call_closure(
        &mut self,
        closure: &ClosureValue,
        arg: Value,
    ) -> Result<Value, EvalError> {
        let call_scope = self.env.push_scope(closure.scope);
        self.env.define(call_scope, closure.param.clone(), arg);
        self.eval_expr(&closure.body, call_scope)
    }

    /// Evaluates `${expr}` segments inside a message string.
    pub(crate) fn interpolate(
        &mut self,
        text: &str,
        scope: ScopeId,
        span: &Span,
    ) -> Result<String, EvalError> {
        if !text.contains("${") {
            return Ok(text.to_string());
        }

        let mut out = String::with_capacity(text.len());
        let mut chars = text.chars().peekable();
        while let Some(ch) = chars.next() {
            if ch == '$' && chars.peek() == Some(&'{') {
                chars.next();
                let mut expr_src = String::new();
                let mut depth = 1usize;
                for ch in chars.by_ref() {
                    match ch {
                        '{' => depth += 1,
                        '}' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    expr_src.push(ch);
                }

                let value = self.eval_snippet(&expr_src, scope, span)?;
                out.push_str(&value.display());
            } else {
                out.push(ch);
            }
        }
        Ok(out)
    }

    fn eval_snippet(
        &mut self,
        source: &str,
        scope: ScopeId,
        span: &Span,
    ) -> Result<Value, EvalError> {
        let tokens = tokenize(source).map_err(|e| {
            EvalError::new(
                EvalErrorKind::TypeMismatch,
                format!("in interpolation: {}", e),
                Some(*span),
            )
        })?;
        let mut parser = gatekeep_syntax::parser::Parser::new(tokens);
        let expr = parser.parse_expression().map_err(|e| {
            EvalError::new(
                EvalErrorKind::TypeMismatch,
                format!("in interpolation: {}", e),
                Some(*span),
            )
        })?;
        self.eval_expr(&expr, scope)
    }
}

fn eval_index(value: &Value, index: &Value, span: &Span) -> Result<Value, EvalError> {
    match (value, index) {
        (Value::Array(items), Value::Number(n)) => {
            if *n < 0.0 || n.fract() != 0.0 {
                bail_eval!(
                    EvalErrorKind::TypeMismatch,
                    span,
                    "array index must be a non-negative integer, got {}",
                    index.display()
                );
            }
            Ok(items.get(*n as usize).cloned().unwrap_or(Value::Null))
        }
        (Value::Object(obj), Value::String(key)) => {
            Ok(obj.get(key).cloned().unwrap_or(Value::Null))
        }
        (receiver, index) => bail_eval!(
            EvalErrorKind::TypeMismatch,
            span,
            "cannot index {} with {}",
            receiver.type_name(),
            index.type_name()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::run_program;
    use crate::error::EvalErrorKind;
    use crate::fetcher::StaticFetcher;
    use crate::resolver::Resolver;
    use crate::interp::Interpreter;
    use gatekeep_syntax::{parse, tokenize};

    fn run_err(source: &str) -> crate::error::EvalError {
        let program = parse(tokenize(source).unwrap()).unwrap();
        let fetcher = StaticFetcher::new();
        let registry = Resolver::new(&fetcher).resolve(&program).unwrap();
        let mut interp = Interpreter::new(registry).buffered();
        interp.run(&program).unwrap_err()
    }

    #[test]
    fn arithmetic_and_precedence() {
        let interp = run_program("print 1 + 2 * 3");
        assert_eq!(interp.output(), ["7"]);
    }

    #[test]
    fn string_concat_with_plus() {
        let interp = run_program(r#"print "n=" + 4"#);
        assert_eq!(interp.output(), ["n=4"]);
    }

    #[test]
    fn division_by_zero_errors() {
        let err = run_err("print 1 / 0");
        assert_eq!(err.kind, EvalErrorKind::TypeMismatch);
        assert!(err.message.contains("division by zero"));
    }

    #[test]
    fn undefined_variable_reports_name_and_position() {
        let err = run_err("print missing_var");
        assert_eq!(err.kind, EvalErrorKind::UndefinedVariable);
        assert!(err.message.contains("missing_var"));
        assert!(err.span.is_some());
    }

    #[test]
    fn short_circuit_skips_rhs() {
        // The undefined rhs is never evaluated.
        let interp = run_program("print false and missing\nprint true or missing");
        assert_eq!(interp.output(), ["false", "true"]);
    }

    #[test]
    fn closures_capture_lexically() {
        let interp = run_program(
            r#"
            let threshold = 2
            let big = [1, 2, 3, 4].filter(n => n > threshold)
            print big
            "#,
        );
        assert_eq!(interp.output(), ["3, 4"]);
    }

    #[test]
    fn closure_sees_definition_scope_not_call_scope() {
        let interp = run_program(
            r#"
            let n = 10
            let check = x => x > n
            if true {
                let n = 1000
                print [50].filter(check).length
            }
            "#,
        );
        // `check` compares against the n captured at definition (10).
        assert_eq!(interp.output(), ["1"]);
    }

    #[test]
    fn filter_then_map_chains() {
        let interp = run_program(
            r#"
            let result = [1, 2, 3, 4].filter(x => x % 2 == 0).map(x => x * 10)
            print result == [20, 40]
            "#,
        );
        assert_eq!(interp.output(), ["true"]);
    }

    #[test]
    fn map_any_all_count() {
        let interp = run_program(
            r#"
            let nums = [1, 2, 3]
            print nums.map(n => n * 2)
            print nums.any(n => n == 2)
            print nums.all(n => n > 0)
            print nums.count(n => n % 2 == 1)
            "#,
        );
        assert_eq!(interp.output(), ["2, 4, 6", "true", "true", "2"]);
    }

    #[test]
    fn find_returns_null_when_absent() {
        let interp = run_program("print [1, 2].find(n => n > 5)");
        assert_eq!(interp.output(), ["null"]);
    }

    #[test]
    fn index_out_of_range_is_null() {
        let interp = run_program("print [1, 2][5]");
        assert_eq!(interp.output(), ["null"]);
    }

    #[test]
    fn ternary_expression() {
        let interp = run_program(r#"print if 2 > 1 then "yes" else "no""#);
        assert_eq!(interp.output(), ["yes"]);
    }

    #[test]
    fn interpolation_nests_expressions() {
        let interp = run_program(
            r#"
            let files = ["a", "b", "c"]
            print "have ${files.length} files"
            "#,
        );
        assert_eq!(interp.output(), ["have 3 files"]);
    }

    #[test]
    fn size_units_compare() {
        let interp = run_program("print 2KB > 1000");
        assert_eq!(interp.output(), ["true"]);
    }

    #[test]
    fn not_binds_looser_than_comparison() {
        let interp = run_program("print not 1 == 2");
        assert_eq!(interp.output(), ["true"]);
    }
}
