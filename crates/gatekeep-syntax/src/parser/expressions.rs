//! Expression grammar.
//!
//! Precedence, low to high: `or` < `and` < `not` < comparison < additive
//! < multiplicative < unary minus < call/property/index.

use super::Parser;
use crate::ast::{BinaryOp, Expr, ExprKind, StringPart, UnaryOp};
use crate::error::{ParseError, Span};
use crate::lexer::{Token, tokenize};

impl Parser {
    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.advance();
            let right = self.parse_and()?;
            left = binary(left, BinaryOp::Or, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.advance();
            let right = self.parse_not()?;
            left = binary(left, BinaryOp::And, right);
        }
        Ok(left)
    }

    // `not` binds looser than comparisons: `not a == b` negates the
    // comparison, not the operand.
    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if matches!(self.peek(), Some(Token::Not)) {
            let start = self.advance().expect("peeked Not").span;
            let inner = self.parse_not()?;
            let span = start.merge(&inner.span);
            return Ok(Expr {
                kind: ExprKind::Unary {
                    op: UnaryOp::Not,
                    expr: Box::new(inner),
                },
                span,
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_additive()?;
        let op = match self.peek() {
            Some(Token::Eq) => BinaryOp::Eq,
            Some(Token::Ne) => BinaryOp::Ne,
            Some(Token::Lt) => BinaryOp::Lt,
            Some(Token::Le) => BinaryOp::Le,
            Some(Token::Gt) => BinaryOp::Gt,
            Some(Token::Ge) => BinaryOp::Ge,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_additive()?;
        Ok(binary(left, op, right))
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if matches!(self.peek(), Some(Token::Minus)) {
            let start = self.advance().expect("peeked Minus").span;
            let inner = self.parse_unary()?;
            let span = start.merge(&inner.span);
            return Ok(Expr {
                kind: ExprKind::Unary {
                    op: UnaryOp::Neg,
                    expr: Box::new(inner),
                },
                span,
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;

        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.advance();
                    let (name, name_span) = self.expect_identifier("a member name after '.'")?;
                    if matches!(self.peek(), Some(Token::LeftParen)) {
                        let (args, end) = self.parse_call_args()?;
                        let span = expr.span.merge(&end);
                        expr = Expr {
                            kind: ExprKind::MethodCall {
                                receiver: Box::new(expr),
                                method: name,
                                args,
                            },
                            span,
                        };
                    } else {
                        let span = expr.span.merge(&name_span);
                        expr = Expr {
                            kind: ExprKind::PropertyAccess {
                                receiver: Box::new(expr),
                                property: name,
                            },
                            span,
                        };
                    }
                }
                Some(Token::LeftParen) => {
                    // Free-function call: only a bare identifier is callable.
                    let ExprKind::Identifier(name) = &expr.kind else {
                        break;
                    };
                    let name = name.clone();
                    let (args, end) = self.parse_call_args()?;
                    let span = expr.span.merge(&end);
                    expr = Expr {
                        kind: ExprKind::Call { name, args },
                        span,
                    };
                }
                Some(Token::LeftBracket) => {
                    self.advance();
                    let index = self.parse_expression()?;
                    let end = self.expect(Token::RightBracket)?;
                    let span = expr.span.merge(&end);
                    expr = Expr {
                        kind: ExprKind::Index {
                            receiver: Box::new(expr),
                            index: Box::new(index),
                        },
                        span,
                    };
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn parse_call_args(&mut self) -> Result<(Vec<Expr>, Span), ParseError> {
        self.expect(Token::LeftParen)?;
        let mut args = Vec::new();
        self.skip_newlines();
        while !matches!(self.peek(), Some(Token::RightParen)) {
            args.push(self.parse_expression()?);
            if matches!(self.peek(), Some(Token::Comma)) {
                self.advance();
                self.skip_newlines();
            } else {
                break;
            }
        }
        let end = self.expect(Token::RightParen)?;
        Ok((args, end))
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let Some(token) = self.peek() else {
            return Err(ParseError::eof("an expression"));
        };

        match token {
            Token::True | Token::False => {
                let st = self.advance().expect("peeked bool");
                let value = st.token == Token::True;
                Ok(Expr {
                    kind: ExprKind::Bool(value),
                    span: st.span,
                })
            }

            Token::Null => {
                let span = self.advance().expect("peeked null").span;
                Ok(Expr {
                    kind: ExprKind::Null,
                    span,
                })
            }

            Token::Number(_) => {
                let st = self.advance().expect("peeked number");
                let Token::Number(n) = st.token else {
                    unreachable!()
                };
                Ok(Expr {
                    kind: ExprKind::Number(n),
                    span: st.span,
                })
            }

            Token::String(_) => {
                let st = self.advance().expect("peeked string");
                let Token::String(text) = st.token else {
                    unreachable!()
                };
                if text.contains("${") {
                    self.parse_interpolated(&text, st.span)
                } else {
                    Ok(Expr {
                        kind: ExprKind::String(text),
                        span: st.span,
                    })
                }
            }

            Token::Identifier(_) => {
                let st = self.advance().expect("peeked identifier");
                let Token::Identifier(name) = st.token else {
                    unreachable!()
                };
                if matches!(self.peek(), Some(Token::FatArrow)) {
                    self.advance();
                    let body = self.parse_expression()?;
                    let span = st.span.merge(&body.span);
                    return Ok(Expr {
                        kind: ExprKind::Closure {
                            param: name,
                            body: Box::new(body),
                        },
                        span,
                    });
                }
                Ok(Expr {
                    kind: ExprKind::Identifier(name),
                    span: st.span,
                })
            }

            Token::LeftBracket => {
                let start = self.advance().expect("peeked '['").span;
                let mut items = Vec::with_capacity(8);
                self.skip_newlines();
                while !matches!(self.peek(), Some(Token::RightBracket)) {
                    items.push(self.parse_expression()?);
                    if matches!(self.peek(), Some(Token::Comma)) {
                        self.advance();
                        self.skip_newlines();
                    } else {
                        break;
                    }
                }
                self.skip_newlines();
                let end = self.expect(Token::RightBracket)?;
                Ok(Expr {
                    kind: ExprKind::Array(items),
                    span: start.merge(&end),
                })
            }

            Token::LeftParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(Token::RightParen)?;
                Ok(expr)
            }

            Token::If => {
                let start = self.advance().expect("peeked if").span;
                let condition = self.parse_expression()?;
                self.expect(Token::Then)?;
                let then_expr = self.parse_expression()?;
                self.expect(Token::Else)?;
                let else_expr = self.parse_expression()?;
                let span = start.merge(&else_expr.span);
                Ok(Expr {
                    kind: ExprKind::Ternary {
                        condition: Box::new(condition),
                        then_expr: Box::new(then_expr),
                        else_expr: Box::new(else_expr),
                    },
                    span,
                })
            }

            other => {
                let found = other.display_name();
                let span = self.peek_span().expect("token present");
                Err(ParseError::unexpected("an expression", found, span))
            }
        }
    }

    /// Splits a string literal containing `${expr}` spans into literal and
    /// expression parts, sub-parsing each expression with a fresh parser.
    fn parse_interpolated(&mut self, text: &str, span: Span) -> Result<Expr, ParseError> {
        let mut parts = Vec::with_capacity(4);
        let mut literal = String::new();
        let mut chars = text.chars().peekable();

        while let Some(ch) = chars.next() {
            if ch == '$' && chars.peek() == Some(&'{') {
                chars.next();

                if !literal.is_empty() {
                    parts.push(StringPart::Literal(std::mem::take(&mut literal)));
                }

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
                if depth != 0 {
                    return Err(ParseError::invalid(
                        "unterminated '${' interpolation in string literal",
                        span,
                    ));
                }

                let tokens = tokenize(&expr_src).map_err(|e| {
                    ParseError::invalid(format!("in string interpolation: {}", e), span)
                })?;
                let mut sub = Parser::new(tokens);
                let expr = sub.parse_expression()?;
                parts.push(StringPart::Expr(expr));
            } else {
                literal.push(ch);
            }
        }

        if !literal.is_empty() {
            parts.push(StringPart::Literal(literal));
        }

        Ok(Expr {
            kind: ExprKind::Interpolated { parts },
            span,
        })
    }
}

fn binary(left: Expr, op: BinaryOp, right: Expr) -> Expr {
    let span = left.span.merge(&right.span);
    Expr {
        kind: ExprKind::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        },
        span,
    }
}
