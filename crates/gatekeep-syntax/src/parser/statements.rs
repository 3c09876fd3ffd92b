//! Statement grammar.

use super::Parser;
use crate::ast::{MatchArm, MatchPattern, OutcomeAction, Severity, Stmt, StmtKind};
use crate::error::{ParseError, Span};
use crate::lexer::Token;
use smallvec::SmallVec;

impl Parser {
    pub(super) fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        let Some(token) = self.peek() else {
            return Err(ParseError::eof("a statement"));
        };

        match token {
            Token::Run => self.parse_run(),
            Token::Print => self.parse_print(),
            Token::Let => self.parse_let(),
            Token::Block => self.parse_outcome(OutcomeAction::Block),
            Token::Warn => self.parse_outcome(OutcomeAction::Warn),
            Token::Allow => self.parse_outcome(OutcomeAction::Allow),
            Token::If => self.parse_if(),
            Token::Foreach => self.parse_foreach(),
            Token::Match => self.parse_match(),
            Token::Parallel => self.parse_parallel(),
            Token::Group => self.parse_group(),
            Token::Macro => self.parse_macro_def(),
            Token::At => self.parse_macro_call(),
            Token::Import => self.parse_import(),
            Token::Use => self.parse_use(),
            Token::Try => self.parse_try_catch(),
            Token::Break => {
                let span = self.advance().expect("peeked break").span;
                Ok(self.make_stmt(StmtKind::Break, span))
            }
            Token::Continue => {
                let span = self.advance().expect("peeked continue").span;
                Ok(self.make_stmt(StmtKind::Continue, span))
            }
            other => {
                let found = other.display_name();
                let span = self.peek_span().expect("token present");
                Err(ParseError::unexpected("a statement", found, span))
            }
        }
    }

    fn parse_run(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect(Token::Run)?;
        let command = self.parse_expression()?;
        let span = start.merge(&command.span);
        Ok(self.make_stmt(StmtKind::Run { command }, span))
    }

    fn parse_print(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect(Token::Print)?;
        let message = self.parse_expression()?;
        let span = start.merge(&message.span);
        Ok(self.make_stmt(StmtKind::Print { message }, span))
    }

    fn parse_let(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect(Token::Let)?;
        let (name, _) = self.expect_identifier("a variable name")?;
        self.expect(Token::Assign)?;
        let value = self.parse_expression()?;
        let span = start.merge(&value.span);
        Ok(self.make_stmt(StmtKind::Let { name, value }, span))
    }

    /// `block "msg"`, `block if cond`, `block if cond message "msg"`,
    /// or `block "msg" if cond`. Same for `warn` and `allow`.
    fn parse_outcome(&mut self, action: OutcomeAction) -> Result<Stmt, ParseError> {
        let start = self.advance().expect("peeked outcome keyword").span;
        let mut end = start;
        let mut message = None;
        let mut condition = None;

        if let Some(Token::String(_)) = self.peek() {
            let (text, span) = self.expect_string("a message")?;
            message = Some(text);
            end = span;
        }

        if matches!(self.peek(), Some(Token::If)) {
            self.advance();
            let cond = self.parse_expression()?;
            end = cond.span;
            condition = Some(cond);

            // Trailing `message "..."` after the condition.
            if message.is_none()
                && matches!(self.peek(), Some(Token::Identifier(id)) if id == "message")
            {
                self.advance();
                let (text, span) = self.expect_string("a message after 'message'")?;
                message = Some(text);
                end = span;
            }
        }

        let span = start.merge(&end);
        Ok(self.make_stmt(
            StmtKind::Outcome {
                action,
                condition,
                message,
            },
            span,
        ))
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect(Token::If)?;
        let condition = self.parse_expression()?;
        self.expect(Token::LeftBrace)?;
        let then_body = self.parse_body()?;
        let mut end = self.expect(Token::RightBrace)?;

        // An `else` may sit on the next line; consume the separating
        // newlines only when one actually follows.
        let mut ahead = 0;
        while matches!(self.peek_nth(ahead), Some(Token::Newline)) {
            ahead += 1;
        }
        let else_body = if matches!(self.peek_nth(ahead), Some(Token::Else)) {
            self.skip_newlines();
            self.advance();
            if matches!(self.peek(), Some(Token::If)) {
                // `else if` chains as an else body with a single nested if.
                let nested = self.parse_if()?;
                end = nested.span;
                Some(vec![nested])
            } else {
                self.expect(Token::LeftBrace)?;
                let body = self.parse_body()?;
                end = self.expect(Token::RightBrace)?;
                Some(body)
            }
        } else {
            None
        };

        let span = start.merge(&end);
        Ok(self.make_stmt(
            StmtKind::If {
                condition,
                then_body,
                else_body,
            },
            span,
        ))
    }

    /// `foreach <collection> [matching "<glob>"] { <var> in <body> }`
    fn parse_foreach(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect(Token::Foreach)?;
        let collection = self.parse_expression()?;

        let pattern = if matches!(self.peek(), Some(Token::Matching)) {
            self.advance();
            let (glob, _) = self.expect_string("a glob pattern after 'matching'")?;
            Some(glob)
        } else {
            None
        };

        self.expect(Token::LeftBrace)?;
        self.skip_newlines();
        let (var, _) = self.expect_identifier("a loop variable")?;
        self.expect(Token::In)?;
        let body = self.parse_body()?;
        let end = self.expect(Token::RightBrace)?;

        let span = start.merge(&end);
        Ok(self.make_stmt(
            StmtKind::Foreach {
                collection,
                pattern,
                var,
                body,
            },
            span,
        ))
    }

    fn parse_match(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect(Token::Match)?;
        let subject = self.parse_expression()?;
        self.expect(Token::LeftBrace)?;

        let mut arms = Vec::new();
        self.skip_newlines();
        while !matches!(self.peek(), Some(Token::RightBrace) | None) {
            arms.push(self.parse_match_arm()?);
            self.skip_newlines();
        }

        let end = self.expect(Token::RightBrace)?;
        let span = start.merge(&end);
        Ok(self.make_stmt(StmtKind::Match { subject, arms }, span))
    }

    fn parse_match_arm(&mut self) -> Result<MatchArm, ParseError> {
        let arm_start = self
            .peek_span()
            .ok_or_else(|| ParseError::eof("a match arm"))?;

        let pattern = match self.peek() {
            Some(Token::String(_)) => {
                let (text, _) = self.expect_string("a pattern")?;
                MatchPattern::Glob(text)
            }
            Some(Token::Identifier(id)) if id == "_" => {
                self.advance();
                MatchPattern::Wildcard
            }
            _ => MatchPattern::Literal(self.parse_expression()?),
        };

        self.expect(Token::Arrow)?;

        let (body, end) = if matches!(self.peek(), Some(Token::LeftBrace)) {
            self.advance();
            let body = self.parse_body()?;
            let end = self.expect(Token::RightBrace)?;
            (body, end)
        } else {
            let stmt = self.parse_statement()?;
            let end = stmt.span;
            (vec![stmt], end)
        };

        Ok(MatchArm {
            pattern,
            body,
            span: arm_start.merge(&end),
        })
    }

    fn parse_parallel(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect(Token::Parallel)?;
        self.expect(Token::LeftBrace)?;
        let body = self.parse_body()?;
        let end = self.expect(Token::RightBrace)?;
        let span = start.merge(&end);
        Ok(self.make_stmt(StmtKind::Parallel { body }, span))
    }

    /// `group <name> [critical|warning|info] [disabled] { <body> }`
    fn parse_group(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect(Token::Group)?;
        let (name, _) = self.expect_identifier("a group name")?;

        let mut severity = Severity::Critical;
        let mut enabled = true;

        while let Some(Token::Identifier(word)) = self.peek() {
            match word.as_str() {
                "critical" => severity = Severity::Critical,
                "warning" => severity = Severity::Warning,
                "info" => severity = Severity::Info,
                "disabled" => enabled = false,
                other => {
                    let found = format!("'{}'", other);
                    let span = self.peek_span().expect("token present");
                    return Err(ParseError::unexpected(
                        "'critical', 'warning', 'info', or 'disabled'",
                        found,
                        span,
                    ));
                }
            }
            self.advance();
        }

        self.expect(Token::LeftBrace)?;
        let body = self.parse_body()?;
        let end = self.expect(Token::RightBrace)?;

        let span = start.merge(&end);
        Ok(self.make_stmt(
            StmtKind::Group {
                name,
                severity,
                enabled,
                body,
            },
            span,
        ))
    }

    fn parse_macro_def(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect(Token::Macro)?;
        let (name, _) = self.expect_identifier("a macro name")?;

        let mut params: SmallVec<[String; 4]> = SmallVec::new();
        if matches!(self.peek(), Some(Token::LeftParen)) {
            self.advance();
            while !matches!(self.peek(), Some(Token::RightParen)) {
                let (param, _) = self.expect_identifier("a parameter name")?;
                params.push(param);
                if matches!(self.peek(), Some(Token::Comma)) {
                    self.advance();
                } else {
                    break;
                }
            }
            self.expect(Token::RightParen)?;
        }

        self.expect(Token::LeftBrace)?;
        let body = self.parse_body()?;
        let end = self.expect(Token::RightBrace)?;

        let span = start.merge(&end);
        Ok(self.make_stmt(StmtKind::MacroDef { name, params, body }, span))
    }

    /// `@name(args)` or `@namespace.name(args)`; parentheses are optional
    /// for zero-argument calls.
    fn parse_macro_call(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect(Token::At)?;
        let (first, mut end) = self.expect_identifier("a macro name after '@'")?;

        let (namespace, name) = if matches!(self.peek(), Some(Token::Dot)) {
            self.advance();
            let (name, span) = self.expect_identifier("a macro name after '.'")?;
            end = span;
            (Some(first), name)
        } else {
            (None, first)
        };

        let mut args = Vec::new();
        if matches!(self.peek(), Some(Token::LeftParen)) {
            self.advance();
            while !matches!(self.peek(), Some(Token::RightParen)) {
                args.push(self.parse_expression()?);
                if matches!(self.peek(), Some(Token::Comma)) {
                    self.advance();
                } else {
                    break;
                }
            }
            end = self.expect(Token::RightParen)?;
        }

        let span = start.merge(&end);
        Ok(self.make_stmt(
            StmtKind::MacroCall {
                namespace,
                name,
                args,
            },
            span,
        ))
    }

    fn parse_import(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect(Token::Import)?;
        let (path, path_span) = self.expect_string("a file path to import")?;
        let (alias, end) = self.parse_alias(path_span)?;
        let span = start.merge(&end);
        Ok(self.make_stmt(StmtKind::Import { path, alias }, span))
    }

    fn parse_use(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect(Token::Use)?;
        let (package, pkg_span) = self.expect_string("a package reference")?;
        let (alias, end) = self.parse_alias(pkg_span)?;
        let span = start.merge(&end);
        Ok(self.make_stmt(StmtKind::Use { package, alias }, span))
    }

    fn parse_alias(&mut self, prev_end: Span) -> Result<(Option<String>, Span), ParseError> {
        if matches!(self.peek(), Some(Token::As)) {
            self.advance();
            let (alias, span) = self.expect_identifier("an alias after 'as'")?;
            Ok((Some(alias), span))
        } else {
            Ok((None, prev_end))
        }
    }

    fn parse_try_catch(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect(Token::Try)?;
        self.expect(Token::LeftBrace)?;
        let body = self.parse_body()?;
        self.expect(Token::RightBrace)?;

        self.skip_newlines();
        self.expect(Token::Catch)?;
        let catch_var = if let Some(Token::Identifier(_)) = self.peek() {
            let (name, _) = self.expect_identifier("an error binding")?;
            Some(name)
        } else {
            None
        };

        self.expect(Token::LeftBrace)?;
        let catch_body = self.parse_body()?;
        let end = self.expect(Token::RightBrace)?;

        let span = start.merge(&end);
        Ok(self.make_stmt(
            StmtKind::TryCatch {
                body,
                catch_var,
                catch_body,
            },
            span,
        ))
    }
}
