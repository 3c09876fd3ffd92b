mod expressions;
mod statements;

use crate::ast::{Stmt, StmtId, StmtKind};
use crate::error::{ParseError, Span};
use crate::lexer::{SpannedToken, Token};

/// Recursive-descent parser for the gatekeep rule language.
///
/// Consumes a token stream produced by [`tokenize`](crate::lexer::tokenize)
/// and yields a `Vec<`[`Stmt`]`>`. The free function [`parse()`] is the
/// usual entry point. The first grammar violation is surfaced as a
/// [`ParseError`] with its exact position; no recovery is attempted.
pub struct Parser {
    pub(super) tokens: Vec<SpannedToken>,
    pub(super) pos: usize,
    next_id: u32,
}

impl Parser {
    pub fn new(tokens: Vec<SpannedToken>) -> Self {
        Self {
            tokens,
            pos: 0,
            next_id: 0,
        }
    }

    #[inline]
    pub(super) fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|st| &st.token)
    }

    #[inline]
    pub(super) fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|st| &st.token)
    }

    #[inline]
    pub(super) fn peek_span(&self) -> Option<Span> {
        self.tokens.get(self.pos).map(|st| st.span)
    }

    #[inline]
    pub(super) fn advance(&mut self) -> Option<SpannedToken> {
        let token = self.tokens.get(self.pos).cloned()?;
        self.pos += 1;
        Some(token)
    }

    /// Consumes the next token if it equals `expected`, else errors.
    pub(super) fn expect(&mut self, expected: Token) -> Result<Span, ParseError> {
        match self.advance() {
            Some(st) if st.token == expected => Ok(st.span),
            Some(st) => Err(ParseError::unexpected(
                expected.display_name(),
                st.token.display_name(),
                st.span,
            )),
            None => Err(ParseError::eof(expected.display_name())),
        }
    }

    /// Consumes an identifier token and returns its text.
    pub(super) fn expect_identifier(&mut self, what: &str) -> Result<(String, Span), ParseError> {
        match self.advance() {
            Some(SpannedToken {
                token: Token::Identifier(name),
                span,
            }) => Ok((name, span)),
            Some(st) => Err(ParseError::unexpected(
                what,
                st.token.display_name(),
                st.span,
            )),
            None => Err(ParseError::eof(what)),
        }
    }

    /// Consumes a string-literal token and returns its text.
    pub(super) fn expect_string(&mut self, what: &str) -> Result<(String, Span), ParseError> {
        match self.advance() {
            Some(SpannedToken {
                token: Token::String(text),
                span,
            }) => Ok((text, span)),
            Some(st) => Err(ParseError::unexpected(
                what,
                st.token.display_name(),
                st.span,
            )),
            None => Err(ParseError::eof(what)),
        }
    }

    #[inline]
    pub(super) fn skip_newlines(&mut self) {
        while matches!(self.peek(), Some(Token::Newline)) {
            self.advance();
        }
    }

    pub(super) fn make_stmt(&mut self, kind: StmtKind, span: Span) -> Stmt {
        let id = StmtId(self.next_id);
        self.next_id += 1;
        Stmt { kind, span, id }
    }

    /// Parses `{`-delimited statements up to the closing brace.
    pub(super) fn parse_body(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut statements = Vec::with_capacity(16);
        self.skip_newlines();
        while !matches!(self.peek(), Some(Token::RightBrace) | None) {
            statements.push(self.parse_statement()?);
            self.skip_newlines();
        }
        Ok(statements)
    }
}

/// Parses a token stream into a program.
pub fn parse(tokens: Vec<SpannedToken>) -> Result<Vec<Stmt>, ParseError> {
    let mut parser = Parser::new(tokens);
    let mut statements = Vec::with_capacity(32);

    parser.skip_newlines();
    while parser.peek().is_some() {
        statements.push(parser.parse_statement()?);
        parser.skip_newlines();
    }

    Ok(statements)
}
