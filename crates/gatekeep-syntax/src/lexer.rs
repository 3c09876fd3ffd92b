use crate::error::{LexError, Span};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;

static KEYWORDS: Lazy<HashMap<&'static str, Token>> = Lazy::new(|| {
    let mut m = HashMap::with_capacity(32);
    m.insert("run", Token::Run);
    m.insert("print", Token::Print);
    m.insert("block", Token::Block);
    m.insert("warn", Token::Warn);
    m.insert("allow", Token::Allow);
    m.insert("parallel", Token::Parallel);
    m.insert("let", Token::Let);
    m.insert("foreach", Token::Foreach);
    m.insert("if", Token::If);
    m.insert("then", Token::Then);
    m.insert("else", Token::Else);
    m.insert("match", Token::Match);
    m.insert("matching", Token::Matching);
    m.insert("try", Token::Try);
    m.insert("catch", Token::Catch);
    m.insert("break", Token::Break);
    m.insert("continue", Token::Continue);
    m.insert("macro", Token::Macro);
    m.insert("import", Token::Import);
    m.insert("use", Token::Use);
    m.insert("group", Token::Group);
    m.insert("as", Token::As);
    m.insert("in", Token::In);
    m.insert("not", Token::Not);
    m.insert("and", Token::And);
    m.insert("or", Token::Or);
    m.insert("true", Token::True);
    m.insert("false", Token::False);
    m.insert("null", Token::Null);
    m
});

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Run,
    Print,
    Block,
    Warn,
    Allow,
    Parallel,
    Let,
    Foreach,
    If,
    Then,
    Else,
    Match,
    Matching,
    Try,
    Catch,
    Break,
    Continue,
    Macro,
    Import,
    Use,
    Group,
    As,
    In,
    Not,
    And,
    Or,
    True,
    False,
    Null,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    LeftParen,
    RightParen,
    Dot,
    Comma,
    Arrow,
    FatArrow,
    At,
    Identifier(String),
    String(String),
    Number(f64),
    Newline,
}

impl Token {
    /// Human-readable name used in parse errors.
    pub fn display_name(&self) -> String {
        match self {
            Token::Identifier(s) => format!("'{}'", s),
            Token::String(s) => format!("string \"{}\"", s),
            Token::Number(n) => format!("number {}", n),
            Token::Newline => "newline".to_string(),
            Token::Eq => "'=='".to_string(),
            Token::Ne => "'!='".to_string(),
            Token::Lt => "'<'".to_string(),
            Token::Le => "'<='".to_string(),
            Token::Gt => "'>'".to_string(),
            Token::Ge => "'>='".to_string(),
            Token::Plus => "'+'".to_string(),
            Token::Minus => "'-'".to_string(),
            Token::Star => "'*'".to_string(),
            Token::Slash => "'/'".to_string(),
            Token::Percent => "'%'".to_string(),
            Token::Assign => "'='".to_string(),
            Token::LeftBrace => "'{'".to_string(),
            Token::RightBrace => "'}'".to_string(),
            Token::LeftBracket => "'['".to_string(),
            Token::RightBracket => "']'".to_string(),
            Token::LeftParen => "'('".to_string(),
            Token::RightParen => "')'".to_string(),
            Token::Dot => "'.'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Arrow => "'->'".to_string(),
            Token::FatArrow => "'=>'".to_string(),
            Token::At => "'@'".to_string(),
            other => format!("keyword '{}'", other),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Token::Run => write!(f, "run"),
            Token::Print => write!(f, "print"),
            Token::Block => write!(f, "block"),
            Token::Warn => write!(f, "warn"),
            Token::Allow => write!(f, "allow"),
            Token::Parallel => write!(f, "parallel"),
            Token::Let => write!(f, "let"),
            Token::Foreach => write!(f, "foreach"),
            Token::If => write!(f, "if"),
            Token::Then => write!(f, "then"),
            Token::Else => write!(f, "else"),
            Token::Match => write!(f, "match"),
            Token::Matching => write!(f, "matching"),
            Token::Try => write!(f, "try"),
            Token::Catch => write!(f, "catch"),
            Token::Break => write!(f, "break"),
            Token::Continue => write!(f, "continue"),
            Token::Macro => write!(f, "macro"),
            Token::Import => write!(f, "import"),
            Token::Use => write!(f, "use"),
            Token::Group => write!(f, "group"),
            Token::As => write!(f, "as"),
            Token::In => write!(f, "in"),
            Token::Not => write!(f, "not"),
            Token::And => write!(f, "and"),
            Token::Or => write!(f, "or"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Null => write!(f, "null"),
            Token::Eq => write!(f, "=="),
            Token::Ne => write!(f, "!="),
            Token::Lt => write!(f, "<"),
            Token::Le => write!(f, "<="),
            Token::Gt => write!(f, ">"),
            Token::Ge => write!(f, ">="),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::Assign => write!(f, "="),
            Token::LeftBrace => write!(f, "{{"),
            Token::RightBrace => write!(f, "}}"),
            Token::LeftBracket => write!(f, "["),
            Token::RightBracket => write!(f, "]"),
            Token::LeftParen => write!(f, "("),
            Token::RightParen => write!(f, ")"),
            Token::Dot => write!(f, "."),
            Token::Comma => write!(f, ","),
            Token::Arrow => write!(f, "->"),
            Token::FatArrow => write!(f, "=>"),
            Token::At => write!(f, "@"),
            Token::Identifier(s) => write!(f, "{}", s),
            Token::String(s) => write!(f, "\"{}\"", s),
            Token::Number(n) => write!(f, "{}", n),
            Token::Newline => write!(f, "newline"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    col: usize,
    offset: usize,
    tokens: Vec<SpannedToken>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            line: 1,
            col: 1,
            offset: 0,
            tokens: Vec::with_capacity(input.len() / 4),
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        self.offset += ch.len_utf8();
        Some(ch)
    }

    fn mark(&self) -> (usize, usize, usize) {
        (self.line, self.col, self.offset)
    }

    fn span_from(&self, mark: (usize, usize, usize)) -> Span {
        Span::new(mark.0, mark.1, mark.2, self.offset)
    }

    fn push(&mut self, token: Token, mark: (usize, usize, usize)) {
        let span = self.span_from(mark);
        self.tokens.push(SpannedToken { token, span });
    }

    fn eat_if(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn lex_string(&mut self, mark: (usize, usize, usize)) -> Result<(), LexError> {
        // Opening quote already consumed. Interpolation markers (`${...}`)
        // are kept verbatim; the parser sub-parses them later.
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('"') => break,
                Some('\\') => {
                    let escaped = self.bump().ok_or(LexError::UnterminatedString {
                        span: self.span_from(mark),
                    })?;
                    text.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                }
                Some(ch) => text.push(ch),
                None => {
                    return Err(LexError::UnterminatedString {
                        span: self.span_from(mark),
                    });
                }
            }
        }
        self.push(Token::String(text), mark);
        Ok(())
    }

    fn lex_number(&mut self, mark: (usize, usize, usize)) -> Result<(), LexError> {
        let mut text = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() || ch == '.' {
                text.push(ch);
                self.bump();
            } else {
                break;
            }
        }

        let mut num: f64 = text.parse().map_err(|_| LexError::InvalidNumber {
            text: text.clone(),
            span: self.span_from(mark),
        })?;

        // Size-unit suffix: `5MB` reads as 5 * 1024 * 1024.
        if self.peek().is_some_and(|c| c.is_alphabetic()) {
            let mut unit = String::new();
            while let Some(ch) = self.peek() {
                if ch.is_alphabetic() {
                    unit.push(ch);
                    self.bump();
                } else {
                    break;
                }
            }
            num *= match unit.to_uppercase().as_str() {
                "KB" => 1024.0,
                "MB" => 1024.0 * 1024.0,
                "GB" => 1024.0 * 1024.0 * 1024.0,
                "TB" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
                _ => {
                    return Err(LexError::UnknownSizeUnit {
                        unit,
                        span: self.span_from(mark),
                    });
                }
            };
        }

        self.push(Token::Number(num), mark);
        Ok(())
    }

    fn lex_word(&mut self, mark: (usize, usize, usize)) {
        let mut ident = String::with_capacity(16);
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                ident.push(ch);
                self.bump();
            } else {
                break;
            }
        }
        let token = KEYWORDS
            .get(ident.as_str())
            .cloned()
            .unwrap_or(Token::Identifier(ident));
        self.push(token, mark);
    }

    fn run(mut self) -> Result<Vec<SpannedToken>, LexError> {
        while let Some(ch) = self.peek() {
            let mark = self.mark();
            match ch {
                ' ' | '\t' | '\r' => {
                    self.bump();
                }
                '\n' => {
                    self.bump();
                    self.push(Token::Newline, mark);
                }
                '#' => {
                    self.bump();
                    self.skip_line_comment();
                }
                '"' => {
                    self.bump();
                    self.lex_string(mark)?;
                }
                '0'..='9' => self.lex_number(mark)?,
                '=' => {
                    self.bump();
                    let token = if self.eat_if('=') {
                        Token::Eq
                    } else if self.eat_if('>') {
                        Token::FatArrow
                    } else {
                        Token::Assign
                    };
                    self.push(token, mark);
                }
                '!' => {
                    self.bump();
                    if self.eat_if('=') {
                        self.push(Token::Ne, mark);
                    } else {
                        return Err(LexError::UnexpectedChar {
                            ch: '!',
                            span: self.span_from(mark),
                            suggestion: Some("did you mean '!='?".to_string()),
                        });
                    }
                }
                '<' => {
                    self.bump();
                    let token = if self.eat_if('=') { Token::Le } else { Token::Lt };
                    self.push(token, mark);
                }
                '>' => {
                    self.bump();
                    let token = if self.eat_if('=') { Token::Ge } else { Token::Gt };
                    self.push(token, mark);
                }
                '-' => {
                    self.bump();
                    let token = if self.eat_if('>') {
                        Token::Arrow
                    } else {
                        Token::Minus
                    };
                    self.push(token, mark);
                }
                '/' => {
                    self.bump();
                    if self.eat_if('/') {
                        self.skip_line_comment();
                    } else {
                        self.push(Token::Slash, mark);
                    }
                }
                '+' | '*' | '%' | '{' | '}' | '[' | ']' | '(' | ')' | '.' | ',' | '@' => {
                    self.bump();
                    let token = match ch {
                        '+' => Token::Plus,
                        '*' => Token::Star,
                        '%' => Token::Percent,
                        '{' => Token::LeftBrace,
                        '}' => Token::RightBrace,
                        '[' => Token::LeftBracket,
                        ']' => Token::RightBracket,
                        '(' => Token::LeftParen,
                        ')' => Token::RightParen,
                        '.' => Token::Dot,
                        ',' => Token::Comma,
                        '@' => Token::At,
                        _ => unreachable!(),
                    };
                    self.push(token, mark);
                }
                _ if ch.is_alphabetic() || ch == '_' => self.lex_word(mark),
                _ => {
                    self.bump();
                    return Err(LexError::UnexpectedChar {
                        ch,
                        span: self.span_from(mark),
                        suggestion: None,
                    });
                }
            }
        }
        Ok(self.tokens)
    }
}

/// Turns source text into a token stream, stopping at the first error.
pub fn tokenize(input: &str) -> Result<Vec<SpannedToken>, LexError> {
    Lexer::new(input).run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Token> {
        tokenize(input).unwrap().into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn keywords_and_identifiers() {
        let tokens = kinds("run print block warn my_var");
        assert_eq!(tokens[0], Token::Run);
        assert_eq!(tokens[1], Token::Print);
        assert_eq!(tokens[2], Token::Block);
        assert_eq!(tokens[3], Token::Warn);
        assert_eq!(tokens[4], Token::Identifier("my_var".to_string()));
    }

    #[test]
    fn operators() {
        let tokens = kinds("== != < <= > >= + - * / % = -> =>");
        assert_eq!(
            tokens,
            vec![
                Token::Eq,
                Token::Ne,
                Token::Lt,
                Token::Le,
                Token::Gt,
                Token::Ge,
                Token::Plus,
                Token::Minus,
                Token::Star,
                Token::Slash,
                Token::Percent,
                Token::Assign,
                Token::Arrow,
                Token::FatArrow,
            ]
        );
    }

    #[test]
    fn string_with_escapes() {
        let tokens = kinds(r#""a \"quoted\" word""#);
        assert_eq!(tokens[0], Token::String("a \"quoted\" word".to_string()));
    }

    #[test]
    fn string_keeps_interpolation_markers() {
        let tokens = kinds(r#""hi ${name}!""#);
        assert_eq!(tokens[0], Token::String("hi ${name}!".to_string()));
    }

    #[test]
    fn numbers_and_size_units() {
        let tokens = kinds("42 3.5 2KB 1MB");
        assert_eq!(tokens[0], Token::Number(42.0));
        assert_eq!(tokens[1], Token::Number(3.5));
        assert_eq!(tokens[2], Token::Number(2048.0));
        assert_eq!(tokens[3], Token::Number(1024.0 * 1024.0));
    }

    #[test]
    fn unknown_size_unit_is_an_error() {
        assert!(matches!(
            tokenize("5QB"),
            Err(LexError::UnknownSizeUnit { .. })
        ));
    }

    #[test]
    fn comments_are_skipped() {
        let tokens = kinds("# a comment\nprint \"x\" // trailing");
        assert_eq!(tokens[0], Token::Newline);
        assert_eq!(tokens[1], Token::Print);
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn unterminated_string_fails() {
        assert!(matches!(
            tokenize("\"never closed"),
            Err(LexError::UnterminatedString { .. })
        ));
    }

    #[test]
    fn bare_bang_fails_with_suggestion() {
        let err = tokenize("print !x").unwrap_err();
        assert!(matches!(err, LexError::UnexpectedChar { ch: '!', .. }));
    }

    #[test]
    fn spans_track_line_and_column() {
        let tokens = tokenize("let x = 1\nlet y = 2").unwrap();
        let second_let = tokens
            .iter()
            .filter(|t| t.token == Token::Let)
            .nth(1)
            .unwrap();
        assert_eq!(second_let.span.line, 2);
        assert_eq!(second_let.span.col, 1);
    }

    #[test]
    fn dotted_access() {
        let tokens = kinds("git.files.staged");
        assert_eq!(tokens[0], Token::Identifier("git".to_string()));
        assert_eq!(tokens[1], Token::Dot);
        assert_eq!(tokens[3], Token::Dot);
    }
}
