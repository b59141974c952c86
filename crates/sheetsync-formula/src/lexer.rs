//! Formula tokenizer
//!
//! Produces tokens that remember their byte span in the formula text, so
//! references can be rewritten in place without re-printing the formula.

use std::ops::Range;

use crate::error::{FormulaError, FormulaResult};
use sheetsync_core::CellError;

/// A token and where it sits in the formula text
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Range<usize>,
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Number(f64),
    String(String),
    Boolean(bool),
    Error(CellError),

    // Identifiers and references
    Identifier(String), // Function name or defined name
    CellRef(String),    // A1, $A$1
    ColumnRef(String),  // The D of D:D
    RowRef(String),     // The 3 of 3:5
    SheetRef(String),   // Sheet1! or 'My Sheet'! (unquoted name)

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Percent,
    Ampersand,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    Colon,
    Comma,

    // Delimiters
    LeftParen,
    RightParen,
}

impl TokenKind {
    /// Whether the token names cells (a cell, column or row reference)
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            TokenKind::CellRef(_) | TokenKind::ColumnRef(_) | TokenKind::RowRef(_)
        )
    }
}

/// Split formula text into tokens
///
/// A leading `=` is skipped; spans always index into `formula` itself.
pub fn tokenize(formula: &str) -> FormulaResult<Vec<Token>> {
    let start = if formula.starts_with('=') { 1 } else { 0 };
    let mut lexer = Lexer {
        input: formula,
        pos: start,
        tokens: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn run(&mut self) -> FormulaResult<()> {
        loop {
            self.skip_whitespace();
            let Some(c) = self.peek_char() else {
                return Ok(());
            };
            let start = self.pos;
            let kind = self.scan_token(c)?;
            self.tokens.push(Token {
                kind,
                span: start..self.pos,
            });
        }
    }

    fn scan_token(&mut self, c: char) -> FormulaResult<TokenKind> {
        let single = match c {
            '+' => Some(TokenKind::Plus),
            '-' => Some(TokenKind::Minus),
            '*' => Some(TokenKind::Star),
            '/' => Some(TokenKind::Slash),
            '^' => Some(TokenKind::Caret),
            '%' => Some(TokenKind::Percent),
            '&' => Some(TokenKind::Ampersand),
            ':' => Some(TokenKind::Colon),
            ',' => Some(TokenKind::Comma),
            '(' => Some(TokenKind::LeftParen),
            ')' => Some(TokenKind::RightParen),
            '=' => Some(TokenKind::Equal),
            _ => None,
        };
        if let Some(kind) = single {
            self.advance();
            return Ok(kind);
        }

        match c {
            '<' => {
                self.advance();
                Ok(match self.peek_char() {
                    Some('=') => {
                        self.advance();
                        TokenKind::LessEqual
                    }
                    Some('>') => {
                        self.advance();
                        TokenKind::NotEqual
                    }
                    _ => TokenKind::LessThan,
                })
            }
            '>' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    return Ok(TokenKind::GreaterEqual);
                }
                Ok(TokenKind::GreaterThan)
            }
            '"' => self.scan_string(),
            '\'' => self.scan_quoted_sheet(),
            '#' => self.scan_error(),
            c if c.is_ascii_digit()
                || (c == '.' && self.peek_char_at(1).map_or(false, |c| c.is_ascii_digit())) =>
            {
                Ok(self.scan_number())
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => Ok(self.scan_word()),
            other => Err(FormulaError::Parse(format!(
                "Unexpected character '{}' at position {}",
                other, self.pos
            ))),
        }
    }

    fn scan_string(&mut self) -> FormulaResult<TokenKind> {
        self.advance(); // opening quote

        let mut s = String::new();
        loop {
            match self.peek_char() {
                Some('"') if self.peek_char_at(1) == Some('"') => {
                    s.push('"');
                    self.advance();
                    self.advance();
                }
                Some('"') => {
                    self.advance();
                    return Ok(TokenKind::String(s));
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
                None => return Err(FormulaError::Parse("Unterminated string literal".into())),
            }
        }
    }

    fn scan_quoted_sheet(&mut self) -> FormulaResult<TokenKind> {
        self.advance(); // opening quote

        let mut name = String::new();
        loop {
            match self.peek_char() {
                Some('\'') if self.peek_char_at(1) == Some('\'') => {
                    name.push('\'');
                    self.advance();
                    self.advance();
                }
                Some('\'') => {
                    self.advance();
                    break;
                }
                Some(c) => {
                    name.push(c);
                    self.advance();
                }
                None => return Err(FormulaError::Parse("Unterminated sheet name".into())),
            }
        }

        if self.peek_char() != Some('!') {
            return Err(FormulaError::Parse(format!(
                "Expected '!' after sheet name '{}'",
                name
            )));
        }
        self.advance();
        Ok(TokenKind::SheetRef(name))
    }

    fn scan_error(&mut self) -> FormulaResult<TokenKind> {
        let start = self.pos;
        self.advance();
        while self
            .peek_char()
            .map_or(false, |c| c.is_ascii_alphanumeric() || matches!(c, '!' | '/' | '?'))
        {
            self.advance();
        }
        let text = &self.input[start..self.pos];
        CellError::from_str(text)
            .map(TokenKind::Error)
            .ok_or_else(|| FormulaError::Parse(format!("Unknown error literal '{}'", text)))
    }

    fn scan_number(&mut self) -> TokenKind {
        let start = self.pos;
        self.skip_digits();

        let mut integral = true;
        if self.peek_char() == Some('.') {
            integral = false;
            self.advance();
            self.skip_digits();
        }
        if matches!(self.peek_char(), Some('e' | 'E'))
            && self
                .peek_char_at(1)
                .map_or(false, |c| c.is_ascii_digit() || c == '+' || c == '-')
        {
            integral = false;
            self.advance();
            if matches!(self.peek_char(), Some('+' | '-')) {
                self.advance();
            }
            self.skip_digits();
        }

        let text = &self.input[start..self.pos];
        if integral && self.touches_colon() {
            return TokenKind::RowRef(text.to_string());
        }
        TokenKind::Number(text.parse().unwrap_or(0.0))
    }

    fn scan_word(&mut self) -> TokenKind {
        let start = self.pos;
        while self
            .peek_char()
            .map_or(false, |c| c.is_alphanumeric() || matches!(c, '_' | '$' | '.'))
        {
            self.advance();
        }
        let text = &self.input[start..self.pos];
        let next = self.peek_char();

        if next == Some('!') {
            self.advance();
            return TokenKind::SheetRef(text.to_string());
        }

        if next != Some('(') {
            if text.eq_ignore_ascii_case("TRUE") {
                return TokenKind::Boolean(true);
            }
            if text.eq_ignore_ascii_case("FALSE") {
                return TokenKind::Boolean(false);
            }
            if is_cell_reference(text) {
                return TokenKind::CellRef(text.to_string());
            }
            if self.touches_colon() {
                if is_column_reference(text) {
                    return TokenKind::ColumnRef(text.to_string());
                }
                if is_row_reference(text) {
                    return TokenKind::RowRef(text.to_string());
                }
            }
        }

        TokenKind::Identifier(text.to_string())
    }

    /// Whether the word just scanned is one side of a `:`
    fn touches_colon(&self) -> bool {
        self.peek_char() == Some(':')
            || matches!(self.tokens.last(), Some(t) if t.kind == TokenKind::Colon)
    }

    // === Helper methods ===

    fn skip_digits(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, char::is_whitespace) {
            self.advance();
        }
    }
}

/// `[$]A-XFD[$]digits`
pub(crate) fn is_cell_reference(text: &str) -> bool {
    let rest = text.strip_prefix('$').unwrap_or(text);
    let letters = rest.bytes().take_while(u8::is_ascii_alphabetic).count();
    if letters == 0 || letters > 3 {
        return false;
    }
    let rest = &rest[letters..];
    let digits = rest.strip_prefix('$').unwrap_or(rest);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// `[$]A-XFD`
fn is_column_reference(text: &str) -> bool {
    let letters = text.strip_prefix('$').unwrap_or(text);
    (1..=3).contains(&letters.len()) && letters.bytes().all(|b| b.is_ascii_alphabetic())
}

/// `$digits` (bare digits are scanned as numbers)
fn is_row_reference(text: &str) -> bool {
    match text.strip_prefix('$') {
        Some(digits) => !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}
