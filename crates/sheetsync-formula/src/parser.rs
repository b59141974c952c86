//! Formula parser
//!
//! A recursive descent parser over [`crate::lexer`] tokens with Excel
//! operator precedence.

use crate::ast::{BinaryOperator, CellReference, FormulaExpr, RangeReference, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::lexer::{tokenize, Token, TokenKind};
use sheetsync_core::{CellAddress, CellRange, MAX_ROWS};

/// Parse a formula string into an AST
///
/// # Example
/// ```rust
/// use sheetsync_formula::parse_formula;
///
/// let ast = parse_formula("=1+2").unwrap();
/// let ast = parse_formula("=SUM(Unit!D:D)+SUM(Common!D:D)").unwrap();
/// let ast = parse_formula("=IF(A1>0,\"Yes\",\"No\")").unwrap();
/// ```
pub fn parse_formula(formula: &str) -> FormulaResult<FormulaExpr> {
    let formula = formula.trim();
    if !formula.starts_with('=') {
        return Err(FormulaError::Parse("Formula must start with '='".into()));
    }

    let mut parser = FormulaParser {
        tokens: tokenize(formula)?,
        pos: 0,
    };
    if parser.tokens.is_empty() {
        return Err(FormulaError::Parse("Empty formula".into()));
    }

    let expr = parser.parse_expression()?;
    if let Some(token) = parser.current() {
        return Err(FormulaError::Parse(format!(
            "Unexpected {:?} after expression at position {}",
            token.kind, token.span.start
        )));
    }

    Ok(expr)
}

struct FormulaParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl FormulaParser {
    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn current_kind(&self) -> Option<&TokenKind> {
        self.current().map(|t| &t.kind)
    }

    fn consume(&mut self) -> Option<TokenKind> {
        let token = self.tokens.get(self.pos)?.kind.clone();
        self.pos += 1;
        Some(token)
    }

    fn expect(&mut self, expected: TokenKind) -> FormulaResult<()> {
        match self.current_kind() {
            Some(kind) if *kind == expected => {
                self.pos += 1;
                Ok(())
            }
            other => Err(FormulaError::Parse(format!(
                "Expected {:?}, got {:?}",
                expected, other
            ))),
        }
    }

    // === Expression parsing with precedence ===
    // Precedence (lowest to highest):
    // 1. Comparison: =, <>, <, <=, >, >=
    // 2. Concatenation: &
    // 3. Addition/Subtraction: +, -
    // 4. Multiplication/Division: *, /
    // 5. Exponentiation: ^
    // 6. Unary: -, + prefix and % postfix
    // 7. Primary: literals, references, function calls, parentheses

    fn parse_expression(&mut self) -> FormulaResult<FormulaExpr> {
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_concatenation()?;

        loop {
            let op = match self.current_kind() {
                Some(TokenKind::Equal) => BinaryOperator::Equal,
                Some(TokenKind::NotEqual) => BinaryOperator::NotEqual,
                Some(TokenKind::LessThan) => BinaryOperator::LessThan,
                Some(TokenKind::LessEqual) => BinaryOperator::LessEqual,
                Some(TokenKind::GreaterThan) => BinaryOperator::GreaterThan,
                Some(TokenKind::GreaterEqual) => BinaryOperator::GreaterEqual,
                _ => break,
            };

            self.consume();
            let right = self.parse_concatenation()?;
            left = binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_concatenation(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_additive()?;

        while matches!(self.current_kind(), Some(TokenKind::Ampersand)) {
            self.consume();
            let right = self.parse_additive()?;
            left = binary(BinaryOperator::Concat, left, right);
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current_kind() {
                Some(TokenKind::Plus) => BinaryOperator::Add,
                Some(TokenKind::Minus) => BinaryOperator::Subtract,
                _ => break,
            };

            self.consume();
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_exponent()?;

        loop {
            let op = match self.current_kind() {
                Some(TokenKind::Star) => BinaryOperator::Multiply,
                Some(TokenKind::Slash) => BinaryOperator::Divide,
                _ => break,
            };

            self.consume();
            let right = self.parse_exponent()?;
            left = binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_exponent(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_unary()?;

        // Left associative, like Excel: 2^3^2 = 64
        while matches!(self.current_kind(), Some(TokenKind::Caret)) {
            self.consume();
            let right = self.parse_unary()?;
            left = binary(BinaryOperator::Power, left, right);
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> FormulaResult<FormulaExpr> {
        match self.current_kind() {
            Some(TokenKind::Minus) => {
                self.consume();
                let operand = self.parse_unary()?;
                return Ok(FormulaExpr::UnaryOp {
                    op: UnaryOperator::Negate,
                    operand: Box::new(operand),
                });
            }
            Some(TokenKind::Plus) => {
                self.consume();
                return self.parse_unary();
            }
            _ => {}
        }

        let mut expr = self.parse_primary()?;
        while matches!(self.current_kind(), Some(TokenKind::Percent)) {
            self.consume();
            expr = FormulaExpr::UnaryOp {
                op: UnaryOperator::Percent,
                operand: Box::new(expr),
            };
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> FormulaResult<FormulaExpr> {
        let Some(kind) = self.consume() else {
            return Err(FormulaError::Parse("Unexpected end of formula".into()));
        };

        match kind {
            TokenKind::Number(n) => Ok(FormulaExpr::Number(n)),
            TokenKind::String(s) => Ok(FormulaExpr::String(s)),
            TokenKind::Boolean(b) => Ok(FormulaExpr::Boolean(b)),
            TokenKind::Error(e) => Ok(FormulaExpr::Error(e)),

            TokenKind::LeftParen => {
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RightParen)?;
                Ok(expr)
            }

            TokenKind::SheetRef(sheet) => match self.consume() {
                Some(first) if first.is_reference() => self.parse_reference(Some(sheet), first),
                other => Err(FormulaError::Parse(format!(
                    "Expected reference after sheet '{}', got {:?}",
                    sheet, other
                ))),
            },

            first @ (TokenKind::CellRef(_) | TokenKind::ColumnRef(_) | TokenKind::RowRef(_)) => {
                self.parse_reference(None, first)
            }

            TokenKind::Identifier(name) => {
                if matches!(self.current_kind(), Some(TokenKind::LeftParen)) {
                    self.parse_function_call(name)
                } else {
                    Ok(FormulaExpr::NameRef(name))
                }
            }

            other => Err(FormulaError::Parse(format!("Unexpected token: {:?}", other))),
        }
    }

    fn parse_function_call(&mut self, name: String) -> FormulaResult<FormulaExpr> {
        self.expect(TokenKind::LeftParen)?;

        let mut args = Vec::new();
        if !matches!(self.current_kind(), Some(TokenKind::RightParen)) {
            args.push(self.parse_expression()?);

            while matches!(self.current_kind(), Some(TokenKind::Comma)) {
                self.consume();
                args.push(self.parse_expression()?);
            }
        }

        self.expect(TokenKind::RightParen)?;

        Ok(FormulaExpr::Function {
            name: name.to_uppercase(),
            args,
        })
    }

    /// `first` is a reference token; an optional `:` and second reference follow
    fn parse_reference(
        &mut self,
        sheet: Option<String>,
        first: TokenKind,
    ) -> FormulaResult<FormulaExpr> {
        if !matches!(self.current_kind(), Some(TokenKind::Colon)) {
            return match first {
                TokenKind::CellRef(text) => Ok(FormulaExpr::CellRef(CellReference {
                    sheet,
                    address: parse_address(&text)?,
                })),
                other => Err(FormulaError::Parse(format!(
                    "Incomplete range reference {:?}",
                    other
                ))),
            };
        }

        self.consume();
        let second = self
            .consume()
            .ok_or_else(|| FormulaError::Parse("Expected reference after ':'".into()))?;

        let range = match (&first, &second) {
            (TokenKind::CellRef(a), TokenKind::CellRef(b)) => {
                CellRange::new(parse_address(a)?, parse_address(b)?)
            }
            (TokenKind::ColumnRef(a), TokenKind::ColumnRef(b)) => {
                let (a, b) = (parse_column(a)?, parse_column(b)?);
                CellRange::whole_columns(a.min(b), a.max(b))
            }
            (TokenKind::RowRef(a), TokenKind::RowRef(b)) => {
                let (a, b) = (parse_row(a)?, parse_row(b)?);
                CellRange::whole_rows(a.min(b), a.max(b))
            }
            _ => {
                return Err(FormulaError::Parse(format!(
                    "Mismatched range {:?}:{:?}",
                    first, second
                )))
            }
        };

        Ok(FormulaExpr::RangeRef(RangeReference { sheet, range }))
    }
}

fn binary(op: BinaryOperator, left: FormulaExpr, right: FormulaExpr) -> FormulaExpr {
    FormulaExpr::BinaryOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn parse_address(text: &str) -> FormulaResult<CellAddress> {
    CellAddress::parse(text)
        .map_err(|e| FormulaError::Parse(format!("Invalid cell reference '{}': {}", text, e)))
}

fn parse_column(text: &str) -> FormulaResult<u16> {
    CellAddress::letters_to_column(text.trim_start_matches('$'))
        .map_err(|e| FormulaError::Parse(format!("Invalid column '{}': {}", text, e)))
}

fn parse_row(text: &str) -> FormulaResult<u32> {
    text.trim_start_matches('$')
        .parse::<u32>()
        .ok()
        .filter(|row| (1..=MAX_ROWS).contains(row))
        .map(|row| row - 1)
        .ok_or_else(|| FormulaError::Parse(format!("Invalid row '{}'", text)))
}
