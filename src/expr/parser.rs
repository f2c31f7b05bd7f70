use super::lexer::{Lexer, SpannedToken, Token};
use super::{BinaryOp, Expression, UnaryOp, Value};
use crate::error::ParseError;

/// Deepest nesting accepted, counted both in brackets/operators while
/// descending and in the height of the resulting tree.
pub const MAX_DEPTH: usize = 64;

/// Parses parameter text into an [`Expression`].
///
/// Grammar, loosest binding first:
///
/// ```text
/// or         := and ("or" and)*
/// and        := not ("and" not)*
/// not        := "not" not | comparison
/// comparison := additive (("==" | "!=" | "<" | "<=" | ">" | ">=") additive)*
/// additive   := term (("+" | "-") term)*
/// term       := unary (("*" | "/" | "//" | "%") unary)*
/// unary      := ("-" | "+") unary | atom
/// atom       := number | string | name | name "(" args ")" | "(" or ")" | "[" args "]"
/// ```
///
/// Text nested deeper than [`MAX_DEPTH`] fails with [`ParseError::TooDeep`].
pub fn parse(text: &str) -> Result<Expression, ParseError> {
    let tokens = Lexer::new(text).tokenize()?;
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        nesting: 0,
    };
    let parsed = parser.parse_or()?;
    match parser.peek() {
        None => Ok(parsed.expr),
        Some(extra) => Err(ParseError::UnexpectedToken {
            found: extra.token.to_string(),
            offset: extra.offset,
        }),
    }
}

/// An expression together with the height of its tree.
struct Parsed {
    expr: Expression,
    depth: usize,
}

impl Parsed {
    fn leaf(expr: Expression) -> Self {
        Self { expr, depth: 1 }
    }
}

struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    nesting: usize,
}

impl Parser {
    fn peek(&self) -> Option<&SpannedToken> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<SpannedToken> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn offset(&self) -> usize {
        self.peek()
            .or_else(|| self.tokens.last())
            .map(|t| t.offset)
            .unwrap_or_default()
    }

    fn check(&self, expected: &Token) -> bool {
        self.peek().is_some_and(|t| &t.token == expected)
    }

    fn check_keyword(&self, keyword: &str) -> bool {
        matches!(
            self.peek(),
            Some(SpannedToken { token: Token::Ident(name), .. }) if name == keyword
        )
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        match self.advance() {
            Some(t) if t.token == expected => Ok(()),
            Some(t) => Err(ParseError::UnexpectedToken {
                found: t.token.to_string(),
                offset: t.offset,
            }),
            None => Err(ParseError::UnexpectedEnd {
                expected: format!("'{}'", expected),
            }),
        }
    }

    /// Runs `inner` one nesting level deeper.
    fn nested<T>(
        &mut self,
        inner: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.nesting >= MAX_DEPTH {
            return Err(ParseError::TooDeep {
                offset: self.offset(),
                limit: MAX_DEPTH,
            });
        }
        self.nesting += 1;
        let result = inner(self);
        self.nesting -= 1;
        result
    }

    fn node(&self, expr: Expression, depth: usize) -> Result<Parsed, ParseError> {
        if depth > MAX_DEPTH {
            return Err(ParseError::TooDeep {
                offset: self.offset(),
                limit: MAX_DEPTH,
            });
        }
        Ok(Parsed { expr, depth })
    }

    fn binary(&self, op: BinaryOp, left: Parsed, right: Parsed) -> Result<Parsed, ParseError> {
        let depth = left.depth.max(right.depth) + 1;
        self.node(Expression::binary(op, left.expr, right.expr), depth)
    }

    fn unary(&self, op: UnaryOp, operand: Parsed) -> Result<Parsed, ParseError> {
        let depth = operand.depth + 1;
        self.node(Expression::unary(op, operand.expr), depth)
    }

    fn parse_or(&mut self) -> Result<Parsed, ParseError> {
        let mut left = self.parse_and()?;
        while self.check_keyword("or") {
            self.advance();
            let right = self.parse_and()?;
            left = self.binary(BinaryOp::Or, left, right)?;
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Parsed, ParseError> {
        let mut left = self.parse_not()?;
        while self.check_keyword("and") {
            self.advance();
            let right = self.parse_not()?;
            left = self.binary(BinaryOp::And, left, right)?;
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Parsed, ParseError> {
        if self.check_keyword("not") {
            self.advance();
            let operand = self.nested(Self::parse_not)?;
            return self.unary(UnaryOp::Not, operand);
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Parsed, ParseError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek().map(|t| &t.token) {
                Some(Token::EqEq) => BinaryOp::Equal,
                Some(Token::NotEq) => BinaryOp::NotEqual,
                Some(Token::Less) => BinaryOp::SmallerThan,
                Some(Token::LessEq) => BinaryOp::SmallerThanOrEqual,
                Some(Token::Greater) => BinaryOp::GreaterThan,
                Some(Token::GreaterEq) => BinaryOp::GreaterThanOrEqual,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_additive()?;
            left = self.binary(op, left, right)?;
        }
    }

    fn parse_additive(&mut self) -> Result<Parsed, ParseError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek().map(|t| &t.token) {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Subtract,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_term()?;
            left = self.binary(op, left, right)?;
        }
    }

    fn parse_term(&mut self) -> Result<Parsed, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek().map(|t| &t.token) {
                Some(Token::Star) => BinaryOp::Multiply,
                Some(Token::Slash) => BinaryOp::Divide,
                Some(Token::DoubleSlash) => BinaryOp::FloorDivide,
                Some(Token::Percent) => BinaryOp::Modulo,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_unary()?;
            left = self.binary(op, left, right)?;
        }
    }

    fn parse_unary(&mut self) -> Result<Parsed, ParseError> {
        let op = match self.peek().map(|t| &t.token) {
            Some(Token::Minus) => UnaryOp::Negate,
            Some(Token::Plus) => UnaryOp::Plus,
            _ => return self.parse_atom(),
        };
        self.advance();
        let operand = self.nested(Self::parse_unary)?;
        self.unary(op, operand)
    }

    fn parse_atom(&mut self) -> Result<Parsed, ParseError> {
        let Some(SpannedToken { token, offset }) = self.advance() else {
            return Err(ParseError::UnexpectedEnd {
                expected: "a value".to_string(),
            });
        };

        match token {
            Token::Int(i) => Ok(Parsed::leaf(Expression::Literal(Value::Int(i)))),
            Token::Float(f) => Ok(Parsed::leaf(Expression::Literal(Value::Float(f)))),
            Token::Str(s) => Ok(Parsed::leaf(Expression::Literal(Value::Str(s)))),
            Token::LParen => {
                let inner = self.nested(Self::parse_or)?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::LBracket => {
                let (items, depth) = self.parse_arguments(Token::RBracket)?;
                self.node(Expression::List(items), depth + 1)
            }
            Token::Ident(name) => {
                let keyword = match name.as_str() {
                    "True" | "true" => Some(Value::Bool(true)),
                    "False" | "false" => Some(Value::Bool(false)),
                    "None" | "null" => Some(Value::Null),
                    _ => None,
                };
                if let Some(value) = keyword {
                    return Ok(Parsed::leaf(Expression::Literal(value)));
                }
                if matches!(name.as_str(), "and" | "or" | "not") {
                    return Err(ParseError::UnexpectedToken {
                        found: name,
                        offset,
                    });
                }
                if self.check(&Token::LParen) {
                    self.advance();
                    let (args, depth) = self.parse_arguments(Token::RParen)?;
                    self.node(Expression::Call(name, args), depth + 1)
                } else {
                    Ok(Parsed::leaf(Expression::Name(name)))
                }
            }
            other => Err(ParseError::UnexpectedToken {
                found: other.to_string(),
                offset,
            }),
        }
    }

    /// Parses a comma separated list up to and including `close`, returning
    /// the items and the height of the tallest one. A trailing comma is
    /// accepted.
    fn parse_arguments(&mut self, close: Token) -> Result<(Vec<Expression>, usize), ParseError> {
        self.nested(|parser| {
            let mut items = Vec::new();
            let mut depth = 0;
            loop {
                if parser.check(&close) {
                    parser.advance();
                    return Ok((items, depth));
                }
                let item = parser.parse_or()?;
                depth = depth.max(item.depth);
                items.push(item.expr);
                if parser.check(&Token::Comma) {
                    parser.advance();
                } else {
                    parser.expect(close)?;
                    return Ok((items, depth));
                }
            }
        })
    }
}
