use crate::error::ParseError;
use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

/// Token types of the parameter expression language.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    /// Identifier, possibly dotted (`blk_0.freq`). Keywords are identifiers too
    /// and are recognized by the parser.
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    Percent,
    EqEq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Int(i) => write!(f, "{}", i),
            Token::Float(n) => write!(f, "{}", n),
            Token::Str(s) => write!(f, "{:?}", s),
            Token::Ident(name) => write!(f, "{}", name),
            Token::Plus => f.write_str("+"),
            Token::Minus => f.write_str("-"),
            Token::Star => f.write_str("*"),
            Token::Slash => f.write_str("/"),
            Token::DoubleSlash => f.write_str("//"),
            Token::Percent => f.write_str("%"),
            Token::EqEq => f.write_str("=="),
            Token::NotEq => f.write_str("!="),
            Token::Less => f.write_str("<"),
            Token::LessEq => f.write_str("<="),
            Token::Greater => f.write_str(">"),
            Token::GreaterEq => f.write_str(">="),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::LBracket => f.write_str("["),
            Token::RBracket => f.write_str("]"),
            Token::Comma => f.write_str(","),
        }
    }
}

/// A token with the byte offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub offset: usize,
}

/// Converts expression text into tokens.
pub struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
        }
    }

    /// Tokenizes the whole input.
    pub fn tokenize(mut self) -> Result<Vec<SpannedToken>, ParseError> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Option<SpannedToken>, ParseError> {
        self.skip_whitespace();

        let Some(&(offset, c)) = self.chars.peek() else {
            return Ok(None);
        };

        let token = match c {
            '0'..='9' => self.read_number(offset)?,
            '"' | '\'' => self.read_string(offset, c)?,
            c if c.is_alphabetic() || c == '_' => self.read_identifier(offset),
            _ => {
                self.chars.next();
                match c {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '%' => Token::Percent,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    ',' => Token::Comma,
                    '/' => {
                        if self.eat('/') {
                            Token::DoubleSlash
                        } else {
                            Token::Slash
                        }
                    }
                    '=' if self.eat('=') => Token::EqEq,
                    '!' if self.eat('=') => Token::NotEq,
                    '<' => {
                        if self.eat('=') {
                            Token::LessEq
                        } else {
                            Token::Less
                        }
                    }
                    '>' => {
                        if self.eat('=') {
                            Token::GreaterEq
                        } else {
                            Token::Greater
                        }
                    }
                    _ => return Err(ParseError::UnexpectedChar { ch: c, offset }),
                }
            }
        };

        Ok(Some(SpannedToken { token, offset }))
    }

    fn skip_whitespace(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_whitespace() {
                self.chars.next();
            } else {
                break;
            }
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if matches!(self.chars.peek(), Some(&(_, c)) if c == expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn current_offset(&mut self) -> usize {
        self.chars
            .peek()
            .map(|&(offset, _)| offset)
            .unwrap_or(self.input.len())
    }

    fn consume_digits(&mut self) {
        while matches!(self.chars.peek(), Some(&(_, c)) if c.is_ascii_digit() || c == '_') {
            self.chars.next();
        }
    }

    fn read_number(&mut self, start: usize) -> Result<Token, ParseError> {
        let mut is_float = false;
        self.consume_digits();

        if self.eat('.') {
            is_float = true;
            self.consume_digits();
        }
        if matches!(self.chars.peek(), Some(&(_, 'e' | 'E'))) {
            is_float = true;
            self.chars.next();
            if matches!(self.chars.peek(), Some(&(_, '+' | '-'))) {
                self.chars.next();
            }
            self.consume_digits();
        }

        let end = self.current_offset();
        let text = &self.input[start..end];
        let cleaned = text.replace('_', "");
        let invalid = || ParseError::InvalidNumber {
            text: text.to_string(),
            offset: start,
        };

        if is_float {
            cleaned.parse().map(Token::Float).map_err(|_| invalid())
        } else {
            cleaned.parse().map(Token::Int).map_err(|_| invalid())
        }
    }

    fn read_string(&mut self, start: usize, quote: char) -> Result<Token, ParseError> {
        self.chars.next();
        let mut value = String::new();
        loop {
            match self.chars.next() {
                None => return Err(ParseError::UnterminatedString { offset: start }),
                Some((_, c)) if c == quote => break,
                Some((_, '\\')) => match self.chars.next() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, other)) => value.push(other),
                    None => return Err(ParseError::UnterminatedString { offset: start }),
                },
                Some((_, c)) => value.push(c),
            }
        }
        Ok(Token::Str(value))
    }

    fn read_identifier(&mut self, start: usize) -> Token {
        loop {
            match self.chars.peek() {
                Some(&(_, c)) if c.is_alphanumeric() || c == '_' => {
                    self.chars.next();
                }
                // A dot continues the identifier only when an identifier follows.
                Some(&(offset, '.')) => {
                    let next = self.input[offset + 1..].chars().next();
                    if next.is_some_and(|n| n.is_alphabetic() || n == '_') {
                        self.chars.next();
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }
        let end = self.current_offset();
        Token::Ident(self.input[start..end].to_string())
    }
}
