//! Restricted arithmetic evaluator.
//!
//! Accepts digits, `+ - * / ^ ( ) .`, the square-root sign `√` and the
//! constant `π`. Anything else is rejected so the caller can hand the input
//! to the AI path instead.

use std::f64::consts::PI;

use thiserror::Error;

const MAX_DEPTH: usize = 256;

#[derive(Debug, Error, PartialEq)]
pub enum EvalError {
    #[error("expression is empty")]
    Empty,
    #[error("unsupported character '{0}' in expression")]
    Unsupported(char),
    #[error("malformed expression: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Input with all whitespace stripped.
    pub cleaned: String,
    pub value: f64,
}

impl Evaluation {
    pub fn display(&self) -> String {
        format_number(self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Pi,
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Sqrt,
    LParen,
    RParen,
}

pub fn clean(candidate: &str) -> String {
    candidate.chars().filter(|c| !c.is_whitespace()).collect()
}

pub fn is_allowed(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '+' | '-' | '*' | '/' | '(' | ')' | '.' | '^' | '√' | 'π')
}

/// Evaluates `candidate` if it is a pure arithmetic expression.
pub fn evaluate(candidate: &str) -> Result<Evaluation, EvalError> {
    let cleaned = clean(candidate);
    if cleaned.is_empty() {
        return Err(EvalError::Empty);
    }
    if let Some(bad) = cleaned.chars().find(|c| !is_allowed(*c)) {
        return Err(EvalError::Unsupported(bad));
    }

    let tokens = tokenize(&cleaned)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if let Some(token) = parser.peek() {
        return Err(EvalError::Malformed(format!(
            "unexpected {} at position {}",
            describe(token),
            parser.pos
        )));
    }

    Ok(Evaluation { cleaned, value })
}

/// Renders a result the way a calculator display would: shortest
/// round-trip decimal, exponent form (`1e+21`, `1e-7`) outside
/// `[1e-6, 1e21)`, `Infinity`/`NaN` for the non-finite cases.
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "Infinity".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else if value == 0.0 {
        "0".to_string()
    } else if value.abs() >= 1e21 || value.abs() < 1e-6 {
        let scientific = format!("{value:e}");
        match scientific.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{mantissa}e+{exponent}")
            }
            _ => scientific,
        }
    } else {
        value.to_string()
    }
}

fn tokenize(cleaned: &str) -> Result<Vec<Token>, EvalError> {
    let mut tokens = Vec::new();
    let mut chars = cleaned.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() || c == '.' {
            let mut literal = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_ascii_digit() || d == '.' {
                    literal.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            let value = literal
                .parse::<f64>()
                .map_err(|_| EvalError::Malformed(format!("invalid number '{literal}'")))?;
            tokens.push(Token::Number(value));
            continue;
        }

        let token = match c {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '^' => Token::Caret,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '√' => Token::Sqrt,
            'π' => Token::Pi,
            other => return Err(EvalError::Unsupported(other)),
        };
        tokens.push(token);
        chars.next();
    }

    Ok(tokens)
}

fn describe(token: Token) -> String {
    match token {
        Token::Number(n) => format!("number {n}"),
        Token::Pi => "'π'".to_string(),
        Token::Plus => "'+'".to_string(),
        Token::Minus => "'-'".to_string(),
        Token::Star => "'*'".to_string(),
        Token::Slash => "'/'".to_string(),
        Token::Caret => "'^'".to_string(),
        Token::Sqrt => "'√'".to_string(),
        Token::LParen => "'('".to_string(),
        Token::RParen => "')'".to_string(),
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn descend(&mut self) -> Result<(), EvalError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(EvalError::Malformed("expression nested too deeply".to_string()));
        }
        Ok(())
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64, EvalError> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.advance();
                    value += self.term()?;
                }
                Some(Token::Minus) => {
                    self.advance();
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    // term := unary (('*' | '/') unary)*
    fn term(&mut self) -> Result<f64, EvalError> {
        let mut value = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.advance();
                    value *= self.unary()?;
                }
                Some(Token::Slash) => {
                    self.advance();
                    value /= self.unary()?;
                }
                _ => return Ok(value),
            }
        }
    }

    // unary := ('-' | '+' | '√') unary | power
    fn unary(&mut self) -> Result<f64, EvalError> {
        self.descend()?;
        let value = match self.peek() {
            Some(Token::Minus) => {
                self.advance();
                -self.unary()?
            }
            Some(Token::Plus) => {
                self.advance();
                self.unary()?
            }
            Some(Token::Sqrt) => {
                self.advance();
                self.unary()?.sqrt()
            }
            _ => self.power()?,
        };
        self.depth -= 1;
        Ok(value)
    }

    // power := primary ('^' unary)?
    fn power(&mut self) -> Result<f64, EvalError> {
        let base = self.primary()?;
        if let Some(Token::Caret) = self.peek() {
            self.advance();
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    // primary := NUMBER | 'π' | '(' expr ')'
    fn primary(&mut self) -> Result<f64, EvalError> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::Pi) => Ok(PI),
            Some(Token::LParen) => {
                let value = self.expr()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err(EvalError::Malformed("missing closing parenthesis".to_string())),
                }
            }
            Some(token) => Err(EvalError::Malformed(format!(
                "unexpected {} at position {}",
                describe(token),
                self.pos - 1
            ))),
            None => Err(EvalError::Malformed("unexpected end of expression".to_string())),
        }
    }
}
