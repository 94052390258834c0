//! Boolean subset expressions over experiment columns.
//!
//! A subset is a comparison between column names and literals, combined
//! with `and`, `or`, `not` (or `&`, `|`, `~`) and parentheses:
//!
//! ```
//! use cytoflow_kmeans::core::Subset;
//!
//! let subset = Subset::parse("Dox == 1.0 and (Well == 'A1' or `V2-A` > -100)").unwrap();
//! assert_eq!(subset.columns(), vec!["Dox", "V2-A", "Well"]);
//! ```
//!
//! Column names containing punctuation must be back-quoted.

use super::experiment::Experiment;
use super::value::Value;
use crate::error::{CytoflowError, Result};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    Cmp(CmpOp),
    And,
    Or,
    Not,
    Minus,
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Column(String),
    Literal(Value),
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Compare(Operand, CmpOp, Operand),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

/// A parsed subset expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Subset {
    source: String,
    expr: Expr,
}

fn tokenize(src: &str) -> std::result::Result<Vec<Token>, String> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '&' => {
                tokens.push(Token::And);
                i += if chars.get(i + 1) == Some(&'&') { 2 } else { 1 };
            }
            '|' => {
                tokens.push(Token::Or);
                i += if chars.get(i + 1) == Some(&'|') { 2 } else { 1 };
            }
            '~' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '=' | '!' | '<' | '>' => {
                let next = chars.get(i + 1).copied();
                let (op, width) = match (c, next) {
                    ('=', Some('=')) => (CmpOp::Eq, 2),
                    ('!', Some('=')) => (CmpOp::Ne, 2),
                    ('<', Some('=')) => (CmpOp::Le, 2),
                    ('>', Some('=')) => (CmpOp::Ge, 2),
                    ('<', _) => (CmpOp::Lt, 1),
                    ('>', _) => (CmpOp::Gt, 1),
                    _ => return Err(format!("unexpected '{c}' at position {i}")),
                };
                tokens.push(Token::Cmp(op));
                i += width;
            }
            '\'' | '"' => {
                let quote = c;
                let start = i + 1;
                let end = chars[start..]
                    .iter()
                    .position(|&ch| ch == quote)
                    .map(|p| start + p)
                    .ok_or_else(|| format!("unterminated string starting at position {i}"))?;
                tokens.push(Token::Str(chars[start..end].iter().collect()));
                i = end + 1;
            }
            '`' => {
                let start = i + 1;
                let end = chars[start..]
                    .iter()
                    .position(|&ch| ch == '`')
                    .map(|p| start + p)
                    .ok_or_else(|| format!("unterminated column name at position {i}"))?;
                tokens.push(Token::Ident(chars[start..end].iter().collect()));
                i = end + 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_digit()
                        || chars[i] == '.'
                        || chars[i] == 'e'
                        || chars[i] == 'E'
                        || ((chars[i] == '-' || chars[i] == '+')
                            && matches!(chars[i - 1], 'e' | 'E')))
                {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number '{text}'"))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    _ => Token::Ident(word),
                });
            }
            _ => return Err(format!("unexpected '{c}' at position {i}")),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn or(&mut self) -> std::result::Result<Expr, String> {
        let mut lhs = self.and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let rhs = self.and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> std::result::Result<Expr, String> {
        let mut lhs = self.not()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let rhs = self.not()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn not(&mut self) -> std::result::Result<Expr, String> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            return Ok(Expr::Not(Box::new(self.not()?)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> std::result::Result<Expr, String> {
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let inner = self.or()?;
            return match self.next() {
                Some(Token::RParen) => Ok(inner),
                _ => Err("expected ')'".to_string()),
            };
        }

        let lhs = self.operand()?;
        let op = match self.next() {
            Some(Token::Cmp(op)) => op,
            Some(other) => return Err(format!("expected a comparison, found {other:?}")),
            None => return Err("expected a comparison, found end of input".to_string()),
        };
        let rhs = self.operand()?;
        Ok(Expr::Compare(lhs, op, rhs))
    }

    fn operand(&mut self) -> std::result::Result<Operand, String> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(Operand::Column(name)),
            Some(Token::Number(x)) => Ok(Operand::Literal(Value::Number(x))),
            Some(Token::Str(s)) => Ok(Operand::Literal(Value::Text(s))),
            Some(Token::Minus) => match self.next() {
                Some(Token::Number(x)) => Ok(Operand::Literal(Value::Number(-x))),
                _ => Err("expected a number after '-'".to_string()),
            },
            Some(other) => Err(format!("expected a column or literal, found {other:?}")),
            None => Err("expected a column or literal, found end of input".to_string()),
        }
    }
}

fn collect_columns<'a>(expr: &'a Expr, out: &mut BTreeSet<&'a str>) {
    match expr {
        Expr::Compare(lhs, _, rhs) => {
            for operand in [lhs, rhs] {
                if let Operand::Column(name) = operand {
                    out.insert(name);
                }
            }
        }
        Expr::And(a, b) | Expr::Or(a, b) => {
            collect_columns(a, out);
            collect_columns(b, out);
        }
        Expr::Not(a) => collect_columns(a, out),
    }
}

impl Subset {
    /// Parse a subset expression.
    pub fn parse(source: &str) -> Result<Self> {
        let invalid = |reason: String| CytoflowError::InvalidSubset {
            subset: source.to_string(),
            reason,
        };

        let tokens = tokenize(source).map_err(invalid)?;
        if tokens.is_empty() {
            return Err(invalid("expression is empty".to_string()));
        }

        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.or().map_err(invalid)?;
        if let Some(token) = parser.peek() {
            return Err(invalid(format!("unexpected trailing {token:?}")));
        }

        Ok(Subset {
            source: source.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Column names referenced by the expression, sorted.
    pub fn columns(&self) -> Vec<&str> {
        let mut out = BTreeSet::new();
        collect_columns(&self.expr, &mut out);
        out.into_iter().collect()
    }

    /// Indices of the events for which the expression holds.
    pub fn matching_rows(&self, experiment: &Experiment) -> Result<Vec<usize>> {
        for name in self.columns() {
            if !experiment.has_column(name) {
                return Err(self.invalid(format!("unknown column '{name}'")));
            }
        }

        let mut rows = Vec::new();
        for row in 0..experiment.len() {
            if self.eval(&self.expr, experiment, row)? {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    fn invalid(&self, reason: String) -> CytoflowError {
        CytoflowError::InvalidSubset {
            subset: self.source.clone(),
            reason,
        }
    }

    fn resolve(&self, operand: &Operand, experiment: &Experiment, row: usize) -> Result<Value> {
        match operand {
            Operand::Literal(v) => Ok(v.clone()),
            Operand::Column(name) => experiment
                .value(name, row)
                .ok_or_else(|| self.invalid(format!("unknown column '{name}'"))),
        }
    }

    fn eval(&self, expr: &Expr, experiment: &Experiment, row: usize) -> Result<bool> {
        match expr {
            Expr::And(a, b) => {
                Ok(self.eval(a, experiment, row)? && self.eval(b, experiment, row)?)
            }
            Expr::Or(a, b) => Ok(self.eval(a, experiment, row)? || self.eval(b, experiment, row)?),
            Expr::Not(a) => Ok(!self.eval(a, experiment, row)?),
            Expr::Compare(lhs, op, rhs) => {
                let lhs = self.resolve(lhs, experiment, row)?;
                let rhs = self.resolve(rhs, experiment, row)?;
                match (&lhs, &rhs) {
                    (Value::Number(a), Value::Number(b)) => Ok(match op {
                        CmpOp::Eq => a == b,
                        CmpOp::Ne => a != b,
                        CmpOp::Lt => a < b,
                        CmpOp::Le => a <= b,
                        CmpOp::Gt => a > b,
                        CmpOp::Ge => a >= b,
                    }),
                    (Value::Text(a), Value::Text(b)) => Ok(match op {
                        CmpOp::Eq => a == b,
                        CmpOp::Ne => a != b,
                        CmpOp::Lt => a < b,
                        CmpOp::Le => a <= b,
                        CmpOp::Gt => a > b,
                        CmpOp::Ge => a >= b,
                    }),
                    _ => Err(self.invalid(format!("can't compare {lhs} with {rhs}"))),
                }
            }
        }
    }
}
