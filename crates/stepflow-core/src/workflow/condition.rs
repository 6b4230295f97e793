//! Closed-grammar boolean conditions for `conditional` steps.
//!
//! ```text
//! expr    := or
//! or      := and (("or" | "||") and)*
//! and     := unary (("and" | "&&") unary)*
//! unary   := ("not" | "!") unary | compare
//! compare := operand (("==" | "!=" | "<" | "<=" | ">" | ">=") operand)?
//! operand := literal | name ("." name)* | "(" expr ")"
//! literal := true | false | null | number | 'string' | "string"
//! ```
//!
//! Names resolve against the run context only; dotted paths walk into JSON
//! objects. There are no calls, indexing, arithmetic or assignment.
//!
//! `and`/`or` chains are kept flat, so nesting depth only grows with
//! parentheses and `not`. Both nesting and total length are bounded.

use std::cmp::Ordering;

use serde_json::Value;

use crate::error::ConditionError;
use crate::workflow::schema::RunContext;

const MAX_DEPTH: usize = 64;
const MAX_TOKENS: usize = 4096;

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
    Name(Vec<String>),
    Literal(Value),
    And,
    Or,
    Not,
    Cmp(CmpOp),
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    Name(Vec<String>),
    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Compare(CmpOp, Box<Expr>, Box<Expr>),
}

/// A parsed condition, ready to be evaluated against any context.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    expr: Expr,
}

impl Condition {
    pub fn parse(source: &str) -> Result<Self, ConditionError> {
        let tokens = tokenize(source)?;
        if let Some((position, _)) = tokens.get(MAX_TOKENS) {
            return Err(syntax(
                *position,
                format!("expression longer than {} tokens", MAX_TOKENS),
            ));
        }
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
            len: source.len(),
        };
        let expr = parser.parse_or()?;
        if let Some((position, token)) = parser.tokens.get(parser.pos) {
            return Err(syntax(*position, format!("unexpected {}", describe(token))));
        }
        Ok(Self { expr })
    }

    /// Evaluate against `context`. Every name in the expression must be
    /// defined, even in branches that short-circuiting would skip.
    pub fn evaluate(&self, context: &RunContext) -> Result<bool, ConditionError> {
        check_names(&self.expr, context)?;
        eval_bool(&self.expr, context)
    }
}

/// Parse and evaluate in one call.
pub fn evaluate(source: &str, context: &RunContext) -> Result<bool, ConditionError> {
    Condition::parse(source)?.evaluate(context)
}

fn syntax(position: usize, message: impl Into<String>) -> ConditionError {
    ConditionError::Syntax {
        position,
        message: message.into(),
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Name(path) => format!("name '{}'", path.join(".")),
        Token::Literal(v) => format!("literal {}", v),
        Token::And => "'and'".to_string(),
        Token::Or => "'or'".to_string(),
        Token::Not => "'not'".to_string(),
        Token::Cmp(_) => "comparison operator".to_string(),
        Token::LParen => "'('".to_string(),
        Token::RParen => "')'".to_string(),
    }
}

// ─── Tokenizer ──────────────────────────────────────────────────────────

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn tokenize(source: &str) -> Result<Vec<(usize, Token)>, ConditionError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];
        let next = chars.get(i + 1).map(|(_, c)| *c);

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        match c {
            '(' => {
                tokens.push((pos, Token::LParen));
                i += 1;
            }
            ')' => {
                tokens.push((pos, Token::RParen));
                i += 1;
            }
            '=' if next == Some('=') => {
                tokens.push((pos, Token::Cmp(CmpOp::Eq)));
                i += 2;
            }
            '!' if next == Some('=') => {
                tokens.push((pos, Token::Cmp(CmpOp::Ne)));
                i += 2;
            }
            '!' => {
                tokens.push((pos, Token::Not));
                i += 1;
            }
            '<' | '>' => {
                let op = match (c, next == Some('=')) {
                    ('<', true) => CmpOp::Le,
                    ('<', false) => CmpOp::Lt,
                    ('>', true) => CmpOp::Ge,
                    _ => CmpOp::Gt,
                };
                tokens.push((pos, Token::Cmp(op)));
                i += if next == Some('=') { 2 } else { 1 };
            }
            '&' if next == Some('&') => {
                tokens.push((pos, Token::And));
                i += 2;
            }
            '|' if next == Some('|') => {
                tokens.push((pos, Token::Or));
                i += 2;
            }
            '\'' | '"' => {
                let quote = c;
                let mut text = String::new();
                i += 1;
                loop {
                    let Some(&(_, ch)) = chars.get(i) else {
                        return Err(syntax(pos, "unterminated string"));
                    };
                    i += 1;
                    if ch == quote {
                        break;
                    }
                    if ch == '\\' {
                        let Some(&(epos, esc)) = chars.get(i) else {
                            return Err(syntax(pos, "unterminated string"));
                        };
                        i += 1;
                        text.push(match esc {
                            'n' => '\n',
                            't' => '\t',
                            '\\' | '\'' | '"' => esc,
                            other => {
                                return Err(syntax(epos, format!("unknown escape '\\{}'", other)))
                            }
                        });
                    } else {
                        text.push(ch);
                    }
                }
                tokens.push((pos, Token::Literal(Value::String(text))));
            }
            c if c.is_ascii_digit() || (c == '-' && next.is_some_and(|n| n.is_ascii_digit())) => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().map(|(_, c)| *c).collect();
                let number: f64 = text
                    .parse()
                    .map_err(|_| syntax(pos, format!("invalid number '{}'", text)))?;
                let value = serde_json::Number::from_f64(number)
                    .map(Value::Number)
                    .ok_or_else(|| syntax(pos, format!("invalid number '{}'", text)))?;
                tokens.push((pos, Token::Literal(value)));
            }
            c if is_name_start(c) => {
                let mut path = Vec::new();
                loop {
                    let start = i;
                    while i < chars.len() && is_name_char(chars[i].1) {
                        i += 1;
                    }
                    path.push(chars[start..i].iter().map(|(_, c)| *c).collect::<String>());
                    let dotted = chars.get(i).map(|(_, c)| *c) == Some('.')
                        && chars.get(i + 1).is_some_and(|(_, c)| is_name_start(*c));
                    if !dotted {
                        break;
                    }
                    i += 1;
                }
                let token = if path.len() == 1 {
                    match path[0].as_str() {
                        "and" => Token::And,
                        "or" => Token::Or,
                        "not" => Token::Not,
                        "true" | "True" => Token::Literal(Value::Bool(true)),
                        "false" | "False" => Token::Literal(Value::Bool(false)),
                        "null" | "None" => Token::Literal(Value::Null),
                        _ => Token::Name(path),
                    }
                } else {
                    Token::Name(path)
                };
                tokens.push((pos, token));
            }
            other => {
                return Err(syntax(pos, format!("unexpected character '{}'", other)));
            }
        }
    }

    Ok(tokens)
}

// ─── Parser ─────────────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    depth: usize,
    len: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map(|(p, _)| *p).unwrap_or(self.len)
    }

    fn enter(&mut self) -> Result<(), ConditionError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(syntax(self.position(), "expression nested too deeply"));
        }
        Ok(())
    }

    fn parse_or(&mut self) -> Result<Expr, ConditionError> {
        self.enter()?;
        let mut terms = vec![self.parse_and()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            terms.push(self.parse_and()?);
        }
        self.depth -= 1;
        Ok(flatten(terms, Expr::Or))
    }

    fn parse_and(&mut self) -> Result<Expr, ConditionError> {
        let mut terms = vec![self.parse_unary()?];
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            terms.push(self.parse_unary()?);
        }
        Ok(flatten(terms, Expr::And))
    }

    fn parse_unary(&mut self) -> Result<Expr, ConditionError> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            self.enter()?;
            let inner = self.parse_unary()?;
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_compare()
    }

    fn parse_compare(&mut self) -> Result<Expr, ConditionError> {
        let left = self.parse_operand()?;
        if let Some(Token::Cmp(op)) = self.peek() {
            let op = *op;
            self.pos += 1;
            let right = self.parse_operand()?;
            return Ok(Expr::Compare(op, Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn parse_operand(&mut self) -> Result<Expr, ConditionError> {
        let position = self.position();
        let Some((_, token)) = self.tokens.get(self.pos).cloned() else {
            return Err(syntax(position, "unexpected end of expression"));
        };
        self.pos += 1;
        match token {
            Token::Literal(value) => Ok(Expr::Literal(value)),
            Token::Name(path) => Ok(Expr::Name(path)),
            Token::LParen => {
                let inner = self.parse_or()?;
                if self.peek() != Some(&Token::RParen) {
                    return Err(syntax(self.position(), "expected ')'"));
                }
                self.pos += 1;
                Ok(inner)
            }
            other => Err(syntax(position, format!("unexpected {}", describe(&other)))),
        }
    }
}

fn flatten(mut terms: Vec<Expr>, chain: fn(Vec<Expr>) -> Expr) -> Expr {
    if terms.len() == 1 {
        terms.remove(0)
    } else {
        chain(terms)
    }
}

// ─── Evaluation ─────────────────────────────────────────────────────────

fn lookup<'a>(path: &[String], context: &'a RunContext) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut value = context.get(first)?;
    for key in rest {
        value = value.as_object()?.get(key)?;
    }
    Some(value)
}

fn check_names(expr: &Expr, context: &RunContext) -> Result<(), ConditionError> {
    match expr {
        Expr::Literal(_) => Ok(()),
        Expr::Name(path) => lookup(path, context)
            .map(|_| ())
            .ok_or_else(|| ConditionError::UndefinedName(path.join("."))),
        Expr::Not(inner) => check_names(inner, context),
        Expr::And(terms) | Expr::Or(terms) => terms
            .iter()
            .try_for_each(|term| check_names(term, context)),
        Expr::Compare(_, a, b) => {
            check_names(a, context)?;
            check_names(b, context)
        }
    }
}

fn eval_value(expr: &Expr, context: &RunContext) -> Result<Value, ConditionError> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Name(path) => lookup(path, context)
            .cloned()
            .ok_or_else(|| ConditionError::UndefinedName(path.join("."))),
        _ => eval_bool(expr, context).map(Value::Bool),
    }
}

fn eval_bool(expr: &Expr, context: &RunContext) -> Result<bool, ConditionError> {
    match expr {
        Expr::Literal(_) | Expr::Name(_) => match eval_value(expr, context)? {
            Value::Bool(b) => Ok(b),
            other => Err(ConditionError::TypeMismatch(format!(
                "expected a boolean, found {}",
                other
            ))),
        },
        Expr::Not(inner) => Ok(!eval_bool(inner, context)?),
        Expr::And(terms) => {
            for term in terms {
                if !eval_bool(term, context)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Expr::Or(terms) => {
            for term in terms {
                if eval_bool(term, context)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Expr::Compare(op, a, b) => {
            let left = eval_value(a, context)?;
            let right = eval_value(b, context)?;
            compare(*op, &left, &right)
        }
    }
}

fn compare(op: CmpOp, left: &Value, right: &Value) -> Result<bool, ConditionError> {
    match op {
        CmpOp::Eq => Ok(values_equal(left, right)),
        CmpOp::Ne => Ok(!values_equal(left, right)),
        _ => {
            let ordering = match (left, right) {
                (Value::Number(a), Value::Number(b)) => a
                    .as_f64()
                    .zip(b.as_f64())
                    .and_then(|(a, b)| a.partial_cmp(&b)),
                (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                _ => None,
            }
            .ok_or_else(|| {
                ConditionError::TypeMismatch(format!("cannot order {} and {}", left, right))
            })?;
            Ok(match op {
                CmpOp::Lt => ordering == Ordering::Less,
                CmpOp::Le => ordering != Ordering::Greater,
                CmpOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            })
        }
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}
