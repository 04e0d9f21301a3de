//! Argument values carried by commands and nodes.
//!
//! `Number` and `Coord` keep their expression text and are evaluated only when
//! the node that owns them executes, so they see the scope at that moment.

use std::fmt;

use super::expr::{self, ExprError, Scalar, Scope};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(Number),
    String(Literal),
    Coord(Coord),
}

/// An expression evaluated on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct Number {
    pub expr: String,
}

/// Structural text: names and labels. Never evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub text: String,
}

/// An `x,y` pair of expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct Coord {
    pub x: String,
    pub y: String,
}

impl Number {
    pub fn new(expr: impl Into<String>) -> Self {
        Self { expr: expr.into() }
    }

    /// Stand-in for an omitted optional argument.
    pub fn absent() -> Self {
        Self::new("None")
    }

    pub fn eval(&self, scope: &Scope) -> Result<Scalar, ExprError> {
        expr::evaluate(&self.expr, scope)
    }
}

impl Literal {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn eval(&self, _scope: &Scope) -> Result<Scalar, ExprError> {
        Err(ExprError::NotEvaluable(self.text.clone()))
    }
}

impl Coord {
    /// Split `"x,y"` once at the first comma. `None` when there is no comma.
    pub fn parse(s: &str) -> Option<Self> {
        let (x, y) = s.split_once(',')?;
        Some(Self {
            x: x.trim().to_string(),
            y: y.trim().to_string(),
        })
    }

    pub fn eval(&self, scope: &Scope) -> Result<(f64, f64), ExprError> {
        let x = component(&self.x, scope)?;
        let y = component(&self.y, scope)?;
        Ok((x, y))
    }
}

fn component(src: &str, scope: &Scope) -> Result<f64, ExprError> {
    match expr::evaluate(src, scope)? {
        Scalar::Absent => Err(ExprError::Type(format!(
            "coordinate `{src}` evaluated to None"
        ))),
        v => v.as_number(),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n.expr),
            Value::String(s) => write!(f, "{:?}", s.text),
            Value::Coord(c) => write!(f, "{},{}", c.x, c.y),
        }
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        Value::Number(n)
    }
}

impl From<Literal> for Value {
    fn from(s: Literal) -> Self {
        Value::String(s)
    }
}

impl From<Coord> for Value {
    fn from(c: Coord) -> Self {
        Value::Coord(c)
    }
}
