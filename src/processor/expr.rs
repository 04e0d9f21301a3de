//! Closed-grammar expression evaluator.
//!
//! Precedence, lowest first:
//!
//! ```text
//! or  →  and  →  not  →  < <= > >= == != (chained)  →  + -  →  * / // %  →  unary - +  →  atom
//! ```
//!
//! Atoms are numeric literals, identifiers looked up in the scope, `True`,
//! `False`, `None` and parenthesised sub-expressions.

use std::collections::HashMap;
use std::iter::Peekable;

use thiserror::Error;

use super::lexer::{Lexer, Token};

/// Deepest expression tree the parser will build.
pub const MAX_DEPTH: usize = 200;

/// Result of evaluating an expression; `Absent` is the `None` sentinel that
/// makes a construct fall back to its option default.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Number(f64),
    Bool(bool),
    Absent,
}

/// The single variable scope shared by a whole script.
pub type Scope = HashMap<String, Scalar>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("invalid expression: {0}")]
    Syntax(String),
    #[error("name `{0}` is not defined")]
    Unbound(String),
    #[error("{0}")]
    Type(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("string literal `{0}` cannot be evaluated")]
    NotEvaluable(String),
}

impl Scalar {
    pub fn truthy(self) -> bool {
        match self {
            Scalar::Number(n) => n != 0.0,
            Scalar::Bool(b) => b,
            Scalar::Absent => false,
        }
    }

    /// Numeric view used by arithmetic; booleans count as 1/0.
    pub fn as_number(self) -> Result<f64, ExprError> {
        match self {
            Scalar::Number(n) => Ok(n),
            Scalar::Bool(b) => Ok(if b { 1.0 } else { 0.0 }),
            Scalar::Absent => Err(ExprError::Type("expected a number, got None".into())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Lit(Scalar),
    Var(String),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Compare(Box<Expr>, Vec<(CmpOp, Expr)>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

/// Parse and evaluate `src` against `scope`.
pub fn evaluate(src: &str, scope: &Scope) -> Result<Scalar, ExprError> {
    let expr = parse(src)?;
    expr.eval(scope)
}

fn parse(src: &str) -> Result<Expr, ExprError> {
    let mut p = Parser {
        lex: Lexer::new(src).peekable(),
        depth: 0,
    };
    if p.peek()? == Token::Eof {
        return Err(ExprError::Syntax("empty expression".into()));
    }
    let expr = p.parse_or()?;
    match p.next()? {
        Token::Eof => Ok(expr),
        t => Err(ExprError::Syntax(format!("unexpected {t:?} in `{src}`"))),
    }
}

struct Parser<'a> {
    lex: Peekable<Lexer<'a>>,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&mut self) -> Result<Token, ExprError> {
        match self.lex.peek() {
            Some(Ok(t)) => Ok(t.clone()),
            Some(Err(e)) => Err(e.clone()),
            None => Ok(Token::Eof),
        }
    }

    fn next(&mut self) -> Result<Token, ExprError> {
        self.lex.next().unwrap_or(Ok(Token::Eof))
    }

    /// One level deeper into the tree. Left-leaning operator chains count
    /// too, since evaluating and dropping the tree recurse just the same.
    fn descend(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExprError::Syntax("expression nested too deeply".into()));
        }
        Ok(())
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let depth = self.depth;
        let mut lhs = self.parse_and()?;
        while self.peek()? == Token::Or {
            self.next()?;
            self.descend()?;
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        self.depth = depth;
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let depth = self.depth;
        let mut lhs = self.parse_not()?;
        while self.peek()? == Token::And {
            self.next()?;
            self.descend()?;
            let rhs = self.parse_not()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        self.depth = depth;
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, ExprError> {
        if self.peek()? == Token::Not {
            self.next()?;
            self.descend()?;
            let inner = self.parse_not()?;
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExprError> {
        let first = self.parse_sum()?;
        let mut rest = Vec::new();
        loop {
            let op = match self.peek()? {
                Token::Lt => CmpOp::Lt,
                Token::Le => CmpOp::Le,
                Token::Gt => CmpOp::Gt,
                Token::Ge => CmpOp::Ge,
                Token::EqEq => CmpOp::Eq,
                Token::NotEq => CmpOp::Ne,
                _ => break,
            };
            self.next()?;
            rest.push((op, self.parse_sum()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare(Box::new(first), rest))
        }
    }

    fn parse_sum(&mut self) -> Result<Expr, ExprError> {
        let depth = self.depth;
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek()? {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.next()?;
            self.descend()?;
            let rhs = self.parse_term()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        self.depth = depth;
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr, ExprError> {
        let depth = self.depth;
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek()? {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::SlashSlash => BinOp::FloorDiv,
                Token::Percent => BinOp::Mod,
                _ => break,
            };
            self.next()?;
            self.descend()?;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        self.depth = depth;
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        match self.peek()? {
            Token::Minus => {
                self.next()?;
                self.descend()?;
                let inner = self.parse_unary()?;
                self.depth -= 1;
                Ok(Expr::Neg(Box::new(inner)))
            }
            Token::Plus => {
                self.next()?;
                self.descend()?;
                let inner = self.parse_unary()?;
                self.depth -= 1;
                Ok(inner)
            }
            _ => self.parse_atom(),
        }
    }

    fn parse_atom(&mut self) -> Result<Expr, ExprError> {
        match self.next()? {
            Token::Number(n) => Ok(Expr::Lit(Scalar::Number(n))),
            Token::True => Ok(Expr::Lit(Scalar::Bool(true))),
            Token::False => Ok(Expr::Lit(Scalar::Bool(false))),
            Token::None => Ok(Expr::Lit(Scalar::Absent)),
            Token::Ident(name) => Ok(Expr::Var(name)),
            Token::LParen => {
                self.descend()?;
                let inner = self.parse_or()?;
                self.depth -= 1;
                match self.next()? {
                    Token::RParen => Ok(inner),
                    t => Err(ExprError::Syntax(format!("expected `)`, found {t:?}"))),
                }
            }
            t => Err(ExprError::Syntax(format!("unexpected {t:?}"))),
        }
    }
}

impl Expr {
    fn eval(&self, scope: &Scope) -> Result<Scalar, ExprError> {
        match self {
            Expr::Lit(v) => Ok(*v),
            Expr::Var(name) => scope
                .get(name)
                .copied()
                .ok_or_else(|| ExprError::Unbound(name.clone())),
            Expr::Neg(inner) => Ok(Scalar::Number(-inner.eval(scope)?.as_number()?)),
            Expr::Not(inner) => Ok(Scalar::Bool(!inner.eval(scope)?.truthy())),
            Expr::And(lhs, rhs) => {
                let l = lhs.eval(scope)?;
                if l.truthy() { rhs.eval(scope) } else { Ok(l) }
            }
            Expr::Or(lhs, rhs) => {
                let l = lhs.eval(scope)?;
                if l.truthy() { Ok(l) } else { rhs.eval(scope) }
            }
            Expr::Binary(op, lhs, rhs) => {
                let a = lhs.eval(scope)?.as_number()?;
                let b = rhs.eval(scope)?.as_number()?;
                arithmetic(*op, a, b).map(Scalar::Number)
            }
            Expr::Compare(first, rest) => {
                let mut lhs = first.eval(scope)?;
                for (op, operand) in rest {
                    let rhs = operand.eval(scope)?;
                    if !compare(*op, lhs, rhs)? {
                        return Ok(Scalar::Bool(false));
                    }
                    lhs = rhs;
                }
                Ok(Scalar::Bool(true))
            }
        }
    }
}

fn arithmetic(op: BinOp, a: f64, b: f64) -> Result<f64, ExprError> {
    match op {
        BinOp::Add => Ok(a + b),
        BinOp::Sub => Ok(a - b),
        BinOp::Mul => Ok(a * b),
        BinOp::Div if b == 0.0 => Err(ExprError::DivisionByZero),
        BinOp::Div => Ok(a / b),
        BinOp::FloorDiv | BinOp::Mod if b == 0.0 => Err(ExprError::DivisionByZero),
        BinOp::FloorDiv => Ok(floored_divmod(a, b).0),
        BinOp::Mod => Ok(floored_divmod(a, b).1),
    }
}

/// Floored division and modulo on floats. The remainder comes from the exact
/// `%` and takes the sign of the divisor; the quotient is derived from it so
/// that `q * b + r == a` holds as closely as floats allow.
fn floored_divmod(a: f64, b: f64) -> (f64, f64) {
    let mut rem = a % b;
    let mut div = (a - rem) / b;
    if rem != 0.0 && (b < 0.0) != (rem < 0.0) {
        rem += b;
        div -= 1.0;
    }
    if rem == 0.0 {
        rem = 0.0_f64.copysign(b);
    }
    let quot = if div == 0.0 {
        0.0_f64.copysign(a / b)
    } else {
        let floor = div.floor();
        if div - floor > 0.5 { floor + 1.0 } else { floor }
    };
    (quot, rem)
}

fn compare(op: CmpOp, lhs: Scalar, rhs: Scalar) -> Result<bool, ExprError> {
    match op {
        CmpOp::Eq => Ok(scalar_eq(lhs, rhs)),
        CmpOp::Ne => Ok(!scalar_eq(lhs, rhs)),
        _ => {
            if lhs == Scalar::Absent || rhs == Scalar::Absent {
                return Err(ExprError::Type("cannot order None".into()));
            }
            let (a, b) = (lhs.as_number()?, rhs.as_number()?);
            Ok(match op {
                CmpOp::Lt => a < b,
                CmpOp::Le => a <= b,
                CmpOp::Gt => a > b,
                CmpOp::Ge => a >= b,
                CmpOp::Eq | CmpOp::Ne => unreachable!(),
            })
        }
    }
}

fn scalar_eq(lhs: Scalar, rhs: Scalar) -> bool {
    match (lhs, rhs) {
        (Scalar::Absent, Scalar::Absent) => true,
        (Scalar::Absent, _) | (_, Scalar::Absent) => false,
        (a, b) => a.as_number().ok() == b.as_number().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(vars: &[(&str, Scalar)]) -> Scope {
        vars.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_arithmetic_and_precedence() {
        let s = scope(&[("x", Scalar::Number(4.0)), ("y", Scalar::Number(-7.0))]);
        let test_cases = vec![
            ("1 + 2 * 3", Scalar::Number(7.0)),
            ("(1 + 2) * 3", Scalar::Number(9.0)),
            ("x / 8", Scalar::Number(0.5)),
            ("7 // 2", Scalar::Number(3.0)),
            ("y // 2", Scalar::Number(-4.0)),
            ("y % 3", Scalar::Number(2.0)),
            ("-x + 1", Scalar::Number(-3.0)),
            ("--x", Scalar::Number(4.0)),
            ("x - 1 - 1", Scalar::Number(2.0)),
            ("True + 1", Scalar::Number(2.0)),
            ("None", Scalar::Absent),
        ];

        for (src, expected) in test_cases {
            assert_eq!(evaluate(src, &s), Ok(expected), "evaluating {src}");
        }
    }

    #[test]
    fn test_boolean_logic() {
        let s = scope(&[("i", Scalar::Number(3.0)), ("n", Scalar::Number(3.0))]);
        let test_cases = vec![
            ("i >= n", Scalar::Bool(true)),
            ("not (i >= n)", Scalar::Bool(false)),
            ("0 < i < 5", Scalar::Bool(true)),
            ("0 < i < 2", Scalar::Bool(false)),
            ("i == 3 and n != 4", Scalar::Bool(true)),
            ("0 or 5", Scalar::Number(5.0)),
            ("2 and 0", Scalar::Number(0.0)),
            ("not None", Scalar::Bool(true)),
            ("None == None", Scalar::Bool(true)),
            ("1 == True", Scalar::Bool(true)),
            ("not 1 > 2", Scalar::Bool(true)),
        ];

        for (src, expected) in test_cases {
            assert_eq!(evaluate(src, &s), Ok(expected), "evaluating {src}");
        }
    }

    #[test]
    fn test_short_circuit_skips_unbound_names() {
        let s = Scope::new();
        assert_eq!(evaluate("False and missing", &s), Ok(Scalar::Bool(false)));
        assert_eq!(evaluate("1 or missing", &s), Ok(Scalar::Number(1.0)));
        assert_eq!(
            evaluate("True and missing", &s),
            Err(ExprError::Unbound("missing".into()))
        );
    }

    #[test]
    fn test_floored_division_on_fractions() {
        let s = Scope::new();
        let test_cases = vec![
            ("1 // 0.1", 9.0),
            ("-7 // 2", -4.0),
            ("7 // -2", -4.0),
            ("7 % -3", -2.0),
            ("-7.5 % 2", 0.5),
            ("5.5 // 1", 5.0),
        ];

        for (src, expected) in test_cases {
            assert_eq!(evaluate(src, &s), Ok(Scalar::Number(expected)), "evaluating {src}");
        }

        match evaluate("1 % 0.1", &s) {
            Ok(Scalar::Number(r)) => assert!((r - 0.1).abs() < 1e-12 && r < 0.1, "got {r}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_nesting_is_bounded() {
        let s = Scope::new();
        let within = MAX_DEPTH - 10;
        let beyond = MAX_DEPTH * 50;
        let test_cases = vec![
            (format!("{}1{}", "(".repeat(within), ")".repeat(within)), true),
            (format!("{}1", "-".repeat(within)), true),
            (format!("{}1", "not ".repeat(within)), true),
            (vec!["1"; within].join(" + "), true),
            (format!("{}1{}", "(".repeat(beyond), ")".repeat(beyond)), false),
            (format!("{}1", "-".repeat(beyond)), false),
            (format!("{}1", "+".repeat(beyond)), false),
            (format!("{}1", "not ".repeat(beyond)), false),
            (vec!["1"; beyond].join(" * "), false),
            (vec!["x"; beyond].join(" or "), false),
        ];

        for (src, ok) in test_cases {
            let result = evaluate(&src, &s);
            if ok {
                assert!(result.is_ok(), "expected {} chars to evaluate", src.len());
            } else {
                assert_eq!(
                    result,
                    Err(ExprError::Syntax("expression nested too deeply".into())),
                    "expected {} chars to be rejected",
                    src.len()
                );
            }
        }
    }

    #[test]
    fn test_errors() {
        let s = scope(&[("gap", Scalar::Absent)]);
        assert_eq!(evaluate("1 / 0", &s), Err(ExprError::DivisionByZero));
        assert_eq!(evaluate("5 % 0", &s), Err(ExprError::DivisionByZero));
        assert_eq!(evaluate("w + 1", &s), Err(ExprError::Unbound("w".into())));
        assert!(matches!(evaluate("gap + 1", &s), Err(ExprError::Type(_))));
        assert!(matches!(evaluate("gap < 1", &s), Err(ExprError::Type(_))));

        for src in ["", "1 +", "(1 + 2", "1 2", "f(1)", "x = 1", "__import__('os')"] {
            assert!(
                matches!(evaluate(src, &s), Err(ExprError::Syntax(_))),
                "expected syntax error for {src:?}"
            );
        }
    }
}
