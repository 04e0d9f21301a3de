//! Very small hand-written lexer for the expression sublanguage.
//!
//! Expressions appear inside commands (`pin x+1,y*2`, `if n > 3:`, …) and are
//! kept as text until execution. At that point the text is broken into
//! `Token`s here and handed to the evaluator in `expr`.
//
//  Lexical items:
//
//      Ident    ::= [A-Za-z_][A-Za-z0-9_]*     (and/or/not/True/False/None are keywords)
//      Number   ::= [0-9]* ('.' [0-9]*)? ([eE] [+-]? [0-9]+)?
//      Symbols  ::= + - * / // % < <= > >= == != ( )
//      Whitespace is discarded.

use std::iter::Peekable;
use std::str::Chars;

use super::expr::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Ident(String),
    True,
    False,
    None,
    And,
    Or,
    Not,
    Plus,
    Minus,
    Star,
    Slash,
    SlashSlash,
    Percent,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    NotEq,
    LParen,
    RParen,
    Eof,
}

#[derive(Clone)]
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            chars: src.chars().peekable(),
            finished: false,
        }
    }

    fn next_char(&mut self) -> Option<char> {
        self.chars.next()
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.next_char();
            true
        } else {
            false
        }
    }

    fn consume_while<F: Fn(char) -> bool>(&mut self, pred: F, buf: &mut String) {
        while let Some(c) = self.peek_char() {
            if pred(c) {
                buf.push(c);
                self.next_char();
            } else {
                break;
            }
        }
    }

    fn read_identifier(&mut self, first: char) -> Token {
        let mut id = String::new();
        id.push(first);
        self.consume_while(|c| c.is_ascii_alphanumeric() || c == '_', &mut id);
        match id.as_str() {
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "True" => Token::True,
            "False" => Token::False,
            "None" => Token::None,
            _ => Token::Ident(id),
        }
    }

    fn read_number(&mut self, first: char) -> Result<Token, ExprError> {
        let mut num = String::new();
        num.push(first);
        self.consume_while(|c| c.is_ascii_digit(), &mut num);
        if first != '.' && self.eat('.') {
            num.push('.');
            self.consume_while(|c| c.is_ascii_digit(), &mut num);
        }
        if matches!(self.peek_char(), Some('e' | 'E')) {
            num.push('e');
            self.next_char();
            if let Some(sign @ ('+' | '-')) = self.peek_char() {
                num.push(sign);
                self.next_char();
            }
            self.consume_while(|c| c.is_ascii_digit(), &mut num);
        }
        num.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| ExprError::Syntax(format!("invalid number literal `{num}`")))
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token, ExprError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.next_char();
            } else {
                break;
            }
        }

        let ch = match self.next_char() {
            Some(c) => c,
            None => {
                self.finished = true;
                return Some(Ok(Token::Eof));
            }
        };

        let tok_res = match ch {
            '+' => Ok(Token::Plus),
            '-' => Ok(Token::Minus),
            '*' => Ok(Token::Star),
            '%' => Ok(Token::Percent),
            '(' => Ok(Token::LParen),
            ')' => Ok(Token::RParen),
            '/' if self.eat('/') => Ok(Token::SlashSlash),
            '/' => Ok(Token::Slash),
            '<' if self.eat('=') => Ok(Token::Le),
            '<' => Ok(Token::Lt),
            '>' if self.eat('=') => Ok(Token::Ge),
            '>' => Ok(Token::Gt),
            '=' if self.eat('=') => Ok(Token::EqEq),
            '!' if self.eat('=') => Ok(Token::NotEq),
            c if c.is_ascii_digit() || c == '.' => self.read_number(c),
            c if c.is_ascii_alphabetic() || c == '_' => Ok(self.read_identifier(c)),
            e => Err(ExprError::Syntax(format!("unexpected character `{e}`"))),
        };

        if tok_res.is_err() {
            self.finished = true;
        }
        Some(tok_res)
    }
}
