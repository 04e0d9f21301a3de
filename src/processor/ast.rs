//! Parsed form of one source line, before it is lowered to graph nodes.

use std::fmt;

use super::value::{Coord, Literal, Number, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Cmd {
    /// `exit` – stop execution (also appended after the last line).
    Exit,

    /// `option NAME=EXPR` – change a default used when an argument is omitted.
    Option { name: Literal, value: Number },

    /// `board W,H` – board outline.
    Board { size: Coord },

    /// `pin X,Y [DOUT] [DIN]` – round pad.
    Pin { at: Coord, dout: Number, din: Number },

    /// `pinq X,Y [DOUT] [DIN]` – square pad.
    Pinq { at: Coord, dout: Number, din: Number },

    /// `wire X1,Y1 X2,Y2 … [WIDTH]` – polyline of wire segments.
    Wire { points: Vec<Coord>, width: Number },

    /// `text "TEXT" X,Y [HEIGHT]`
    Text {
        text: Literal,
        at: Coord,
        height: Number,
    },

    /// `var NAME=EXPR`
    Var { name: Literal, value: Number },

    /// `if EXPR:`
    If { cond: Number },

    /// `else:`
    Else,

    /// `for NAME in FROM..TO:` – TO is exclusive.
    For {
        var: Literal,
        from: Number,
        to: Number,
    },

    /// `translate DX,DY:`
    Translate { by: Coord },

    /// `rotate DEGREES:`
    Rotate { angle: Number },

    /// `macro NAME(PARAM, …):` – top level only.
    MacroDef { name: Literal, params: Vec<Literal> },

    /// `NAME(EXPR, …)`
    MacroCall { name: Literal, args: Vec<Number> },
}

impl Cmd {
    pub fn keyword(&self) -> &'static str {
        match self {
            Cmd::Exit => "exit",
            Cmd::Option { .. } => "option",
            Cmd::Board { .. } => "board",
            Cmd::Pin { .. } => "pin",
            Cmd::Pinq { .. } => "pinq",
            Cmd::Wire { .. } => "wire",
            Cmd::Text { .. } => "text",
            Cmd::Var { .. } => "var",
            Cmd::If { .. } => "if",
            Cmd::Else => "else",
            Cmd::For { .. } => "for",
            Cmd::Translate { .. } => "translate",
            Cmd::Rotate { .. } => "rotate",
            Cmd::MacroDef { .. } => "macro",
            Cmd::MacroCall { .. } => "call",
        }
    }

    /// Commands that open an indented block.
    pub fn opens_block(&self) -> bool {
        matches!(
            self,
            Cmd::If { .. }
                | Cmd::Else
                | Cmd::For { .. }
                | Cmd::Translate { .. }
                | Cmd::Rotate { .. }
                | Cmd::MacroDef { .. }
        )
    }
}

/// One source line: what it says, how deep it is indented and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub cmd: Cmd,
    pub indent: usize,
    /// 1-based line in the source text.
    pub line: usize,
}

impl Command {
    pub fn new(cmd: Cmd, indent: usize, line: usize) -> Self {
        Self { cmd, indent, line }
    }

    /// Arguments in source order.
    pub fn args(&self) -> Vec<Value> {
        match &self.cmd {
            Cmd::Exit | Cmd::Else => vec![],
            Cmd::Option { name, value } | Cmd::Var { name, value } => {
                vec![name.clone().into(), value.clone().into()]
            }
            Cmd::Board { size } => vec![size.clone().into()],
            Cmd::Pin { at, dout, din } | Cmd::Pinq { at, dout, din } => {
                vec![at.clone().into(), dout.clone().into(), din.clone().into()]
            }
            Cmd::Wire { points, width } => points
                .iter()
                .cloned()
                .map(Value::from)
                .chain(std::iter::once(width.clone().into()))
                .collect(),
            Cmd::Text { text, at, height } => {
                vec![text.clone().into(), at.clone().into(), height.clone().into()]
            }
            Cmd::If { cond } => vec![cond.clone().into()],
            Cmd::For { var, from, to } => {
                vec![var.clone().into(), from.clone().into(), to.clone().into()]
            }
            Cmd::Translate { by } => vec![by.clone().into()],
            Cmd::Rotate { angle } => vec![angle.clone().into()],
            Cmd::MacroDef { name, params } => std::iter::once(name.clone().into())
                .chain(params.iter().cloned().map(Value::from))
                .collect(),
            Cmd::MacroCall { name, args } => std::iter::once(name.clone().into())
                .chain(args.iter().cloned().map(Value::from))
                .collect(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<String> = self.args().iter().map(|v| v.to_string()).collect();
        write!(
            f,
            "{}({}) [line={}, indent={}]",
            self.cmd.keyword(),
            args.join(", "),
            self.line,
            self.indent
        )
    }
}
