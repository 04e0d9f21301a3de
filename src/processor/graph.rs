//! Lowers parsed commands into an index-addressed node graph.
//!
//! Works like a two-pass assembler squeezed into one pass: block-opening
//! commands emit jumps with unknown targets and remember where they are on an
//! indent stack; when the block closes (a dedent) the jump is patched by index.

use std::collections::HashMap;

use tracing::{debug, trace, warn};

use super::ast::{Cmd, Command};
use super::value::{Coord, Number};
use crate::error::CompileError;
use crate::model::OptionKey;

#[derive(Debug, Clone, PartialEq)]
pub enum TransformSpec {
    Translate(Coord),
    Rotate(Number),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Exit,
    Option { key: OptionKey, value: Number },
    Board { size: Coord },
    Pin { at: Coord, dout: Number, din: Number },
    Pinq { at: Coord, dout: Number, din: Number },
    Wire { points: Vec<Coord>, width: Number },
    Text { text: String, at: Coord, height: Number },
    Assign { name: String, value: Number },
    /// Jump to `target` when `cond` is truthy; no condition means always.
    Jmp {
        target: Option<usize>,
        cond: Option<Number>,
    },
    TransformEnter(TransformSpec),
    TransformExit,
    MacroCall { body: usize, ret: usize },
    MacroReturn,
}

/// Compiled program: `nodes[i]` came from source line `lines[i]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub lines: Vec<usize>,
}

impl Graph {
    fn emit(&mut self, node: Node, line: usize) -> usize {
        self.nodes.push(node);
        self.lines.push(line);
        self.nodes.len() - 1
    }

    fn patch(&mut self, at: usize, to: usize) -> Result<(), CompileError> {
        let line = self.lines.get(at).copied().unwrap_or(0);
        match self.nodes.get_mut(at) {
            Some(Node::Jmp { target, .. }) => {
                *target = Some(to);
                Ok(())
            }
            _ => Err(CompileError::internal(
                line,
                format!("node {at} is not a jump and cannot be patched"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MacroDef {
    /// Index of the first body node.
    pub body: usize,
    pub params: Vec<String>,
}

/// Build the node graph for a parsed script.
pub fn build_graph(commands: &[Command]) -> Result<Graph, CompileError> {
    let mut builder = Builder::default();
    let mut index = 0;

    while index < commands.len() {
        let command = &commands[index];
        let depth = builder.stack.len();

        if command.indent > depth {
            return Err(CompileError::structure(
                command.line,
                format!(
                    "unexpected indent: level {} inside a block of depth {depth}",
                    command.indent
                ),
            ));
        }

        if command.indent < depth {
            // Close the innermost block and look at the same command again.
            if let Some((start, opener)) = builder.stack.pop() {
                builder.exit(start, opener)?;
            }
            continue;
        }

        builder.enter(command)?;
        index += 1;
    }

    builder.finish()
}

#[derive(Default)]
struct Builder<'a> {
    graph: Graph,
    stack: Vec<(usize, &'a Command)>,
    macros: HashMap<String, MacroDef>,
    /// Skip-else jump of the `if` block that closed last, waiting to see
    /// whether an `else:` follows at the same depth.
    pending_else: Option<usize>,
}

impl<'a> Builder<'a> {
    fn emit(&mut self, node: Node, line: usize) -> usize {
        self.graph.emit(node, line)
    }

    fn next_index(&self) -> usize {
        self.graph.nodes.len()
    }

    /// Without an `else`, the skip-else jump just lands on the next node.
    fn settle_pending_else(&mut self) -> Result<(), CompileError> {
        if let Some(skip) = self.pending_else.take() {
            let here = self.next_index();
            self.graph.patch(skip, here)?;
        }
        Ok(())
    }

    fn enter(&mut self, command: &'a Command) -> Result<(), CompileError> {
        trace!(%command, node = self.next_index(), "enter");
        let line = command.line;

        if command.cmd == Cmd::Else {
            if self.pending_else.take().is_none() {
                return Err(CompileError::structure(line, "else without matching if"));
            }
        } else {
            self.settle_pending_else()?;
        }

        let start = self.next_index();

        match &command.cmd {
            Cmd::Exit => {
                self.emit(Node::Exit, line);
            }
            Cmd::Option { name, value } => {
                let key = name
                    .text
                    .parse::<OptionKey>()
                    .map_err(|e| CompileError::reference(line, e))?;
                self.emit(
                    Node::Option {
                        key,
                        value: value.clone(),
                    },
                    line,
                );
            }
            Cmd::Board { size } => {
                self.emit(Node::Board { size: size.clone() }, line);
            }
            Cmd::Pin { at, dout, din } => {
                let node = Node::Pin {
                    at: at.clone(),
                    dout: dout.clone(),
                    din: din.clone(),
                };
                self.emit(node, line);
            }
            Cmd::Pinq { at, dout, din } => {
                let node = Node::Pinq {
                    at: at.clone(),
                    dout: dout.clone(),
                    din: din.clone(),
                };
                self.emit(node, line);
            }
            Cmd::Wire { points, width } => {
                let node = Node::Wire {
                    points: points.clone(),
                    width: width.clone(),
                };
                self.emit(node, line);
            }
            Cmd::Text { text, at, height } => {
                let node = Node::Text {
                    text: text.text.clone(),
                    at: at.clone(),
                    height: height.clone(),
                };
                self.emit(node, line);
            }
            Cmd::Var { name, value } => {
                let node = Node::Assign {
                    name: name.text.clone(),
                    value: value.clone(),
                };
                self.emit(node, line);
            }
            Cmd::If { cond } => {
                let node = Node::Jmp {
                    target: None,
                    cond: Some(Number::new(format!("not ({})", cond.expr))),
                };
                self.emit(node, line);
            }
            Cmd::Else => {}
            Cmd::For { var, from, to } => {
                let init = Node::Assign {
                    name: var.text.clone(),
                    value: from.clone(),
                };
                self.emit(init, line);
                let check = Node::Jmp {
                    target: None,
                    cond: Some(Number::new(format!("{} >= ({})", var.text, to.expr))),
                };
                self.emit(check, line);
            }
            Cmd::Translate { by } => {
                self.emit(Node::TransformEnter(TransformSpec::Translate(by.clone())), line);
            }
            Cmd::Rotate { angle } => {
                self.emit(Node::TransformEnter(TransformSpec::Rotate(angle.clone())), line);
            }
            Cmd::MacroDef { name, params } => {
                if command.indent > 0 {
                    return Err(CompileError::structure(
                        line,
                        format!("macro `{}` must be defined at top level", name.text),
                    ));
                }
                self.emit(
                    Node::Jmp {
                        target: None,
                        cond: None,
                    },
                    line,
                );
                let def = MacroDef {
                    body: self.next_index(),
                    params: params.iter().map(|p| p.text.clone()).collect(),
                };
                debug!(name = %name.text, body = def.body, "macro registered");
                self.macros.insert(name.text.clone(), def);
            }
            Cmd::MacroCall { name, args } => {
                let def = self.macros.get(&name.text).cloned().ok_or_else(|| {
                    CompileError::reference(line, format!("macro `{}` is not defined", name.text))
                })?;
                if def.params.len() != args.len() {
                    warn!(
                        line,
                        name = %name.text,
                        expected = def.params.len(),
                        given = args.len(),
                        "macro argument count mismatch, extra values are ignored"
                    );
                }
                for (param, arg) in def.params.iter().zip(args) {
                    let node = Node::Assign {
                        name: param.clone(),
                        value: arg.clone(),
                    };
                    self.emit(node, line);
                }
                let ret = self.next_index() + 1;
                self.emit(Node::MacroCall { body: def.body, ret }, line);
            }
        }

        if command.cmd.opens_block() {
            self.stack.push((start, command));
        }
        Ok(())
    }

    fn exit(&mut self, start: usize, opener: &'a Command) -> Result<(), CompileError> {
        trace!(command = %opener, start, node = self.next_index(), "exit");
        self.settle_pending_else()?;
        let line = opener.line;

        match &opener.cmd {
            Cmd::If { .. } => {
                let skip = self.emit(
                    Node::Jmp {
                        target: None,
                        cond: None,
                    },
                    line,
                );
                let after = self.next_index();
                self.graph.patch(start, after)?;
                self.pending_else = Some(skip);
            }
            Cmd::Else => {
                // The node right before the else body is the if's skip-else jump.
                let here = self.next_index();
                let skip = start.checked_sub(1).ok_or_else(|| {
                    CompileError::internal(line, "else block has no preceding jump")
                })?;
                self.graph.patch(skip, here)?;
            }
            Cmd::For { var, .. } => {
                let step = Node::Assign {
                    name: var.text.clone(),
                    value: Number::new(format!("({}) + 1", var.text)),
                };
                self.emit(step, line);
                let head = start + 1;
                self.emit(
                    Node::Jmp {
                        target: Some(head),
                        cond: None,
                    },
                    line,
                );
                let here = self.next_index();
                self.graph.patch(head, here)?;
            }
            Cmd::Translate { .. } | Cmd::Rotate { .. } => {
                self.emit(Node::TransformExit, line);
            }
            Cmd::MacroDef { .. } => {
                self.emit(Node::MacroReturn, line);
                let here = self.next_index();
                self.graph.patch(start, here)?;
            }
            other => {
                return Err(CompileError::internal(
                    line,
                    format!("`{}` does not open a block", other.keyword()),
                ));
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Graph, CompileError> {
        while let Some((start, opener)) = self.stack.pop() {
            self.exit(start, opener)?;
        }
        self.settle_pending_else()?;

        let unresolved = self
            .graph
            .nodes
            .iter()
            .position(|n| matches!(n, Node::Jmp { target: None, .. }));
        if let Some(at) = unresolved {
            return Err(CompileError::internal(
                self.graph.lines[at],
                format!("jump at node {at} was never resolved"),
            ));
        }

        debug!(
            nodes = self.graph.nodes.len(),
            macros = self.macros.len(),
            "graph built"
        );
        Ok(self.graph)
    }
}
