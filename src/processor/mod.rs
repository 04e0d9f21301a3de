//! The functional core: source text in, ordered items out.
//!
//! Parsing, graph building, execution and ordering run one after the other;
//! any failure aborts the whole call.
pub mod ast;
pub mod expr;
pub mod graph;
pub mod lexer;
pub mod script_parser;
pub mod transform;
pub mod value;
pub mod vm;

use std::cmp::Reverse;

use tracing::debug;

use crate::error::CompileError;
use crate::model::{Item, Options};

/// Reusable compiler. Holds only the option defaults every call starts from,
/// so the output of `compile` depends on nothing but its input.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    defaults: Options,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(defaults: Options) -> Self {
        Self { defaults }
    }

    pub fn compile(&self, code: &str) -> Result<Vec<Item>, CompileError> {
        // 1. ── Parse: code -> commands ─────────────────────────────────
        let commands = script_parser::parse_script(code)?;

        // 2. ── Build: commands -> nodes ────────────────────────────────
        let graph = graph::build_graph(&commands)?;

        // 3. ── Execute: nodes -> items ─────────────────────────────────
        let mut items = vm::execute(&graph, self.defaults)?;

        // 4. ── Order for drawing ───────────────────────────────────────
        sort_items(&mut items);

        debug!(items = items.len(), "compiled");
        Ok(items)
    }
}

/// Stable sort: boards, then texts, wires, pins and square pins.
pub fn sort_items(items: &mut [Item]) {
    items.sort_by_key(|item| Reverse(item.priority()));
}
