//! Interpreter for the node graph.
//!
//! A program counter walks `Graph::nodes`; each node falls through, jumps or
//! halts. All state lives in `Machine` and is dropped when the run ends.

use tracing::{debug, trace};

use super::expr::{ExprError, Scalar, Scope};
use super::graph::{Graph, Node, TransformSpec};
use super::transform::{self, Transform};
use super::value::{Coord, Number};
use crate::error::CompileError;
use crate::model::{Item, OptionKey, Options};

/// What to do after a node ran.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Flow {
    Next,
    Jump(usize),
    Halt,
}

pub struct Machine<'g> {
    graph: &'g Graph,
    items: Vec<Item>,
    scope: Scope,
    transforms: Vec<Transform>,
    returns: Vec<usize>,
    options: Options,
}

/// Run `graph` from node 0 with `options` as the starting defaults.
pub fn execute(graph: &Graph, options: Options) -> Result<Vec<Item>, CompileError> {
    Machine::new(graph, options).run()
}

impl<'g> Machine<'g> {
    pub fn new(graph: &'g Graph, options: Options) -> Self {
        Self {
            graph,
            items: Vec::new(),
            scope: Scope::new(),
            transforms: Vec::new(),
            returns: Vec::new(),
            options,
        }
    }

    pub fn run(mut self) -> Result<Vec<Item>, CompileError> {
        let mut pc = 0;
        let mut steps: u64 = 0;

        while let Some(node) = self.graph.nodes.get(pc) {
            let line = self.graph.lines[pc];
            trace!(pc, line, ?node, "step");
            steps += 1;

            match self.step(node, line)? {
                Flow::Next => pc += 1,
                Flow::Jump(target) => pc = target,
                Flow::Halt => break,
            }
        }

        debug!(steps, items = self.items.len(), "execution finished");
        Ok(self.items)
    }

    fn step(&mut self, node: &Node, line: usize) -> Result<Flow, CompileError> {
        let at = |e: ExprError| CompileError::from_expr(line, e);

        match node {
            Node::Exit => return Ok(Flow::Halt),
            Node::Option { key, value } => {
                let v = match value.eval(&self.scope).map_err(at)? {
                    Scalar::Absent => None,
                    v => Some(v.as_number().map_err(at)?),
                };
                self.options
                    .set(*key, v)
                    .map_err(|e| CompileError::evaluation(line, e))?;
            }
            Node::Board { size } => {
                let (width, height) = size.eval(&self.scope).map_err(at)?;
                self.items.push(Item::Board {
                    width,
                    height,
                    gap: self.options.gap,
                });
            }
            Node::Pin { at: pos, dout, din } => {
                let (x, y) = self.point(pos, line)?;
                let dout = self.number_or_option(dout, OptionKey::PinDout, line)?;
                let din = self.number_or_option(din, OptionKey::PinDin, line)?;
                self.items.push(Item::Pin { x, y, dout, din });
            }
            Node::Pinq { at: pos, dout, din } => {
                let (x, y) = self.point(pos, line)?;
                let dout = self.number_or_option(dout, OptionKey::PinDout, line)?;
                let din = self.number_or_option(din, OptionKey::PinDin, line)?;
                self.items.push(Item::Pinq { x, y, dout, din });
            }
            Node::Wire { points, width } => {
                let width = self.number_or_option(width, OptionKey::WireWidth, line)?;
                let resolved = points
                    .iter()
                    .map(|p| self.point(p, line))
                    .collect::<Result<Vec<_>, _>>()?;
                for pair in resolved.windows(2) {
                    let ((x1, y1), (x2, y2)) = (pair[0], pair[1]);
                    self.items.push(Item::Wire {
                        x1,
                        y1,
                        x2,
                        y2,
                        width,
                    });
                }
            }
            Node::Text {
                text,
                at: pos,
                height,
            } => {
                let (x, y) = self.point(pos, line)?;
                let height = self.number_or_option(height, OptionKey::TextHeight, line)?;
                self.items.push(Item::Text {
                    text: text.clone(),
                    x,
                    y,
                    height,
                });
            }
            Node::Assign { name, value } => {
                let v = value.eval(&self.scope).map_err(at)?;
                self.scope.insert(name.clone(), v);
            }
            Node::Jmp { target, cond } => {
                let taken = match cond {
                    Some(cond) => cond.eval(&self.scope).map_err(at)?.truthy(),
                    None => true,
                };
                if taken {
                    let target = target.ok_or_else(|| {
                        CompileError::internal(line, "jump target was never resolved")
                    })?;
                    return Ok(Flow::Jump(target));
                }
            }
            Node::TransformEnter(spec) => {
                let t = match spec {
                    TransformSpec::Translate(by) => {
                        let (dx, dy) = by.eval(&self.scope).map_err(at)?;
                        Transform::translate(dx, dy)
                    }
                    TransformSpec::Rotate(angle) => {
                        let degrees = angle.eval(&self.scope).map_err(at)?.as_number().map_err(at)?;
                        Transform::rotate(degrees)
                    }
                };
                self.transforms.push(t);
            }
            Node::TransformExit => {
                self.transforms.pop().ok_or_else(|| {
                    CompileError::internal(line, "transform stack is empty")
                })?;
            }
            Node::MacroCall { body, ret } => {
                self.returns.push(*ret);
                return Ok(Flow::Jump(*body));
            }
            Node::MacroReturn => {
                let ret = self.returns.pop().ok_or_else(|| {
                    CompileError::internal(line, "macro return stack is empty")
                })?;
                return Ok(Flow::Jump(ret));
            }
        }

        Ok(Flow::Next)
    }

    /// Evaluate a coordinate and push it through the active transforms.
    fn point(&self, coord: &Coord, line: usize) -> Result<(f64, f64), CompileError> {
        let (x, y) = coord
            .eval(&self.scope)
            .map_err(|e| CompileError::from_expr(line, e))?;
        Ok(transform::resolve(&self.transforms, x, y))
    }

    fn number_or_option(
        &self,
        value: &Number,
        key: OptionKey,
        line: usize,
    ) -> Result<f64, CompileError> {
        let at = |e: ExprError| CompileError::from_expr(line, e);
        match value.eval(&self.scope).map_err(at)? {
            Scalar::Absent => self
                .options
                .get(key)
                .ok_or_else(|| CompileError::evaluation(line, format!("option {key} has no value"))),
            v => v.as_number().map_err(at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::graph::build_graph;
    use crate::processor::script_parser::parse_script;

    fn run(src: &str) -> Result<Vec<Item>, CompileError> {
        let graph = build_graph(&parse_script(src)?)?;
        execute(&graph, Options::default())
    }

    fn pin_x(items: &[Item]) -> Vec<f64> {
        items
            .iter()
            .filter_map(|i| match i {
                Item::Pin { x, .. } => Some(*x),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_if_else_takes_one_branch() {
        let items = run("if 1>0:\n    pin 1,0\nelse:\n    pin 2,0\npin 3,0\n").unwrap();
        assert_eq!(pin_x(&items), vec![1.0, 3.0]);

        let items = run("if 1<0:\n    pin 1,0\nelse:\n    pin 2,0\npin 3,0\n").unwrap();
        assert_eq!(pin_x(&items), vec![2.0, 3.0]);
    }

    #[test]
    fn test_for_loop_runs_half_open_range() {
        let items = run("for i in 0..3:\n    pin i,0\n").unwrap();
        assert_eq!(pin_x(&items), vec![0.0, 1.0, 2.0]);

        let items = run("for i in 3..3:\n    pin i,0\npin 9,0\n").unwrap();
        assert_eq!(pin_x(&items), vec![9.0]);
    }

    #[test]
    fn test_macro_calls_resume_after_call_site() {
        let items = run("macro m(a):\n    pin a,0\nm(5)\npin 6,0\nm(7)\n").unwrap();
        assert_eq!(pin_x(&items), vec![5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_recursion_shares_the_global_scope() {
        let src = "macro r(n):\n    if n > 0:\n        pin n,0\n        r(n - 1)\n        pin n,1\nr(2)\n";
        let items = run(src).unwrap();
        // the inner call overwrote `n`, so the trailing pins all see n == 0
        assert_eq!(
            items,
            vec![
                Item::Pin { x: 2.0, y: 0.0, dout: 0.75, din: 0.25 },
                Item::Pin { x: 1.0, y: 0.0, dout: 0.75, din: 0.25 },
                Item::Pin { x: 0.0, y: 1.0, dout: 0.75, din: 0.25 },
                Item::Pin { x: 0.0, y: 1.0, dout: 0.75, din: 0.25 },
            ]
        );
    }

    #[test]
    fn test_nested_transforms_apply_inner_first() {
        let items = run("translate 10,0:\n    rotate 90:\n        pin 1,0\npin 1,0\n").unwrap();
        match (&items[0], &items[1]) {
            (Item::Pin { x, y, .. }, Item::Pin { x: x2, y: y2, .. }) => {
                assert!((x - 10.0).abs() < 1e-9 && (y + 1.0).abs() < 1e-9);
                // the transform stack is popped after the block
                assert_eq!((*x2, *y2), (1.0, 0.0));
            }
            other => panic!("unexpected items {other:?}"),
        }
    }

    #[test]
    fn test_board_size_ignores_transforms() {
        let items = run("translate 5,5:\n    rotate 90:\n        board 20,10\n        pin 1,0\n").unwrap();
        assert_eq!(items[0], Item::Board { width: 20.0, height: 10.0, gap: None });
        match &items[1] {
            Item::Pin { x, y, .. } => assert!((x - 5.0).abs() < 1e-9 && (y - 4.0).abs() < 1e-9),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_options_fill_in_omitted_arguments() {
        let src = "option PIN_DOUT=2\noption GAP=0.5\nboard 20,10\npin 0,0\npin 0,0 3 1\nwire 0,0 1,0 2,0\ntext \"J1\" 0,0\n";
        let items = run(src).unwrap();
        assert_eq!(
            items,
            vec![
                Item::Board { width: 20.0, height: 10.0, gap: Some(0.5) },
                Item::Pin { x: 0.0, y: 0.0, dout: 2.0, din: 0.25 },
                Item::Pin { x: 0.0, y: 0.0, dout: 3.0, din: 1.0 },
                Item::Wire { x1: 0.0, y1: 0.0, x2: 1.0, y2: 0.0, width: 0.375 },
                Item::Wire { x1: 1.0, y1: 0.0, x2: 2.0, y2: 0.0, width: 0.375 },
                Item::Text { text: "J1".into(), x: 0.0, y: 0.0, height: 0.75 },
            ]
        );
    }

    #[test]
    fn test_option_expressions_see_the_scope() {
        let items = run("var d=1.5\noption PIN_DIN=d/3\npin 0,0\n").unwrap();
        assert_eq!(
            items,
            vec![Item::Pin { x: 0.0, y: 0.0, dout: 0.75, din: 0.5 }]
        );
        assert!(matches!(
            run("option PIN_DIN=None\n"),
            Err(CompileError::Evaluation { line: 1, .. })
        ));
    }

    #[test]
    fn test_exit_halts_immediately() {
        let items = run("pin 1,0\nexit\npin 2,0\n").unwrap();
        assert_eq!(pin_x(&items), vec![1.0]);
    }

    #[test]
    fn test_runtime_errors_carry_the_line() {
        assert_eq!(
            run("pin 0,0\npin w,0\n"),
            Err(CompileError::reference(2, "name `w` is not defined"))
        );
        assert!(matches!(
            run("var a=1\n\nvar b=a/0\n"),
            Err(CompileError::Evaluation { line: 3, .. })
        ));
    }

    #[test]
    fn test_broken_graphs_are_internal_errors() {
        let graph = Graph {
            nodes: vec![Node::Jmp {
                target: None,
                cond: None,
            }],
            lines: vec![1],
        };
        assert!(matches!(
            execute(&graph, Options::default()),
            Err(CompileError::Internal { .. })
        ));

        let test_cases = vec![Node::MacroReturn, Node::TransformExit];
        for node in test_cases {
            let graph = Graph {
                nodes: vec![node, Node::Exit],
                lines: vec![3, 4],
            };
            assert!(
                matches!(
                    execute(&graph, Options::default()),
                    Err(CompileError::Internal { line: 3, .. })
                ),
                "popping an empty stack must fail"
            );
        }
    }
}
