//! Line parser: turns source text into `Command`s.
//!
//! Each cleaned line is matched against an ordered grammar table; the first
//! rule whose pattern matches builds the command. A synthetic `exit` is
//! appended so every script ends in a halt.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use tracing::{debug, trace};

use super::ast::{Cmd, Command};
use super::value::{Coord, Literal, Number};
use crate::error::CompileError;

/// Columns per indentation level.
pub const INDENT_UNIT: usize = 4;

type Build = fn(&Captures, usize) -> Result<Cmd, CompileError>;

const IDENT: &str = r"[A-Za-z_][A-Za-z0-9_]*";

fn rule(pattern: &str, build: Build) -> (Regex, Build) {
    let pattern = pattern.replace("IDENT", IDENT);
    let re = Regex::new(&pattern).expect("grammar patterns are valid regexes");
    (re, build)
}

lazy_static! {
    static ref GRAMMAR: Vec<(Regex, Build)> = vec![
        rule(r"^exit$", |_, _| Ok(Cmd::Exit)),
        rule(r"^option\s+(IDENT)\s*=\s*(.+)$", build_option),
        rule(r"^board\s+(.+)$", build_board),
        rule(r"^pin\s+(\S+)(?:\s+(\S+))?(?:\s+(\S+))?$", build_pin),
        rule(r"^pinq\s+(\S+)(?:\s+(\S+))?(?:\s+(\S+))?$", build_pinq),
        rule(r"^wire\s+(.+)$", build_wire),
        rule(r#"^text\s+"(.*?)"\s+(\S+)(?:\s+(\S+))?$"#, build_text),
        rule(r"^var\s+(IDENT)\s*=\s*(.+)$", build_var),
        rule(r"^if\s+(.+?)\s*:$", build_if),
        rule(r"^else\s*:$", |_, _| Ok(Cmd::Else)),
        rule(r"^for\s+(IDENT)\s+in\s+(.+?)\.\.(.+?)\s*:$", build_for),
        rule(r"^translate\s+(.+?)\s*:$", build_translate),
        rule(r"^rotate\s+(.+?)\s*:$", build_rotate),
        rule(r"^macro\s+(IDENT)\s*\((.*?)\)\s*:$", build_macro_def),
        rule(r"^(IDENT)\s*\((.*?)\)$", build_macro_call),
    ];
    static ref IDENT_RE: Regex =
        Regex::new(&format!("^{IDENT}$")).expect("identifier pattern is a valid regex");
}

/// Parse a whole script. Blank and comment-only lines are skipped.
pub fn parse_script(code: &str) -> Result<Vec<Command>, CompileError> {
    let mut commands = Vec::new();
    let mut last_line = 0;

    for (idx, raw) in code.split('\n').enumerate() {
        last_line = idx + 1;
        let line = clean_line(raw);
        if line.is_empty() {
            continue;
        }
        let command = parse_line(line, last_line)?;
        trace!(%command, "parsed");
        commands.push(command);
    }
    commands.push(Command::new(Cmd::Exit, 0, last_line + 1));

    debug!(commands = commands.len(), "script parsed");
    Ok(commands)
}

/// Drop a trailing `#` comment and trailing whitespace.
fn clean_line(raw: &str) -> &str {
    raw.split_once('#').map_or(raw, |(code, _)| code).trim_end()
}

/// Parse one cleaned, non-empty line.
pub fn parse_line(line: &str, line_no: usize) -> Result<Command, CompileError> {
    let body = line.trim_start();
    let columns = line.chars().count() - body.chars().count();
    if columns % INDENT_UNIT != 0 {
        return Err(CompileError::parse(
            line_no,
            format!("invalid indent of {columns} columns, must be a multiple of {INDENT_UNIT}"),
        ));
    }

    for (re, build) in GRAMMAR.iter() {
        if let Some(caps) = re.captures(body) {
            let cmd = build(&caps, line_no)?;
            return Ok(Command::new(cmd, columns / INDENT_UNIT, line_no));
        }
    }

    Err(CompileError::parse(
        line_no,
        format!("unknown expression: {body}"),
    ))
}

// ── Rule builders ───────────────────────────────────────────────────

fn group<'t>(caps: &Captures<'t>, i: usize) -> &'t str {
    caps.get(i).map_or("", |m| m.as_str())
}

fn optional_number(caps: &Captures, i: usize) -> Number {
    caps.get(i)
        .map_or_else(Number::absent, |m| Number::new(m.as_str()))
}

fn coord(s: &str, line_no: usize) -> Result<Coord, CompileError> {
    Coord::parse(s).ok_or_else(|| {
        CompileError::parse(line_no, format!("expected an `x,y` coordinate, found `{s}`"))
    })
}

fn build_option(caps: &Captures, _: usize) -> Result<Cmd, CompileError> {
    Ok(Cmd::Option {
        name: Literal::new(group(caps, 1)),
        value: Number::new(group(caps, 2)),
    })
}

fn build_board(caps: &Captures, line_no: usize) -> Result<Cmd, CompileError> {
    Ok(Cmd::Board {
        size: coord(group(caps, 1), line_no)?,
    })
}

fn build_pin(caps: &Captures, line_no: usize) -> Result<Cmd, CompileError> {
    Ok(Cmd::Pin {
        at: coord(group(caps, 1), line_no)?,
        dout: optional_number(caps, 2),
        din: optional_number(caps, 3),
    })
}

fn build_pinq(caps: &Captures, line_no: usize) -> Result<Cmd, CompileError> {
    Ok(Cmd::Pinq {
        at: coord(group(caps, 1), line_no)?,
        dout: optional_number(caps, 2),
        din: optional_number(caps, 3),
    })
}

fn build_wire(caps: &Captures, line_no: usize) -> Result<Cmd, CompileError> {
    let mut tokens: Vec<&str> = group(caps, 1).split_whitespace().collect();

    // A trailing plain number is the width, anything else is a point.
    let width = match tokens.last() {
        Some(last) if last.parse::<f64>().is_ok() => {
            let width = Number::new(*last);
            tokens.pop();
            width
        }
        _ => Number::absent(),
    };

    if tokens.len() < 2 {
        return Err(CompileError::parse(
            line_no,
            "a wire needs at least two points",
        ));
    }

    let points = tokens
        .into_iter()
        .map(|t| coord(t, line_no))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Cmd::Wire { points, width })
}

fn build_text(caps: &Captures, line_no: usize) -> Result<Cmd, CompileError> {
    Ok(Cmd::Text {
        text: Literal::new(group(caps, 1)),
        at: coord(group(caps, 2), line_no)?,
        height: optional_number(caps, 3),
    })
}

fn build_var(caps: &Captures, _: usize) -> Result<Cmd, CompileError> {
    Ok(Cmd::Var {
        name: Literal::new(group(caps, 1)),
        value: Number::new(group(caps, 2)),
    })
}

fn build_if(caps: &Captures, _: usize) -> Result<Cmd, CompileError> {
    Ok(Cmd::If {
        cond: Number::new(group(caps, 1)),
    })
}

fn build_for(caps: &Captures, _: usize) -> Result<Cmd, CompileError> {
    Ok(Cmd::For {
        var: Literal::new(group(caps, 1)),
        from: Number::new(group(caps, 2).trim()),
        to: Number::new(group(caps, 3).trim()),
    })
}

fn build_translate(caps: &Captures, line_no: usize) -> Result<Cmd, CompileError> {
    Ok(Cmd::Translate {
        by: coord(group(caps, 1), line_no)?,
    })
}

fn build_rotate(caps: &Captures, _: usize) -> Result<Cmd, CompileError> {
    Ok(Cmd::Rotate {
        angle: Number::new(group(caps, 1)),
    })
}

fn build_macro_def(caps: &Captures, line_no: usize) -> Result<Cmd, CompileError> {
    let params = split_list(group(caps, 2))
        .into_iter()
        .map(|p| {
            if IDENT_RE.is_match(p) {
                Ok(Literal::new(p))
            } else {
                Err(CompileError::parse(
                    line_no,
                    format!("invalid macro parameter `{p}`"),
                ))
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Cmd::MacroDef {
        name: Literal::new(group(caps, 1)),
        params,
    })
}

fn build_macro_call(caps: &Captures, line_no: usize) -> Result<Cmd, CompileError> {
    let args = split_list(group(caps, 2))
        .into_iter()
        .map(|a| {
            if a.is_empty() {
                Err(CompileError::parse(line_no, "empty macro argument"))
            } else {
                Ok(Number::new(a))
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Cmd::MacroCall {
        name: Literal::new(group(caps, 1)),
        args,
    })
}

/// Comma separated list; an empty (or blank) string is an empty list.
fn split_list(s: &str) -> Vec<&str> {
    let s = s.trim();
    if s.is_empty() {
        return Vec::new();
    }
    s.split(',').map(str::trim).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(line: &str) -> Result<Cmd, CompileError> {
        parse_line(line, 1).map(|c| c.cmd)
    }

    fn coord(x: &str, y: &str) -> Coord {
        Coord {
            x: x.into(),
            y: y.into(),
        }
    }

    #[test]
    fn test_parse_leaf_commands() {
        let test_cases = vec![
            ("exit", Cmd::Exit),
            (
                "option PIN_DOUT = 1.5",
                Cmd::Option {
                    name: Literal::new("PIN_DOUT"),
                    value: Number::new("1.5"),
                },
            ),
            (
                "board 30, 20",
                Cmd::Board {
                    size: coord("30", "20"),
                },
            ),
            (
                "pin 1,2",
                Cmd::Pin {
                    at: coord("1", "2"),
                    dout: Number::absent(),
                    din: Number::absent(),
                },
            ),
            (
                "pinq x+1,y 2 d/2",
                Cmd::Pinq {
                    at: coord("x+1", "y"),
                    dout: Number::new("2"),
                    din: Number::new("d/2"),
                },
            ),
            (
                "wire 0,0 5,0 5,5 0.5",
                Cmd::Wire {
                    points: vec![coord("0", "0"), coord("5", "0"), coord("5", "5")],
                    width: Number::new("0.5"),
                },
            ),
            (
                "wire 0,0 i,0",
                Cmd::Wire {
                    points: vec![coord("0", "0"), coord("i", "0")],
                    width: Number::absent(),
                },
            ),
            (
                "text \"GND rail\" 3,4 1.2",
                Cmd::Text {
                    text: Literal::new("GND rail"),
                    at: coord("3", "4"),
                    height: Number::new("1.2"),
                },
            ),
            (
                "var step=2.54",
                Cmd::Var {
                    name: Literal::new("step"),
                    value: Number::new("2.54"),
                },
            ),
            (
                "led(1, n*2)",
                Cmd::MacroCall {
                    name: Literal::new("led"),
                    args: vec![Number::new("1"), Number::new("n*2")],
                },
            ),
            (
                "reset()",
                Cmd::MacroCall {
                    name: Literal::new("reset"),
                    args: vec![],
                },
            ),
        ];

        for (input, expected) in test_cases {
            assert_eq!(cmd(input), Ok(expected), "parsing {input}");
        }
    }

    #[test]
    fn test_parse_block_commands() {
        let test_cases = vec![
            (
                "if i % 2 == 0 :",
                Cmd::If {
                    cond: Number::new("i % 2 == 0"),
                },
            ),
            ("else:", Cmd::Else),
            (
                "for i in 0.5..n+1:",
                Cmd::For {
                    var: Literal::new("i"),
                    from: Number::new("0.5"),
                    to: Number::new("n+1"),
                },
            ),
            (
                "translate 10,0:",
                Cmd::Translate {
                    by: coord("10", "0"),
                },
            ),
            (
                "rotate 90:",
                Cmd::Rotate {
                    angle: Number::new("90"),
                },
            ),
            (
                "macro dip(x, y, n):",
                Cmd::MacroDef {
                    name: Literal::new("dip"),
                    params: vec![Literal::new("x"), Literal::new("y"), Literal::new("n")],
                },
            ),
            (
                "macro header():",
                Cmd::MacroDef {
                    name: Literal::new("header"),
                    params: vec![],
                },
            ),
        ];

        for (input, expected) in test_cases {
            let parsed = cmd(input);
            assert_eq!(parsed, Ok(expected), "parsing {input}");
        }
    }

    #[test]
    fn test_indent_must_be_multiple_of_unit() {
        for columns in 0..17 {
            let line = format!("{}pin 0,0", " ".repeat(columns));
            let result = parse_line(&line, 7);
            if columns % INDENT_UNIT == 0 {
                assert_eq!(result.map(|c| c.indent), Ok(columns / INDENT_UNIT));
            } else {
                assert!(
                    matches!(result, Err(CompileError::Parse { line: 7, .. })),
                    "{columns} columns should be rejected"
                );
            }
        }
    }

    #[test]
    fn test_rejects_malformed_lines() {
        for line in [
            "pinx 1,2",
            "pin 1",
            "pin 1,2 3 4 5",
            "wire 0,0",
            "wire 0,0 w",
            "board",
            "macro m(1a):",
            "m(1,,2)",
            "if x",
            "text \"unterminated 1,2",
        ] {
            assert!(
                matches!(cmd(line), Err(CompileError::Parse { .. })),
                "expected parse error for {line:?}"
            );
        }
    }

    #[test]
    fn test_comments_blank_lines_and_trailing_exit() {
        let src = "# header\n\nboard 10,10   # outline\n    \npin 1,1\n";
        let commands = parse_script(src).unwrap();

        assert_eq!(commands.len(), 3);
        assert_eq!(commands[0].line, 3);
        assert_eq!(commands[1].line, 5);
        assert_eq!(commands[2].cmd, Cmd::Exit);
        assert_eq!(commands[2].indent, 0);
    }

    #[test]
    fn test_unknown_line_reports_line_number() {
        let err = parse_script("board 1,1\nfrobnicate 3\n").unwrap_err();
        assert_eq!(
            err,
            CompileError::parse(2, "unknown expression: frobnicate 3")
        );
    }
}
